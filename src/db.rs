use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::backup::{Backup, BackupData};
use crate::error::ReportError;
use crate::models::{
    Attendance, AttendanceStatus, Category, Class, DashboardStats, DateRange, Score, Student,
    Subject, Weight,
};

/// The teacher account every query is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub id: Uuid,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool, owner: Owner) -> anyhow::Result<()> {
    let class_id = upsert_class(pool, owner, "7A").await?;
    let subject_id = upsert_subject(pool, owner, "Matematika").await?;

    let students = [
        ("Avery Lee", "2026001"),
        ("Jules Moreno", "2026002"),
        ("Kiara Patel", "2026003"),
    ];
    let mut student_ids = Vec::new();
    for (name, nis) in students {
        student_ids.push(upsert_student(pool, owner, name, nis, class_id).await?);
    }

    let categories = [
        ("UH1", "Ulangan harian", 30.0),
        ("UTS", "Ujian tengah semester", 30.0),
        ("UAS", "Ujian akhir semester", 40.0),
    ];
    let mut category_ids = Vec::new();
    for (name, description, weight) in categories {
        let category_id = upsert_category(pool, owner, name, description).await?;
        upsert_weight(pool, owner, category_id, weight).await?;
        category_ids.push(category_id);
    }

    let marks: [[f64; 3]; 3] = [[88.0, 92.0, 90.0], [75.0, 68.0, 72.5], [60.0, 58.0, 65.0]];
    for (student_id, row) in student_ids.iter().zip(marks) {
        for (category_id, score) in category_ids.iter().zip(row) {
            upsert_score(pool, owner, *student_id, subject_id, *category_id, "Seed", score)
                .await?;
        }
    }

    let start = NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?;
    let patterns = [
        [AttendanceStatus::Hadir; 5],
        [
            AttendanceStatus::Hadir,
            AttendanceStatus::Terlambat,
            AttendanceStatus::Hadir,
            AttendanceStatus::Sakit,
            AttendanceStatus::Hadir,
        ],
        [
            AttendanceStatus::Alfa,
            AttendanceStatus::Hadir,
            AttendanceStatus::Izin,
            AttendanceStatus::Alfa,
            AttendanceStatus::Hadir,
        ],
    ];
    for (student_id, pattern) in student_ids.iter().zip(patterns) {
        for (offset, status) in pattern.into_iter().enumerate() {
            let date = start + Duration::days(offset as i64);
            upsert_attendance(pool, owner, *student_id, date, status).await?;
        }
    }

    tracing::info!(owner = %owner.id, students = student_ids.len(), "Seed data written");
    Ok(())
}

fn student_from_row(row: &PgRow) -> Student {
    Student {
        id: row.get("id"),
        name: row.get("name"),
        nis: row.get("nis"),
        class_id: row.get("class_id"),
        class_name: row.get("class_name"),
    }
}

fn score_from_row(row: &PgRow) -> Score {
    Score {
        id: row.get("id"),
        student_id: row.get("student_id"),
        subject_id: row.get("subject_id"),
        category_id: row.get("category_id"),
        assessment_name: row.get("assessment_name"),
        score: row.get("score"),
    }
}

fn attendance_from_row(row: &PgRow) -> anyhow::Result<Attendance> {
    let status: String = row.get("status");
    Ok(Attendance {
        id: row.get("id"),
        student_id: row.get("student_id"),
        date: row.get("date"),
        status: status.parse()?,
    })
}

pub async fn list_classes(pool: &PgPool, owner: Owner) -> anyhow::Result<Vec<Class>> {
    let rows = sqlx::query(
        "SELECT id, name, is_active FROM sumatif.classes WHERE user_id = $1 ORDER BY name",
    )
    .bind(owner.id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Class {
            id: row.get("id"),
            name: row.get("name"),
            is_active: row.get("is_active"),
        })
        .collect())
}

pub async fn list_students(
    pool: &PgPool,
    owner: Owner,
    class_id: Option<Uuid>,
) -> anyhow::Result<Vec<Student>> {
    let mut query = String::from(
        "SELECT s.id, s.name, s.nis, s.class_id, c.name AS class_name \
         FROM sumatif.students s \
         LEFT JOIN sumatif.classes c ON c.id = s.class_id \
         WHERE s.user_id = $1",
    );
    if class_id.is_some() {
        query.push_str(" AND s.class_id = $2");
    }
    query.push_str(" ORDER BY s.name, s.nis");

    let mut rows = sqlx::query(&query).bind(owner.id);
    if let Some(value) = class_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records.iter().map(student_from_row).collect())
}

pub async fn list_subjects(pool: &PgPool, owner: Owner) -> anyhow::Result<Vec<Subject>> {
    let rows = sqlx::query("SELECT id, name FROM sumatif.subjects WHERE user_id = $1 ORDER BY name")
        .bind(owner.id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| Subject {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

/// Matches `key` as a UUID first, then as a case-insensitive name.
fn pick_by_key<'a, T>(
    items: &'a [T],
    key: &str,
    id: impl Fn(&T) -> Uuid,
    name: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let key = key.trim();
    if let Ok(wanted) = key.parse::<Uuid>() {
        return items.iter().find(|item| id(*item) == wanted);
    }
    items
        .iter()
        .find(|item| name(*item).trim().eq_ignore_ascii_case(key))
}

pub fn pick_subject<'a>(subjects: &'a [Subject], key: &str) -> Result<&'a Subject, ReportError> {
    pick_by_key(subjects, key, |s| s.id, |s| s.name.as_str())
        .ok_or_else(|| ReportError::SubjectNotFound(key.to_string()))
}

pub fn pick_class<'a>(classes: &'a [Class], key: &str) -> Result<&'a Class, ReportError> {
    pick_by_key(classes, key, |c| c.id, |c| c.name.as_str())
        .ok_or_else(|| ReportError::ClassNotFound(key.to_string()))
}

/// Students are keyed by UUID or NIS; names are not unique.
pub fn pick_student<'a>(students: &'a [Student], key: &str) -> Result<&'a Student, ReportError> {
    pick_by_key(students, key, |s| s.id, |s| s.nis.as_str())
        .ok_or_else(|| ReportError::UnknownStudent(key.to_string()))
}

/// Looks a subject up by id or by name.
pub async fn find_subject(pool: &PgPool, owner: Owner, key: &str) -> anyhow::Result<Subject> {
    let subjects = list_subjects(pool, owner).await?;
    Ok(pick_subject(&subjects, key)?.clone())
}

/// Looks a class up by id or by name.
pub async fn find_class(pool: &PgPool, owner: Owner, key: &str) -> anyhow::Result<Class> {
    let classes = list_classes(pool, owner).await?;
    Ok(pick_class(&classes, key)?.clone())
}

pub async fn list_categories(pool: &PgPool, owner: Owner) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query(
        "SELECT id, name, description FROM sumatif.categories WHERE user_id = $1 ORDER BY created_at, name",
    )
    .bind(owner.id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Category {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
        })
        .collect())
}

pub async fn list_weights(pool: &PgPool, owner: Owner) -> anyhow::Result<Vec<Weight>> {
    let rows = sqlx::query(
        "SELECT w.id, w.category_id, w.weight_percent, c.name AS category_name \
         FROM sumatif.weights w \
         LEFT JOIN sumatif.categories c ON c.id = w.category_id \
         WHERE w.user_id = $1 \
         ORDER BY w.created_at",
    )
    .bind(owner.id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Weight {
            id: row.get("id"),
            category_id: row.get("category_id"),
            weight_percent: row.get("weight_percent"),
            category_name: row.get("category_name"),
        })
        .collect())
}

pub async fn list_scores(
    pool: &PgPool,
    owner: Owner,
    subject_id: Uuid,
    student_id: Option<Uuid>,
) -> anyhow::Result<Vec<Score>> {
    let mut query = String::from(
        "SELECT id, student_id, subject_id, category_id, assessment_name, score \
         FROM sumatif.scores \
         WHERE user_id = $1 AND subject_id = $2",
    );
    if student_id.is_some() {
        query.push_str(" AND student_id = $3");
    }

    let mut rows = sqlx::query(&query).bind(owner.id).bind(subject_id);
    if let Some(value) = student_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records.iter().map(score_from_row).collect())
}

pub async fn list_attendance(
    pool: &PgPool,
    owner: Owner,
    range: DateRange,
    student_id: Option<Uuid>,
) -> anyhow::Result<Vec<Attendance>> {
    let mut query = String::from(
        "SELECT id, student_id, date, status FROM sumatif.attendance \
         WHERE user_id = $1 AND date >= $2 AND date <= $3",
    );
    if student_id.is_some() {
        query.push_str(" AND student_id = $4");
    }
    query.push_str(" ORDER BY date");

    let mut rows = sqlx::query(&query)
        .bind(owner.id)
        .bind(range.start())
        .bind(range.end());
    if let Some(value) = student_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(attendance_from_row).collect()
}

pub async fn dashboard_stats(pool: &PgPool, owner: Owner) -> anyhow::Result<DashboardStats> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM sumatif.classes WHERE user_id = $1) AS total_classes,
            (SELECT COUNT(*) FROM sumatif.classes WHERE user_id = $1 AND is_active) AS active_classes,
            (SELECT COUNT(*) FROM sumatif.students WHERE user_id = $1) AS total_students,
            (SELECT COUNT(*) FROM sumatif.subjects WHERE user_id = $1) AS total_subjects,
            (SELECT COUNT(*) FROM sumatif.categories WHERE user_id = $1) AS total_categories,
            (SELECT COUNT(*) FROM sumatif.scores WHERE user_id = $1) AS total_scores
        "#,
    )
    .bind(owner.id)
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        total_classes: row.get("total_classes"),
        active_classes: row.get("active_classes"),
        total_students: row.get("total_students"),
        total_subjects: row.get("total_subjects"),
        total_categories: row.get("total_categories"),
        total_scores: row.get("total_scores"),
    })
}

async fn upsert_class(pool: &PgPool, owner: Owner, name: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO sumatif.classes (id, user_id, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.id)
    .bind(name)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_subject(pool: &PgPool, owner: Owner, name: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO sumatif.subjects (id, user_id, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.id)
    .bind(name)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_category(
    pool: &PgPool,
    owner: Owner,
    name: &str,
    description: &str,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO sumatif.categories (id, user_id, name, description)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, name) DO UPDATE
        SET description = CASE WHEN EXCLUDED.description = '' THEN sumatif.categories.description
                               ELSE EXCLUDED.description END
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.id)
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_student(
    pool: &PgPool,
    owner: Owner,
    name: &str,
    nis: &str,
    class_id: Uuid,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO sumatif.students (id, user_id, name, nis, class_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, nis) DO UPDATE
        SET name = EXCLUDED.name, class_id = EXCLUDED.class_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.id)
    .bind(name)
    .bind(nis)
    .bind(class_id)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_weight(
    pool: &PgPool,
    owner: Owner,
    category_id: Uuid,
    weight_percent: f64,
) -> anyhow::Result<()> {
    if !(0.0..=100.0).contains(&weight_percent) {
        return Err(ReportError::InvalidWeight(weight_percent).into());
    }

    sqlx::query(
        r#"
        INSERT INTO sumatif.weights (id, user_id, category_id, weight_percent)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, category_id) DO UPDATE
        SET weight_percent = EXCLUDED.weight_percent
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.id)
    .bind(category_id)
    .bind(weight_percent)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_score(
    pool: &PgPool,
    owner: Owner,
    student_id: Uuid,
    subject_id: Uuid,
    category_id: Uuid,
    assessment_name: &str,
    score: f64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sumatif.scores
        (id, user_id, student_id, subject_id, category_id, assessment_name, score)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id, student_id, subject_id, category_id, assessment_name) DO UPDATE
        SET score = EXCLUDED.score
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.id)
    .bind(student_id)
    .bind(subject_id)
    .bind(category_id)
    .bind(assessment_name)
    .bind(score)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_attendance(
    pool: &PgPool,
    owner: Owner,
    student_id: Uuid,
    date: NaiveDate,
    status: AttendanceStatus,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sumatif.attendance (id, user_id, student_id, date, status)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, student_id, date) DO UPDATE
        SET status = EXCLUDED.status
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.id)
    .bind(student_id)
    .bind(date)
    .bind(status.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

async fn student_id_by_nis(pool: &PgPool, owner: Owner, nis: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM sumatif.students WHERE user_id = $1 AND nis = $2")
        .bind(owner.id)
        .bind(nis)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ReportError::UnknownStudent(nis.to_string()))?;
    Ok(row.get("id"))
}

/// Upserts a category weight by category name, creating the category if needed.
pub async fn set_weight(
    pool: &PgPool,
    owner: Owner,
    category: &str,
    weight_percent: f64,
) -> anyhow::Result<()> {
    if !(0.0..=100.0).contains(&weight_percent) {
        return Err(ReportError::InvalidWeight(weight_percent).into());
    }
    let category_id = upsert_category(pool, owner, category, "").await?;
    upsert_weight(pool, owner, category_id, weight_percent).await
}

#[derive(Debug, serde::Deserialize)]
struct StudentCsvRow {
    name: String,
    nis: String,
    class: String,
}

#[derive(Debug, serde::Deserialize)]
struct ScoreCsvRow {
    nis: String,
    subject: String,
    category: String,
    assessment_name: String,
    score: f64,
}

#[derive(Debug, serde::Deserialize)]
struct AttendanceCsvRow {
    nis: String,
    date: NaiveDate,
    status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidStudentRow {
    pub line: usize,
    pub name: String,
    pub nis: String,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidScoreRow {
    pub line: usize,
    pub nis: String,
    pub subject: String,
    pub category: String,
    pub assessment_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidAttendanceRow {
    pub line: usize,
    pub nis: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

fn required(line: usize, column: &str, value: &str) -> anyhow::Result<String> {
    let value = value.trim();
    if value.is_empty() {
        anyhow::bail!("line {line}: {column} is required");
    }
    Ok(value.to_string())
}

/// Rows without a name or NIS are skipped, not rejected.
fn parse_student_row(line: usize, row: StudentCsvRow) -> anyhow::Result<Option<ValidStudentRow>> {
    if row.name.trim().is_empty() || row.nis.trim().is_empty() {
        tracing::warn!(line, "Skipping student row without name or NIS");
        return Ok(None);
    }
    Ok(Some(ValidStudentRow {
        line,
        name: row.name.trim().to_string(),
        nis: row.nis.trim().to_string(),
        class: required(line, "class", &row.class)?,
    }))
}

fn parse_score_row(line: usize, row: ScoreCsvRow) -> anyhow::Result<ValidScoreRow> {
    let assessment_name = required(line, "assessment_name", &row.assessment_name)?;
    // NaN fails the range check as well.
    if !(0.0..=100.0).contains(&row.score) {
        return Err(ReportError::InvalidScore {
            assessment: assessment_name,
            score: row.score,
        })
        .with_context(|| format!("line {line}"));
    }
    Ok(ValidScoreRow {
        line,
        nis: required(line, "nis", &row.nis)?,
        subject: required(line, "subject", &row.subject)?,
        category: required(line, "category", &row.category)?,
        assessment_name,
        score: row.score,
    })
}

fn parse_attendance_row(line: usize, row: AttendanceCsvRow) -> anyhow::Result<ValidAttendanceRow> {
    let status = row
        .status
        .parse::<AttendanceStatus>()
        .with_context(|| format!("line {line}"))?;
    Ok(ValidAttendanceRow {
        line,
        nis: required(line, "nis", &row.nis)?,
        date: row.date,
        status,
    })
}

/// Deserializes and validates every row before anything is written, so a
/// bad line aborts the import without a partial write. Line numbers count
/// the header as line 1.
fn read_rows<R, Row, Valid>(
    input: R,
    parse: impl Fn(usize, Row) -> anyhow::Result<Valid>,
) -> anyhow::Result<Vec<Valid>>
where
    R: std::io::Read,
    Row: serde::de::DeserializeOwned,
{
    let mut reader = csv::Reader::from_reader(input);
    reader
        .deserialize::<Row>()
        .enumerate()
        .map(|(index, result)| {
            let line = index + 2;
            let row = result.with_context(|| format!("line {line}"))?;
            parse(line, row)
        })
        .collect()
}

pub fn read_student_rows<R: std::io::Read>(input: R) -> anyhow::Result<Vec<ValidStudentRow>> {
    let rows = read_rows(input, parse_student_row)?;
    Ok(rows.into_iter().flatten().collect())
}

pub fn read_score_rows<R: std::io::Read>(input: R) -> anyhow::Result<Vec<ValidScoreRow>> {
    read_rows(input, parse_score_row)
}

pub fn read_attendance_rows<R: std::io::Read>(input: R) -> anyhow::Result<Vec<ValidAttendanceRow>> {
    read_rows(input, parse_attendance_row)
}

fn open_csv(csv_path: &std::path::Path) -> anyhow::Result<std::fs::File> {
    std::fs::File::open(csv_path).with_context(|| format!("failed to open {}", csv_path.display()))
}

pub async fn import_students_csv(
    pool: &PgPool,
    owner: Owner,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let rows = read_student_rows(open_csv(csv_path)?)?;

    for row in &rows {
        let class_id = upsert_class(pool, owner, &row.class).await?;
        upsert_student(pool, owner, &row.name, &row.nis, class_id)
            .await
            .with_context(|| format!("line {}", row.line))?;
    }

    Ok(rows.len())
}

pub async fn import_scores_csv(
    pool: &PgPool,
    owner: Owner,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let rows = read_score_rows(open_csv(csv_path)?)?;

    for row in &rows {
        let student_id = student_id_by_nis(pool, owner, &row.nis)
            .await
            .with_context(|| format!("line {}", row.line))?;
        let subject_id = upsert_subject(pool, owner, &row.subject).await?;
        let category_id = upsert_category(pool, owner, &row.category, "").await?;
        upsert_score(
            pool,
            owner,
            student_id,
            subject_id,
            category_id,
            &row.assessment_name,
            row.score,
        )
        .await?;
    }

    Ok(rows.len())
}

pub async fn import_attendance_csv(
    pool: &PgPool,
    owner: Owner,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let rows = read_attendance_rows(open_csv(csv_path)?)?;

    for row in &rows {
        let student_id = student_id_by_nis(pool, owner, &row.nis)
            .await
            .with_context(|| format!("line {}", row.line))?;
        upsert_attendance(pool, owner, student_id, row.date, row.status).await?;
    }

    Ok(rows.len())
}

pub async fn export_backup(pool: &PgPool, owner: Owner) -> anyhow::Result<BackupData> {
    let (classes, students, subjects, categories, weights) = tokio::try_join!(
        list_classes(pool, owner),
        list_students(pool, owner, None),
        list_subjects(pool, owner),
        list_categories(pool, owner),
        list_weights(pool, owner),
    )?;

    let score_rows = sqlx::query(
        "SELECT id, student_id, subject_id, category_id, assessment_name, score \
         FROM sumatif.scores WHERE user_id = $1",
    )
    .bind(owner.id)
    .fetch_all(pool)
    .await?;
    let scores = score_rows.iter().map(score_from_row).collect();

    let attendance_rows = sqlx::query(
        "SELECT id, student_id, date, status FROM sumatif.attendance WHERE user_id = $1",
    )
    .bind(owner.id)
    .fetch_all(pool)
    .await?;
    let attendance = attendance_rows
        .iter()
        .map(attendance_from_row)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(BackupData {
        classes,
        students,
        subjects,
        categories,
        weights,
        scores,
        attendance,
    })
}

/// Replaces every row the owner has with the backup contents, atomically.
/// A backup taken by another owner is restored under fresh ids, since the
/// recorded ones still belong to that owner's rows.
pub async fn restore_backup(pool: &PgPool, owner: Owner, backup: &Backup) -> anyhow::Result<()> {
    let data = backup.rows_for(owner.id);
    let mut tx = pool.begin().await?;

    for table in [
        "attendance",
        "scores",
        "weights",
        "students",
        "categories",
        "subjects",
        "classes",
    ] {
        sqlx::query(&format!("DELETE FROM sumatif.{table} WHERE user_id = $1"))
            .bind(owner.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to clear {table}"))?;
    }

    insert_backup_rows(&mut tx, owner, &data).await?;
    tx.commit().await?;

    tracing::info!(
        owner = %owner.id,
        source_owner = %backup.user_id,
        remapped = owner.id != backup.user_id,
        students = data.students.len(),
        scores = data.scores.len(),
        attendance = data.attendance.len(),
        "Backup restored"
    );
    Ok(())
}

async fn insert_backup_rows(
    tx: &mut Transaction<'_, Postgres>,
    owner: Owner,
    data: &BackupData,
) -> anyhow::Result<()> {
    for class in &data.classes {
        sqlx::query("INSERT INTO sumatif.classes (id, user_id, name, is_active) VALUES ($1, $2, $3, $4)")
            .bind(class.id)
            .bind(owner.id)
            .bind(&class.name)
            .bind(class.is_active)
            .execute(&mut **tx)
            .await?;
    }

    for subject in &data.subjects {
        sqlx::query("INSERT INTO sumatif.subjects (id, user_id, name) VALUES ($1, $2, $3)")
            .bind(subject.id)
            .bind(owner.id)
            .bind(&subject.name)
            .execute(&mut **tx)
            .await?;
    }

    for category in &data.categories {
        sqlx::query(
            "INSERT INTO sumatif.categories (id, user_id, name, description) VALUES ($1, $2, $3, $4)",
        )
        .bind(category.id)
        .bind(owner.id)
        .bind(&category.name)
        .bind(&category.description)
        .execute(&mut **tx)
        .await?;
    }

    for student in &data.students {
        sqlx::query(
            "INSERT INTO sumatif.students (id, user_id, name, nis, class_id) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(student.id)
        .bind(owner.id)
        .bind(&student.name)
        .bind(&student.nis)
        .bind(student.class_id)
        .execute(&mut **tx)
        .await?;
    }

    for weight in &data.weights {
        sqlx::query(
            "INSERT INTO sumatif.weights (id, user_id, category_id, weight_percent) VALUES ($1, $2, $3, $4)",
        )
        .bind(weight.id)
        .bind(owner.id)
        .bind(weight.category_id)
        .bind(weight.weight_percent)
        .execute(&mut **tx)
        .await?;
    }

    for score in &data.scores {
        sqlx::query(
            r#"
            INSERT INTO sumatif.scores
            (id, user_id, student_id, subject_id, category_id, assessment_name, score)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(score.id)
        .bind(owner.id)
        .bind(score.student_id)
        .bind(score.subject_id)
        .bind(score.category_id)
        .bind(&score.assessment_name)
        .bind(score.score)
        .execute(&mut **tx)
        .await?;
    }

    for record in &data.attendance {
        sqlx::query(
            "INSERT INTO sumatif.attendance (id, user_id, student_id, date, status) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(owner.id)
        .bind(record.student_id)
        .bind(record.date)
        .bind(record.status.as_str())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
