use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod attendance;
mod backup;
mod config;
mod db;
mod error;
mod grading;
mod models;
mod report;
mod scores;

use crate::db::Owner;
use crate::error::ReportError;
use crate::models::DateRange;

#[derive(Parser)]
#[command(name = "sumatif")]
#[command(about = "SUMATIF CLOUD grade and attendance recaps", long_about = None)]
struct Cli {
    /// Teacher account every query is scoped to
    #[arg(long, env = "SUMATIF_OWNER_ID", global = true)]
    owner: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImportKind {
    Students,
    Scores,
    Attendance,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo data for the owner
    Seed,
    /// Import rows from a CSV file
    Import {
        #[arg(long, value_enum)]
        kind: ImportKind,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Set the weight of a grading category (0-100)
    SetWeight {
        #[arg(long)]
        category: String,
        #[arg(long)]
        percent: f64,
    },
    /// Show configured weights and whether they total 100%
    Weights,
    /// Show record counts for the owner
    Dashboard,
    /// List subjects with their ids
    Subjects,
    /// List classes with their ids
    Classes,
    /// Weighted final score recap for one subject
    Scores {
        /// Subject id or name
        #[arg(long)]
        subject: String,
        /// Class id or name
        #[arg(long)]
        class: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Attendance recap over an inclusive date range (defaults to this month)
    #[command(group(
        ArgGroup::new("period")
            .args(["month", "start"])
            .multiple(false)
    ))]
    Attendance {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
        /// Whole calendar month, as YYYY-MM
        #[arg(long)]
        month: Option<String>,
        /// Class id or name
        #[arg(long)]
        class: Option<String>,
        /// Student id or NIS
        #[arg(long)]
        student: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export every table for the owner to JSON
    Backup {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the owner's data with a backup file
    Restore {
        #[arg(long)]
        file: PathBuf,
        /// Confirm that existing data will be deleted
        #[arg(long)]
        yes: bool,
    },
}

fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    month: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange, ReportError> {
    if let Some(month) = month {
        let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
            .map_err(|_| ReportError::InvalidRange(format!("month must be YYYY-MM, got {month}")))?;
        return DateRange::month_of(first);
    }
    if start.is_none() && end.is_none() {
        return DateRange::month_of(today);
    }
    DateRange::from_bounds(start, end)
}

fn require_owner(owner: Option<Uuid>) -> anyhow::Result<Owner> {
    let id = owner.context("--owner or SUMATIF_OWNER_ID must identify the teacher account")?;
    Ok(Owner { id })
}

fn write_output(
    out: Option<&Path>,
    render: impl FnOnce(&mut dyn Write) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            render(&mut file)?;
            println!("Report written to {}.", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            render(&mut lock)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sumatif_cloud=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    tracing::debug!(max_connections = config.max_connections, "Database pool ready");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let owner = require_owner(cli.owner)?;
            db::seed(&pool, owner).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { kind, csv } => {
            let owner = require_owner(cli.owner)?;
            let imported = match kind {
                ImportKind::Students => db::import_students_csv(&pool, owner, &csv).await?,
                ImportKind::Scores => db::import_scores_csv(&pool, owner, &csv).await?,
                ImportKind::Attendance => db::import_attendance_csv(&pool, owner, &csv).await?,
            };
            tracing::info!(imported, path = %csv.display(), "CSV import finished");
            println!("Imported {imported} rows from {}.", csv.display());
        }
        Commands::SetWeight { category, percent } => {
            let owner = require_owner(cli.owner)?;
            db::set_weight(&pool, owner, &category, percent).await?;
            let balance = grading::weight_balance(&db::list_weights(&pool, owner).await?);
            println!(
                "Weight for {category} set to {percent}%. Total {}%, remaining {}%.",
                balance.total, balance.remaining
            );
        }
        Commands::Weights => {
            let owner = require_owner(cli.owner)?;
            let weights = db::list_weights(&pool, owner).await?;
            if weights.is_empty() {
                println!("No weights configured.");
                return Ok(());
            }
            for weight in &weights {
                println!(
                    "- {}: {}%",
                    weight.category_name.as_deref().unwrap_or("-"),
                    weight.weight_percent
                );
            }
            let balance = grading::weight_balance(&weights);
            if balance.balanced {
                println!("Total 100%, weights are balanced.");
            } else {
                println!(
                    "Total {}% of 100%, {}% remaining. Final scores will be rescaled.",
                    balance.total, balance.remaining
                );
            }
        }
        Commands::Dashboard => {
            let owner = require_owner(cli.owner)?;
            let stats = db::dashboard_stats(&pool, owner).await?;
            println!("Total Kelas: {}", stats.total_classes);
            println!("Kelas Aktif: {}", stats.active_classes);
            println!("Total Siswa: {}", stats.total_students);
            println!("Mata Pelajaran: {}", stats.total_subjects);
            println!("Kategori Penilaian: {}", stats.total_categories);
            println!("Total Nilai: {}", stats.total_scores);
        }
        Commands::Subjects => {
            let subjects = db::list_subjects(&pool, require_owner(cli.owner)?).await?;
            if subjects.is_empty() {
                println!("No subjects yet.");
            }
            for subject in &subjects {
                println!("{}  {}", subject.id, subject.name);
            }
        }
        Commands::Classes => {
            let classes = db::list_classes(&pool, require_owner(cli.owner)?).await?;
            if classes.is_empty() {
                println!("No classes yet.");
            }
            for class in &classes {
                let state = if class.is_active { "aktif" } else { "nonaktif" };
                println!("{}  {}  ({state})", class.id, class.name);
            }
        }
        Commands::Scores {
            subject,
            class,
            format,
            out,
        } => {
            let owner = require_owner(cli.owner)?;
            let subject = db::find_subject(&pool, owner, &subject).await?;
            let class_id = match class.as_deref() {
                Some(key) => Some(db::find_class(&pool, owner, key).await?.id),
                None => None,
            };
            let (students, scores, categories, weights) = tokio::try_join!(
                db::list_students(&pool, owner, class_id),
                db::list_scores(&pool, owner, subject.id, None),
                db::list_categories(&pool, owner),
                db::list_weights(&pool, owner),
            )?;
            tracing::info!(
                subject = %subject.name,
                students = students.len(),
                scores = scores.len(),
                "Fetched score snapshot"
            );

            let reports = scores::build_score_report(
                scores::ScoreSnapshot {
                    students: &students,
                    scores: &scores,
                    categories: &categories,
                    weights: &weights,
                },
                scores::ScoreFilter {
                    subject_id: subject.id,
                    class_id,
                },
            );

            write_output(out.as_deref(), |w| match format {
                OutputFormat::Csv => report::write_score_csv(w, &categories, &reports),
                OutputFormat::Markdown => {
                    let doc = report::build_score_report(&subject, &categories, &weights, &reports);
                    w.write_all(doc.as_bytes())?;
                    Ok(())
                }
            })?;
        }
        Commands::Attendance {
            start,
            end,
            month,
            class,
            student,
            format,
            out,
        } => {
            let owner = require_owner(cli.owner)?;
            let range = resolve_range(start, end, month.as_deref(), Utc::now().date_naive())?;
            let (classes, students) = tokio::try_join!(
                db::list_classes(&pool, owner),
                db::list_students(&pool, owner, None),
            )?;
            let class_id = class
                .as_deref()
                .map(|key| db::pick_class(&classes, key).map(|c| c.id))
                .transpose()?;
            let student_id = student
                .as_deref()
                .map(|key| db::pick_student(&students, key).map(|s| s.id))
                .transpose()?;
            let records = db::list_attendance(&pool, owner, range, student_id).await?;
            tracing::info!(
                %range,
                students = students.len(),
                records = records.len(),
                "Fetched attendance snapshot"
            );

            let recap = attendance::build_attendance_report(
                &students,
                &records,
                attendance::AttendanceFilter {
                    range,
                    class_id,
                    student_id,
                },
            );

            write_output(out.as_deref(), |w| match format {
                OutputFormat::Csv => report::write_attendance_csv(w, &recap),
                OutputFormat::Markdown => {
                    w.write_all(report::build_attendance_report(&recap).as_bytes())?;
                    Ok(())
                }
            })?;
        }
        Commands::Backup { out } => {
            let owner = require_owner(cli.owner)?;
            let data = db::export_backup(&pool, owner).await?;
            let backup = backup::Backup::new(owner.id, data);
            let path = out.unwrap_or_else(|| PathBuf::from(backup.file_name()));
            backup.write_to(&path)?;
            println!("Backup written to {}.", path.display());
        }
        Commands::Restore { file, yes } => {
            anyhow::ensure!(
                yes,
                "restore deletes all existing data for this account; pass --yes to continue"
            );
            let owner = require_owner(cli.owner)?;
            let backup = backup::Backup::read_from(&file)?;
            db::restore_backup(&pool, owner, &backup).await?;
            println!("Backup from {} restored.", backup.timestamp);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_defaults_to_current_month() {
        let range = resolve_range(None, None, None, day(2026, 10, 16)).unwrap();
        assert_eq!(range.start(), day(2026, 10, 1));
        assert_eq!(range.end(), day(2026, 10, 31));
    }

    #[test]
    fn range_from_month_argument() {
        let range = resolve_range(None, None, Some("2024-02"), day(2026, 10, 16)).unwrap();
        assert_eq!(range.total_days(), 29);
        assert!(resolve_range(None, None, Some("Feb"), day(2026, 10, 16)).is_err());
    }

    #[test]
    fn half_open_range_is_rejected() {
        let err = resolve_range(Some(day(2024, 3, 1)), None, None, day(2026, 10, 16)).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRange(_)));

        let range =
            resolve_range(Some(day(2024, 3, 1)), Some(day(2024, 3, 31)), None, day(2026, 10, 16))
                .unwrap();
        assert_eq!(range.total_days(), 31);
    }

    #[test]
    fn owner_is_required_outside_init_db() {
        let err = require_owner(None).unwrap_err();
        assert!(err.to_string().contains("SUMATIF_OWNER_ID"));

        let id = Uuid::new_v4();
        assert_eq!(require_owner(Some(id)).unwrap(), Owner { id });
    }

    #[test]
    fn report_filters_accept_names() {
        let cli = Cli::try_parse_from([
            "sumatif",
            "scores",
            "--subject",
            "Matematika",
            "--class",
            "7A",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Scores { subject, class: Some(class), .. } if subject == "Matematika" && class == "7A"
        ));

        let cli = Cli::try_parse_from(["sumatif", "init-db"]).unwrap();
        assert!(matches!(cli.command, Commands::InitDb));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
