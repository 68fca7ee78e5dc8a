use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Attendance, Category, Class, Score, Student, Subject, Weight};

/// Full snapshot of one owner's tables, in the JSON shape the web client
/// downloads: `{ timestamp, user_id, data: { classes, students, ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub timestamp: DateTime<Utc>,
    pub user_id: Uuid,
    pub data: BackupData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupData {
    #[serde(default)]
    pub classes: Vec<Class>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub weights: Vec<Weight>,
    #[serde(default)]
    pub scores: Vec<Score>,
    #[serde(default)]
    pub attendance: Vec<Attendance>,
}

impl Backup {
    pub fn new(user_id: Uuid, data: BackupData) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id,
            data,
        }
    }

    /// Default file name, `backup-YYYY-MM-DD.json`.
    pub fn file_name(&self) -> String {
        format!("backup-{}.json", self.timestamp.date_naive())
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write backup to {}", path.display()))
    }

    pub fn read_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let backup: Self = serde_json::from_str(content).context("invalid backup file format")?;
        backup.check_references()?;
        Ok(backup)
    }

    /// Rejects backups whose rows point at entities missing from the file,
    /// which would otherwise fail halfway through a restore.
    fn check_references(&self) -> anyhow::Result<()> {
        let data = &self.data;
        let has = |ids: &[Uuid], id: Uuid| ids.contains(&id);
        let class_ids: Vec<Uuid> = data.classes.iter().map(|c| c.id).collect();
        let student_ids: Vec<Uuid> = data.students.iter().map(|s| s.id).collect();
        let subject_ids: Vec<Uuid> = data.subjects.iter().map(|s| s.id).collect();
        let category_ids: Vec<Uuid> = data.categories.iter().map(|c| c.id).collect();

        if let Some(student) = data.students.iter().find(|s| !has(&class_ids, s.class_id)) {
            anyhow::bail!("student {} references a missing class", student.nis);
        }
        if let Some(weight) = data.weights.iter().find(|w| !has(&category_ids, w.category_id)) {
            anyhow::bail!("weight {} references a missing category", weight.id);
        }
        if let Some(score) = data.scores.iter().find(|s| {
            !has(&student_ids, s.student_id)
                || !has(&subject_ids, s.subject_id)
                || !has(&category_ids, s.category_id)
        }) {
            anyhow::bail!("score {} references a missing row", score.assessment_name);
        }
        if let Some(record) = data.attendance.iter().find(|a| !has(&student_ids, a.student_id)) {
            anyhow::bail!("attendance on {} references a missing student", record.date);
        }
        Ok(())
    }

    /// Rows to insert for `owner_id`. The recorded ids are kept when the
    /// backup is that owner's own; otherwise every id is replaced.
    pub fn rows_for(&self, owner_id: Uuid) -> Cow<'_, BackupData> {
        if self.user_id == owner_id {
            Cow::Borrowed(&self.data)
        } else {
            Cow::Owned(self.data.with_fresh_ids())
        }
    }
}

/// Old id to new id, allocated on first sight.
#[derive(Default)]
struct IdMap(HashMap<Uuid, Uuid>);

impl IdMap {
    fn map(&mut self, old: Uuid) -> Uuid {
        *self.0.entry(old).or_insert_with(Uuid::new_v4)
    }
}

impl BackupData {
    /// Copy of the data with every primary key regenerated and every
    /// reference rewritten to match.
    pub fn with_fresh_ids(&self) -> Self {
        let mut ids = IdMap::default();

        let classes = self
            .classes
            .iter()
            .map(|class| Class {
                id: ids.map(class.id),
                ..class.clone()
            })
            .collect();
        let subjects = self
            .subjects
            .iter()
            .map(|subject| Subject {
                id: ids.map(subject.id),
                ..subject.clone()
            })
            .collect();
        let categories = self
            .categories
            .iter()
            .map(|category| Category {
                id: ids.map(category.id),
                ..category.clone()
            })
            .collect();
        let students = self
            .students
            .iter()
            .map(|student| Student {
                id: ids.map(student.id),
                class_id: ids.map(student.class_id),
                ..student.clone()
            })
            .collect();
        let weights = self
            .weights
            .iter()
            .map(|weight| Weight {
                id: ids.map(weight.id),
                category_id: ids.map(weight.category_id),
                ..weight.clone()
            })
            .collect();
        let scores = self
            .scores
            .iter()
            .map(|score| Score {
                id: ids.map(score.id),
                student_id: ids.map(score.student_id),
                subject_id: ids.map(score.subject_id),
                category_id: ids.map(score.category_id),
                ..score.clone()
            })
            .collect();
        let attendance = self
            .attendance
            .iter()
            .map(|record| Attendance {
                id: ids.map(record.id),
                student_id: ids.map(record.student_id),
                ..record.clone()
            })
            .collect();

        Self {
            classes,
            students,
            subjects,
            categories,
            weights,
            scores,
            attendance,
        }
    }
}
