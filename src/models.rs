use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReportError;
use crate::grading::{AttendanceLabel, Grade};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub nis: String,
    pub class_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weight {
    pub id: Uuid,
    pub category_id: Uuid,
    pub weight_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub category_id: Uuid,
    pub assessment_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Hadir,
    Sakit,
    Izin,
    Alfa,
    Terlambat,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hadir => "hadir",
            Self::Sakit => "sakit",
            Self::Izin => "izin",
            Self::Alfa => "alfa",
            Self::Terlambat => "terlambat",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hadir" => Ok(Self::Hadir),
            "sakit" => Ok(Self::Sakit),
            "izin" => Ok(Self::Izin),
            "alfa" => Ok(Self::Alfa),
            "terlambat" => Ok(Self::Terlambat),
            other => Err(ReportError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub id: Uuid,
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Inclusive calendar-day range. Both bounds are required and `end >= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if end < start {
            return Err(ReportError::inverted_range(start, end));
        }
        Ok(Self { start, end })
    }

    pub fn from_bounds(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, ReportError> {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            (None, _) => Err(ReportError::InvalidRange("start date is missing".into())),
            (_, None) => Err(ReportError::InvalidRange("end date is missing".into())),
        }
    }

    /// The calendar month containing `day`.
    pub fn month_of(day: NaiveDate) -> Result<Self, ReportError> {
        let start = day.with_day0(0).ok_or_else(|| {
            ReportError::InvalidRange(format!("cannot find first day of month for {day}"))
        })?;
        let next_month = start.checked_add_months(Months::new(1)).ok_or_else(|| {
            ReportError::InvalidRange(format!("month after {start} is out of range"))
        })?;
        let end = next_month.pred_opt().ok_or_else(|| {
            ReportError::InvalidRange(format!("cannot find last day of month for {day}"))
        })?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Calendar span, both ends included. Weekends and holidays are counted.
    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[derive(Debug, Clone)]
pub struct StudentScoreReport {
    pub student: Student,
    /// Category id to average. Categories without scores are absent.
    pub scores: HashMap<Uuid, f64>,
    pub final_score: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone)]
pub struct AttendanceReport {
    pub student: Student,
    pub total_days: i64,
    pub hadir: usize,
    pub sakit: usize,
    pub izin: usize,
    pub alfa: usize,
    pub terlambat: usize,
    pub attendance_percentage: f64,
    pub label: AttendanceLabel,
}

impl AttendanceReport {
    /// Late arrival still earns attendance credit.
    pub fn attended_days(&self) -> usize {
        self.hadir + self.terlambat
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceSummary {
    pub total_students: usize,
    pub total_days: i64,
    pub average_attendance: f64,
    pub best_attendance: Option<AttendanceReport>,
    pub worst_attendance: Option<AttendanceReport>,
}

#[derive(Debug, Clone)]
pub struct AttendanceRecap {
    pub range: DateRange,
    pub reports: Vec<AttendanceReport>,
    pub summary: AttendanceSummary,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub total_classes: i64,
    pub active_classes: i64,
    pub total_students: i64,
    pub total_subjects: i64,
    pub total_categories: i64,
    pub total_scores: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn total_days_counts_both_ends() {
        let single = DateRange::new(day(2024, 3, 1), day(2024, 3, 1)).unwrap();
        assert_eq!(single.total_days(), 1);

        let march = DateRange::new(day(2024, 3, 1), day(2024, 3, 31)).unwrap();
        assert_eq!(march.total_days(), 31);
    }

    #[test]
    fn inverted_or_missing_bounds_are_rejected() {
        assert!(matches!(
            DateRange::new(day(2024, 3, 2), day(2024, 3, 1)),
            Err(ReportError::InvalidRange(_))
        ));
        assert!(DateRange::from_bounds(Some(day(2024, 3, 1)), None).is_err());
        assert!(DateRange::from_bounds(None, Some(day(2024, 3, 1))).is_err());
    }

    #[test]
    fn month_of_covers_the_whole_month() {
        let feb = DateRange::month_of(day(2024, 2, 14)).unwrap();
        assert_eq!(feb.start(), day(2024, 2, 1));
        assert_eq!(feb.end(), day(2024, 2, 29));
        assert_eq!(feb.total_days(), 29);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Terlambat".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Terlambat);
        assert!("bolos".parse::<AttendanceStatus>().is_err());
    }
}
