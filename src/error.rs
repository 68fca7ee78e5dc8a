use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Score {score} for {assessment} is outside 0-100")]
    InvalidScore { assessment: String, score: f64 },

    #[error("Weight {0} is outside 0-100")]
    InvalidWeight(f64),

    #[error("Unknown attendance status: {0}")]
    UnknownStatus(String),

    #[error("Student not found: {0}")]
    UnknownStudent(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Class not found: {0}")]
    ClassNotFound(String),
}

impl ReportError {
    pub fn inverted_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self::InvalidRange(format!("end date {end} is before start date {start}"))
    }
}
