use std::fmt;

use crate::models::Weight;

/// Round to 2 decimals, half away from zero (half-up for non-negative input).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn letter_grade(score: f64) -> Grade {
    match score {
        s if s >= 90.0 => Grade::A,
        s if s >= 80.0 => Grade::B,
        s if s >= 70.0 => Grade::C,
        s if s >= 60.0 => Grade::D,
        _ => Grade::E,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceLabel {
    SangatBaik,
    Baik,
    Cukup,
    Kurang,
    SangatKurang,
}

impl AttendanceLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SangatBaik => "Sangat Baik",
            Self::Baik => "Baik",
            Self::Cukup => "Cukup",
            Self::Kurang => "Kurang",
            Self::SangatKurang => "Sangat Kurang",
        }
    }
}

impl fmt::Display for AttendanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn attendance_label(percentage: f64) -> AttendanceLabel {
    match percentage {
        p if p >= 95.0 => AttendanceLabel::SangatBaik,
        p if p >= 85.0 => AttendanceLabel::Baik,
        p if p >= 75.0 => AttendanceLabel::Cukup,
        p if p >= 65.0 => AttendanceLabel::Kurang,
        _ => AttendanceLabel::SangatKurang,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBalance {
    pub total: f64,
    pub remaining: f64,
    pub balanced: bool,
}

/// Totals the configured weights. The set is balanced only at exactly 100.
pub fn weight_balance(weights: &[Weight]) -> WeightBalance {
    let total: f64 = weights.iter().map(|w| w.weight_percent).sum();
    WeightBalance {
        total,
        remaining: 100.0 - total,
        balanced: total == 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn weight(percent: f64) -> Weight {
        Weight {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            weight_percent: percent,
            category_name: None,
        }
    }

    #[test]
    fn grade_bands_are_inclusive_at_lower_bound() {
        assert_eq!(letter_grade(100.0), Grade::A);
        assert_eq!(letter_grade(90.0), Grade::A);
        assert_eq!(letter_grade(89.99), Grade::B);
        assert_eq!(letter_grade(80.0), Grade::B);
        assert_eq!(letter_grade(70.0), Grade::C);
        assert_eq!(letter_grade(60.0), Grade::D);
        assert_eq!(letter_grade(59.99), Grade::E);
        assert_eq!(letter_grade(0.0), Grade::E);
    }

    #[test]
    fn attendance_labels_are_inclusive_at_lower_bound() {
        assert_eq!(attendance_label(95.0), AttendanceLabel::SangatBaik);
        assert_eq!(attendance_label(94.99), AttendanceLabel::Baik);
        assert_eq!(attendance_label(85.0), AttendanceLabel::Baik);
        assert_eq!(attendance_label(80.0), AttendanceLabel::Cukup);
        assert_eq!(attendance_label(65.0), AttendanceLabel::Kurang);
        assert_eq!(attendance_label(64.99), AttendanceLabel::SangatKurang);
        assert_eq!(AttendanceLabel::SangatKurang.to_string(), "Sangat Kurang");
    }

    #[test]
    fn round2_rounds_half_up() {
        assert_eq!(round2(76.0), 76.0);
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(12.345_1), 12.35);
        assert_eq!(round2(12.344_9), 12.34);
        assert_eq!(round2(0.125), 0.13);
    }

    #[test]
    fn weight_balance_reports_remaining() {
        let balance = weight_balance(&[weight(40.0), weight(20.0)]);
        assert_eq!(balance.total, 60.0);
        assert_eq!(balance.remaining, 40.0);
        assert!(!balance.balanced);

        assert!(weight_balance(&[weight(40.0), weight(60.0)]).balanced);
        assert_eq!(weight_balance(&[]).total, 0.0);
    }
}
