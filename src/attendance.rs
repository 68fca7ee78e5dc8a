use uuid::Uuid;

use crate::grading::{attendance_label, round2};
use crate::models::{
    Attendance, AttendanceRecap, AttendanceReport, AttendanceStatus, AttendanceSummary, DateRange,
    Student,
};

#[derive(Debug, Clone, Copy)]
pub struct AttendanceFilter {
    pub range: DateRange,
    pub class_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}

pub fn build_attendance_report(
    students: &[Student],
    attendance: &[Attendance],
    filter: AttendanceFilter,
) -> AttendanceRecap {
    let records: Vec<&Attendance> = attendance
        .iter()
        .filter(|record| filter.range.contains(record.date))
        .filter(|record| filter.student_id.map_or(true, |id| record.student_id == id))
        .collect();

    let total_days = filter.range.total_days();

    let reports: Vec<AttendanceReport> = students
        .iter()
        .filter(|student| filter.class_id.map_or(true, |id| student.class_id == id))
        .filter(|student| filter.student_id.map_or(true, |id| student.id == id))
        .map(|student| student_report(student, &records, total_days))
        .collect();

    let summary = summarize(&reports, total_days);

    tracing::debug!(
        range = %filter.range,
        students = summary.total_students,
        records = records.len(),
        average = summary.average_attendance,
        "Built attendance recap"
    );

    AttendanceRecap {
        range: filter.range,
        reports,
        summary,
    }
}

fn student_report(student: &Student, records: &[&Attendance], total_days: i64) -> AttendanceReport {
    let mut report = AttendanceReport {
        student: student.clone(),
        total_days,
        hadir: 0,
        sakit: 0,
        izin: 0,
        alfa: 0,
        terlambat: 0,
        attendance_percentage: 0.0,
        label: attendance_label(0.0),
    };

    for record in records.iter().filter(|r| r.student_id == student.id) {
        match record.status {
            AttendanceStatus::Hadir => report.hadir += 1,
            AttendanceStatus::Sakit => report.sakit += 1,
            AttendanceStatus::Izin => report.izin += 1,
            AttendanceStatus::Alfa => report.alfa += 1,
            AttendanceStatus::Terlambat => report.terlambat += 1,
        }
    }

    report.attendance_percentage = attendance_percentage(report.attended_days(), total_days);
    report.label = attendance_label(report.attendance_percentage);
    report
}

pub fn attendance_percentage(attended_days: usize, total_days: i64) -> f64 {
    if total_days <= 0 {
        return 0.0;
    }
    round2(attended_days as f64 / total_days as f64 * 100.0)
}

/// Best and worst keep the first strictly better candidate, so earlier
/// students win ties.
pub fn summarize(reports: &[AttendanceReport], total_days: i64) -> AttendanceSummary {
    if reports.is_empty() {
        return AttendanceSummary {
            total_days,
            ..AttendanceSummary::default()
        };
    }

    let total: f64 = reports.iter().map(|r| r.attendance_percentage).sum();
    let average = total / reports.len() as f64;

    let mut best = &reports[0];
    let mut worst = &reports[0];
    for report in &reports[1..] {
        if report.attendance_percentage > best.attendance_percentage {
            best = report;
        }
        if report.attendance_percentage < worst.attendance_percentage {
            worst = report;
        }
    }

    AttendanceSummary {
        total_students: reports.len(),
        total_days,
        average_attendance: round2(average),
        best_attendance: Some(best.clone()),
        worst_attendance: Some(worst.clone()),
    }
}
