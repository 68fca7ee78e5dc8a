use std::fmt::Write;

use crate::grading::weight_balance;
use crate::models::{AttendanceRecap, AttendanceReport, Category, StudentScoreReport, Subject, Weight};

fn class_label(class_name: Option<&str>) -> &str {
    class_name.unwrap_or("-")
}

fn category_cell(report: &StudentScoreReport, category: &Category) -> String {
    report
        .scores
        .get(&category.id)
        .map(|average| format!("{average:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn score_headers(categories: &[Category]) -> Vec<String> {
    let mut headers = vec!["Nama".to_string(), "NIS".to_string(), "Kelas".to_string()];
    headers.extend(categories.iter().map(|c| c.name.clone()));
    headers.push("Nilai Akhir".to_string());
    headers.push("Grade".to_string());
    headers
}

pub fn score_row(report: &StudentScoreReport, categories: &[Category]) -> Vec<String> {
    let mut row = vec![
        report.student.name.clone(),
        report.student.nis.clone(),
        class_label(report.student.class_name.as_deref()).to_string(),
    ];
    row.extend(categories.iter().map(|c| category_cell(report, c)));
    row.push(format!("{:.1}", report.final_score));
    row.push(report.grade.to_string());
    row
}

pub const ATTENDANCE_HEADERS: [&str; 11] = [
    "Nama",
    "NIS",
    "Kelas",
    "Total Hari",
    "Hadir",
    "Sakit",
    "Izin",
    "Alfa",
    "Terlambat",
    "Persentase Kehadiran",
    "Predikat",
];

pub fn attendance_row(report: &AttendanceReport) -> Vec<String> {
    vec![
        report.student.name.clone(),
        report.student.nis.clone(),
        class_label(report.student.class_name.as_deref()).to_string(),
        report.total_days.to_string(),
        report.hadir.to_string(),
        report.sakit.to_string(),
        report.izin.to_string(),
        report.alfa.to_string(),
        report.terlambat.to_string(),
        format!("{:.1}%", report.attendance_percentage),
        report.label.to_string(),
    ]
}

pub fn write_score_csv<W: std::io::Write>(
    out: W,
    categories: &[Category],
    reports: &[StudentScoreReport],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(score_headers(categories))?;
    for report in reports {
        writer.write_record(score_row(report, categories))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_attendance_csv<W: std::io::Write>(
    out: W,
    recap: &AttendanceRecap,
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(ATTENDANCE_HEADERS)?;
    for report in &recap.reports {
        writer.write_record(attendance_row(report))?;
    }
    writer.flush()?;
    Ok(())
}

fn markdown_table(output: &mut String, headers: &[String], rows: &[Vec<String>]) {
    let _ = writeln!(output, "| {} |", headers.join(" | "));
    let _ = writeln!(output, "|{}", "---|".repeat(headers.len()));
    for row in rows {
        let _ = writeln!(output, "| {} |", row.join(" | "));
    }
}

pub fn build_score_report(
    subject: &Subject,
    categories: &[Category],
    weights: &[Weight],
    reports: &[StudentScoreReport],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Rekap Nilai - {}", subject.name);
    let _ = writeln!(output, "{} siswa", reports.len());
    let _ = writeln!(output);
    let _ = writeln!(output, "## Bobot Penilaian");

    if weights.is_empty() {
        let _ = writeln!(output, "No weights configured; every final score is 0.");
    } else {
        for weight in weights {
            let _ = writeln!(
                output,
                "- {}: {}%",
                weight.category_name.as_deref().unwrap_or("-"),
                weight.weight_percent
            );
        }
        let balance = weight_balance(weights);
        if !balance.balanced {
            let _ = writeln!(
                output,
                "- Total {}% (not 100%, final scores are rescaled)",
                balance.total
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Nilai");

    if reports.is_empty() {
        let _ = writeln!(output, "Belum ada data nilai untuk mata pelajaran ini.");
    } else {
        let rows: Vec<Vec<String>> = reports.iter().map(|r| score_row(r, categories)).collect();
        markdown_table(&mut output, &score_headers(categories), &rows);
    }

    output
}

pub fn build_attendance_report(recap: &AttendanceRecap) -> String {
    let summary = &recap.summary;
    let mut output = String::new();

    let _ = writeln!(output, "# Rekap Kehadiran Siswa");
    let _ = writeln!(
        output,
        "Periode: {} - {}",
        recap.range.start(),
        recap.range.end()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Ringkasan");
    let _ = writeln!(output, "- Total Siswa: {}", summary.total_students);
    let _ = writeln!(output, "- Total Hari: {} hari", summary.total_days);
    let _ = writeln!(
        output,
        "- Rata-rata Kehadiran: {:.1}%",
        summary.average_attendance
    );
    if let Some(best) = &summary.best_attendance {
        let _ = writeln!(
            output,
            "- Kehadiran Terbaik: {} ({:.1}%)",
            best.student.name, best.attendance_percentage
        );
    }
    if let Some(worst) = &summary.worst_attendance {
        let _ = writeln!(
            output,
            "- Kehadiran Terendah: {} ({:.1}%)",
            worst.student.name, worst.attendance_percentage
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Detail");

    if recap.reports.is_empty() {
        let _ = writeln!(output, "Tidak ada siswa untuk filter ini.");
    } else {
        let headers: Vec<String> = ATTENDANCE_HEADERS.iter().map(|h| h.to_string()).collect();
        let rows: Vec<Vec<String>> = recap.reports.iter().map(attendance_row).collect();
        markdown_table(&mut output, &headers, &rows);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{self, AttendanceFilter};
    use crate::grading::Grade;
    use crate::models::{Attendance, AttendanceStatus, DateRange, Student};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn student(name: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.to_string(),
            nis: "2026001".to_string(),
            class_id: Uuid::new_v4(),
            class_name: Some("7A".to_string()),
        }
    }

    fn category(name: &str) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn score_rows_dash_missing_categories() {
        let uh1 = category("UH1");
        let uts = category("UTS");
        let report = StudentScoreReport {
            student: student("Avery Lee"),
            scores: HashMap::from([(uh1.id, 85.0)]),
            final_score: 85.0,
            grade: Grade::B,
        };
        let categories = vec![uh1, uts];

        let mut buffer = Vec::new();
        write_score_csv(&mut buffer, &categories, &[report]).unwrap();
        let csv = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Nama,NIS,Kelas,UH1,UTS,Nilai Akhir,Grade");
        assert_eq!(lines[1], "Avery Lee,2026001,7A,85.0,-,85.0,B");
    }

    #[test]
    fn attendance_exports_carry_summary_and_rows() {
        let avery = student("Avery Lee");
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let range = DateRange::new(start, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()).unwrap();
        let records = vec![Attendance {
            id: Uuid::new_v4(),
            student_id: avery.id,
            date: start,
            status: AttendanceStatus::Hadir,
        }];
        let recap = attendance::build_attendance_report(
            &[avery],
            &records,
            AttendanceFilter {
                range,
                class_id: None,
                student_id: None,
            },
        );

        let mut buffer = Vec::new();
        write_attendance_csv(&mut buffer, &recap).unwrap();
        let csv = String::from_utf8(buffer).unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(",2,1,0,0,0,0,50.0%,Sangat Kurang"));

        let markdown = build_attendance_report(&recap);
        assert!(markdown.contains("Periode: 2024-03-01 - 2024-03-02"));
        assert!(markdown.contains("- Total Hari: 2 hari"));
        assert!(markdown.contains("- Kehadiran Terbaik: Avery Lee (50.0%)"));
    }

    #[test]
    fn score_markdown_flags_unbalanced_weights() {
        let uh1 = category("UH1");
        let subject = Subject {
            id: Uuid::new_v4(),
            name: "Matematika".to_string(),
        };
        let weights = vec![Weight {
            id: Uuid::new_v4(),
            category_id: uh1.id,
            weight_percent: 60.0,
            category_name: Some("UH1".to_string()),
        }];

        let markdown = build_score_report(&subject, &[uh1], &weights, &[]);
        assert!(markdown.starts_with("# Rekap Nilai - Matematika"));
        assert!(markdown.contains("- UH1: 60%"));
        assert!(markdown.contains("Total 60%"));
        assert!(markdown.contains("Belum ada data nilai"));
    }
}
