use std::fmt::Write;

use crate::analytics;
use crate::grades;
use crate::models::{AlertLevel, StudentPerformance, StudentSummary};
use crate::performance::ClassOverview;

/// Converts a 0-20 score to the percentage view used by dashboards.
pub fn to_percentage(score: f64) -> f64 {
    score / grades::SCALE * 100.0
}

fn band_label(score: f64) -> &'static str {
    grades::classify(score).map_or("n/a", |band| band.label())
}

pub fn build_report_card(student: &StudentSummary, performance: &StudentPerformance) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Report Card");
    let _ = writeln!(
        output,
        "{} ({}), {} trimester {}",
        student.full_name, student.class_name, performance.trimester, performance.academic_year
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "| Subject | Coef. | Average | Min | Max | Grades | Band |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");

    for subject in &performance.subjects {
        let _ = writeln!(
            output,
            "| {} | {} | {:.2}/20 | {:.2} | {:.2} | {} | {} |",
            subject.subject_name,
            subject.subject_coefficient,
            subject.average,
            subject.min_score,
            subject.max_score,
            subject.evaluation_count,
            band_label(subject.average)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Evaluations");

    for subject in &performance.subjects {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {}", subject.subject_name);
        for grade in &subject.grades {
            let evaluation = &grade.evaluation;
            let _ = writeln!(
                output,
                "- {} {}{}: {:.2}/20 (coef {}) {}",
                evaluation.evaluation_date,
                evaluation.evaluation_type,
                evaluation
                    .title
                    .as_deref()
                    .map(|t| format!(" \"{t}\""))
                    .unwrap_or_default(),
                grade.normalized,
                evaluation.coefficient,
                band_label(grade.normalized)
            );
        }
    }

    let overall = performance.overall_average;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall");
    let _ = writeln!(
        output,
        "Average {:.2}/20 ({:.1}%), {}",
        overall,
        to_percentage(overall),
        band_label(overall)
    );
    let _ = writeln!(output, "{}", analytics::appreciation(overall));

    output
}

pub fn build_class_report(
    class_name: &str,
    trimester: &str,
    academic_year: &str,
    overview: &ClassOverview,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Class Report");
    let _ = writeln!(
        output,
        "Class {} for the {} trimester {}",
        class_name, trimester, academic_year
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Statistics");

    match &overview.statistics {
        None => {
            let _ = writeln!(output, "No graded students for this period.");
        }
        Some(stats) => {
            let _ = writeln!(output, "- Students graded: {}", stats.student_count);
            let _ = writeln!(output, "- Class average: {:.2}/20", stats.average);
            let _ = writeln!(output, "- Median: {:.2}/20", stats.median);
            let _ = writeln!(output, "- Range: {:.2} to {:.2}", stats.min, stats.max);
            let _ = writeln!(
                output,
                "- Standard deviation: {:.2}",
                stats.standard_deviation
            );
            let _ = writeln!(output, "- Pass rate: {:.2}%", stats.pass_rate);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranking");

    if overview.rankings.is_empty() {
        let _ = writeln!(output, "No graded students for this period.");
    } else {
        for entry in &overview.rankings {
            let _ = writeln!(
                output,
                "{}. {} {:.2}/20 ({})",
                entry.rank,
                entry.full_name,
                entry.overall_average,
                band_label(entry.overall_average)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");

    if overview.alerts.is_empty() {
        let _ = writeln!(output, "No students below {:.0}/20.", analytics::WARNING_MARK);
    } else {
        for alert in &overview.alerts {
            let label = match alert.level {
                AlertLevel::Danger => "insufficient",
                AlertLevel::Warning => "fragile",
            };
            let _ = writeln!(
                output,
                "- {}: {} overall average ({:.2}/20)",
                alert.full_name, label, alert.overall_average
            );
        }
    }

    if !overview.ungraded.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Without Grades");
        for student in &overview.ungraded {
            let _ = writeln!(output, "- {}", student.full_name);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grades::{aggregate_student, group_by_subject};
    use crate::models::{Evaluation, EvaluationType, Subject, Trimester};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn sample_performance() -> (StudentSummary, StudentPerformance) {
        let student = StudentSummary {
            id: Uuid::from_u128(10),
            full_name: "Avery Lee".to_string(),
            class_name: "6A".to_string(),
        };
        let maths = Subject {
            id: Uuid::from_u128(1),
            code: "MATH".to_string(),
            name: "Mathematics".to_string(),
            coefficient: 4.0,
        };
        let records: Vec<Evaluation> = [(15.0, 1.0), (18.0, 1.0), (14.0, 3.0), (17.0, 2.0)]
            .into_iter()
            .enumerate()
            .map(|(n, (raw, coefficient))| Evaluation {
                id: Uuid::from_u128(100 + n as u128),
                student_id: student.id,
                subject_id: maths.id,
                teacher_id: Uuid::from_u128(42),
                evaluation_type: EvaluationType::Exam,
                raw_value: raw,
                max_value: 20.0,
                coefficient,
                trimester: Trimester::First,
                academic_year: "2024-2025".to_string(),
                evaluation_date: NaiveDate::from_ymd_opt(2024, 10, 5).unwrap(),
                title: Some("Geometry".to_string()),
                comments: None,
                visible_to_parents: true,
            })
            .collect();
        let groups = group_by_subject(&records, &[maths]).unwrap();
        (student, aggregate_student(&groups).unwrap())
    }

    #[test]
    fn percentage_view_is_a_plain_rescale() {
        assert_eq!(to_percentage(20.0), 100.0);
        assert_eq!(to_percentage(15.0), 75.0);
        assert_eq!(to_percentage(0.0), 0.0);
    }

    #[test]
    fn report_card_rounds_only_when_rendering() {
        let (student, performance) = sample_performance();
        let report = build_report_card(&student, &performance);

        assert!(report.contains("Avery Lee (6A), first trimester 2024-2025"));
        assert!(report.contains("| Mathematics | 4 | 15.57/20 | 14.00 | 18.00 | 4 | Good |"));
        assert!(report.contains("Average 15.57/20 (77.9%), Good"));
        assert!(report.contains("Very good work. Keep it up."));
        assert!((performance.overall_average - 109.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn class_report_lists_statistics_ranking_and_alerts() {
        let summary = |n: u128, name: &str| StudentSummary {
            id: Uuid::from_u128(n),
            full_name: name.to_string(),
            class_name: "6A".to_string(),
        };
        let rankings = analytics::rank_students(&[
            (summary(1, "Kiara Patel"), 18.5),
            (summary(2, "Avery Lee"), 109.0 / 7.0),
            (summary(3, "Sam Ortiz"), 109.0 / 7.0),
            (summary(4, "Jules Moreno"), 11.0),
            (summary(5, "Noa Martin"), 9.666666),
        ]);
        let averages: Vec<f64> = rankings.iter().map(|r| r.overall_average).collect();
        let overview = ClassOverview {
            statistics: analytics::class_statistics(&averages),
            alerts: analytics::detect_alerts(&rankings),
            rankings,
            ungraded: vec![summary(6, "Robin Chen")],
        };
        let report = build_class_report("6A", "first", "2024-2025", &overview);

        assert!(report.contains("- Students graded: 5"));
        assert!(report.contains("- Class average: 14.06/20"));
        assert!(report.contains("- Median: 15.57/20"));
        assert!(report.contains("- Range: 9.67 to 18.50"));
        assert!(report.contains("- Pass rate: 80.00%"));
        assert!(report.contains("1. Kiara Patel 18.50/20 (Excellent)"));
        assert!(report.contains("2. Avery Lee 15.57/20 (Good)"));
        assert!(report.contains("2. Sam Ortiz 15.57/20 (Good)"));
        assert!(report.contains("4. Jules Moreno 11.00/20 (Passing)"));
        assert!(report.contains("5. Noa Martin 9.67/20 (Insufficient)"));
        assert!(report.contains("- Jules Moreno: fragile overall average (11.00/20)"));
        assert!(report.contains("- Noa Martin: insufficient overall average (9.67/20)"));
        assert!(report.contains("## Without Grades\n- Robin Chen"));
        assert!(!report.contains("No students below"));
    }

    #[test]
    fn class_report_handles_empty_class() {
        let overview = ClassOverview {
            rankings: Vec::new(),
            statistics: None,
            alerts: Vec::new(),
            ungraded: Vec::new(),
        };
        let report = build_class_report("6B", "first", "2024-2025", &overview);

        assert!(report.contains("Class 6B for the first trimester 2024-2025"));
        assert!(report.contains("No graded students for this period."));
        assert!(report.contains("No students below 12/20."));
        assert!(!report.contains("## Without Grades"));
    }
}
