use std::cmp::Ordering;

use crate::models::{
    AlertLevel, AlertPriority, ClassComparison, ClassStatistics, Progression, RankingEntry,
    StudentAlert, StudentSummary, Trend,
};

/// Minimum overall average that counts as a pass.
pub const PASS_MARK: f64 = 10.0;

/// Below this, a passing student still gets a warning.
pub const WARNING_MARK: f64 = 12.0;

/// Ranks students by overall average, best first. Equal averages share a rank
/// and the next rank skips accordingly (1, 2, 2, 4).
pub fn rank_students(entries: &[(StudentSummary, f64)]) -> Vec<RankingEntry> {
    let mut sorted: Vec<&(StudentSummary, f64)> = entries.iter().collect();
    sorted.sort_by(|(a, a_avg), (b, b_avg)| {
        b_avg
            .partial_cmp(a_avg)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.full_name.cmp(&b.full_name))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut rankings: Vec<RankingEntry> = Vec::with_capacity(sorted.len());
    for (position, (student, average)) in sorted.into_iter().enumerate() {
        let rank = match rankings.last() {
            Some(previous) if previous.overall_average == *average => previous.rank,
            _ => position + 1,
        };
        rankings.push(RankingEntry {
            rank,
            student_id: student.id,
            full_name: student.full_name.clone(),
            overall_average: *average,
        });
    }
    rankings
}

/// Distribution of overall averages across a class; `None` for an empty class.
pub fn class_statistics(averages: &[f64]) -> Option<ClassStatistics> {
    if averages.is_empty() {
        return None;
    }

    let mut sorted = averages.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let count = sorted.len() as f64;
    let average = sorted.iter().sum::<f64>() / count;
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    };
    let variance = sorted
        .iter()
        .map(|value| (value - average).powi(2))
        .sum::<f64>()
        / count;
    let passed = sorted.iter().filter(|value| **value >= PASS_MARK).count();

    Some(ClassStatistics {
        student_count: sorted.len(),
        average,
        median,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        standard_deviation: variance.sqrt(),
        pass_rate: passed as f64 / count * 100.0,
    })
}

/// Statistics for several classes side by side, in the order given.
pub fn compare_classes(classes: &[(String, Vec<f64>)]) -> Vec<ClassComparison> {
    classes
        .iter()
        .map(|(class_name, averages)| ClassComparison {
            class_name: class_name.clone(),
            statistics: class_statistics(averages),
        })
        .collect()
}

pub fn detect_alerts(rankings: &[RankingEntry]) -> Vec<StudentAlert> {
    rankings
        .iter()
        .filter_map(|entry| {
            let (level, priority) = match entry.overall_average {
                avg if avg < PASS_MARK => (AlertLevel::Danger, AlertPriority::High),
                avg if avg < WARNING_MARK => (AlertLevel::Warning, AlertPriority::Medium),
                _ => return None,
            };
            Some(StudentAlert {
                student_id: entry.student_id,
                full_name: entry.full_name.clone(),
                level,
                priority,
                overall_average: entry.overall_average,
            })
        })
        .collect()
}

pub fn progression(previous_average: f64, current_average: f64) -> Progression {
    let delta = current_average - previous_average;
    let trend = match delta.partial_cmp(&0.0) {
        Some(Ordering::Greater) => Trend::Up,
        Some(Ordering::Less) => Trend::Down,
        _ => Trend::Stable,
    };
    Progression {
        previous_average,
        current_average,
        delta,
        trend,
    }
}

/// Report-card comment for an overall average.
pub fn appreciation(overall_average: f64) -> &'static str {
    match overall_average {
        avg if avg >= 16.0 => "Excellent work. Congratulations!",
        avg if avg >= 14.0 => "Very good work. Keep it up.",
        avg if avg >= 12.0 => "Good work. Keep up the effort.",
        avg if avg >= 10.0 => "Satisfactory work, but could do better.",
        avg if avg >= 8.0 => "Insufficient results. A real effort is needed.",
        _ => "Very insufficient results. Risk of repeating the year.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn student(n: u128, name: &str) -> StudentSummary {
        StudentSummary {
            id: Uuid::from_u128(n),
            full_name: name.to_string(),
            class_name: "6A".to_string(),
        }
    }

    #[test]
    fn ranking_sorts_descending_and_shares_ties() {
        let entries = vec![
            (student(1, "Avery Lee"), 11.5),
            (student(2, "Jules Moreno"), 15.25),
            (student(3, "Kiara Patel"), 11.5),
            (student(4, "Daniel Abitbol"), 8.0),
        ];
        let rankings = rank_students(&entries);
        let summary: Vec<(usize, &str)> = rankings
            .iter()
            .map(|r| (r.rank, r.full_name.as_str()))
            .collect();

        assert_eq!(
            summary,
            [
                (1, "Jules Moreno"),
                (2, "Avery Lee"),
                (2, "Kiara Patel"),
                (4, "Daniel Abitbol"),
            ]
        );
    }

    #[test]
    fn statistics_cover_the_distribution() {
        let stats = class_statistics(&[14.0, 8.0, 12.0, 10.0]).unwrap();

        assert_eq!(stats.student_count, 4);
        assert!((stats.average - 11.0).abs() < 1e-9);
        assert!((stats.median - 11.0).abs() < 1e-9);
        assert_eq!(stats.min, 8.0);
        assert_eq!(stats.max, 14.0);
        assert!((stats.standard_deviation - 5.0_f64.sqrt()).abs() < 1e-9);
        assert!((stats.pass_rate - 75.0).abs() < 1e-9);
    }

    #[test]
    fn statistics_of_empty_class_are_absent() {
        assert!(class_statistics(&[]).is_none());
        let single = class_statistics(&[13.0]).unwrap();
        assert_eq!(single.median, 13.0);
        assert_eq!(single.standard_deviation, 0.0);
    }

    #[test]
    fn comparison_keeps_class_order_and_empty_classes() {
        let classes = vec![
            ("6B".to_string(), vec![9.0, 13.0]),
            ("6A".to_string(), Vec::new()),
            ("5A".to_string(), vec![16.0]),
        ];
        let comparison = compare_classes(&classes);
        let names: Vec<_> = comparison.iter().map(|c| c.class_name.as_str()).collect();

        assert_eq!(names, ["6B", "6A", "5A"]);
        let first = comparison[0].statistics.as_ref().unwrap();
        assert!((first.average - 11.0).abs() < 1e-9);
        assert!((first.pass_rate - 50.0).abs() < 1e-9);
        assert!(comparison[1].statistics.is_none());
        assert_eq!(comparison[2].statistics.as_ref().unwrap().max, 16.0);
    }

    #[test]
    fn alerts_flag_failing_and_fragile_students() {
        let rankings = rank_students(&[
            (student(1, "Avery Lee"), 15.0),
            (student(2, "Jules Moreno"), 11.99),
            (student(3, "Kiara Patel"), 9.5),
            (student(4, "Daniel Abitbol"), 12.0),
        ]);
        let alerts = detect_alerts(&rankings);

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].full_name, "Jules Moreno");
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert_eq!(alerts[0].priority, AlertPriority::Medium);
        assert_eq!(alerts[1].full_name, "Kiara Patel");
        assert_eq!(alerts[1].level, AlertLevel::Danger);
        assert_eq!(alerts[1].priority, AlertPriority::High);
    }

    #[test]
    fn progression_reports_trend() {
        assert_eq!(progression(11.0, 13.5).trend, Trend::Up);
        assert_eq!(progression(13.5, 11.0).trend, Trend::Down);
        assert_eq!(progression(12.0, 12.0).trend, Trend::Stable);
        assert!((progression(11.0, 13.5).delta - 2.5).abs() < 1e-9);
    }

    #[test]
    fn appreciation_thresholds() {
        assert_eq!(appreciation(16.0), "Excellent work. Congratulations!");
        assert_eq!(appreciation(15.99), "Very good work. Keep it up.");
        assert_eq!(appreciation(10.0), "Satisfactory work, but could do better.");
        assert_eq!(
            appreciation(7.99),
            "Very insufficient results. Risk of repeating the year."
        );
    }
}
