//! Weighted grade aggregation on the 0-20 scale.
//!
//! Everything here is a pure function of its input: no I/O, no logging, no
//! shared state. Subject averages keep full precision all the way into the
//! overall average; rounding belongs to whoever renders the result.

use std::collections::HashMap;

use crate::error::GradeError;
use crate::models::{
    Evaluation, PerformanceBand, ScoredEvaluation, StudentPerformance, Subject,
    SubjectAggregate, SubjectGroup,
};

/// Upper bound of the common grading scale.
pub const SCALE: f64 = 20.0;

/// Checks the value, scale and coefficient bounds of an evaluation.
pub fn validate(evaluation: &Evaluation) -> Result<(), GradeError> {
    let Evaluation {
        id,
        raw_value,
        max_value,
        coefficient,
        ..
    } = *evaluation;

    if !max_value.is_finite() || max_value <= 0.0 {
        return Err(GradeError::invalid(
            id,
            format!("max value {max_value} must be positive"),
        ));
    }
    if !raw_value.is_finite() || raw_value < 0.0 || raw_value > max_value {
        return Err(GradeError::invalid(
            id,
            format!("raw value {raw_value} is outside 0..={max_value}"),
        ));
    }
    if !coefficient.is_finite() || coefficient <= 0.0 {
        return Err(GradeError::invalid(
            id,
            format!("coefficient {coefficient} must be positive"),
        ));
    }
    Ok(())
}

/// Rescales an evaluation's score to the 0-20 scale.
pub fn normalize(evaluation: &Evaluation) -> Result<f64, GradeError> {
    validate(evaluation)?;
    Ok(evaluation.raw_value / evaluation.max_value * SCALE)
}

fn check_subject(subject: &Subject) -> Result<(), GradeError> {
    if !subject.coefficient.is_finite() || subject.coefficient <= 0.0 {
        return Err(GradeError::InvalidSubjectCoefficient {
            subject_id: subject.id,
            coefficient: subject.coefficient,
        });
    }
    Ok(())
}

fn same_period(a: &Evaluation, b: &Evaluation) -> bool {
    a.student_id == b.student_id
        && a.trimester == b.trimester
        && a.academic_year == b.academic_year
}

/// Weighted average of one subject's evaluations.
///
/// The evaluations must already be grouped by subject, student and period;
/// a record that does not match the first one is rejected, not regrouped.
pub fn aggregate_subject(
    subject: &Subject,
    evaluations: &[Evaluation],
) -> Result<SubjectAggregate, GradeError> {
    check_subject(subject)?;
    let first = evaluations.first().ok_or(GradeError::EmptyEvaluationSet)?;

    let mut grades = Vec::with_capacity(evaluations.len());
    let mut total_coefficient = 0.0;
    let mut min_score = f64::INFINITY;
    let mut max_score = f64::NEG_INFINITY;

    for evaluation in evaluations {
        if evaluation.subject_id != subject.id {
            return Err(GradeError::invalid(
                evaluation.id,
                format!(
                    "belongs to subject {} while aggregating {}",
                    evaluation.subject_id, subject.id
                ),
            ));
        }
        if !same_period(first, evaluation) {
            return Err(GradeError::invalid(
                evaluation.id,
                "mixes students or periods within one subject",
            ));
        }

        let normalized = normalize(evaluation)?;
        total_coefficient += evaluation.coefficient;
        min_score = min_score.min(normalized);
        max_score = max_score.max(normalized);
        grades.push(ScoredEvaluation {
            evaluation: evaluation.clone(),
            normalized,
        });
    }

    // Weights are divided out first so a lone evaluation keeps its exact score.
    // The sum can drift past its inputs by an ulp; a weighted mean never does.
    let average = grades
        .iter()
        .map(|g| g.normalized * (g.evaluation.coefficient / total_coefficient))
        .sum::<f64>()
        .clamp(min_score, max_score);

    Ok(SubjectAggregate {
        subject_id: subject.id,
        subject_name: subject.name.clone(),
        subject_coefficient: subject.coefficient,
        evaluation_count: grades.len(),
        grades,
        average,
        min_score,
        max_score,
    })
}

/// Aggregates every graded subject of a student into an overall average
/// weighted by subject coefficient. Subjects keep the order they were given in.
pub fn aggregate_student(groups: &[SubjectGroup]) -> Result<StudentPerformance, GradeError> {
    if groups.is_empty() {
        return Err(GradeError::NoGradedSubjects);
    }

    let mut subjects = Vec::with_capacity(groups.len());
    for group in groups {
        subjects.push(aggregate_subject(&group.subject, &group.evaluations)?);
    }

    let reference = subjects[0].grades[0].evaluation.clone();
    for subject in subjects.iter().skip(1) {
        let evaluation = &subject.grades[0].evaluation;
        if !same_period(&reference, evaluation) {
            return Err(GradeError::invalid(
                evaluation.id,
                "mixes students or periods across subjects",
            ));
        }
    }

    let total_coefficient: f64 = subjects.iter().map(|s| s.subject_coefficient).sum();
    let (lowest, highest) = subjects
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.average), hi.max(s.average))
        });
    let overall_average = subjects
        .iter()
        .map(|s| s.average * (s.subject_coefficient / total_coefficient))
        .sum::<f64>()
        .clamp(lowest, highest);

    Ok(StudentPerformance {
        student_id: reference.student_id,
        trimester: reference.trimester,
        academic_year: reference.academic_year,
        subjects,
        overall_average,
    })
}

/// Maps a 0-20 score to its qualitative band. Lower bounds are inclusive.
pub fn classify(score: f64) -> Result<PerformanceBand, GradeError> {
    if score.is_nan() || !(0.0..=SCALE).contains(&score) {
        return Err(GradeError::InvalidScore(score));
    }

    Ok(match score {
        s if s >= 18.0 => PerformanceBand::Excellent,
        s if s >= 16.0 => PerformanceBand::VeryGood,
        s if s >= 14.0 => PerformanceBand::Good,
        s if s >= 12.0 => PerformanceBand::FairlyGood,
        s if s >= 10.0 => PerformanceBand::Passing,
        _ => PerformanceBand::Insufficient,
    })
}

/// Groups one student's evaluations by subject, ordered by subject name and
/// then id. Subjects without evaluations never appear.
pub fn group_by_subject(
    evaluations: &[Evaluation],
    catalog: &[Subject],
) -> Result<Vec<SubjectGroup>, GradeError> {
    let subjects: HashMap<_, _> = catalog.iter().map(|s| (s.id, s)).collect();
    let mut groups: HashMap<uuid::Uuid, SubjectGroup> = HashMap::new();

    for evaluation in evaluations {
        let subject = subjects
            .get(&evaluation.subject_id)
            .ok_or(GradeError::UnknownSubject {
                evaluation_id: evaluation.id,
                subject_id: evaluation.subject_id,
            })?;
        groups
            .entry(evaluation.subject_id)
            .or_insert_with(|| SubjectGroup {
                subject: (*subject).clone(),
                evaluations: Vec::new(),
            })
            .evaluations
            .push(evaluation.clone());
    }

    let mut values: Vec<SubjectGroup> = groups.into_values().collect();
    values.sort_by(|a, b| {
        a.subject
            .name
            .cmp(&b.subject.name)
            .then_with(|| a.subject.id.cmp(&b.subject.id))
    });
    Ok(values)
}
