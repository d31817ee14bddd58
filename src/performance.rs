use anyhow::Context;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analytics;
use crate::db;
use crate::error::GradeError;
use crate::grades;
use crate::models::{
    ClassComparison, ClassStatistics, Progression, RankingEntry, StudentAlert,
    StudentPerformance, StudentSummary, Subject, Trimester,
};

/// Loads, groups and aggregates one student's evaluations for a period.
/// Returns `None` when the student has nothing graded in it.
pub async fn student_performance(
    pool: &PgPool,
    student_id: Uuid,
    trimester: Trimester,
    academic_year: &str,
) -> anyhow::Result<Option<StudentPerformance>> {
    let catalog = db::fetch_subjects(pool).await?;
    performance_with_catalog(pool, &catalog, student_id, trimester, academic_year).await
}

async fn performance_with_catalog(
    pool: &PgPool,
    catalog: &[Subject],
    student_id: Uuid,
    trimester: Trimester,
    academic_year: &str,
) -> anyhow::Result<Option<StudentPerformance>> {
    let evaluations =
        db::fetch_evaluations(pool, student_id, Some(trimester), Some(academic_year)).await?;
    let groups = grades::group_by_subject(&evaluations, catalog)?;

    match grades::aggregate_student(&groups) {
        Ok(performance) => Ok(Some(performance)),
        Err(GradeError::NoGradedSubjects) => {
            debug!(%student_id, %trimester, academic_year, "no graded subjects");
            Ok(None)
        }
        Err(err) => Err(anyhow::Error::new(err)
            .context(format!("failed to aggregate grades for student {student_id}"))),
    }
}

#[derive(Debug, Clone)]
pub struct ClassOverview {
    pub rankings: Vec<RankingEntry>,
    pub statistics: Option<ClassStatistics>,
    pub alerts: Vec<StudentAlert>,
    /// Students of the class with no graded subject in the period.
    pub ungraded: Vec<StudentSummary>,
}

pub async fn class_overview(
    pool: &PgPool,
    class_name: &str,
    trimester: Trimester,
    academic_year: &str,
) -> anyhow::Result<ClassOverview> {
    let catalog = db::fetch_subjects(pool).await?;
    let students = db::fetch_class_students(pool, class_name).await?;
    if students.is_empty() {
        warn!(class_name, "class has no students");
    }

    let mut graded = Vec::with_capacity(students.len());
    let mut ungraded = Vec::new();
    for student in students {
        match performance_with_catalog(pool, &catalog, student.id, trimester, academic_year)
            .await?
        {
            Some(performance) => graded.push((student, performance.overall_average)),
            None => ungraded.push(student),
        }
    }

    let rankings = analytics::rank_students(&graded);
    let averages: Vec<f64> = rankings.iter().map(|r| r.overall_average).collect();
    let statistics = analytics::class_statistics(&averages);
    let alerts = analytics::detect_alerts(&rankings);

    Ok(ClassOverview {
        rankings,
        statistics,
        alerts,
        ungraded,
    })
}

/// Class statistics for each named class, in the order given.
pub async fn compare_classes(
    pool: &PgPool,
    class_names: &[String],
    trimester: Trimester,
    academic_year: &str,
) -> anyhow::Result<Vec<ClassComparison>> {
    let mut classes = Vec::with_capacity(class_names.len());
    for class_name in class_names {
        let overview = class_overview(pool, class_name, trimester, academic_year).await?;
        let averages: Vec<f64> = overview
            .rankings
            .iter()
            .map(|r| r.overall_average)
            .collect();
        classes.push((class_name.clone(), averages));
    }
    Ok(analytics::compare_classes(&classes))
}

/// Compares a student's overall average between two trimesters of a year.
pub async fn student_progression(
    pool: &PgPool,
    student_id: Uuid,
    from: Trimester,
    to: Trimester,
    academic_year: &str,
) -> anyhow::Result<Progression> {
    let previous = student_performance(pool, student_id, from, academic_year)
        .await?
        .with_context(|| format!("student {student_id} has no grades in the {from} trimester"))?;
    let current = student_performance(pool, student_id, to, academic_year)
        .await?
        .with_context(|| format!("student {student_id} has no grades in the {to} trimester"))?;

    Ok(analytics::progression(
        previous.overall_average,
        current.overall_average,
    ))
}
