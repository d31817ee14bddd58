use std::collections::HashMap;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::grades;
use crate::models::{Evaluation, EvaluationType, NewEvaluation, StudentSummary, Subject, Trimester};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let math = Uuid::parse_str("6f1c2a0e-1d4b-4c55-9a3e-0b7d2c9e4a11")?;
    let french = Uuid::parse_str("a3d9e7b2-5c41-4f0a-8e26-7b1f3c5d9e22")?;
    let english = Uuid::parse_str("c8b4f1d3-9e27-4a6c-b153-2d8e6f0a7b33")?;
    let science = Uuid::parse_str("e2a7c5f9-3b18-4d4e-a9c7-5f1b8d2e6c44")?;

    let subjects = vec![
        (math, "MATH", "Mathematics", 4.0),
        (french, "FREN", "French", 3.0),
        (english, "ENGL", "English", 2.0),
        (science, "SCIE", "Science", 2.0),
    ];

    for (id, code, name, coefficient) in subjects {
        sqlx::query(
            r#"
            INSERT INTO school_grades.subjects (id, code, name, coefficient)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, coefficient = EXCLUDED.coefficient
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .bind(coefficient)
        .execute(pool)
        .await?;
    }

    let avery = Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?;
    let jules = Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?;
    let kiara = Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?;

    let students = vec![
        (avery, "Avery Lee", "avery.lee@school.example", "6A"),
        (jules, "Jules Moreno", "jules.moreno@school.example", "6A"),
        (kiara, "Kiara Patel", "kiara.patel@school.example", "6A"),
    ];

    for (id, name, email, class_name) in students {
        sqlx::query(
            r#"
            INSERT INTO school_grades.students (id, full_name, email, class_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, class_name = EXCLUDED.class_name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(class_name)
        .execute(pool)
        .await?;
    }

    let teacher = Uuid::parse_str("5b6e2d1c-8f3a-4e7b-9c0d-1a2b3c4d5e6f")?;
    let date = |m, d| NaiveDate::from_ymd_opt(2024, m, d).context("invalid date");

    // (student, subject, type, raw, max, coefficient, trimester, date)
    let rows = vec![
        (avery, math, EvaluationType::Homework, 15.0, 20.0, 1.0, Trimester::First, date(9, 15)?),
        (avery, math, EvaluationType::Quiz, 18.0, 20.0, 1.0, Trimester::First, date(9, 22)?),
        (avery, math, EvaluationType::Exam, 14.0, 20.0, 3.0, Trimester::First, date(10, 5)?),
        (avery, math, EvaluationType::ContinuousAssessment, 17.0, 20.0, 2.0, Trimester::First, date(10, 15)?),
        (avery, french, EvaluationType::Homework, 13.0, 20.0, 1.0, Trimester::First, date(9, 18)?),
        (avery, french, EvaluationType::Exam, 62.0, 100.0, 3.0, Trimester::First, date(10, 8)?),
        (avery, english, EvaluationType::Oral, 16.0, 20.0, 1.0, Trimester::First, date(10, 1)?),
        (avery, math, EvaluationType::Exam, 16.5, 20.0, 3.0, Trimester::Second, date(12, 10)?),
        (jules, math, EvaluationType::Exam, 9.0, 20.0, 3.0, Trimester::First, date(10, 5)?),
        (jules, math, EvaluationType::Homework, 12.0, 20.0, 1.0, Trimester::First, date(9, 15)?),
        (jules, french, EvaluationType::Exam, 11.0, 20.0, 3.0, Trimester::First, date(10, 8)?),
        (jules, science, EvaluationType::Project, 14.0, 20.0, 2.0, Trimester::First, date(10, 20)?),
        (kiara, math, EvaluationType::Exam, 19.0, 20.0, 3.0, Trimester::First, date(10, 5)?),
        (kiara, french, EvaluationType::Exam, 17.5, 20.0, 3.0, Trimester::First, date(10, 8)?),
        (kiara, english, EvaluationType::Quiz, 8.0, 10.0, 1.0, Trimester::First, date(9, 25)?),
    ];

    let mut conn = pool.acquire().await?;
    let mut inserted = 0usize;
    for (n, (student_id, subject_id, kind, raw, max, coefficient, trimester, day)) in
        rows.into_iter().enumerate()
    {
        let evaluation = Evaluation {
            id: Uuid::from_u128(0x5eed_0000_0000_0000_0000_0000_0000_0000 + n as u128),
            student_id,
            subject_id,
            teacher_id: teacher,
            evaluation_type: kind,
            raw_value: raw,
            max_value: max,
            coefficient,
            trimester,
            academic_year: "2024-2025".to_string(),
            evaluation_date: day,
            title: None,
            comments: None,
            visible_to_parents: true,
        };
        if insert_evaluation(&mut conn, &evaluation).await? {
            inserted += 1;
        }
    }

    info!(inserted, "seed evaluations written");
    Ok(())
}

async fn insert_evaluation(conn: &mut PgConnection, evaluation: &Evaluation) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_grades.evaluations
        (id, student_id, subject_id, teacher_id, evaluation_type, raw_value, max_value,
         coefficient, trimester, academic_year, evaluation_date, title, comments,
         visible_to_parents)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(evaluation.id)
    .bind(evaluation.student_id)
    .bind(evaluation.subject_id)
    .bind(evaluation.teacher_id)
    .bind(evaluation.evaluation_type.as_str())
    .bind(evaluation.raw_value)
    .bind(evaluation.max_value)
    .bind(evaluation.coefficient)
    .bind(evaluation.trimester.as_str())
    .bind(&evaluation.academic_year)
    .bind(evaluation.evaluation_date)
    .bind(&evaluation.title)
    .bind(&evaluation.comments)
    .bind(evaluation.visible_to_parents)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stores one evaluation after checking its bounds.
pub async fn create_evaluation(pool: &PgPool, new: NewEvaluation) -> anyhow::Result<Evaluation> {
    let evaluation = new.with_id(Uuid::new_v4());
    grades::validate(&evaluation)?;

    let mut conn = pool.acquire().await?;
    insert_evaluation(&mut conn, &evaluation).await?;
    debug!(id = %evaluation.id, student_id = %evaluation.student_id, "evaluation created");
    Ok(evaluation)
}

/// Stores a batch in one transaction. Every record is validated before the
/// first write, so a bad record leaves the store untouched.
pub async fn create_evaluations(
    pool: &PgPool,
    batch: Vec<NewEvaluation>,
) -> anyhow::Result<Vec<Evaluation>> {
    let mut evaluations = Vec::with_capacity(batch.len());
    for (index, new) in batch.into_iter().enumerate() {
        let evaluation = new.with_id(Uuid::new_v4());
        grades::validate(&evaluation)
            .with_context(|| format!("evaluation #{} rejected", index + 1))?;
        evaluations.push(evaluation);
    }

    insert_batch(pool, &evaluations).await?;
    Ok(evaluations)
}

/// Writes already validated evaluations in one transaction.
async fn insert_batch(pool: &PgPool, evaluations: &[Evaluation]) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for evaluation in evaluations {
        insert_evaluation(&mut tx, evaluation).await?;
    }
    tx.commit().await?;

    info!(count = evaluations.len(), "evaluations created");
    Ok(())
}

fn evaluation_from_row(row: &PgRow) -> anyhow::Result<Evaluation> {
    let evaluation_type: String = row.get("evaluation_type");
    let trimester: String = row.get("trimester");

    Ok(Evaluation {
        id: row.get("id"),
        student_id: row.get("student_id"),
        subject_id: row.get("subject_id"),
        teacher_id: row.get("teacher_id"),
        evaluation_type: evaluation_type.parse()?,
        raw_value: row.get("raw_value"),
        max_value: row.get("max_value"),
        coefficient: row.get("coefficient"),
        trimester: trimester.parse()?,
        academic_year: row.get("academic_year"),
        evaluation_date: row.get("evaluation_date"),
        title: row.get("title"),
        comments: row.get("comments"),
        visible_to_parents: row.get("visible_to_parents"),
    })
}

pub async fn fetch_evaluations(
    pool: &PgPool,
    student_id: Uuid,
    trimester: Option<Trimester>,
    academic_year: Option<&str>,
) -> anyhow::Result<Vec<Evaluation>> {
    let mut query = String::from(
        "SELECT id, student_id, subject_id, teacher_id, evaluation_type, raw_value, \
         max_value, coefficient, trimester, academic_year, evaluation_date, title, \
         comments, visible_to_parents \
         FROM school_grades.evaluations \
         WHERE student_id = $1",
    );

    let mut next_param = 2;
    if trimester.is_some() {
        query.push_str(&format!(" AND trimester = ${next_param}"));
        next_param += 1;
    }
    if academic_year.is_some() {
        query.push_str(&format!(" AND academic_year = ${next_param}"));
    }
    query.push_str(" ORDER BY evaluation_date, id");

    let mut rows = sqlx::query(&query).bind(student_id);
    if let Some(value) = trimester {
        rows = rows.bind(value.as_str());
    }
    if let Some(value) = academic_year {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut evaluations = Vec::with_capacity(records.len());
    for row in records {
        evaluations.push(evaluation_from_row(&row)?);
    }

    debug!(%student_id, count = evaluations.len(), "evaluations fetched");
    Ok(evaluations)
}

pub async fn fetch_subjects(pool: &PgPool) -> anyhow::Result<Vec<Subject>> {
    let rows = sqlx::query(
        "SELECT id, code, name, coefficient FROM school_grades.subjects ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Subject {
            id: row.get("id"),
            code: row.get("code"),
            name: row.get("name"),
            coefficient: row.get("coefficient"),
        })
        .collect())
}

fn student_from_row(row: &PgRow) -> StudentSummary {
    StudentSummary {
        id: row.get("id"),
        full_name: row.get("full_name"),
        class_name: row.get("class_name"),
    }
}

pub async fn fetch_student(pool: &PgPool, student_id: Uuid) -> anyhow::Result<Option<StudentSummary>> {
    let row = sqlx::query(
        "SELECT id, full_name, class_name FROM school_grades.students WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(student_from_row))
}

pub async fn fetch_class_students(
    pool: &PgPool,
    class_name: &str,
) -> anyhow::Result<Vec<StudentSummary>> {
    let rows = sqlx::query(
        "SELECT id, full_name, class_name FROM school_grades.students \
         WHERE class_name = $1 ORDER BY full_name",
    )
    .bind(class_name)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

#[derive(serde::Deserialize)]
struct CsvRow {
    student_email: String,
    subject_code: String,
    teacher_id: Uuid,
    evaluation_type: String,
    raw_value: f64,
    max_value: Option<f64>,
    coefficient: Option<f64>,
    trimester: String,
    academic_year: String,
    evaluation_date: NaiveDate,
    title: Option<String>,
    comments: Option<String>,
    visible_to_parents: Option<bool>,
}

/// Imports evaluations from a CSV export. Students are matched by email and
/// subjects by code; the whole file is rejected if any row is invalid.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let subjects: HashMap<String, Uuid> = fetch_subjects(pool)
        .await?
        .into_iter()
        .map(|s| (s.code, s.id))
        .collect();
    let students: HashMap<String, Uuid> =
        sqlx::query("SELECT id, email FROM school_grades.students")
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|row| (row.get("email"), row.get("id")))
            .collect();

    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let batch = read_evaluations(reader, &students, &subjects)?;

    insert_batch(pool, &batch).await?;
    Ok(batch.len())
}

/// Parses and validates every CSV row; errors name the file line.
fn read_evaluations<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    students: &HashMap<String, Uuid>,
    subjects: &HashMap<String, Uuid>,
) -> anyhow::Result<Vec<Evaluation>> {
    let mut batch = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("line {line}: malformed row"))?;

        let Some(&student_id) = students.get(&row.student_email) else {
            bail!("line {line}: unknown student {}", row.student_email);
        };
        let Some(&subject_id) = subjects.get(&row.subject_code) else {
            bail!("line {line}: unknown subject {}", row.subject_code);
        };

        let evaluation = NewEvaluation {
            student_id,
            subject_id,
            teacher_id: row.teacher_id,
            evaluation_type: row
                .evaluation_type
                .parse()
                .with_context(|| format!("line {line}"))?,
            raw_value: row.raw_value,
            max_value: row.max_value.unwrap_or(grades::SCALE),
            coefficient: row.coefficient.unwrap_or(1.0),
            trimester: row.trimester.parse().with_context(|| format!("line {line}"))?,
            academic_year: row.academic_year,
            evaluation_date: row.evaluation_date,
            title: row.title.filter(|t| !t.is_empty()),
            comments: row.comments.filter(|c| !c.is_empty()),
            visible_to_parents: row.visible_to_parents.unwrap_or(true),
        }
        .with_id(Uuid::new_v4());
        grades::validate(&evaluation).with_context(|| format!("line {line}"))?;
        batch.push(evaluation);
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GradeError;

    const HEADER: &str = "student_email,subject_code,teacher_id,evaluation_type,raw_value,\
max_value,coefficient,trimester,academic_year,evaluation_date,title,comments,visible_to_parents\n";
    const TEACHER: &str = "5b6e2d1c-8f3a-4e7b-9c0d-1a2b3c4d5e6f";

    fn lookups() -> (HashMap<String, Uuid>, HashMap<String, Uuid>) {
        let students = HashMap::from([("avery@school.example".to_string(), Uuid::from_u128(10))]);
        let subjects = HashMap::from([("MATH".to_string(), Uuid::from_u128(1))]);
        (students, subjects)
    }

    fn read(body: &str) -> anyhow::Result<Vec<Evaluation>> {
        let (students, subjects) = lookups();
        let data = format!("{HEADER}{body}");
        read_evaluations(csv::Reader::from_reader(data.as_bytes()), &students, &subjects)
    }

    #[test]
    fn rows_get_defaults_and_legacy_labels() {
        let evaluations = read(&format!(
            "avery@school.example,MATH,{TEACHER},Examen,15,,,Premier trimestre,2024-2025,2024-10-05,,,\n"
        ))
        .unwrap();

        assert_eq!(evaluations.len(), 1);
        let evaluation = &evaluations[0];
        assert_eq!(evaluation.student_id, Uuid::from_u128(10));
        assert_eq!(evaluation.evaluation_type, EvaluationType::Exam);
        assert_eq!(evaluation.trimester, Trimester::First);
        assert_eq!(evaluation.max_value, 20.0);
        assert_eq!(evaluation.coefficient, 1.0);
        assert!(evaluation.title.is_none());
        assert!(evaluation.visible_to_parents);
    }

    #[test]
    fn invalid_row_is_reported_with_its_line() {
        let err = read(&format!(
            "avery@school.example,MATH,{TEACHER},exam,15,20,1,first,2024-2025,2024-10-05,,,true\n\
             avery@school.example,MATH,{TEACHER},exam,25,20,1,first,2024-2025,2024-10-06,,,true\n"
        ))
        .unwrap_err();

        assert!(err.to_string().contains("line 3"));
        assert!(matches!(
            err.downcast_ref::<GradeError>(),
            Some(GradeError::InvalidEvaluation { .. })
        ));
    }

    #[test]
    fn unknown_subject_rejects_the_file() {
        let err = read(&format!(
            "avery@school.example,FREN,{TEACHER},exam,15,20,1,first,2024-2025,2024-10-05,,,true\n"
        ))
        .unwrap_err();

        assert!(err.to_string().contains("line 2: unknown subject FREN"));
    }
}
