use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LabelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    Homework,
    Quiz,
    Exam,
    ContinuousAssessment,
    Project,
    Oral,
}

impl EvaluationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationType::Homework => "homework",
            EvaluationType::Quiz => "quiz",
            EvaluationType::Exam => "exam",
            EvaluationType::ContinuousAssessment => "continuous_assessment",
            EvaluationType::Project => "project",
            EvaluationType::Oral => "oral",
        }
    }
}

impl fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the stored snake_case labels and the French labels found in
/// legacy grade exports.
impl FromStr for EvaluationType {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "homework" | "Devoir" => Ok(EvaluationType::Homework),
            "quiz" | "Interrogation" => Ok(EvaluationType::Quiz),
            "exam" | "Examen" => Ok(EvaluationType::Exam),
            "continuous_assessment" | "Contrôle continu" => {
                Ok(EvaluationType::ContinuousAssessment)
            }
            "project" | "Projet" => Ok(EvaluationType::Project),
            "oral" | "Oral" => Ok(EvaluationType::Oral),
            other => Err(LabelError {
                kind: "evaluation type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Trimester {
    First,
    Second,
    Third,
}

impl Trimester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trimester::First => "first",
            Trimester::Second => "second",
            Trimester::Third => "third",
        }
    }
}

impl fmt::Display for Trimester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trimester {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "first" | "1" | "Premier trimestre" => Ok(Trimester::First),
            "second" | "2" | "Deuxième trimestre" => Ok(Trimester::Second),
            "third" | "3" | "Troisième trimestre" => Ok(Trimester::Third),
            other => Err(LabelError {
                kind: "trimester",
                value: other.to_string(),
            }),
        }
    }
}

/// A single graded assessment for one student in one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub teacher_id: Uuid,
    pub evaluation_type: EvaluationType,
    pub raw_value: f64,
    pub max_value: f64,
    pub coefficient: f64,
    pub trimester: Trimester,
    pub academic_year: String,
    pub evaluation_date: NaiveDate,
    pub title: Option<String>,
    pub comments: Option<String>,
    pub visible_to_parents: bool,
}

/// An evaluation before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvaluation {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub teacher_id: Uuid,
    pub evaluation_type: EvaluationType,
    pub raw_value: f64,
    pub max_value: f64,
    pub coefficient: f64,
    pub trimester: Trimester,
    pub academic_year: String,
    pub evaluation_date: NaiveDate,
    pub title: Option<String>,
    pub comments: Option<String>,
    pub visible_to_parents: bool,
}

impl NewEvaluation {
    pub fn with_id(self, id: Uuid) -> Evaluation {
        Evaluation {
            id,
            student_id: self.student_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            evaluation_type: self.evaluation_type,
            raw_value: self.raw_value,
            max_value: self.max_value,
            coefficient: self.coefficient,
            trimester: self.trimester,
            academic_year: self.academic_year,
            evaluation_date: self.evaluation_date,
            title: self.title,
            comments: self.comments,
            visible_to_parents: self.visible_to_parents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub coefficient: f64,
}

/// All evaluations of one student in one subject for one period.
#[derive(Debug, Clone)]
pub struct SubjectGroup {
    pub subject: Subject,
    pub evaluations: Vec<Evaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEvaluation {
    pub evaluation: Evaluation,
    /// Score on the 0-20 scale.
    pub normalized: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAggregate {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub subject_coefficient: f64,
    pub grades: Vec<ScoredEvaluation>,
    pub average: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub evaluation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentPerformance {
    pub student_id: Uuid,
    pub trimester: Trimester,
    pub academic_year: String,
    pub subjects: Vec<SubjectAggregate>,
    pub overall_average: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBand {
    Excellent,
    VeryGood,
    Good,
    FairlyGood,
    Passing,
    Insufficient,
}

impl PerformanceBand {
    pub fn label(&self) -> &'static str {
        match self {
            PerformanceBand::Excellent => "Excellent",
            PerformanceBand::VeryGood => "Very good",
            PerformanceBand::Good => "Good",
            PerformanceBand::FairlyGood => "Fairly good",
            PerformanceBand::Passing => "Passing",
            PerformanceBand::Insufficient => "Insufficient",
        }
    }
}

impl fmt::Display for PerformanceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub id: Uuid,
    pub full_name: String,
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub student_id: Uuid,
    pub full_name: String,
    pub overall_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStatistics {
    pub student_count: usize,
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub standard_deviation: f64,
    /// Share of students at or above 10/20, as a percentage.
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassComparison {
    pub class_name: String,
    pub statistics: Option<ClassStatistics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Danger,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAlert {
    pub student_id: Uuid,
    pub full_name: String,
    pub level: AlertLevel,
    pub priority: AlertPriority,
    pub overall_average: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progression {
    pub previous_average: f64,
    pub current_average: f64,
    pub delta: f64,
    pub trend: Trend,
}
