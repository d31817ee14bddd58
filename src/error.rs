use uuid::Uuid;

/// Contract violations raised by the grade aggregator.
///
/// None of these are transient: the input is wrong and the caller has to fix
/// or exclude it before calling again.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GradeError {
    #[error("invalid evaluation {id}: {reason}")]
    InvalidEvaluation { id: Uuid, reason: String },
    #[error("cannot aggregate an empty evaluation set")]
    EmptyEvaluationSet,
    #[error("no graded subjects to aggregate")]
    NoGradedSubjects,
    #[error("score {0} is outside the 0-20 scale")]
    InvalidScore(f64),
    #[error("subject {subject_id} has invalid coefficient {coefficient}")]
    InvalidSubjectCoefficient { subject_id: Uuid, coefficient: f64 },
    #[error("evaluation {evaluation_id} references unknown subject {subject_id}")]
    UnknownSubject { evaluation_id: Uuid, subject_id: Uuid },
}

impl GradeError {
    pub(crate) fn invalid(id: Uuid, reason: impl Into<String>) -> Self {
        Self::InvalidEvaluation {
            id,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} label: {value:?}")]
pub struct LabelError {
    pub kind: &'static str,
    pub value: String,
}
