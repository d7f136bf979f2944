use crate::error::SubmissionError;
use crate::model::AnalysisResult;

/// Observable state of the submission pipeline.
///
/// Owned by [`super::SubmissionController`]; everything else only reads it.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Validating,
    CheckingHealth,
    /// Upload outstanding; `progress` is a client-side estimate in `0..=100`.
    Uploading { progress: u8 },
    Succeeded(AnalysisResult),
    Failed(SubmissionError),
}

impl SubmissionState {
    /// Whether an attempt is between selection and its final outcome.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Validating | Self::CheckingHealth | Self::Uploading { .. }
        )
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::Uploading { progress } => Some(*progress),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SubmissionError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::CheckingHealth => "checking-health",
            Self::Uploading { .. } => "uploading",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}
