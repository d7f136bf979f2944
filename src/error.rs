//! Error taxonomy shared by every stage of a submission.

use serde::Serialize;

/// Category of a submission failure.
///
/// Every exit path of an attempt maps onto exactly one of these kinds so the
/// presentation layer can pick specific copy for each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// No file was selected, or the name lacks a `.csv` suffix.
    InvalidFileKind,
    /// The selected file exceeds the configured upload limit.
    FileTooLarge,
    /// The service could not be reached (timeout, refused connection, non-2xx probe).
    Unreachable,
    /// The service answered the liveness probe but did not report itself healthy.
    Unhealthy,
    /// The analyze call exceeded its timeout.
    UploadTimeout,
    /// The service returned an explicit error message.
    RemoteAnalysisError,
    /// The service answered successfully with a body of no recognized shape.
    MalformedResponse,
    /// The attempt was superseded before it finished. Never shown to the user.
    Cancelled,
}

impl ErrorKind {
    /// Short user-facing category text.
    pub fn summary(self) -> &'static str {
        match self {
            Self::InvalidFileKind => "Please select a CSV file",
            Self::FileTooLarge => "File is too large",
            Self::Unreachable => "Service unavailable",
            Self::Unhealthy => "Service is not healthy",
            Self::UploadTimeout => "Analysis timed out",
            Self::RemoteAnalysisError => "Analysis failed",
            Self::MalformedResponse => "Unexpected response from the analysis service",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether resubmitting the same file may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Unreachable | Self::Unhealthy | Self::UploadTimeout)
    }
}

/// A failed submission step, carrying its category and a descriptive message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct SubmissionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SubmissionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFileKind, message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unreachable, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteAnalysisError, message)
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Attempt superseded")
    }
}
