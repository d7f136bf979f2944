//! Validation and staging of user-selected files.

use crate::error::{ErrorKind, SubmissionError};
use crate::model::{SelectedFile, UploadCandidate};

const CSV_SUFFIX: &str = ".csv";

/// Validates selections and holds the most recently staged candidate.
///
/// Only the file name and size are inspected; the content is passed through
/// untouched.
#[derive(Debug, Default)]
pub struct FileIntake {
    max_bytes: Option<u64>,
    staged: Option<UploadCandidate>,
}

impl FileIntake {
    /// Create an intake that rejects files larger than `max_bytes` when set.
    pub fn new(max_bytes: Option<u64>) -> Self {
        Self {
            max_bytes,
            staged: None,
        }
    }

    /// Validate `file` and stage it, replacing any previous candidate.
    ///
    /// A failed validation leaves nothing staged.
    pub fn stage(&mut self, file: Option<SelectedFile>) -> Result<UploadCandidate, SubmissionError> {
        self.staged = None;
        let file = file.ok_or_else(|| SubmissionError::invalid_file("No file selected"))?;
        if !has_csv_suffix(&file.name) {
            return Err(SubmissionError::invalid_file(format!(
                "{} is not a CSV file",
                file.name
            )));
        }
        let size = file.content.len() as u64;
        if let Some(max) = self.max_bytes
            && size > max
        {
            return Err(SubmissionError::new(
                ErrorKind::FileTooLarge,
                format!("{} is {size} bytes; the limit is {max} bytes", file.name),
            ));
        }
        let candidate = UploadCandidate::new(file.name, file.content);
        self.staged = Some(candidate.clone());
        Ok(candidate)
    }

    pub fn staged(&self) -> Option<&UploadCandidate> {
        self.staged.as_ref()
    }

    /// Drop the staged candidate, e.g. after a successful upload.
    pub fn clear(&mut self) {
        self.staged = None;
    }
}

fn has_csv_suffix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= CSV_SUFFIX.len()
        && bytes[bytes.len() - CSV_SUFFIX.len()..].eq_ignore_ascii_case(CSV_SUFFIX.as_bytes())
}
