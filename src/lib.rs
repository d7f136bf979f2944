//! Client pipeline for submitting CSV datasets to a remote statistical analysis
//! service and projecting its answer into a stable result model.
//!
//! The usual entry point is [`SubmissionController`]: hand it a selected file
//! and observe [`SubmissionState`] until it settles.

/// Client for the analyze endpoint.
pub mod analysis_client;
/// Application directory resolution.
pub mod app_dirs;
/// Persisted settings and env overrides.
pub mod config;
/// Submission state machine and attempt plumbing.
pub mod controller;
/// Error taxonomy for submissions.
pub mod error;
/// Service liveness probe.
pub mod health;
mod http_client;
/// File validation and staging.
pub mod intake;
/// Tracing subscriber setup.
pub mod logging;
/// Data types shared across the pipeline.
pub mod model;
/// Normalization of analyze responses.
pub mod projector;
/// The service seam used by the controller.
pub mod service;
/// Presentation helpers.
pub mod view_model;

#[cfg(test)]
mod test_support;

pub use controller::{AttemptId, ControllerSettings, SubmissionController, SubmissionState};
pub use error::{ErrorKind, SubmissionError};
pub use http_client::{ANALYZE_TIMEOUT, HEALTH_TIMEOUT};
pub use model::{
    AnalysisResult, CorrelationPoint, ImageRef, Metrics, PredictionSeries, ResultImages,
    SelectedFile, UploadCandidate,
};
pub use service::{AnalysisService, HttpAnalysisService};
