//! The remote analysis service as seen by the controller.

use std::sync::atomic::AtomicBool;

use url::Url;

use crate::analysis_client::AnalysisClient;
use crate::error::SubmissionError;
use crate::health::HealthProbe;
use crate::model::{AnalysisResult, UploadCandidate};

/// Operations an attempt worker performs against the service.
///
/// Implementations are called from a background thread, one attempt at a time
/// per worker.
pub trait AnalysisService: Send + Sync + 'static {
    /// Liveness gate; the upload is issued only after this returns `Ok`.
    fn check_health(&self) -> Result<(), SubmissionError>;

    /// Upload the candidate and return the projected result.
    fn submit(
        &self,
        candidate: &UploadCandidate,
        cancel: &AtomicBool,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<AnalysisResult, SubmissionError>;
}

/// HTTP implementation bound to one base URL.
#[derive(Clone, Debug)]
pub struct HttpAnalysisService {
    base: Url,
    probe: HealthProbe,
    client: AnalysisClient,
}

impl HttpAnalysisService {
    pub fn new(base: Url) -> Self {
        Self {
            probe: HealthProbe::new(&base),
            client: AnalysisClient::new(&base),
            base,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

impl AnalysisService for HttpAnalysisService {
    fn check_health(&self) -> Result<(), SubmissionError> {
        self.probe.check()
    }

    fn submit(
        &self,
        candidate: &UploadCandidate,
        cancel: &AtomicBool,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<AnalysisResult, SubmissionError> {
        self.client.submit(candidate, cancel, on_progress)
    }
}
