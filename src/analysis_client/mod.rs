//! Upload of a staged candidate to the analyze endpoint.
//!
//! The request runs on its own thread while the caller's thread ticks the
//! progress estimate and watches the cancel flag. Every transport and body
//! outcome is folded into one `Result<AnalysisResult, SubmissionError>`.

mod multipart;
mod progress;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ErrorKind, SubmissionError};
use crate::http_client;
use crate::model::{AnalysisResult, UploadCandidate};
use crate::projector;

use multipart::MultipartBody;
use progress::ProgressEstimator;

pub use progress::PROGRESS_TICK;

const ANALYZE_PATH: &str = "api/analyze";
const FILE_FIELD: &str = "file";
/// Inline base64 images make successful bodies large.
const MAX_ANALYZE_RESPONSE_BYTES: usize = 64 * 1024 * 1024;
const MAX_ERROR_RESPONSE_BYTES: usize = 64 * 1024;

/// Posts candidates to `{base}/api/analyze` with a bounded deadline.
#[derive(Clone, Debug)]
pub struct AnalysisClient {
    url: String,
    agent: ureq::Agent,
    tick: Duration,
}

impl AnalysisClient {
    pub fn new(base: &Url) -> Self {
        Self::with_agent(base, http_client::analyze_agent().clone(), PROGRESS_TICK)
    }

    pub(crate) fn with_agent(base: &Url, agent: ureq::Agent, tick: Duration) -> Self {
        Self {
            url: http_client::endpoint(base, ANALYZE_PATH),
            agent,
            tick,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Upload `candidate` and project the response.
    ///
    /// `on_progress` sees non-decreasing estimates and receives 100 only after
    /// the response was accepted. Once `cancel` is raised the call stops
    /// waiting and returns [`ErrorKind::Cancelled`]; the request itself runs
    /// to its own deadline in the background.
    pub fn submit(
        &self,
        candidate: &UploadCandidate,
        cancel: &AtomicBool,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<AnalysisResult, SubmissionError> {
        let body = multipart::encode_file_field(FILE_FIELD, candidate.name(), candidate.content());
        debug!(
            "Uploading {} ({} bytes) to {}",
            candidate.name(),
            candidate.size_bytes(),
            self.url
        );
        let (tx, rx) = mpsc::channel();
        let agent = self.agent.clone();
        let url = self.url.clone();
        thread::spawn(move || {
            let _ = tx.send(send_upload(&agent, &url, body));
        });

        let mut estimator = ProgressEstimator::default();
        let outcome = loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(SubmissionError::cancelled());
            }
            match rx.recv_timeout(self.tick) {
                Ok(outcome) => break outcome,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(percent) = estimator.tick() {
                        on_progress(percent);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(SubmissionError::unreachable(
                        "Upload stopped before a response arrived",
                    ));
                }
            }
        };
        if cancel.load(Ordering::Relaxed) {
            return Err(SubmissionError::cancelled());
        }
        let result = outcome.and_then(|bytes| interpret_analyze_body(&bytes))?;
        on_progress(estimator.complete());
        Ok(result)
    }
}

fn send_upload(agent: &ureq::Agent, url: &str, body: MultipartBody) -> Result<Vec<u8>, SubmissionError> {
    let request = agent
        .post(url)
        .set("Content-Type", &body.content_type)
        .set("Accept", "application/json");
    match request.send_bytes(&body.bytes) {
        Ok(response) => http_client::read_response_bytes(response, MAX_ANALYZE_RESPONSE_BYTES)
            .map_err(map_read_error),
        Err(ureq::Error::Status(code, response)) => {
            let bytes = http_client::read_response_bytes(response, MAX_ERROR_RESPONSE_BYTES)
                .unwrap_or_else(|err| {
                    debug!("Failed to read HTTP {code} error body: {err}");
                    Vec::new()
                });
            Err(status_error(code, &bytes))
        }
        Err(ureq::Error::Transport(err)) if http_client::is_timeout(&err) => Err(SubmissionError::new(
            ErrorKind::UploadTimeout,
            format!(
                "Analysis did not finish within {}s",
                http_client::ANALYZE_TIMEOUT.as_secs()
            ),
        )),
        Err(ureq::Error::Transport(err)) => Err(SubmissionError::unreachable(format!(
            "Upload failed: {err}"
        ))),
    }
}

fn map_read_error(err: std::io::Error) -> SubmissionError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => SubmissionError::new(
            ErrorKind::UploadTimeout,
            "Timed out reading the analysis response",
        ),
        _ => SubmissionError::malformed(format!("Unreadable analysis response: {err}")),
    }
}

fn status_error(code: u16, bytes: &[u8]) -> SubmissionError {
    let message = serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|value| remote_error_message(&value));
    match message {
        Some(message) => SubmissionError::remote(message),
        None => {
            warn!("Analyze call returned HTTP {code} without an error message");
            SubmissionError::remote(format!("Service responded with HTTP {code}"))
        }
    }
}

/// Turn a successful response body into a result or a classified error.
pub(crate) fn interpret_analyze_body(bytes: &[u8]) -> Result<AnalysisResult, SubmissionError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| SubmissionError::malformed(format!("Response is not JSON: {err}")))?;
    if let Some(message) = remote_error_message(&value) {
        return Err(SubmissionError::remote(message));
    }
    projector::project(&value)
}

/// Service-supplied failure text, if the body reports one.
fn remote_error_message(value: &Value) -> Option<String> {
    match value.get("error") {
        Some(Value::String(message)) if !message.trim().is_empty() => {
            return Some(message.clone());
        }
        Some(Value::Null) | None => {}
        Some(Value::String(_)) => {}
        Some(other) => return Some(other.to_string()),
    }
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or("Analysis reported failure");
        return Some(message.to_string());
    }
    None
}
