//! Liveness probe gating every upload.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{ErrorKind, SubmissionError};
use crate::http_client;

const HEALTH_PATH: &str = "api/healthcheck";
const HEALTHY: &str = "healthy";
const MAX_HEALTH_RESPONSE_BYTES: usize = 16 * 1024;

#[derive(Debug, Deserialize)]
struct HealthStatus {
    status: Option<String>,
}

/// Short-deadline check that the analysis service is able to accept work.
#[derive(Clone, Debug)]
pub struct HealthProbe {
    url: String,
    agent: ureq::Agent,
}

impl HealthProbe {
    pub fn new(base: &Url) -> Self {
        Self::with_agent(base, http_client::health_agent().clone())
    }

    pub(crate) fn with_agent(base: &Url, agent: ureq::Agent) -> Self {
        Self {
            url: http_client::endpoint(base, HEALTH_PATH),
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `Ok` only when the service answers 2xx with `status: "healthy"`.
    pub fn check(&self) -> Result<(), SubmissionError> {
        debug!("Probing {}", self.url);
        let response = match self.agent.get(&self.url).set("Accept", "application/json").call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(SubmissionError::unreachable(format!(
                    "Health check returned HTTP {code}"
                )));
            }
            Err(ureq::Error::Transport(err)) if http_client::is_timeout(&err) => {
                return Err(SubmissionError::unreachable(format!(
                    "Health check timed out after {}s",
                    http_client::HEALTH_TIMEOUT.as_secs()
                )));
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(SubmissionError::unreachable(format!(
                    "Health check failed: {err}"
                )));
            }
        };
        let bytes = http_client::read_response_bytes(response, MAX_HEALTH_RESPONSE_BYTES)
            .map_err(|err| {
                if matches!(err.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) {
                    SubmissionError::unreachable("Health check timed out reading the response")
                } else {
                    SubmissionError::new(ErrorKind::Unhealthy, format!("Unreadable health response: {err}"))
                }
            })?;
        interpret_health_body(&bytes)
    }
}

fn interpret_health_body(bytes: &[u8]) -> Result<(), SubmissionError> {
    let parsed: HealthStatus = serde_json::from_slice(bytes).map_err(|err| {
        SubmissionError::new(ErrorKind::Unhealthy, format!("Invalid health response: {err}"))
    })?;
    match parsed.status.as_deref() {
        Some(HEALTHY) => Ok(()),
        Some(other) => Err(SubmissionError::new(
            ErrorKind::Unhealthy,
            format!("Service reported status '{other}'"),
        )),
        None => Err(SubmissionError::new(
            ErrorKind::Unhealthy,
            "Health response has no status field",
        )),
    }
}
