//! Shared HTTP agents, bounded response reads and transport error helpers.

use std::io::{self, Read};
use std::sync::OnceLock;
use std::time::Duration;

use url::Url;

/// Overall deadline for the liveness probe.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Overall deadline for the analyze upload, including reading the response.
pub const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("statlink/", env!("CARGO_PKG_VERSION"));

/// Build an agent whose every request is bounded by `timeout`.
pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Return the shared agent used for health probes.
pub(crate) fn health_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| build_agent(HEALTH_TIMEOUT))
}

/// Return the shared agent used for analyze uploads.
pub(crate) fn analyze_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| build_agent(ANALYZE_TIMEOUT))
}

/// Join an API path onto the service base URL, keeping any base path prefix.
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Whether a transport failure was caused by a deadline elapsing.
pub(crate) fn is_timeout(err: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            )
        {
            return true;
        }
        source = current.source();
    }
    err.to_string().to_ascii_lowercase().contains("timed out")
}

/// Read a response into memory, enforcing a maximum byte size.
pub(crate) fn read_response_bytes(
    response: ureq::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, io::Error> {
    check_content_length(&response, max_bytes)?;
    let reader = response.into_reader();
    let mut limited = reader.take(max_bytes as u64 + 1);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response exceeded {max_bytes} bytes"),
        ));
    }
    Ok(bytes)
}

fn check_content_length(response: &ureq::Response, max_bytes: usize) -> Result<(), io::Error> {
    let Some(length) = response.header("Content-Length") else {
        return Ok(());
    };
    let Ok(length) = length.parse::<u64>() else {
        return Ok(());
    };
    if length > max_bytes as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response too large: {length} bytes"),
        ));
    }
    Ok(())
}
