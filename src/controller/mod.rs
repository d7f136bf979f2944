//! Submission state machine.
//!
//! `select` validates and stages a file; when auto-submit is on (or `submit`
//! is called) a worker thread probes the service and, only if healthy,
//! uploads the candidate. Workers report back over a channel tagged with their
//! attempt id. Messages are applied in `poll` on the owning thread, so the
//! controller is the only writer of [`SubmissionState`]. Messages from
//! superseded attempts are dropped.

mod jobs;
mod state;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{ConfigError, Settings};
use crate::error::SubmissionError;
use crate::intake::FileIntake;
use crate::model::{SelectedFile, UploadCandidate};
use crate::service::{AnalysisService, HttpAnalysisService};

use jobs::{AttemptJobs, AttemptMessage};

pub use jobs::AttemptId;
pub use state::SubmissionState;

/// Behaviour switches for a controller instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Proceed to the health check right after a valid selection.
    pub auto_submit: bool,
    /// Reject files above this size before staging.
    pub max_upload_bytes: Option<u64>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Settings::default().into()
    }
}

impl From<Settings> for ControllerSettings {
    fn from(settings: Settings) -> Self {
        Self::from(&settings)
    }
}

impl From<&Settings> for ControllerSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            auto_submit: settings.auto_submit,
            max_upload_bytes: settings.max_upload_bytes(),
        }
    }
}

type StateObserver = Box<dyn FnMut(&SubmissionState)>;

/// Drives one submission at a time and owns the resulting state.
pub struct SubmissionController<S: AnalysisService = HttpAnalysisService> {
    service: Arc<S>,
    settings: ControllerSettings,
    intake: FileIntake,
    state: SubmissionState,
    jobs: AttemptJobs,
    observers: Vec<StateObserver>,
}

impl SubmissionController<HttpAnalysisService> {
    /// Build a controller talking HTTP to the configured service.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let base = settings.base_url()?;
        Ok(Self::new(HttpAnalysisService::new(base), settings.into()))
    }
}

impl<S: AnalysisService> SubmissionController<S> {
    pub fn new(service: S, settings: ControllerSettings) -> Self {
        Self {
            service: Arc::new(service),
            settings,
            intake: FileIntake::new(settings.max_upload_bytes),
            state: SubmissionState::Idle,
            jobs: AttemptJobs::new(),
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn settings(&self) -> ControllerSettings {
        self.settings
    }

    /// The candidate waiting to be (re)submitted, if any.
    pub fn staged(&self) -> Option<&UploadCandidate> {
        self.intake.staged()
    }

    /// Id of the attempt whose messages are currently applied.
    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.jobs.current()
    }

    /// Register a callback invoked after every state change.
    pub fn subscribe(&mut self, observer: impl FnMut(&SubmissionState) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Handle a new file selection, superseding any outstanding attempt.
    pub fn select(&mut self, file: Option<SelectedFile>) {
        self.jobs.cancel_active();
        self.set_state(SubmissionState::Validating);
        match self.intake.stage(file) {
            Ok(candidate) if self.settings.auto_submit => self.start_attempt(candidate),
            Ok(candidate) => {
                info!(
                    "Staged {} ({} bytes); waiting for submit",
                    candidate.name(),
                    candidate.size_bytes()
                );
                self.set_state(SubmissionState::Idle);
            }
            Err(err) => self.fail(err),
        }
    }

    /// Start an attempt for the staged candidate.
    ///
    /// Returns `false` when nothing is staged. An attempt already in flight
    /// is superseded.
    pub fn submit(&mut self) -> bool {
        let Some(candidate) = self.intake.staged().cloned() else {
            debug!("Submit requested with nothing staged");
            return false;
        };
        self.start_attempt(candidate);
        true
    }

    /// Apply every pending worker message. Returns whether the state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.jobs.try_recv() {
            changed |= self.apply(message);
        }
        changed
    }

    /// Block until the current attempt settles or `timeout` elapses.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> &SubmissionState {
        let deadline = Instant::now() + timeout;
        self.poll();
        while self.jobs.current().is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Attempt still {} after {:?}", self.state.label(), timeout);
                break;
            }
            match self.jobs.recv_timeout(remaining) {
                Ok(message) => {
                    self.apply(message);
                }
                Err(_) => break,
            }
        }
        &self.state
    }

    fn start_attempt(&mut self, candidate: UploadCandidate) {
        let (attempt, cancel) = self.jobs.begin();
        info!(
            "Attempt {attempt:?}: submitting {} ({} bytes)",
            candidate.name(),
            candidate.size_bytes()
        );
        self.set_state(SubmissionState::CheckingHealth);
        let service = Arc::clone(&self.service);
        let tx = self.jobs.sender();
        thread::spawn(move || jobs::run_attempt(service.as_ref(), attempt, candidate, cancel, tx));
    }

    fn apply(&mut self, message: AttemptMessage) -> bool {
        if !self.jobs.is_current(message.attempt()) {
            debug!("Dropping message from superseded attempt {:?}", message.attempt());
            return false;
        }
        match message {
            AttemptMessage::HealthChecked { result: Ok(()), .. } => {
                self.set_state(SubmissionState::Uploading { progress: 0 });
                true
            }
            AttemptMessage::HealthChecked { result: Err(err), .. } => {
                self.jobs.finish();
                self.fail(err);
                true
            }
            AttemptMessage::Progress { percent, .. } => match self.state {
                SubmissionState::Uploading { progress } if percent > progress => {
                    self.set_state(SubmissionState::Uploading {
                        progress: percent.min(100),
                    });
                    true
                }
                _ => false,
            },
            AttemptMessage::Finished { result: Ok(result), .. } => {
                self.jobs.finish();
                self.intake.clear();
                self.set_state(SubmissionState::Succeeded(result));
                true
            }
            AttemptMessage::Finished { result: Err(err), .. } => {
                self.jobs.finish();
                self.fail(err);
                true
            }
        }
    }

    fn fail(&mut self, err: SubmissionError) {
        warn!("Submission failed ({:?}): {}", err.kind, err.message);
        self.set_state(SubmissionState::Failed(err));
    }

    fn set_state(&mut self, next: SubmissionState) {
        match (&self.state, &next) {
            (SubmissionState::Uploading { .. }, SubmissionState::Uploading { progress }) => {
                debug!("Upload progress {progress}%");
            }
            _ => info!("Submission state: {} -> {}", self.state.label(), next.label()),
        }
        self.state = next;
        for observer in &mut self.observers {
            observer(&self.state);
        }
    }
}
