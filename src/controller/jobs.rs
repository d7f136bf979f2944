use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use tracing::debug;

use crate::error::SubmissionError;
use crate::model::{AnalysisResult, UploadCandidate};
use crate::service::AnalysisService;

/// Identity of one submission attempt; later attempts supersede earlier ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

/// Messages sent by an attempt worker back to the controller thread.
#[derive(Debug)]
pub(crate) enum AttemptMessage {
    HealthChecked {
        attempt: AttemptId,
        result: Result<(), SubmissionError>,
    },
    Progress {
        attempt: AttemptId,
        percent: u8,
    },
    Finished {
        attempt: AttemptId,
        result: Result<AnalysisResult, SubmissionError>,
    },
}

impl AttemptMessage {
    pub(crate) fn attempt(&self) -> AttemptId {
        match self {
            Self::HealthChecked { attempt, .. }
            | Self::Progress { attempt, .. }
            | Self::Finished { attempt, .. } => *attempt,
        }
    }
}

#[derive(Debug)]
struct ActiveAttempt {
    id: AttemptId,
    cancel: Arc<AtomicBool>,
}

/// Attempt bookkeeping: id allocation, the current attempt and its channel.
pub(crate) struct AttemptJobs {
    message_tx: Sender<AttemptMessage>,
    message_rx: Receiver<AttemptMessage>,
    next_attempt_id: u64,
    active: Option<ActiveAttempt>,
}

impl AttemptJobs {
    pub(crate) fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel();
        Self {
            message_tx,
            message_rx,
            next_attempt_id: 1,
            active: None,
        }
    }

    /// Start a new attempt, cancelling whichever one was current.
    pub(crate) fn begin(&mut self) -> (AttemptId, Arc<AtomicBool>) {
        self.cancel_active();
        let id = AttemptId(self.next_attempt_id);
        self.next_attempt_id = self.next_attempt_id.wrapping_add(1).max(1);
        let cancel = Arc::new(AtomicBool::new(false));
        self.active = Some(ActiveAttempt {
            id,
            cancel: Arc::clone(&cancel),
        });
        (id, cancel)
    }

    pub(crate) fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("Cancelling attempt {:?}", active.id);
            active.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Mark the current attempt as settled without raising its cancel flag.
    pub(crate) fn finish(&mut self) {
        self.active = None;
    }

    pub(crate) fn current(&self) -> Option<AttemptId> {
        self.active.as_ref().map(|active| active.id)
    }

    pub(crate) fn is_current(&self, attempt: AttemptId) -> bool {
        self.current() == Some(attempt)
    }

    pub(crate) fn sender(&self) -> Sender<AttemptMessage> {
        self.message_tx.clone()
    }

    pub(crate) fn try_recv(&self) -> Result<AttemptMessage, TryRecvError> {
        self.message_rx.try_recv()
    }

    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<AttemptMessage, RecvTimeoutError> {
        self.message_rx.recv_timeout(timeout)
    }
}

impl Drop for AttemptJobs {
    fn drop(&mut self) {
        self.cancel_active();
    }
}

/// Body of an attempt worker thread: probe, then upload only if healthy.
pub(crate) fn run_attempt<S: AnalysisService + ?Sized>(
    service: &S,
    attempt: AttemptId,
    candidate: UploadCandidate,
    cancel: Arc<AtomicBool>,
    tx: Sender<AttemptMessage>,
) {
    let health = service.check_health();
    let healthy = health.is_ok();
    if tx
        .send(AttemptMessage::HealthChecked {
            attempt,
            result: health,
        })
        .is_err()
        || !healthy
    {
        return;
    }
    if cancel.load(Ordering::Relaxed) {
        debug!("Attempt {attempt:?} superseded before upload");
        return;
    }
    let result = service.submit(&candidate, &cancel, &mut |percent| {
        let _ = tx.send(AttemptMessage::Progress { attempt, percent });
    });
    let _ = tx.send(AttemptMessage::Finished { attempt, result });
}
