//! Background push queue for server-side progress.
//!
//! Pushes are fire-and-forget from the wizard's point of view: they are queued
//! here and run by a single worker task in FIFO order with bounded retry. The
//! outcome is observable through `SyncStatus`; a push that exhausts its retries
//! raises a dismissible `SyncNotice`. Jobs are only ever queued for signed-in
//! users, so every notice is one the user should see.
//!
//! There is no fencing against other devices: whatever the backend stored last
//! wins.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend_client::{AssessmentBackend, BackendError};
use crate::models::identity::Identity;
use crate::models::session::ProgressPayload;
use crate::persistence::store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Local persistence failed: {0}")]
    Local(#[from] StoreError),

    #[error("Remote persistence failed: {0}")]
    Remote(#[from] BackendError),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncNotice {
    pub id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub pending: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub last_error: Option<String>,
    pub notices: Vec<SyncNotice>,
}

enum SyncJob {
    Save {
        identity: Identity,
        payload: Box<ProgressPayload>,
    },
    Clear {
        identity: Identity,
    },
    Flush(oneshot::Sender<()>),
}

impl SyncJob {
    fn label(&self) -> &'static str {
        match self {
            SyncJob::Save { .. } => "save progress",
            SyncJob::Clear { .. } => "clear progress",
            SyncJob::Flush(_) => "flush",
        }
    }
}

#[derive(Clone)]
pub struct SyncQueue {
    tx: mpsc::UnboundedSender<SyncJob>,
    status: Arc<Mutex<SyncStatus>>,
}

fn lock(status: &Mutex<SyncStatus>) -> MutexGuard<'_, SyncStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SyncQueue {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(backend: Arc<dyn AssessmentBackend>, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(SyncStatus::default()));
        tokio::spawn(run_worker(rx, backend, policy, status.clone()));
        Self { tx, status }
    }

    pub fn enqueue_save(&self, identity: Identity, payload: ProgressPayload) {
        self.enqueue(SyncJob::Save {
            identity,
            payload: Box::new(payload),
        });
    }

    pub fn enqueue_clear(&self, identity: Identity) {
        self.enqueue(SyncJob::Clear { identity });
    }

    fn enqueue(&self, job: SyncJob) {
        let label = job.label();
        lock(&self.status).pending += 1;
        if self.tx.send(job).is_err() {
            lock(&self.status).pending -= 1;
            error!("Sync worker has stopped; dropping '{label}' job");
        }
    }

    /// Resolves once every job queued before the call has finished.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(SyncJob::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn status(&self) -> SyncStatus {
        lock(&self.status).clone()
    }

    /// Returns false when no notice has that id.
    pub fn dismiss_notice(&self, id: Uuid) -> bool {
        let mut status = lock(&self.status);
        let before = status.notices.len();
        status.notices.retain(|n| n.id != id);
        status.notices.len() != before
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<SyncJob>,
    backend: Arc<dyn AssessmentBackend>,
    policy: RetryPolicy,
    status: Arc<Mutex<SyncStatus>>,
) {
    while let Some(job) = rx.recv().await {
        if let SyncJob::Flush(done) = job {
            let _ = done.send(());
            continue;
        }

        let label = job.label();
        let result = run_with_retry(backend.as_ref(), &job, policy).await;

        let mut state = lock(&status);
        state.pending = state.pending.saturating_sub(1);
        match result {
            Ok(()) => {
                state.succeeded += 1;
                debug!("Sync job '{label}' succeeded");
            }
            Err(e) => {
                error!("Sync job '{label}' failed permanently: {e}");
                state.failed += 1;
                state.last_error = Some(e.to_string());
                state.notices.push(SyncNotice {
                    id: Uuid::new_v4(),
                    message: notice_message(&job),
                    created_at: Utc::now(),
                });
            }
        }
    }
    info!("Sync worker stopped");
}

async fn run_with_retry(
    backend: &dyn AssessmentBackend,
    job: &SyncJob,
    policy: RetryPolicy,
) -> Result<(), SyncError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.delay_before(attempt);
            warn!(
                "Sync job '{}' attempt {attempt} failed, retrying after {}ms...",
                job.label(),
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let result = match job {
            SyncJob::Save { identity, payload } => backend.save_progress(identity, payload).await,
            SyncJob::Clear { identity } => backend.clear_progress(identity).await,
            SyncJob::Flush(_) => return Ok(()),
        };

        match result {
            Ok(()) => return Ok(()),
            // retrying with the same credentials cannot help
            Err(BackendError::Unauthorized) => return Err(BackendError::Unauthorized.into()),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error
        .unwrap_or(BackendError::Unavailable { retries: attempts })
        .into())
}

fn notice_message(job: &SyncJob) -> String {
    match job {
        SyncJob::Clear { .. } => {
            "We couldn't remove your saved progress from your account. It was cleared on this device."
                .to_string()
        }
        _ => "We couldn't save your progress to your account. It is still saved on this device."
            .to_string(),
    }
}
