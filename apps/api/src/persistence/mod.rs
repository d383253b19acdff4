// Persistence Sync: local durable storage on every change, best-effort server
// push when signed in, and precedence-ordered restore on mount.
// Local writes always happen first and never wait on the network.

pub mod local;
pub mod restore;
pub mod store;
pub mod sync;

use std::sync::Arc;

use tracing::warn;

use crate::backend_client::AssessmentBackend;
use crate::models::identity::Identity;
use crate::models::session::{AssessmentSession, ProgressPayload};

pub use local::LocalProgress;
pub use restore::{RestoreSource, RestoredState};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use sync::{RetryPolicy, SyncError, SyncQueue, SyncStatus};

#[derive(Clone)]
pub struct PersistenceSync {
    local: LocalProgress,
    queue: SyncQueue,
}

impl PersistenceSync {
    pub fn new(store: Arc<dyn KeyValueStore>, queue: SyncQueue) -> Self {
        Self {
            local: LocalProgress::new(store),
            queue,
        }
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Writes locally, then queues a server push when signed in. A local
    /// failure is logged and does not stop the push.
    pub fn persist(
        &self,
        current_step: u8,
        session: &AssessmentSession,
        identity: Option<&Identity>,
    ) {
        let data = match self.local.save(current_step, session) {
            Ok(record) => record.data,
            Err(e) => {
                warn!("{}", SyncError::Local(e));
                session.sanitized()
            }
        };

        if let Some(identity) = identity {
            self.queue.enqueue_save(
                identity.clone(),
                ProgressPayload {
                    current_step,
                    answers: session.personality.clone(),
                    data,
                },
            );
        }
    }

    /// Clears local copies unconditionally and queues the server clear.
    pub fn purge(&self, identity: Option<&Identity>) {
        if let Err(e) = self.local.clear() {
            warn!("{}", SyncError::Local(e));
        }
        if let Some(identity) = identity {
            self.queue.enqueue_clear(identity.clone());
        }
    }

    /// Saves the in-flight assessment so it survives a sign-in redirect.
    pub fn stash_pending(
        &self,
        current_step: u8,
        session: &AssessmentSession,
    ) -> Result<(), SyncError> {
        self.local.stash_pending(&ProgressPayload {
            current_step,
            data: session.clone(),
            answers: session.personality.clone(),
        })?;
        Ok(())
    }

    pub async fn restore(
        &self,
        backend: &dyn AssessmentBackend,
        identity: Option<&Identity>,
    ) -> RestoredState {
        restore::restore(&self.local, backend, identity).await
    }
}
