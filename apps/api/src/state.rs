use std::sync::Arc;

use tokio::sync::Mutex;

use crate::assessment::AssessmentService;
use crate::journey::ProjectTracker;
use crate::persistence::SyncQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// One assessment per process; the lock serializes mutations.
    ///
    /// Handlers hold it across backend calls (quiz submission, sign-in restore,
    /// personalized results), so a slow backend stalls other assessment requests.
    pub assessment: Arc<Mutex<AssessmentService>>,
    /// Same worker the assessment pushes through. Read without the assessment lock.
    pub sync: SyncQueue,
    pub projects: Arc<ProjectTracker>,
}
