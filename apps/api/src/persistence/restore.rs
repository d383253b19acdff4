//! Restore precedence on mount.
//!
//! 1. A pending payload left by a sign-in redirect decides everything and
//!    nothing else is consulted.
//! 2. Otherwise local progress is loaded (step clamped).
//! 3. If signed in, the server record is overlaid on the local state field by
//!    field; server values win where present. Returned answers are written to
//!    the local answers key.
//!
//! Last write wins; there are no versions or timestamps to compare.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::backend_client::{AssessmentBackend, ServerProgress};
use crate::models::identity::Identity;
use crate::models::session::AssessmentSession;
use crate::persistence::local::LocalProgress;
use crate::wizard::steps::clamp_step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreSource {
    Fresh,
    PendingRedirect,
    Local,
    Server,
    LocalWithServer,
}

#[derive(Debug, Clone)]
pub struct RestoredState {
    pub current_step: u8,
    pub session: AssessmentSession,
    pub source: RestoreSource,
}

pub async fn restore(
    local: &LocalProgress,
    backend: &dyn AssessmentBackend,
    identity: Option<&Identity>,
) -> RestoredState {
    if let Some(pending) = local.take_pending() {
        info!("Restoring assessment from sign-in redirect (step {})", pending.current_step);
        if let Err(e) = local.save_answers(&pending.answers) {
            warn!("Failed to write restored answers locally: {e}");
        }
        let mut session = pending.data;
        if session.personality.is_empty() {
            session.personality = pending.answers;
        }
        return RestoredState {
            current_step: clamp_step(pending.current_step as i64),
            session,
            source: RestoreSource::PendingRedirect,
        };
    }

    let local_progress = local.load();
    let had_local = local_progress.is_some();
    let (mut current_step, mut session) = local_progress
        .map(|p| (p.current_step, p.data))
        .unwrap_or((1, AssessmentSession::default()));
    let mut source = if had_local {
        RestoreSource::Local
    } else {
        RestoreSource::Fresh
    };

    if let Some(identity) = identity {
        match backend.load_progress(identity).await {
            Ok(Some(server)) => {
                if let Some(answers) = &server.answers {
                    if let Err(e) = local.save_answers(answers) {
                        warn!("Failed to write server answers locally: {e}");
                    }
                }
                match overlay_server_progress(current_step, &session, &server) {
                    Ok((step, merged)) => {
                        current_step = step;
                        session = merged;
                        source = if had_local {
                            RestoreSource::LocalWithServer
                        } else {
                            RestoreSource::Server
                        };
                    }
                    Err(e) => warn!("Ignoring unreadable server progress: {e}"),
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load server progress, keeping local state: {e}"),
        }
    }

    if session.personality.is_empty() {
        session.personality = local.load_answers();
    }

    RestoredState {
        current_step,
        session,
        source,
    }
}

/// Server fields replace local ones where the server has a non-null value.
pub fn overlay_server_progress(
    local_step: u8,
    local_session: &AssessmentSession,
    server: &ServerProgress,
) -> Result<(u8, AssessmentSession), serde_json::Error> {
    let step = server.current_step.map(clamp_step).unwrap_or(local_step);

    let mut merged = serde_json::to_value(local_session)?;
    if let (Value::Object(target), Some(Value::Object(incoming))) = (&mut merged, &server.data) {
        for (key, value) in incoming {
            if !value.is_null() {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    let mut session: AssessmentSession = serde_json::from_value(merged)?;
    session.portfolio = None;
    if let Some(answers) = &server.answers {
        if !answers.is_empty() {
            session.personality = answers.clone();
        }
    }
    Ok((step, session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::ProgressPayload;
    use crate::persistence::local::ANSWERS_KEY;
    use crate::persistence::store::{KeyValueStore, MemoryStore};
    use crate::persistence::sync::tests::{identity, FlakyBackend};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryStore>, LocalProgress, FlakyBackend) {
        let store = Arc::new(MemoryStore::new());
        (
            store.clone(),
            LocalProgress::new(store),
            FlakyBackend::default(),
        )
    }

    fn session_with_goal(goal: &str) -> AssessmentSession {
        AssessmentSession {
            goals: Some(goal.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_when_nothing_stored() {
        let (_, local, backend) = setup();
        let restored = restore(&local, &backend, None).await;
        assert_eq!(restored.source, RestoreSource::Fresh);
        assert_eq!(restored.current_step, 1);
    }

    #[tokio::test]
    async fn test_pending_short_circuits_local_and_server() {
        let (_, local, backend) = setup();
        local.save(2, &session_with_goal("local")).unwrap();
        *backend.progress.lock().unwrap() = Some(ServerProgress {
            current_step: Some(3),
            data: Some(json!({ "goals": "server" })),
            answers: None,
        });
        local
            .stash_pending(&ProgressPayload {
                current_step: 4,
                data: session_with_goal("pending"),
                answers: BTreeMap::from([("q2".to_string(), 3)]),
            })
            .unwrap();

        let restored = restore(&local, &backend, Some(&identity())).await;
        assert_eq!(restored.source, RestoreSource::PendingRedirect);
        assert_eq!(restored.current_step, 4);
        assert_eq!(restored.session.goals.as_deref(), Some("pending"));
        assert_eq!(restored.session.personality["q2"], 3);
        assert_eq!(local.load_answers()["q2"], 3);

        // consumed: the next mount falls through to local + server
        let again = restore(&local, &backend, Some(&identity())).await;
        assert_eq!(again.source, RestoreSource::LocalWithServer);
    }

    #[tokio::test]
    async fn test_local_only_when_signed_out() {
        let (_, local, backend) = setup();
        local.save(3, &session_with_goal("local")).unwrap();
        *backend.progress.lock().unwrap() = Some(ServerProgress {
            current_step: Some(5),
            ..Default::default()
        });
        let restored = restore(&local, &backend, None).await;
        assert_eq!(restored.source, RestoreSource::Local);
        assert_eq!(restored.current_step, 3);
    }

    #[tokio::test]
    async fn test_server_overlays_local_field_by_field() {
        let (store, local, backend) = setup();
        let mut session = session_with_goal("local-goal");
        session.personality_type = "ISTJ".to_string();
        session.preferences.budget = "low".to_string();
        local.save(2, &session).unwrap();

        *backend.progress.lock().unwrap() = Some(ServerProgress {
            current_step: Some(9),
            data: Some(json!({ "goals": "server-goal", "personalityType": null })),
            answers: Some(BTreeMap::from([("q1".to_string(), 5)])),
        });

        let restored = restore(&local, &backend, Some(&identity())).await;
        assert_eq!(restored.source, RestoreSource::LocalWithServer);
        assert_eq!(restored.current_step, 5, "server step clamped");
        assert_eq!(restored.session.goals.as_deref(), Some("server-goal"));
        assert_eq!(restored.session.personality_type, "ISTJ", "null keeps local");
        assert_eq!(restored.session.preferences.budget, "low");
        assert_eq!(restored.session.personality["q1"], 5);
        assert!(store.get(ANSWERS_KEY).unwrap().unwrap().contains("q1"));
    }

    #[tokio::test]
    async fn test_server_without_local() {
        let (_, local, backend) = setup();
        *backend.progress.lock().unwrap() = Some(ServerProgress {
            current_step: Some(3),
            data: Some(json!({ "goals": "remote" })),
            answers: None,
        });
        let restored = restore(&local, &backend, Some(&identity())).await;
        assert_eq!(restored.source, RestoreSource::Server);
        assert_eq!(restored.current_step, 3);
    }

    #[tokio::test]
    async fn test_unreadable_server_data_keeps_local() {
        let (_, local, backend) = setup();
        local.save(2, &session_with_goal("mine")).unwrap();
        *backend.progress.lock().unwrap() = Some(ServerProgress {
            current_step: Some(4),
            data: Some(json!({ "skills": "not-a-map" })),
            answers: None,
        });
        let restored = restore(&local, &backend, Some(&identity())).await;
        assert_eq!(restored.source, RestoreSource::Local);
        assert_eq!(restored.current_step, 2);
        assert_eq!(restored.session.goals.as_deref(), Some("mine"));
    }
}
