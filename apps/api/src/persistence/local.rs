use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::models::session::{AssessmentSession, PersistedProgress, ProgressPayload};
use crate::persistence::store::{KeyValueStore, StoreError};
use crate::wizard::steps::clamp_step;

/// `{currentStep, data}`; the upload is always null.
pub const PROGRESS_KEY: &str = "assessment_progress";
/// Personality answers, question id -> 1..=5.
pub const ANSWERS_KEY: &str = "assessment_answers";
/// `{currentStep, data, answers}` stashed across a sign-in redirect.
pub const PENDING_KEY: &str = "pending_assessment";

/// The stored step may be anything; it is clamped on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProgress {
    current_step: i64,
    data: AssessmentSession,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPending {
    current_step: i64,
    data: AssessmentSession,
    #[serde(default)]
    answers: BTreeMap<String, u8>,
}

/// Typed access to the three local keys.
#[derive(Clone)]
pub struct LocalProgress {
    store: Arc<dyn KeyValueStore>,
}

impl LocalProgress {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes the sanitized session and the answers map. Returns what was written.
    pub fn save(
        &self,
        current_step: u8,
        session: &AssessmentSession,
    ) -> Result<PersistedProgress, StoreError> {
        let record = PersistedProgress {
            current_step,
            data: session.sanitized(),
        };
        self.store
            .set(PROGRESS_KEY, &serde_json::to_string(&record)?)?;
        self.save_answers(&session.personality)?;
        Ok(record)
    }

    /// `None` when nothing is stored or the record is malformed.
    pub fn load(&self) -> Option<PersistedProgress> {
        let raw = match self.store.get(PROGRESS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read local progress: {e}");
                return None;
            }
        };
        match serde_json::from_str::<StoredProgress>(&raw) {
            Ok(stored) => Some(PersistedProgress {
                current_step: clamp_step(stored.current_step),
                data: AssessmentSession {
                    portfolio: None,
                    ..stored.data
                },
            }),
            Err(e) => {
                warn!("Ignoring malformed local progress: {e}");
                None
            }
        }
    }

    pub fn save_answers(&self, answers: &BTreeMap<String, u8>) -> Result<(), StoreError> {
        self.store.set(ANSWERS_KEY, &serde_json::to_string(answers)?)
    }

    pub fn load_answers(&self) -> BTreeMap<String, u8> {
        match self.store.get(ANSWERS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed local answers: {e}");
                BTreeMap::new()
            }),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read local answers: {e}");
                BTreeMap::new()
            }
        }
    }

    pub fn stash_pending(&self, payload: &ProgressPayload) -> Result<(), StoreError> {
        let payload = ProgressPayload {
            current_step: payload.current_step,
            data: payload.data.sanitized(),
            answers: payload.answers.clone(),
        };
        self.store
            .set(PENDING_KEY, &serde_json::to_string(&payload)?)
    }

    /// Reads and removes the pending payload; it is never read twice.
    pub fn take_pending(&self) -> Option<ProgressPayload> {
        let raw = match self.store.get(PENDING_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read pending assessment: {e}");
                return None;
            }
        };
        if let Err(e) = self.store.remove(PENDING_KEY) {
            warn!("Failed to remove pending assessment: {e}");
        }
        match serde_json::from_str::<StoredPending>(&raw) {
            Ok(stored) => Some(ProgressPayload {
                current_step: clamp_step(stored.current_step),
                data: AssessmentSession {
                    portfolio: None,
                    ..stored.data
                },
                answers: stored.answers,
            }),
            Err(e) => {
                warn!("Discarding malformed pending assessment: {e}");
                None
            }
        }
    }

    /// Removes all three keys, attempting each even if one fails.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in [PROGRESS_KEY, ANSWERS_KEY, PENDING_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to clear local key {key}: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{PortfolioUpload, SkillSelection};
    use crate::persistence::store::MemoryStore;

    fn local() -> (Arc<MemoryStore>, LocalProgress) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), LocalProgress::new(store))
    }

    fn rich_session(seed: u8) -> AssessmentSession {
        let mut session = AssessmentSession {
            goals: Some(format!("goal-{seed}")),
            personality_type: "ENFP".to_string(),
            portfolio: Some(PortfolioUpload {
                file_name: "work.zip".to_string(),
                content_type: "application/zip".to_string(),
                bytes: vec![seed; 16],
            }),
            ..Default::default()
        };
        for i in 0..seed % 5 {
            session.skills.insert(
                format!("skill-{i}"),
                SkillSelection {
                    selected: i % 2 == 0,
                    level: i % 5,
                },
            );
            session
                .personality
                .insert(format!("q{}", i + 1), (i % 5) + 1);
        }
        session.preferences.learning_style = vec!["video".to_string(); (seed % 3) as usize];
        session.preferences.time_commitment = format!("{seed}h");
        session
    }

    #[test]
    fn test_save_then_load_roundtrip_nulls_upload() {
        let (_, local) = local();
        for seed in 0..20u8 {
            let session = rich_session(seed);
            let step = seed % 5 + 1;
            local.save(step, &session).unwrap();

            let restored = local.load().unwrap();
            assert_eq!(restored.current_step, step);
            assert!(restored.data.portfolio.is_none());
            assert_eq!(
                restored.data,
                AssessmentSession {
                    portfolio: None,
                    ..session.clone()
                }
            );
            assert_eq!(local.load_answers(), session.personality);
        }
    }

    #[test]
    fn test_stored_upload_is_null() {
        let (store, local) = local();
        local.save(2, &rich_session(3)).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&store.get(PROGRESS_KEY).unwrap().unwrap()).unwrap();
        assert!(raw["data"]["portfolio"].is_null());
    }

    #[test]
    fn test_out_of_range_step_clamped_on_load() {
        let (store, local) = local();
        store
            .set(PROGRESS_KEY, r#"{"currentStep":12,"data":{}}"#)
            .unwrap();
        assert_eq!(local.load().unwrap().current_step, 5);
        store
            .set(PROGRESS_KEY, r#"{"currentStep":-4,"data":{}}"#)
            .unwrap();
        assert_eq!(local.load().unwrap().current_step, 1);
    }

    #[test]
    fn test_malformed_progress_ignored() {
        let (store, local) = local();
        store.set(PROGRESS_KEY, "not json").unwrap();
        assert!(local.load().is_none());
        store.set(PROGRESS_KEY, r#"{"data":{}}"#).unwrap();
        assert!(local.load().is_none());
    }

    #[test]
    fn test_pending_consumed_once() {
        let (_, local) = local();
        let payload = ProgressPayload {
            current_step: 4,
            data: rich_session(2),
            answers: BTreeMap::from([("q1".to_string(), 5)]),
        };
        local.stash_pending(&payload).unwrap();

        let taken = local.take_pending().unwrap();
        assert_eq!(taken.current_step, 4);
        assert!(taken.data.portfolio.is_none());
        assert_eq!(taken.answers["q1"], 5);
        assert!(local.take_pending().is_none());
    }

    #[test]
    fn test_clear_removes_everything() {
        let (store, local) = local();
        local.save(3, &rich_session(4)).unwrap();
        local.stash_pending(&ProgressPayload::default()).unwrap();
        local.clear().unwrap();
        for key in [PROGRESS_KEY, ANSWERS_KEY, PENDING_KEY] {
            assert!(store.get(key).unwrap().is_none(), "{key} left behind");
        }
    }
}
