//! The assessment session as one unit: wizard, persistence and backend.
//!
//! Every mutation goes through here so that it is followed by a local write
//! and, when signed in, a queued server push.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::backend_client::{AssessmentBackend, BackendError, QuizSubmission};
use crate::models::identity::Identity;
use crate::models::recommendations::{BackendRecommendationsResponse, NextRole, Profile};
use crate::models::session::{AssessmentSession, SessionPatch, SkillSelection};
use crate::persistence::{PersistenceSync, RestoreSource, SyncError};
use crate::scoring::skill_gap::with_session_levels;
use crate::scoring::{rank_matches, RankedMatch};
use crate::wizard::steps::{StepDescriptor, RESULTS_STEP, STEPS};
use crate::wizard::{AdvanceOutcome, QuizSubmitter, Wizard};

/// Submits the quiz under the signed-in user's credentials.
struct AuthedSubmitter<'a> {
    backend: &'a dyn AssessmentBackend,
    identity: &'a Identity,
}

#[async_trait]
impl QuizSubmitter for AuthedSubmitter<'_> {
    async fn submit_quiz(
        &self,
        submission: &QuizSubmission,
    ) -> Result<BackendRecommendationsResponse, BackendError> {
        self.backend.submit_quiz(self.identity, submission).await
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSnapshot {
    pub current_step: u8,
    pub steps: Vec<StepDescriptor>,
    pub session: AssessmentSession,
    pub validation_errors: BTreeMap<u8, String>,
    pub authenticated: bool,
    pub restored_from: RestoreSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultsSource {
    /// Recommendations already held by the session.
    Session,
    /// Fetched afterwards from the personalized endpoint.
    Personalized,
    /// Nothing to show beyond the user's own answers.
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub source: ResultsSource,
    pub personality_type: String,
    pub profile: Option<Profile>,
    pub matches: Vec<RankedMatch>,
}

pub struct AssessmentService {
    wizard: Wizard,
    persistence: PersistenceSync,
    backend: Arc<dyn AssessmentBackend>,
    identity: Option<Identity>,
    restored_from: RestoreSource,
}

impl AssessmentService {
    pub fn new(persistence: PersistenceSync, backend: Arc<dyn AssessmentBackend>) -> Self {
        Self {
            wizard: Wizard::default(),
            persistence,
            backend,
            identity: None,
            restored_from: RestoreSource::Fresh,
        }
    }

    /// Loads saved progress into the wizard. Called at startup and after sign-in.
    pub async fn mount(&mut self) -> RestoreSource {
        let restored = self
            .persistence
            .restore(self.backend.as_ref(), self.identity.as_ref())
            .await;
        info!(
            "Assessment restored from {:?} at step {}",
            restored.source, restored.current_step
        );
        self.wizard.restore(restored.current_step, restored.session);
        self.restored_from = restored.source;
        if restored.source != RestoreSource::Fresh {
            self.persist();
        }
        restored.source
    }

    pub async fn advance(&mut self, patch: SessionPatch) -> AdvanceOutcome {
        let outcome = match &self.identity {
            Some(identity) => {
                let submitter = AuthedSubmitter {
                    backend: self.backend.as_ref(),
                    identity,
                };
                self.wizard
                    .advance(patch, Some(&submitter as &dyn QuizSubmitter))
                    .await
            }
            None => self.wizard.advance(patch, None).await,
        };
        self.persist();
        outcome
    }

    pub fn retreat(&mut self) -> u8 {
        let step = self.wizard.retreat();
        self.persist();
        step
    }

    pub fn continue_without_saving(&mut self) -> AdvanceOutcome {
        let outcome = self.wizard.continue_without_saving();
        self.persist();
        outcome
    }

    /// Clears the wizard, every local key and (when signed in) the server copy.
    pub fn reset_all(&mut self) {
        self.wizard.reset_all();
        self.restored_from = RestoreSource::Fresh;
        self.persistence.purge(self.identity.as_ref());
        info!("Assessment reset");
    }

    /// Stashes the current state so it survives the sign-in round trip.
    pub fn begin_auth_redirect(&self) -> Result<u8, SyncError> {
        let step = self.wizard.current_step();
        self.persistence.stash_pending(step, self.wizard.session())?;
        info!("Assessment stashed at step {step} for sign-in");
        Ok(step)
    }

    pub async fn sign_in(&mut self, identity: Identity) -> RestoreSource {
        info!("User {} signed in", identity.user_id);
        self.identity = Some(identity);
        self.mount().await
    }

    /// Local progress is kept; only server pushes stop.
    pub fn sign_out(&mut self) {
        if let Some(identity) = self.identity.take() {
            info!("User {} signed out", identity.user_id);
        }
    }

    /// `None` until the wizard reaches the Results step.
    ///
    /// When the quiz submission produced nothing and the user is signed in,
    /// the personalized endpoint is tried once per call.
    pub async fn results(&mut self) -> Option<ResultsView> {
        if self.wizard.current_step() != RESULTS_STEP {
            return None;
        }

        let mut source = ResultsSource::Session;
        if self.wizard.session().backend.is_none() {
            source = ResultsSource::Unavailable;
            if let Some(identity) = &self.identity {
                match self.backend.personalized_recommendations(identity).await {
                    Ok(response) if response.top_matches.is_empty() => {
                        info!("No personalized recommendations stored for this user");
                    }
                    Ok(response) => {
                        info!(
                            "Loaded {} personalized recommendations",
                            response.top_matches.len()
                        );
                        self.wizard.set_backend(response);
                        self.persist();
                        source = ResultsSource::Personalized;
                    }
                    Err(e) => warn!("Personalized recommendations unavailable: {e}"),
                }
            }
        }

        let session = self.wizard.session();
        let matches = session
            .backend
            .as_ref()
            .map(|response| rank_matches(&with_levels_from(response, &session.skills)))
            .unwrap_or_default();

        Some(ResultsView {
            source,
            personality_type: session.personality_type.clone(),
            profile: session.backend.as_ref().and_then(|b| b.profile.clone()),
            matches,
        })
    }

    pub fn snapshot(&self) -> AssessmentSnapshot {
        AssessmentSnapshot {
            current_step: self.wizard.current_step(),
            steps: STEPS.to_vec(),
            session: self.wizard.session().sanitized(),
            validation_errors: self.wizard.validation_errors().clone(),
            authenticated: self.identity.is_some(),
            restored_from: self.restored_from,
        }
    }

    fn persist(&self) {
        self.persistence.persist(
            self.wizard.current_step(),
            self.wizard.session(),
            self.identity.as_ref(),
        );
    }
}

/// Copy of the response whose missing-skill lists carry the user's own levels
/// where the backend left them out.
fn with_levels_from(
    response: &BackendRecommendationsResponse,
    skills: &BTreeMap<String, SkillSelection>,
) -> BackendRecommendationsResponse {
    let fill = |role: &mut Option<NextRole>| {
        if let Some(missing) = role.as_mut().and_then(|r| r.missing_skills.as_mut()) {
            let filled = with_session_levels(missing, skills);
            *missing = filled;
        }
    };

    let mut response = response.clone();
    for top_match in &mut response.top_matches {
        fill(&mut top_match.next_role);
    }
    for path in &mut response.paths {
        fill(&mut path.next_role);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recommendations::{MissingSkill, TopMatch};
    use crate::persistence::local::{PENDING_KEY, PROGRESS_KEY};
    use crate::persistence::sync::tests::{identity, FlakyBackend};
    use crate::persistence::{KeyValueStore, MemoryStore, RetryPolicy, SyncQueue};
    use crate::scoring::skill_gap::SkillGapView;
    use crate::wizard::machine::tests::{
        goals_patch, personality_patch, preferences_patch, sample_response, skills_patch,
    };
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn service_with(backend: Arc<FlakyBackend>) -> (Arc<MemoryStore>, AssessmentService) {
        let store = Arc::new(MemoryStore::new());
        let queue = SyncQueue::spawn(
            backend.clone(),
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::ZERO,
            },
        );
        let persistence = PersistenceSync::new(store.clone(), queue);
        (store, AssessmentService::new(persistence, backend))
    }

    async fn to_step_four(service: &mut AssessmentService) {
        for patch in [goals_patch(), skills_patch(), personality_patch()] {
            service.advance(patch).await;
        }
        assert_eq!(service.snapshot().current_step, 4);
    }

    #[tokio::test]
    async fn test_every_mutation_writes_locally() {
        let (store, mut service) = service_with(Arc::new(FlakyBackend::default()));
        service.advance(goals_patch()).await;
        let raw = store.get(PROGRESS_KEY).unwrap().unwrap();
        assert!(raw.contains("\"currentStep\":2"));
        assert!(raw.contains("career-change"));

        service.retreat();
        assert!(store.get(PROGRESS_KEY).unwrap().unwrap().contains("\"currentStep\":1"));
    }

    #[tokio::test]
    async fn test_signed_in_flow_submits_and_pushes() {
        let backend = Arc::new(FlakyBackend::default());
        *backend.quiz_response.lock().unwrap() = Some(sample_response());
        let (_, mut service) = service_with(backend.clone());
        service.sign_in(identity()).await;

        to_step_four(&mut service).await;
        let outcome = service.advance(preferences_patch()).await;
        assert!(matches!(
            outcome,
            AdvanceOutcome::Completed {
                submitted: true,
                ..
            }
        ));

        service.persistence.queue().flush().await;
        let saved = backend.saved.lock().unwrap();
        assert_eq!(saved.last().unwrap().current_step, 5);
        assert_eq!(saved.last().unwrap().answers.len(), 32);
    }

    #[tokio::test]
    async fn test_anonymous_user_hits_gate_then_continues() {
        let (_, mut service) = service_with(Arc::new(FlakyBackend::default()));
        to_step_four(&mut service).await;
        assert!(matches!(
            service.advance(preferences_patch()).await,
            AdvanceOutcome::AuthRequired
        ));
        assert!(matches!(
            service.continue_without_saving(),
            AdvanceOutcome::Completed {
                submitted: false,
                ..
            }
        ));

        let results = service.results().await.unwrap();
        assert_eq!(results.source, ResultsSource::Unavailable);
        assert!(results.matches.is_empty());
    }

    #[tokio::test]
    async fn test_redirect_stash_restored_after_sign_in() {
        let (store, mut service) = service_with(Arc::new(FlakyBackend::default()));
        to_step_four(&mut service).await;
        service.advance(preferences_patch()).await;
        assert_eq!(service.begin_auth_redirect().unwrap(), 4);
        assert!(store.get(PENDING_KEY).unwrap().is_some());

        service.reset_all();
        // reset clears the stash too, so stash again from a fresh walk
        to_step_four(&mut service).await;
        service.begin_auth_redirect().unwrap();

        let source = service.sign_in(identity()).await;
        assert_eq!(source, RestoreSource::PendingRedirect);
        assert_eq!(service.snapshot().current_step, 4);
        assert!(service.snapshot().authenticated);
        assert!(store.get(PENDING_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_results_falls_back_to_personalized() {
        let backend = Arc::new(FlakyBackend::default());
        *backend.personalized.lock().unwrap() = Some(sample_response());
        let (_, mut service) = service_with(backend);
        service.sign_in(identity()).await;

        to_step_four(&mut service).await;
        // quiz_response unset: the submission fails but Results is reached
        service.advance(preferences_patch()).await;
        assert!(service.snapshot().session.backend.is_none());

        let results = service.results().await.unwrap();
        assert_eq!(results.source, ResultsSource::Personalized);
        assert_eq!(results.matches[0].score, Some(81));

        let again = service.results().await.unwrap();
        assert_eq!(again.source, ResultsSource::Session);
    }

    #[tokio::test]
    async fn test_results_before_completion_is_none() {
        let (_, mut service) = service_with(Arc::new(FlakyBackend::default()));
        assert!(service.results().await.is_none());
    }

    #[tokio::test]
    async fn test_results_fill_levels_from_session() {
        let backend = Arc::new(FlakyBackend::default());
        let mut response = sample_response();
        response.top_matches[0].next_role = Some(NextRole {
            title: Some("Senior Data Engineer".to_string()),
            level: Some("3".to_string()),
            missing_skills: Some(vec![MissingSkill {
                skill: "Rust".to_string(),
                have: 0,
                need: 4,
            }]),
        });
        *backend.quiz_response.lock().unwrap() = Some(response);
        let (_, mut service) = service_with(backend);
        service.sign_in(identity()).await;
        to_step_four(&mut service).await;
        service.advance(preferences_patch()).await;

        let results = service.results().await.unwrap();
        match &results.matches[0].skill_gaps {
            SkillGapView::Gaps { entries, .. } => {
                // skills_patch rates Rust at 3
                assert_eq!(entries[0].have, 3);
                assert_eq!(entries[0].shortfall, 1);
            }
            other => panic!("expected gaps, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_results_keep_backend_gap_order() {
        let backend = Arc::new(FlakyBackend::default());
        let names = ["Kafka", "Rust", "Airflow", "SQL", "Spark", "Python", "Go", "dbt"];
        let mut response = sample_response();
        response.top_matches[0].next_role = Some(NextRole {
            title: Some("Staff Engineer".to_string()),
            level: None,
            missing_skills: Some(
                names
                    .iter()
                    .map(|n| MissingSkill {
                        skill: n.to_string(),
                        have: 0,
                        need: 4,
                    })
                    .collect(),
            ),
        });
        *backend.quiz_response.lock().unwrap() = Some(response);
        let (_, mut service) = service_with(backend);
        service.sign_in(identity()).await;
        to_step_four(&mut service).await;
        service.advance(preferences_patch()).await;

        let results = service.results().await.unwrap();
        match &results.matches[0].skill_gaps {
            SkillGapView::Gaps { entries, hidden } => {
                let shown: Vec<_> = entries.iter().map(|e| e.skill.as_str()).collect();
                assert_eq!(shown, names[..6]);
                assert_eq!(*hidden, 2);
                // Rust and SQL carry the user's own ratings
                assert_eq!(entries[1].have, 3);
                assert_eq!(entries[3].have, 2);
            }
            other => panic!("expected gaps, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reset_all_purges_local_and_server() {
        let backend = Arc::new(FlakyBackend::default());
        let (store, mut service) = service_with(backend.clone());
        service.sign_in(identity()).await;
        service.advance(goals_patch()).await;

        service.reset_all();
        service.persistence.queue().flush().await;
        assert!(store.get(PROGRESS_KEY).unwrap().is_none());
        assert_eq!(backend.cleared.load(Ordering::SeqCst), 1);
        assert_eq!(service.snapshot().current_step, 1);
    }

    #[tokio::test]
    async fn test_sign_out_stops_pushes() {
        let backend = Arc::new(FlakyBackend::default());
        let (_, mut service) = service_with(backend.clone());
        service.sign_in(identity()).await;
        service.sign_out();
        service.advance(goals_patch()).await;
        service.persistence.queue().flush().await;
        assert!(backend.saved.lock().unwrap().is_empty());
        assert!(!service.snapshot().authenticated);
    }

    #[test]
    fn test_levels_filled_on_paths_too() {
        let mut response = BackendRecommendationsResponse {
            top_matches: vec![TopMatch::default()],
            ..Default::default()
        };
        response.paths.push(crate::models::recommendations::Path {
            next_role: Some(NextRole {
                missing_skills: Some(vec![MissingSkill {
                    skill: "Go".to_string(),
                    have: 0,
                    need: 2,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        });
        let filled = with_levels_from(&response, &BTreeMap::new());
        let missing = filled.paths[0]
            .next_role
            .as_ref()
            .and_then(|r| r.missing_skills.clone())
            .unwrap();
        assert_eq!(missing[0].have, 0);
        assert_eq!(missing[0].need, 2);
    }
}
