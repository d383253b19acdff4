//! Step State Machine.
//!
//! Owns the current step and the session aggregate. `advance` is the only way
//! forward and only moves after the active step's rule passes. Persistence is
//! not handled here; `AssessmentService` writes after every mutation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend_client::{BackendError, QuizSubmission};
use crate::models::recommendations::BackendRecommendationsResponse;
use crate::models::session::{AssessmentSession, SessionPatch};
use crate::scoring::{rank_matches, RankedMatch};
use crate::wizard::steps::{clamp_step, PREFERENCES_STEP, STEP_COUNT};
use crate::wizard::validation::StepValidator;

/// The quiz submission performed at the step 4 → 5 boundary.
#[async_trait]
pub trait QuizSubmitter: Send + Sync {
    async fn submit_quiz(
        &self,
        submission: &QuizSubmission,
    ) -> Result<BackendRecommendationsResponse, BackendError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// The active step's rule failed; `current_step` is unchanged.
    Invalid { step: u8, message: String },
    Advanced { from: u8, to: u8 },
    /// Moved onto the Results step.
    Completed {
        submitted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        submission_error: Option<String>,
        matches: Vec<RankedMatch>,
    },
    /// Step 4 passed but there is no identity to submit under.
    AuthRequired,
    AtLastStep,
}

#[derive(Debug, Clone)]
pub struct Wizard {
    current_step: u8,
    session: AssessmentSession,
    validation_errors: BTreeMap<u8, String>,
    validator: StepValidator,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new(StepValidator::default())
    }
}

impl Wizard {
    pub fn new(validator: StepValidator) -> Self {
        Self {
            current_step: 1,
            session: AssessmentSession::default(),
            validation_errors: BTreeMap::new(),
            validator,
        }
    }

    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    pub fn session(&self) -> &AssessmentSession {
        &self.session
    }

    pub fn validation_errors(&self) -> &BTreeMap<u8, String> {
        &self.validation_errors
    }

    /// Adopts restored state. The step is clamped into range.
    pub fn restore(&mut self, current_step: u8, session: AssessmentSession) {
        self.current_step = clamp_step(current_step as i64);
        self.session = session;
        self.validation_errors.clear();
    }

    /// Adopts recommendations fetched outside the submission (Results fallback).
    pub fn set_backend(&mut self, backend: BackendRecommendationsResponse) {
        self.session.backend = Some(backend);
    }

    pub async fn advance(
        &mut self,
        patch: SessionPatch,
        submitter: Option<&dyn QuizSubmitter>,
    ) -> AdvanceOutcome {
        self.session.apply(patch);

        let step = self.current_step;
        let result = self.validator.validate(step, &self.session);
        if !result.is_valid {
            debug!("Step {step} failed validation: {}", result.message);
            self.validation_errors.insert(step, result.message.clone());
            return AdvanceOutcome::Invalid {
                step,
                message: result.message,
            };
        }
        self.validation_errors.remove(&step);

        if step >= STEP_COUNT {
            return AdvanceOutcome::AtLastStep;
        }

        if step == PREFERENCES_STEP {
            return match submitter {
                Some(submitter) => self.submit_and_finish(submitter).await,
                None => {
                    info!("Quiz ready but no identity present; waiting on sign-in choice");
                    AdvanceOutcome::AuthRequired
                }
            };
        }

        self.current_step = step + 1;
        AdvanceOutcome::Advanced {
            from: step,
            to: self.current_step,
        }
    }

    /// The "continue without saving" branch of the sign-in gate: moves to
    /// Results without a backend submission.
    pub fn continue_without_saving(&mut self) -> AdvanceOutcome {
        let step = self.current_step;
        if step != PREFERENCES_STEP {
            return AdvanceOutcome::Invalid {
                step,
                message: "Continuing without saving is only possible from the preferences step."
                    .to_string(),
            };
        }
        let result = self.validator.validate(step, &self.session);
        if !result.is_valid {
            self.validation_errors.insert(step, result.message.clone());
            return AdvanceOutcome::Invalid {
                step,
                message: result.message,
            };
        }
        self.validation_errors.remove(&step);
        self.session.backend = None;
        self.current_step = STEP_COUNT;
        AdvanceOutcome::Completed {
            submitted: false,
            submission_error: None,
            matches: vec![],
        }
    }

    pub fn retreat(&mut self) -> u8 {
        self.current_step = self.current_step.saturating_sub(1).max(1);
        self.current_step
    }

    pub fn reset_all(&mut self) {
        self.current_step = 1;
        self.session = AssessmentSession::default();
        self.validation_errors.clear();
    }

    async fn submit_and_finish(&mut self, submitter: &dyn QuizSubmitter) -> AdvanceOutcome {
        let submission = QuizSubmission::from_session(&self.session);

        let (submitted, submission_error, matches) = match submitter.submit_quiz(&submission).await
        {
            Ok(response) => {
                let matches = rank_matches(&response);
                match matches.first() {
                    Some(top) => info!(
                        "Quiz submitted: {} matches, top '{}' at {:?}",
                        matches.len(),
                        top.name,
                        top.score
                    ),
                    None => info!("Quiz submitted: backend returned no matches"),
                }
                self.session.backend = Some(response);
                (true, None, matches)
            }
            Err(e) => {
                // Results still render, just without backend data.
                warn!("Quiz submission failed: {e}");
                self.session.backend = None;
                (false, Some(e.to_string()), vec![])
            }
        };

        self.current_step = STEP_COUNT;
        AdvanceOutcome::Completed {
            submitted,
            submission_error,
            matches,
        }
    }
}
