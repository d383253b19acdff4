//! Per-step gating rules.
//!
//! A step with no registered rule is always valid (step 5 has none).

use serde::Serialize;
use tracing::warn;

use crate::models::session::AssessmentSession;
use crate::wizard::questions::{is_valid_answer, question_ids};
use crate::wizard::steps::{GOALS_STEP, PERSONALITY_STEP, PREFERENCES_STEP, SKILLS_STEP};

/// Rated skills needed to leave step 2. The wording stays a recommendation
/// but the step does not advance below it.
pub const RECOMMENDED_SKILL_COUNT: usize = 3;

/// Answer count the personality step historically gated on. The catalog has
/// more items than this; see `StepValidator::personality`.
pub const LEGACY_PERSONALITY_THRESHOLD: usize = 20;

pub const GOAL_REQUIRED_MESSAGE: &str = "Please select a career goal to continue.";
pub const SKILL_REQUIRED_MESSAGE: &str =
    "Please select at least one skill and rate your level (we recommend at least 3).";
pub const SKILLS_RECOMMENDED_MESSAGE: &str =
    "We recommend rating at least 3 skills so your matches are accurate.";
pub const PREFERENCES_STYLE_MESSAGE: &str = "Please select at least one learning style.";
pub const PREFERENCES_TIME_MESSAGE: &str = "Please select how much time you can commit each week.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: String::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }
}

/// Holds the rule set for each step.
#[derive(Debug, Clone)]
pub struct StepValidator {
    question_ids: Vec<String>,
}

impl Default for StepValidator {
    fn default() -> Self {
        Self::new(question_ids().map(str::to_string).collect())
    }
}

impl StepValidator {
    pub fn new(question_ids: Vec<String>) -> Self {
        if question_ids.len() != LEGACY_PERSONALITY_THRESHOLD {
            warn!(
                "Personality catalog has {} questions but the legacy gate counted {}; \
                 gating on the full catalog",
                question_ids.len(),
                LEGACY_PERSONALITY_THRESHOLD
            );
        }
        Self { question_ids }
    }

    pub fn validate(&self, step: u8, session: &AssessmentSession) -> ValidationResult {
        match step {
            GOALS_STEP => goals(session),
            SKILLS_STEP => skills(session),
            PERSONALITY_STEP => self.personality(session),
            PREFERENCES_STEP => preferences(session),
            _ => ValidationResult::valid(),
        }
    }

    fn personality(&self, session: &AssessmentSession) -> ValidationResult {
        let answered = self
            .question_ids
            .iter()
            .filter(|id| {
                session
                    .personality
                    .get(id.as_str())
                    .is_some_and(|a| is_valid_answer(*a))
            })
            .count();
        let total = self.question_ids.len();

        if answered == total {
            return ValidationResult::valid();
        }

        if answered >= LEGACY_PERSONALITY_THRESHOLD {
            warn!(
                "Personality step blocked at {answered}/{total} answers; \
                 the legacy {LEGACY_PERSONALITY_THRESHOLD}-answer gate would have passed"
            );
        }

        ValidationResult::invalid(format!(
            "Please answer all {total} personality questions ({} remaining).",
            total - answered
        ))
    }
}

fn goals(session: &AssessmentSession) -> ValidationResult {
    match session.goals.as_deref().map(str::trim) {
        Some(goal) if !goal.is_empty() => ValidationResult::valid(),
        _ => ValidationResult::invalid(GOAL_REQUIRED_MESSAGE),
    }
}

fn skills(session: &AssessmentSession) -> ValidationResult {
    let rated = session.rated_skill_count();
    match rated {
        0 => ValidationResult::invalid(SKILL_REQUIRED_MESSAGE),
        n if n < RECOMMENDED_SKILL_COUNT => ValidationResult::invalid(SKILLS_RECOMMENDED_MESSAGE),
        _ => ValidationResult::valid(),
    }
}

fn preferences(session: &AssessmentSession) -> ValidationResult {
    let prefs = &session.preferences;
    if prefs.learning_style.iter().all(|s| s.trim().is_empty()) {
        return ValidationResult::invalid(PREFERENCES_STYLE_MESSAGE);
    }
    if prefs.time_commitment.trim().is_empty() {
        return ValidationResult::invalid(PREFERENCES_TIME_MESSAGE);
    }
    ValidationResult::valid()
}
