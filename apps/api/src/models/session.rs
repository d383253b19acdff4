use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::recommendations::BackendRecommendationsResponse;
use crate::wizard::questions::is_valid_answer;

/// Highest proficiency level a skill can be rated at.
pub const MAX_SKILL_LEVEL: u8 = 4;

/// A single skill selection from step 2.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSelection {
    pub selected: bool,
    /// 0 = not rated, 4 = expert
    pub level: u8,
}

impl SkillSelection {
    /// A skill only counts toward validation once it is selected and rated.
    pub fn is_rated(&self) -> bool {
        self.selected && (1..=MAX_SKILL_LEVEL).contains(&self.level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub learning_style: Vec<String>,
    #[serde(default)]
    pub time_commitment: String,
    #[serde(default)]
    pub budget: String,
}

/// A portfolio upload attached in the UI. Held in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The assessment aggregate. Mutated only through the wizard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSession {
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub skills: BTreeMap<String, SkillSelection>,
    /// question id -> Likert answer 1..=5
    #[serde(default)]
    pub personality: BTreeMap<String, u8>,
    #[serde(default)]
    pub personality_type: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub backend: Option<BackendRecommendationsResponse>,
    #[serde(default)]
    pub portfolio: Option<PortfolioUpload>,
}

impl AssessmentSession {
    /// Copy of the session safe to write to storage: the upload is always nulled.
    pub fn sanitized(&self) -> Self {
        Self {
            portfolio: None,
            ..self.clone()
        }
    }

    pub fn rated_skill_count(&self) -> usize {
        self.skills.values().filter(|s| s.is_rated()).count()
    }

    /// Applies a partial update. Map fields merge per key; scalar fields replace.
    ///
    /// Out-of-range skill levels and answers are not stored: the key is removed
    /// so the step rule sees it as unrated or unanswered.
    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(goals) = patch.goals {
            self.goals = Some(goals);
        }
        if let Some(skills) = patch.skills {
            for (name, selection) in skills {
                if selection.level > MAX_SKILL_LEVEL {
                    warn!("Ignoring skill '{name}' rated {}", selection.level);
                    self.skills.remove(&name);
                    continue;
                }
                self.skills.insert(name, selection);
            }
        }
        if let Some(answers) = patch.personality {
            for (question_id, answer) in answers {
                if !is_valid_answer(answer) {
                    warn!("Ignoring answer {answer} for question '{question_id}'");
                    self.personality.remove(&question_id);
                    continue;
                }
                self.personality.insert(question_id, answer);
            }
        }
        if let Some(personality_type) = patch.personality_type {
            self.personality_type = personality_type;
        }
        if let Some(prefs) = patch.preferences {
            if let Some(learning_style) = prefs.learning_style {
                self.preferences.learning_style = learning_style;
            }
            if let Some(time_commitment) = prefs.time_commitment {
                self.preferences.time_commitment = time_commitment;
            }
            if let Some(budget) = prefs.budget {
                self.preferences.budget = budget;
            }
        }
        if let Some(portfolio) = patch.portfolio {
            self.portfolio = Some(portfolio);
        }
    }
}

/// Partial data submitted with each `advance` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub goals: Option<String>,
    pub skills: Option<BTreeMap<String, SkillSelection>>,
    pub personality: Option<BTreeMap<String, u8>>,
    pub personality_type: Option<String>,
    pub preferences: Option<PreferencesPatch>,
    pub portfolio: Option<PortfolioUpload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub learning_style: Option<Vec<String>>,
    pub time_commitment: Option<String>,
    pub budget: Option<String>,
}

/// The `{currentStep, data}` record written under the progress key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProgress {
    pub current_step: u8,
    pub data: AssessmentSession,
}

/// The `{currentStep, data, answers}` payload shared by the pending-redirect key
/// and the server progress endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub current_step: u8,
    pub data: AssessmentSession,
    #[serde(default)]
    pub answers: BTreeMap<String, u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(selected: bool, level: u8) -> SkillSelection {
        SkillSelection { selected, level }
    }

    #[test]
    fn test_sanitized_drops_portfolio() {
        let session = AssessmentSession {
            goals: Some("career-change".to_string()),
            portfolio: Some(PortfolioUpload {
                file_name: "cv.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: vec![1, 2, 3],
            }),
            ..Default::default()
        };
        let clean = session.sanitized();
        assert!(clean.portfolio.is_none());
        assert_eq!(clean.goals.as_deref(), Some("career-change"));
    }

    #[test]
    fn test_apply_merges_skills_per_key() {
        let mut session = AssessmentSession::default();
        session.skills.insert("Rust".to_string(), skill(true, 2));

        let mut incoming = BTreeMap::new();
        incoming.insert("SQL".to_string(), skill(true, 4));
        session.apply(SessionPatch {
            skills: Some(incoming),
            ..Default::default()
        });

        assert_eq!(session.skills.len(), 2);
        assert_eq!(session.skills["Rust"].level, 2);
        assert_eq!(session.skills["SQL"].level, MAX_SKILL_LEVEL);
    }

    #[test]
    fn test_apply_drops_out_of_range_levels_and_answers() {
        let mut session = AssessmentSession::default();
        session.skills.insert("Rust".to_string(), skill(true, 2));
        session.personality.insert("q1".to_string(), 3);

        let mut skills = BTreeMap::new();
        skills.insert("Rust".to_string(), skill(true, 9));
        skills.insert("SQL".to_string(), skill(true, 7));
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), 0);
        answers.insert("q2".to_string(), 6);
        answers.insert("q3".to_string(), 5);
        session.apply(SessionPatch {
            skills: Some(skills),
            personality: Some(answers),
            ..Default::default()
        });

        assert!(session.skills.is_empty());
        assert_eq!(session.personality.len(), 1);
        assert_eq!(session.personality["q3"], 5);
    }

    #[test]
    fn test_apply_preferences_only_touches_present_fields() {
        let mut session = AssessmentSession::default();
        session.preferences.budget = "low".to_string();
        session.apply(SessionPatch {
            preferences: Some(PreferencesPatch {
                time_commitment: Some("5-10h".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(session.preferences.budget, "low");
        assert_eq!(session.preferences.time_commitment, "5-10h");
    }

    #[test]
    fn test_rated_skill_count_ignores_unselected_and_zero() {
        let mut session = AssessmentSession::default();
        session.skills.insert("a".to_string(), skill(true, 0));
        session.skills.insert("b".to_string(), skill(false, 3));
        session.skills.insert("c".to_string(), skill(true, 1));
        session.skills.insert("d".to_string(), skill(true, 9));
        assert_eq!(session.rated_skill_count(), 1);
    }

    #[test]
    fn test_session_deserializes_camel_case() {
        let json = r#"{"goals":"upskill","personalityType":"INTJ","preferences":{"learningStyle":["video"],"timeCommitment":"1-5h","budget":"free"}}"#;
        let session: AssessmentSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.personality_type, "INTJ");
        assert_eq!(session.preferences.learning_style, vec!["video"]);
        assert!(session.skills.is_empty());
    }
}
