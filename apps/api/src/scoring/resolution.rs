//! Score Resolution: picks one match percentage and one role title/level out of
//! the partially-populated shapes the backend returns.
//!
//! Resolution order for the score:
//! 1. `match.currentRole.score`
//! 2. `path.currentRole.weightedScore`
//! 3. weighted blend of `skillFit`/`personalityFit`/`learningFit`, only when at
//!    least two of the three are present
//! 4. `None`, which callers render as "score unavailable" (never as 0%)

use serde::{Deserialize, Serialize};

use crate::models::recommendations::{Path, PathRole, TopMatch};

/// Blend weights for the last-resort score estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub skill: f64,
    pub personality: f64,
    pub learning: f64,
}

pub const BLEND_WEIGHTS: BlendWeights = BlendWeights {
    skill: 0.6,
    personality: 0.3,
    learning: 0.1,
};

/// Substituted for a missing fit component once the two-component gate passed.
const MISSING_COMPONENT_FIT: f64 = 0.5;
const MIN_FIT_COMPONENTS: usize = 2;

pub const UNKNOWN_ROLE_TITLE: &str = "(Role)";
pub const UNKNOWN_ROLE_LEVEL: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTitleLevel {
    pub title: String,
    pub level: String,
}

impl RoleTitleLevel {
    fn unknown() -> Self {
        Self {
            title: UNKNOWN_ROLE_TITLE.to_string(),
            level: UNKNOWN_ROLE_LEVEL.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.title == UNKNOWN_ROLE_TITLE
    }
}

/// A percentage is usable only if it is a finite number within [0, 100].
fn valid_percentage(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && (0.0..=100.0).contains(v))
}

fn valid_fit(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn blend_fit_components(role: &PathRole, weights: BlendWeights) -> Option<f64> {
    let skill = valid_fit(role.skill_fit);
    let personality = valid_fit(role.personality_fit);
    let learning = valid_fit(role.learning_fit);

    let present = [skill, personality, learning]
        .iter()
        .filter(|c| c.is_some())
        .count();
    if present < MIN_FIT_COMPONENTS {
        return None;
    }

    Some(
        skill.unwrap_or(MISSING_COMPONENT_FIT) * weights.skill
            + personality.unwrap_or(MISSING_COMPONENT_FIT) * weights.personality
            + learning.unwrap_or(MISSING_COMPONENT_FIT) * weights.learning,
    )
}

/// Resolves a single 0..=100 match percentage, or `None` when no tier has usable data.
pub fn resolve_match_score(top_match: &TopMatch, path: Option<&Path>) -> Option<u8> {
    if let Some(score) = valid_percentage(top_match.current_role.as_ref().and_then(|r| r.score)) {
        return Some(score.round() as u8);
    }

    let path_role = path.and_then(|p| p.current_role.as_ref())?;

    if let Some(weighted) = valid_percentage(path_role.weighted_score) {
        return Some(weighted.round() as u8);
    }

    let blend = blend_fit_components(path_role, BLEND_WEIGHTS)?;
    Some((blend * 100.0).round().clamp(0.0, 100.0) as u8)
}

/// Resolves the title and level of the role the user would start in.
pub fn resolve_current_role_title_level(
    top_match: &TopMatch,
    path: Option<&Path>,
) -> RoleTitleLevel {
    if let Some(role) = &top_match.current_role {
        if let Some(title) = &role.title {
            return RoleTitleLevel {
                title: title.clone(),
                level: role
                    .level
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_ROLE_LEVEL.to_string()),
            };
        }
    }

    let Some(path_role) = path.and_then(|p| p.current_role.as_ref()) else {
        return RoleTitleLevel::unknown();
    };

    match path_role.role_title.as_ref().or(path_role.title.as_ref()) {
        Some(title) => RoleTitleLevel {
            title: title.clone(),
            level: path_role
                .level
                .clone()
                .unwrap_or_else(|| UNKNOWN_ROLE_LEVEL.to_string()),
        },
        None => RoleTitleLevel::unknown(),
    }
}
