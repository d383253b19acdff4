//! Skill Gap Analyzer: current levels versus what the recommended next role needs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::recommendations::MissingSkill;
use crate::models::session::SkillSelection;

/// Most gap entries shown for one recommendation.
pub const MAX_GAP_ENTRIES: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapEntry {
    pub skill: String,
    pub have: u8,
    pub need: u8,
    pub shortfall: u8,
}

impl From<&MissingSkill> for GapEntry {
    fn from(m: &MissingSkill) -> Self {
        Self {
            skill: m.skill.clone(),
            have: m.have,
            need: m.need,
            shortfall: m.need.saturating_sub(m.have),
        }
    }
}

/// The three renderable states of the gap section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SkillGapView {
    /// No next-role data at all: the section is not shown.
    NoNextRole,
    /// A next role exists and the user already meets every requirement.
    NoGaps,
    Gaps {
        entries: Vec<GapEntry>,
        /// entries beyond the display limit
        hidden: usize,
    },
}

pub fn analyze_skill_gaps(missing_skills: Option<&[MissingSkill]>) -> SkillGapView {
    match missing_skills {
        None => SkillGapView::NoNextRole,
        Some([]) => SkillGapView::NoGaps,
        Some(list) => SkillGapView::Gaps {
            entries: list.iter().take(MAX_GAP_ENTRIES).map(GapEntry::from).collect(),
            hidden: list.len().saturating_sub(MAX_GAP_ENTRIES),
        },
    }
}

/// Builds the missing-skill list from the user's own ratings.
///
/// Unselected skills count as level 0. Only skills below the required level are
/// returned, largest shortfall first.
pub fn compare_with_session(
    current: &BTreeMap<String, SkillSelection>,
    required: &BTreeMap<String, u8>,
) -> Vec<MissingSkill> {
    let mut gaps: Vec<MissingSkill> = required
        .iter()
        .filter_map(|(skill, &need)| {
            let have = current
                .get(skill)
                .filter(|s| s.selected)
                .map(|s| s.level)
                .unwrap_or(0);
            (have < need).then(|| MissingSkill {
                skill: skill.clone(),
                have,
                need,
            })
        })
        .collect();
    gaps.sort_by_key(|g| std::cmp::Reverse(g.need - g.have));
    gaps
}

/// Fills in current levels from the session when the backend sent none.
///
/// A list where every `have` is 0 is treated as "levels omitted": each entry
/// takes the user's selected level for that skill. Backend order and length
/// are kept. Lists carrying any backend level are returned untouched.
pub fn with_session_levels(
    missing: &[MissingSkill],
    current: &BTreeMap<String, SkillSelection>,
) -> Vec<MissingSkill> {
    if missing.iter().any(|m| m.have > 0) {
        return missing.to_vec();
    }
    missing
        .iter()
        .map(|m| MissingSkill {
            have: current
                .get(&m.skill)
                .filter(|s| s.selected)
                .map(|s| s.level)
                .unwrap_or(0),
            ..m.clone()
        })
        .collect()
}
