use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::models::recommendations::{BackendRecommendationsResponse, NextRole};
use crate::scoring::resolution::{
    resolve_current_role_title_level, resolve_match_score, RoleTitleLevel,
};
use crate::scoring::skill_gap::{analyze_skill_gaps, SkillGapView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    Resolved,
    /// Backend data was incomplete. Rendered as "data incomplete", never 0%.
    Unavailable,
}

/// One career match ready for the Results view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMatch {
    pub path_id: String,
    pub name: String,
    pub description: String,
    pub score: Option<u8>,
    pub score_status: ScoreStatus,
    pub current_role: RoleTitleLevel,
    pub next_role: Option<NextRoleSummary>,
    pub skill_gaps: SkillGapView,
    pub average_salary: Option<f64>,
    pub job_growth: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextRoleSummary {
    pub title: Option<String>,
    pub level: Option<String>,
}

impl From<&NextRole> for NextRoleSummary {
    fn from(role: &NextRole) -> Self {
        Self {
            title: role.title.clone(),
            level: role.level.clone(),
        }
    }
}

/// Resolves every top match against its path and orders them best-first.
///
/// Matches without a resolvable score sort after all scored matches; ties keep
/// backend order.
pub fn rank_matches(response: &BackendRecommendationsResponse) -> Vec<RankedMatch> {
    let mut ranked: Vec<RankedMatch> = response
        .top_matches
        .iter()
        .map(|m| {
            let path = response.path_by_id(&m.path_id);
            let score = resolve_match_score(m, path);
            let current_role = resolve_current_role_title_level(m, path);
            if current_role.is_unknown() {
                debug!("No role title for path '{}'", m.path_id);
            }
            // the path's next role stands in when the match carries none
            let next_role = m
                .next_role
                .as_ref()
                .or_else(|| path.and_then(|p| p.next_role.as_ref()));

            RankedMatch {
                path_id: m.path_id.clone(),
                name: m.name.clone(),
                description: if m.description.is_empty() {
                    path.map(|p| p.description.clone()).unwrap_or_default()
                } else {
                    m.description.clone()
                },
                score,
                score_status: if score.is_some() {
                    ScoreStatus::Resolved
                } else {
                    ScoreStatus::Unavailable
                },
                current_role,
                next_role: next_role.map(NextRoleSummary::from),
                skill_gaps: analyze_skill_gaps(
                    next_role.and_then(|n| n.missing_skills.as_deref()),
                ),
                average_salary: m.average_salary,
                job_growth: m.job_growth.clone(),
            }
        })
        .collect();

    ranked.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ranked
}
