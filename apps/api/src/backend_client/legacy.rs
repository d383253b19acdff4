//! Normalizes the `GET /recommendations/personalized` payload.
//!
//! Older deployments answer with a flat `recommendations` list carrying a
//! `matchPercentage`; newer ones already answer in the quiz response shape.
//! Both end up as `BackendRecommendationsResponse`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::recommendations::{
    lenient_f64, lenient_string, lenient_timestamp, validated_profile, BackendRecommendationsResponse,
    MatchRole, NextRole, Path, Profile, TopMatch,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecommendations {
    #[serde(default)]
    recommendations: Vec<LegacyRecommendation>,
    #[serde(default, deserialize_with = "validated_profile")]
    profile: Option<Profile>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecommendation {
    #[serde(alias = "careerPathId", alias = "_id")]
    path_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    match_percentage: Option<f64>,
    #[serde(default)]
    current_role: Option<MatchRole>,
    #[serde(default)]
    next_role: Option<NextRole>,
    #[serde(default, deserialize_with = "lenient_f64")]
    average_salary: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    job_growth: Option<String>,
}

pub fn normalize_personalized(
    value: Value,
) -> Result<BackendRecommendationsResponse, serde_json::Error> {
    if value.get("topMatches").is_some() {
        return serde_json::from_value(value);
    }

    let legacy: LegacyRecommendations = serde_json::from_value(value)?;

    let mut top_matches = Vec::with_capacity(legacy.recommendations.len());
    let mut paths = Vec::with_capacity(legacy.recommendations.len());

    for rec in legacy.recommendations {
        let mut current_role = rec.current_role.unwrap_or_default();
        if current_role.score.is_none() {
            current_role.score = rec.match_percentage;
        }

        paths.push(Path {
            id: rec.path_id.clone(),
            description: rec.description.clone(),
            current_role: None,
            next_role: rec.next_role.clone(),
        });
        top_matches.push(TopMatch {
            path_id: rec.path_id,
            name: rec.name,
            description: rec.description,
            current_role: Some(current_role),
            next_role: rec.next_role,
            average_salary: rec.average_salary,
            job_growth: rec.job_growth,
        });
    }

    Ok(BackendRecommendationsResponse {
        top_matches,
        profile: legacy.profile,
        paths,
        timestamp: legacy.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_modern_shape_passes_through() {
        let resp = normalize_personalized(json!({
            "topMatches": [{ "pathId": "p9", "name": "SRE", "currentRole": { "score": 64 } }],
            "paths": []
        }))
        .unwrap();
        assert_eq!(resp.top_matches[0].path_id, "p9");
        assert_eq!(
            resp.top_matches[0].current_role.as_ref().unwrap().score,
            Some(64.0)
        );
    }

    #[test]
    fn test_legacy_match_percentage_becomes_score() {
        let resp = normalize_personalized(json!({
            "recommendations": [{
                "careerPathId": "ux",
                "name": "UX Designer",
                "matchPercentage": 72.4,
                "currentRole": { "title": "Junior UX", "level": "Entry" },
                "nextRole": { "title": "UX Designer", "level": "Mid", "missingSkills": [] },
                "jobGrowth": 8
            }]
        }))
        .unwrap();
        let m = &resp.top_matches[0];
        assert_eq!(m.current_role.as_ref().unwrap().score, Some(72.4));
        assert_eq!(m.job_growth.as_deref(), Some("8"));
        assert_eq!(resp.paths[0].id, "ux");
        assert_eq!(
            resp.paths[0].next_role.as_ref().unwrap().missing_skills,
            Some(vec![])
        );
    }

    #[test]
    fn test_explicit_role_score_wins_over_match_percentage() {
        let resp = normalize_personalized(json!({
            "recommendations": [{
                "pathId": "a",
                "matchPercentage": 10,
                "currentRole": { "title": "T", "score": 90 }
            }]
        }))
        .unwrap();
        assert_eq!(
            resp.top_matches[0].current_role.as_ref().unwrap().score,
            Some(90.0)
        );
    }

    #[test]
    fn test_empty_payload_normalizes_to_no_matches() {
        let resp = normalize_personalized(json!({})).unwrap();
        assert!(resp.top_matches.is_empty());
        assert!(resp.profile.is_none());
    }
}
