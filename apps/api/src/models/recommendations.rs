//! Payload shapes returned by the recommendations backend.
//!
//! The backend is loosely typed: score fields sometimes arrive as strings or
//! nulls, levels as numbers or strings. Numeric fields deserialize leniently
//! (anything that is not a JSON number becomes `None`) so the scoring resolver
//! only ever sees real numbers. The personality profile is checked against
//! an explicit schema here and dropped when it does not conform.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRecommendationsResponse {
    #[serde(default)]
    pub top_matches: Vec<TopMatch>,
    #[serde(
        default,
        deserialize_with = "validated_profile",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub paths: Vec<Path>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl BackendRecommendationsResponse {
    pub fn path_by_id(&self, id: &str) -> Option<&Path> {
        self.paths.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopMatch {
    #[serde(alias = "careerPathId")]
    pub path_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default)]
    pub current_role: Option<MatchRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_role: Option<NextRole>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub average_salary: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub job_growth: Option<String>,
}

/// `topMatches[].currentRole`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRole {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextRole {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub level: Option<String>,
    /// `None` and `Some(vec![])` mean different things to the gap view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_skills: Option<Vec<MissingSkill>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingSkill {
    pub skill: String,
    #[serde(default, deserialize_with = "lenient_level")]
    pub have: u8,
    #[serde(default, deserialize_with = "lenient_level")]
    pub need: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_role: Option<PathRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_role: Option<NextRole>,
}

/// `paths[].currentRole`. Older backends send `roleTitle`, newer ones `title`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRole {
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub weighted_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub skill_fit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub personality_fit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub learning_fit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub role_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Profile schema
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("{field} = {value} is outside [0, 1]")]
    OutOfRange { field: String, value: f64 },

    #[error("work value '{0}' is not a finite number")]
    NonFiniteWorkValue(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "BigFive", alias = "bigFive")]
    pub big_five: BigFive,
    #[serde(rename = "RIASEC", alias = "riasec")]
    pub riasec: Riasec,
    #[serde(rename = "WorkValues", alias = "workValues", default)]
    pub work_values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BigFive {
    #[serde(alias = "Openness")]
    pub openness: f64,
    #[serde(alias = "Conscientiousness")]
    pub conscientiousness: f64,
    #[serde(alias = "Extraversion")]
    pub extraversion: f64,
    #[serde(alias = "Agreeableness")]
    pub agreeableness: f64,
    #[serde(alias = "Neuroticism")]
    pub neuroticism: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Riasec {
    #[serde(alias = "Realistic", alias = "R")]
    pub realistic: f64,
    #[serde(alias = "Investigative", alias = "I")]
    pub investigative: f64,
    #[serde(alias = "Artistic", alias = "A")]
    pub artistic: f64,
    #[serde(alias = "Social", alias = "S")]
    pub social: f64,
    #[serde(alias = "Enterprising", alias = "E")]
    pub enterprising: f64,
    #[serde(alias = "Conventional", alias = "C")]
    pub conventional: f64,
}

impl Profile {
    pub fn validate(&self) -> Result<(), SchemaError> {
        let b = &self.big_five;
        let r = &self.riasec;
        let unit_fields = [
            ("BigFive.openness", b.openness),
            ("BigFive.conscientiousness", b.conscientiousness),
            ("BigFive.extraversion", b.extraversion),
            ("BigFive.agreeableness", b.agreeableness),
            ("BigFive.neuroticism", b.neuroticism),
            ("RIASEC.realistic", r.realistic),
            ("RIASEC.investigative", r.investigative),
            ("RIASEC.artistic", r.artistic),
            ("RIASEC.social", r.social),
            ("RIASEC.enterprising", r.enterprising),
            ("RIASEC.conventional", r.conventional),
        ];
        for (field, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(SchemaError::OutOfRange {
                    field: field.to_string(),
                    value,
                });
            }
        }
        if let Some((name, _)) = self.work_values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SchemaError::NonFiniteWorkValue(name.clone()));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient field deserializers
// ────────────────────────────────────────────────────────────────────────────

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()))
}

/// Accepts strings and numbers (levels arrive as both); everything else is `None`.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Display text: nulls and non-strings read as empty.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// Skill levels: numbers are rounded and clamped to `u8`, numeric strings are
/// parsed, anything else is 0.
pub(crate) fn lenient_level<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let level = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(level
        .filter(|l| l.is_finite())
        .map(|l| l.round().clamp(0.0, f64::from(u8::MAX)) as u8)
        .unwrap_or(0))
}

/// RFC 3339 strings or epoch milliseconds.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    })
}

pub(crate) fn validated_profile<'de, D>(deserializer: D) -> Result<Option<Profile>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    match serde_json::from_value::<Profile>(value) {
        Ok(profile) => match profile.validate() {
            Ok(()) => Ok(Some(profile)),
            Err(e) => {
                warn!("Dropping backend profile that failed schema validation: {e}");
                Ok(None)
            }
        },
        Err(e) => {
            warn!("Dropping malformed backend profile: {e}");
            Ok(None)
        }
    }
}
