use serde::{Deserialize, Serialize};

/// A signed-in user. Its presence is what "authenticated" means throughout
/// the assessment flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    /// Bearer token forwarded to the recommendations backend.
    #[serde(skip_serializing)]
    pub token: String,
}
