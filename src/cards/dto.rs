use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::repo_types::{Card, UsageEntry};

/// Body of `POST /cards/generate`. Fields stay loosely typed so a wrong type is reported as a
/// 400 with a specific message instead of a body rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCardRequest {
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default)]
    pub secret_item: Option<Value>,
    #[serde(default)]
    pub difficulty: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCardResponse {
    pub success: bool,
    pub card: Card,
    pub message: String,
    pub from_database: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<UsageEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UnusedQuery {
    pub category: String,
    pub difficulty: String,
}

#[derive(Debug, Serialize)]
pub struct UnusedResponse {
    pub success: bool,
    pub card: Option<Card>,
    pub remaining: usize,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub card_id: Uuid,
    pub users: i64,
}

#[derive(Debug, Serialize)]
pub struct UsedResponse {
    pub card_id: Uuid,
    pub used: bool,
}
