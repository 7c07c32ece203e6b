use crate::identifier::VehicleIdentifier;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// Where a returned report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    /// Served from the store, no generation call.
    Cache,
    /// Generated by this call and written to the store.
    Live,
}

impl ReportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportSource::Cache => "cache",
            ReportSource::Live => "live",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedReport {
    pub key: String,
    pub report: String,
    pub source: ReportSource,
}

/// How the user described the vehicle.
#[derive(Debug, Clone)]
pub enum AnalysisInput {
    Query(String),
    Image(Vec<u8>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub identifier: VehicleIdentifier,
    pub key: String,
    pub report: String,
    pub source: ReportSource,
}
