//! Model catalog types.
//!
//! A model record maps a stable record id (what canvases and requests refer
//! to) onto a provider id and the vendor's own model name. API key records
//! describe a stored credential; the key value itself is never part of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::llm::ModelParams;

/// Whether a catalog entry may be used.
///
/// Shared by model records and API key records, both of which use
/// `CHECK (status IN ('active', 'inactive'))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for CatalogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogStatus::Active => write!(f, "active"),
            CatalogStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for CatalogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(CatalogStatus::Active),
            "inactive" => Ok(CatalogStatus::Inactive),
            other => Err(format!("invalid catalog status: '{other}'")),
        }
    }
}

/// A model the service can route turns to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Stable record id, e.g. `"default"` or `"gpt4-fast"`.
    pub id: String,
    /// Registry id of the provider factory, e.g. `"openai"`.
    pub provider_id: String,
    /// Vendor-side model name, e.g. `"gpt-4"`.
    pub vendor_model: String,
    pub name: String,
    /// Defaults applied beneath per-request params.
    pub params: ModelParams,
    pub status: CatalogStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata of a stored provider API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: uuid::Uuid,
    pub provider_id: String,
    pub name: String,
    pub status: CatalogStatus,
    pub created_at: DateTime<Utc>,
}
