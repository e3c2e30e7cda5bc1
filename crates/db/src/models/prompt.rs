//! Prompt template models.

use serde::Serialize;
use sqlx::FromRow;
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `system_prompts` table, addressed by `function_key`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SystemPrompt {
    pub id: DbId,
    pub function_key: String,
    pub content: String,
    pub updated_at: Timestamp,
}

/// A row from the `feature_prompts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FeaturePromptRow {
    pub id: DbId,
    pub name: String,
    pub prompt: String,
    pub reference_links: Option<serde_json::Value>,
    pub updated_at: Timestamp,
}

/// A style prompt plus the reference links attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturePrompt {
    pub prompt: String,
    pub reference_links: Vec<String>,
}

impl From<FeaturePromptRow> for FeaturePrompt {
    fn from(row: FeaturePromptRow) -> Self {
        let reference_links = match row.reference_links {
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        FeaturePrompt {
            prompt: row.prompt,
            reference_links,
        }
    }
}
