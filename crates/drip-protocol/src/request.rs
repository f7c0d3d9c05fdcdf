//! The query handed to the worker process on its stdin.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which provider endpoint the worker talks to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub endpoint: String,
    /// Extra request headers, passed through verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for ProviderInfo {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            headers: BTreeMap::new(),
        }
    }
}

/// A single streaming query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub prompt: String,
    pub provider: ProviderInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl QueryRequest {
    pub fn new(prompt: impl Into<String>, provider: ProviderInfo) -> Self {
        Self {
            prompt: prompt.into(),
            provider,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Stable header shown above the streamed answer, e.g. `openai · gpt-4o-mini`.
    pub fn header(&self) -> String {
        format!("{} · {}", self.provider.name, self.provider.model)
    }
}
