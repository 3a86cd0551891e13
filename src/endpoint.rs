//! Endpoint identity types.
//!
//! An endpoint is one (provider, model, model-type) tuple representing a
//! distinct external service target. Circuit breaker state, health records,
//! and alert ids are all keyed by this identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of model served by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Text completion / chat model
    Llm,
    /// Embedding model
    Embedding,
    /// Reranking model
    Reranking,
}

impl ModelType {
    /// Stable lower-case label used in endpoint keys and alert ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Llm => "llm",
            ModelType::Embedding => "embedding",
            ModelType::Reranking => "reranking",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique key for per-endpoint resilience and health state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointIdentity {
    /// Provider name, e.g. `"openai"` or `"cohere"`
    pub provider: String,
    /// Model name as exposed by the provider
    pub model_name: String,
    /// Kind of model served
    pub model_type: ModelType,
}

impl EndpointIdentity {
    /// Create an identity from its three parts.
    pub fn new(
        provider: impl Into<String>,
        model_name: impl Into<String>,
        model_type: ModelType,
    ) -> Self {
        Self {
            provider: provider.into(),
            model_name: model_name.into(),
            model_type,
        }
    }

    /// Stable `provider:type:name` key.
    ///
    /// This string keys circuit breakers and health records, and forms the
    /// deterministic part of endpoint-scoped alert ids.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.provider, self.model_type, self.model_name)
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.provider, self.model_type, self.model_name
        )
    }
}
