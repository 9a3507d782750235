//! # Transition Context
//!
//! Request attribution carried through an order transition for audit
//! enrichment and log correlation.
//!
//! `TransitionContext` holds the correlation id of the upstream request and,
//! when the caller knows them, the client's ip address and user agent. The
//! coordinator copies the ip address and user agent into the audit entry,
//! merges the whole context into the history entry's metadata, and tags its
//! log span and published event with the correlation id.
//!
//! ## Usage
//!
//! ```rust
//! use workorder_core::state_machine::TransitionContext;
//! use uuid::Uuid;
//!
//! let context = TransitionContext::with_correlation_id(Uuid::new_v4())
//!     .with_client("10.0.0.7", "field-app/2.3");
//!
//! assert!(context.has_attribution());
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attribution data attached to a single transition request.
///
/// # Examples
///
/// ```rust
/// use workorder_core::state_machine::TransitionContext;
///
/// let empty = TransitionContext::default();
/// assert!(!empty.has_attribution());
/// assert!(empty.correlation_id.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionContext {
    /// Correlation ID linking this transition to the originating request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Client address as seen by the request handler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Client user agent as seen by the request handler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl TransitionContext {
    /// Create a context carrying only a correlation id
    #[must_use]
    pub fn with_correlation_id(correlation_id: Uuid) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            ..Self::default()
        }
    }

    /// Attach client details
    #[must_use]
    pub fn with_client(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Check if this context has any attribution data
    #[must_use]
    pub fn has_attribution(&self) -> bool {
        self.correlation_id.is_some() || self.ip_address.is_some() || self.user_agent.is_some()
    }

    /// Correlation id for logs and events, generating one when the caller gave none
    #[must_use]
    pub fn correlation_id_or_new(&self) -> Uuid {
        self.correlation_id.unwrap_or_else(Uuid::new_v4)
    }

    /// Merge this context into a JSON metadata object.
    ///
    /// Only populated fields are added, and only when `metadata` is an object.
    /// A `null` metadata value is promoted to an object first.
    ///
    /// ```rust
    /// use workorder_core::state_machine::TransitionContext;
    /// use serde_json::json;
    /// use uuid::Uuid;
    ///
    /// let id = Uuid::new_v4();
    /// let context = TransitionContext::with_correlation_id(id);
    /// let enriched = context.merge_into_metadata(json!({"source": "web"}));
    ///
    /// assert_eq!(enriched["source"], "web");
    /// assert_eq!(enriched["correlation_id"], id.to_string());
    /// assert!(enriched.get("ip_address").is_none());
    /// ```
    #[must_use]
    pub fn merge_into_metadata(&self, metadata: serde_json::Value) -> serde_json::Value {
        let mut metadata = if metadata.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            metadata
        };

        if let serde_json::Value::Object(ref mut map) = metadata {
            if let Some(correlation_id) = self.correlation_id {
                map.insert(
                    "correlation_id".to_string(),
                    serde_json::Value::String(correlation_id.to_string()),
                );
            }
            if let Some(ip_address) = &self.ip_address {
                map.insert(
                    "ip_address".to_string(),
                    serde_json::Value::String(ip_address.clone()),
                );
            }
            if let Some(user_agent) = &self.user_agent {
                map.insert(
                    "user_agent".to_string(),
                    serde_json::Value::String(user_agent.clone()),
                );
            }
        }
        metadata
    }
}
