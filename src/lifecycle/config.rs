//! # Configuration
//!
//! Plain `serde` structs with sensible defaults. Every field is optional when deserializing, so
//! a config file only needs to mention what it overrides.
//!
//! ```rust
//! use fetch_orchestrator::lifecycle::{LoadingPolicy, OrchestratorConfig};
//!
//! let config: OrchestratorConfig =
//!     serde_json::from_str(r#"{ "loading_policy": "until_settled" }"#).unwrap();
//! assert_eq!(config.loading_policy, LoadingPolicy::UntilSettled);
//! assert_eq!(config.buffer_size, 32);
//! ```

use serde::{Deserialize, Serialize};

pub const DEFAULT_BUFFER_SIZE: usize = 32;
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong while fetching the resource";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// When a slot's loading flag is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingPolicy {
    /// Loading clears only when data is written by a success. A slot whose attempts keep
    /// failing stays loading until a later success.
    #[default]
    UntilData,
    /// Loading clears on any committed outcome, success or failure.
    UntilSettled,
}

/// How `refetch_index` / `refetch_key` attempts are bookkept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetedRefetch {
    /// Independent of the generation: not cancelled by a bulk refetch nor by teardown.
    /// Whichever of a racing targeted and bulk attempt settles last wins.
    #[default]
    Untracked,
    /// The targeted attempt becomes the slot's current attempt. It supersedes the slot's bulk
    /// attempt, is superseded by the next bulk refetch, and is cancelled on teardown.
    Tracked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Capacity of the command channel between clients and the orchestrator task.
    pub buffer_size: usize,
    pub loading_policy: LoadingPolicy,
    pub targeted_refetch: TargetedRefetch,
    /// Message recorded when a transport fails without saying why.
    pub fallback_error_message: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            loading_policy: LoadingPolicy::default(),
            targeted_refetch: TargetedRefetch::default(),
            fallback_error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_loading_policy(mut self, policy: LoadingPolicy) -> Self {
        self.loading_policy = policy;
        self
    }

    pub fn with_targeted_refetch(mut self, mode: TargetedRefetch) -> Self {
        self.targeted_refetch = mode;
        self
    }

    pub fn with_fallback_error_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_error_message = message.into();
        self
    }
}

/// Settings for [`HttpTransport`](crate::transport::HttpTransport).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: None,
        }
    }
}
