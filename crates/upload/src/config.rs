//! Client configuration.

use serde::{Deserialize, Serialize};

use bucketpush_protocol::constants::DEFAULT_BASE_URL;

/// Settings for talking to the upload API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Access token sent as a bearer credential.
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout. Unset by default because one payload unit
    /// can take arbitrarily long on a slow link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("bucketpush/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Base URL with any trailing `/` removed.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
