use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Storage network the committed object is published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProtocol {
    Ipfs,
    Filecoin,
    Arweave,
}

impl StorageProtocol {
    /// Wire name, as used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProtocol::Ipfs => "ipfs",
            StorageProtocol::Filecoin => "filecoin",
            StorageProtocol::Arweave => "arweave",
        }
    }
}

impl fmt::Display for StorageProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown protocol name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown storage protocol: {0}")]
pub struct ParseProtocolError(pub String);

impl FromStr for StorageProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipfs" => Ok(StorageProtocol::Ipfs),
            "filecoin" => Ok(StorageProtocol::Filecoin),
            "arweave" => Ok(StorageProtocol::Arweave),
            _ => Err(ParseProtocolError(s.to_string())),
        }
    }
}

/// How a session is resolved when it is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalizeAction {
    /// Commit received bytes into a durable object.
    Upload,
    /// Discard received bytes and free the session.
    Cancel,
}

impl FinalizeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeAction::Upload => "UPLOAD",
            FinalizeAction::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for FinalizeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Progress information for an active upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub upload_id: String,
    pub status: UploadStatus,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_file: String,
    /// Smoothed throughput in bytes per second (0 until two samples exist).
    #[serde(default)]
    pub bytes_per_second: f64,
    /// Estimated seconds left, once a speed is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
}

impl UploadProgress {
    /// Returns the upload progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.transferred_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}
