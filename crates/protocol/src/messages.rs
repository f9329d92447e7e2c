use serde::{Deserialize, Serialize};

use crate::types::StorageProtocol;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens a new upload session. Sent as query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiateUploadRequest {
    pub protocol: StorageProtocol,
    /// Bucket name the committed object is filed under.
    pub name: String,
    #[serde(
        rename = "organization",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub organization_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Server answer to an initiate call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateUploadResponse {
    /// Session id for every later call.
    pub upload_id: String,
    /// Maximum byte size of a single payload unit.
    pub payload_size: u64,
    /// How many units may be in flight at once.
    pub parallel_upload_count: usize,
    /// Short-lived token scoped to this session (browser flows).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_token: Option<String>,
}

/// Server answer to a payload unit post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitUploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<u64>,
}

/// Server answer to a finish call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeUploadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub upload_id: String,
    #[serde(default)]
    pub bucket_id: String,
    #[serde(default)]
    pub protocol_link: String,
    #[serde(default)]
    pub affected_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(alias = "error")]
    pub message: String,
}
