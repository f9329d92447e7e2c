//! Data types for the upload flow.

use std::fmt;

use serde::{Deserialize, Serialize};

use bucketpush_protocol::types::{StorageProtocol, UploadProgress};

use crate::error::ApiError;

/// Called once with the session id after `initiate` succeeds.
pub type InitiatedCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Called after each payload unit with `(bytes sent so far, total bytes)`.
pub type ChunkUploadedCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Called after each payload unit with a full progress snapshot.
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// Options for one upload.
pub struct UploadOptions {
    pub protocol: StorageProtocol,
    /// Bucket name.
    pub name: String,
    pub organization_id: Option<String>,
    pub on_upload_initiated: Option<InitiatedCallback>,
    pub on_chunk_uploaded: Option<ChunkUploadedCallback>,
    pub on_progress: Option<ProgressCallback>,
}

impl UploadOptions {
    pub fn new(protocol: StorageProtocol, name: impl Into<String>) -> Self {
        Self {
            protocol,
            name: name.into(),
            organization_id: None,
            on_upload_initiated: None,
            on_chunk_uploaded: None,
            on_progress: None,
        }
    }

    pub fn organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn on_upload_initiated(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_upload_initiated = Some(Box::new(f));
        self
    }

    pub fn on_chunk_uploaded(mut self, f: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.on_chunk_uploaded = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(UploadProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("protocol", &self.protocol)
            .field("name", &self.name)
            .field("organization_id", &self.organization_id)
            .field("on_upload_initiated", &self.on_upload_initiated.is_some())
            .field("on_chunk_uploaded", &self.on_chunk_uploaded.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// A committed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub upload_id: String,
    pub bucket_id: String,
    pub protocol_link: String,
    pub dynamic_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// Aggregate outcome of the transfer phase.
#[derive(Debug, Default)]
pub struct TransferReport {
    /// First unit error; later concurrent failures are only counted.
    pub first_error: Option<ApiError>,
    /// Dispatch stopped because the caller cancelled.
    pub cancelled: bool,
    /// Sum over successful units. A lower bound unless [`success`](Self::success).
    pub bytes_sent: u64,
    pub units_sent: usize,
    pub units_failed: usize,
    /// Units never dispatched because the transfer was aborted.
    pub units_skipped: usize,
}

impl TransferReport {
    /// `true` when every unit was sent.
    pub fn success(&self) -> bool {
        self.first_error.is_none() && !self.cancelled && self.units_failed == 0
    }
}
