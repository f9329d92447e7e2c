//! Wire types for the bucketpush upload session API.
//!
//! The API is a three-call protocol: initiate a session, post payload
//! units to it, then finish it with either `UPLOAD` or `CANCEL`.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    ApiErrorBody, FinalizeUploadResponse, InitiateUploadRequest, InitiateUploadResponse,
    UnitUploadResponse,
};
pub use types::{
    FinalizeAction, ParseProtocolError, StorageProtocol, UploadProgress, UploadStatus,
};
