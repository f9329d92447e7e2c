//! Upload error types.

use std::fmt;

use bucketpush_transfer::TransferError;

/// Errors produced by a single API call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed JSON")]
    Json(#[from] serde_json::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid payload unit: {0}")]
    InvalidUnit(String),

    #[error("unexpected server response: {0}")]
    InvalidResponse(String),

    #[error("server rejected the request: {0}")]
    Rejected(String),
}

/// Phase of an upload in which a terminal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Enumerate,
    Initiate,
    Transfer,
    Finalize,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadPhase::Enumerate => "enumerate",
            UploadPhase::Initiate => "initiate",
            UploadPhase::Transfer => "transfer",
            UploadPhase::Finalize => "finalize",
        })
    }
}

/// Terminal errors returned by [`Uploader::upload`](crate::Uploader::upload).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The source could not be read; no network call was made.
    #[error("source unavailable")]
    SourceUnavailable(#[source] TransferError),

    /// The server refused to open a session; nothing was transferred.
    #[error("initiate failed")]
    InitiateFailed(#[source] ApiError),

    /// A payload unit failed; the session was cancelled.
    #[error("transfer failed")]
    TransferFailed(#[source] ApiError),

    /// The caller cancelled the upload; the session was cancelled.
    #[error("upload cancelled")]
    Cancelled,

    /// The server could not commit (or cancel) the session.
    #[error("finalize failed")]
    FinalizeFailed(#[source] ApiError),

    /// Transfer failed and the follow-up cancel failed too.
    #[error("cancelling the failed session also failed: {finalize}")]
    TransferAndFinalizeFailed {
        #[source]
        transfer: Box<UploadError>,
        finalize: ApiError,
    },
}

impl UploadError {
    /// Phase in which the first failure happened.
    pub fn phase(&self) -> UploadPhase {
        match self {
            UploadError::SourceUnavailable(_) => UploadPhase::Enumerate,
            UploadError::InitiateFailed(_) => UploadPhase::Initiate,
            UploadError::TransferFailed(_) | UploadError::Cancelled => UploadPhase::Transfer,
            UploadError::FinalizeFailed(_) => UploadPhase::Finalize,
            UploadError::TransferAndFinalizeFailed { transfer, .. } => transfer.phase(),
        }
    }
}
