//! Transport seam between the session driver and the upload API.
//!
//! [`HttpConnection`](crate::HttpConnection) implements this trait over
//! `reqwest`; tests implement it with in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use bucketpush_protocol::messages::{
    FinalizeUploadResponse, InitiateUploadRequest, InitiateUploadResponse,
};
use bucketpush_protocol::types::FinalizeAction;
use bucketpush_transfer::PayloadUnit;

use crate::error::ApiError;

/// Boxed future returned by [`StorageConnection`] calls.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Abstract connection to the upload API.
pub trait StorageConnection: Send + Sync {
    /// Opens an upload session.
    fn initiate<'a>(
        &'a self,
        request: &'a InitiateUploadRequest,
        token: &'a str,
    ) -> ApiFuture<'a, InitiateUploadResponse>;

    /// Sends one payload unit and returns the number of bytes the server accepted.
    fn upload_unit<'a>(
        &'a self,
        session_id: &'a str,
        unit: PayloadUnit,
        token: &'a str,
    ) -> ApiFuture<'a, u64>;

    /// Commits (`Upload`) or discards (`Cancel`) the session.
    fn finalize<'a>(
        &'a self,
        session_id: &'a str,
        action: FinalizeAction,
        token: &'a str,
    ) -> ApiFuture<'a, FinalizeUploadResponse>;
}
