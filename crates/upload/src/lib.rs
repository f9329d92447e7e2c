//! Upload session engine: initiate, bounded-parallel transfer, finalize.
//!
//! The crate drives one upload of a file tree to the storage API. It is
//! transport-agnostic: [`StorageConnection`] is the seam, with
//! [`HttpConnection`] as the `reqwest` implementation.
//!
//! # Pipeline
//!
//! 1. **Enumerate** the source tree (stat only, before any network call)
//! 2. **Initiate** a session and receive the size budget and parallelism
//! 3. **Transfer** packed units, at most `parallelism` in flight, fail-fast
//! 4. **Finalize** exactly once: `UPLOAD` on success, `CANCEL` otherwise

pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod scheduler;
pub mod session;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod mock;

pub use config::ClientConfig;
pub use connection::{ApiFuture, StorageConnection};
pub use error::{ApiError, UploadError, UploadPhase};
pub use http::HttpConnection;
pub use scheduler::transfer_units;
pub use session::{Finalized, Initiated, SessionDriver, Transferred, UploadSession};
pub use types::{
    ChunkUploadedCallback, InitiatedCallback, ProgressCallback, TransferReport, UploadOptions,
    UploadResult,
};
pub use uploader::Uploader;
