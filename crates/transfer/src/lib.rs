//! Source enumeration, payload packing and progress tracking.
//!
//! A source tree is enumerated into [`SourceFile`]s, which the
//! [`Packer`] turns into transport-sized [`PayloadUnit`]s: batches of
//! whole small files, or byte-range chunks of one large file.

mod packer;
mod progress;
mod source;
mod types;
mod validation;

use std::path::PathBuf;

pub use packer::{Packer, pack};
pub use progress::{SpeedCalculator, TransferProgress};
pub use source::{SourceEnumerator, SourceTree, enumerate_source, scan_source};
pub use types::{BatchUnit, ByteRange, ChunkUnit, PayloadUnit, SourceFile};
pub use validation::{validate_relative_path, wire_path};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("source unavailable: {}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("size budget must be greater than zero")]
    InvalidBudget,
}
