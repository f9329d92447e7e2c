//! High-level upload entry point.
//!
//! `Uploader::upload` runs the whole pipeline for one source tree:
//! 1. Enumerate the source (no network until this succeeds)
//! 2. Initiate a session
//! 3. Pack and transfer with bounded parallelism
//! 4. Finalize exactly once

use std::error::Error;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use bucketpush_protocol::messages::InitiateUploadRequest;
use bucketpush_protocol::types::UploadStatus;
use bucketpush_transfer::{TransferError, TransferProgress, scan_source};

use crate::config::ClientConfig;
use crate::connection::StorageConnection;
use crate::error::{ApiError, UploadError};
use crate::http::HttpConnection;
use crate::session::SessionDriver;
use crate::types::{UploadOptions, UploadResult};

/// Uploads file trees through a [`StorageConnection`].
pub struct Uploader<C> {
    conn: C,
    token: String,
    cancel: CancellationToken,
}

impl Uploader<HttpConnection> {
    /// Creates an uploader talking HTTP to `config.base_url`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self::new(HttpConnection::new(config)?, config.token.clone()))
    }
}

impl<C: StorageConnection> Uploader<C> {
    pub fn new(conn: C, token: impl Into<String>) -> Self {
        Self {
            conn,
            token: token.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a token that cancels uploads run by this uploader.
    ///
    /// Cancelling stops dispatch of further units; the open session is
    /// then finalized with `CANCEL` and the upload fails with
    /// [`UploadError::Cancelled`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Uploads the file or directory at `source`.
    pub async fn upload(
        &self,
        source: impl AsRef<Path>,
        options: UploadOptions,
    ) -> Result<UploadResult, UploadError> {
        // 1. Enumerate
        let root = source.as_ref().to_path_buf();
        let tree = tokio::task::spawn_blocking(move || scan_source(&root))
            .await
            .map_err(|e| UploadError::SourceUnavailable(TransferError::Io(std::io::Error::other(e))))?
            .map_err(|e| {
                error!(error = &e as &dyn Error, "source enumeration failed");
                UploadError::SourceUnavailable(e)
            })?;

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        // 2. Initiate
        let request = InitiateUploadRequest {
            protocol: options.protocol,
            name: options.name.clone(),
            organization_id: options.organization_id.clone(),
        };
        let initiated = SessionDriver::new(&self.conn)
            .initiate(&request, &self.token)
            .await
            .inspect_err(|e| {
                error!(bucket = %options.name, error = e as &dyn Error, "initiate failed")
            })?;

        let session_id = initiated.session().session_id.clone();
        if let Some(cb) = &options.on_upload_initiated {
            cb(&session_id);
        }

        // 3. Transfer
        let progress = TransferProgress::new(session_id.as_str(), tree.total_bytes);
        progress.set_status(UploadStatus::InProgress);
        let total = tree.total_bytes;
        info!(
            session = %session_id,
            files = tree.files.len(),
            bytes = total,
            "starting transfer"
        );

        let abort = self.cancel.child_token();
        let transferred = initiated
            .transfer(tree, &abort, |bytes, path| {
                let sent = progress.record(bytes, path);
                if let Some(cb) = &options.on_chunk_uploaded {
                    cb(sent, total);
                }
                let snapshot = progress.snapshot();
                debug!(
                    sent,
                    total,
                    bytes_per_second = snapshot.bytes_per_second,
                    eta_secs = ?snapshot.eta_secs,
                    path,
                    "unit uploaded"
                );
                if let Some(cb) = &options.on_progress {
                    cb(snapshot);
                }
            })
            .await;

        // 4. Finalize
        let result = transferred.finalize().await.into_result();
        progress.set_status(match &result {
            Ok(_) => UploadStatus::Completed,
            Err(UploadError::Cancelled) => UploadStatus::Cancelled,
            Err(_) => UploadStatus::Failed,
        });
        if let Some(cb) = &options.on_progress {
            cb(progress.snapshot());
        }

        match &result {
            Ok(r) => info!(session = %session_id, link = %r.protocol_link, "upload committed"),
            Err(e) => error!(
                session = %session_id,
                phase = %e.phase(),
                error = e as &dyn Error,
                "upload failed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnection;
    use bucketpush_protocol::types::{FinalizeAction, StorageProtocol, UploadProgress};
    use bucketpush_transfer::PayloadUnit;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    fn options() -> UploadOptions {
        UploadOptions::new(StorageProtocol::Ipfs, "site")
    }

    fn write_file(dir: &Path, name: &str, size: usize) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::write(path, data).unwrap();
    }

    #[tokio::test]
    async fn large_file_is_sent_as_three_chunks() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "big.bin", 12_000);

        let uploader = Uploader::new(MockConnection::new(5_000, 2), "tok");
        let progress = Arc::new(Mutex::new(Vec::new()));
        let seen = progress.clone();
        let opts = options().on_chunk_uploaded(move |sent, total| {
            seen.lock().unwrap().push((sent, total));
        });

        let result = uploader.upload(dir.path().join("big.bin"), opts).await.unwrap();
        assert_eq!(result.bucket_id, "bucket-1");

        let conn = uploader.connection();
        let mut ranges: Vec<_> = conn
            .units
            .lock()
            .unwrap()
            .iter()
            .map(|u| match u {
                PayloadUnit::Chunk(c) => (c.chunk_index, c.chunk_count, c.range.start, c.range.end),
                PayloadUnit::Batch(_) => panic!("unexpected batch"),
            })
            .collect();
        ranges.sort();
        assert_eq!(
            ranges,
            vec![(0, 3, 0, 5_000), (1, 3, 5_000, 10_000), (2, 3, 10_000, 12_000)]
        );
        assert_eq!(conn.finalize_actions(), vec![FinalizeAction::Upload]);

        let progress = progress.lock().unwrap();
        assert_eq!(progress.len(), 3);
        assert_eq!(progress.last(), Some(&(12_000, 12_000)));
    }

    #[tokio::test]
    async fn small_files_are_batched() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            write_file(dir.path(), name, 1_000);
        }

        let uploader = Uploader::new(MockConnection::new(2_500, 1), "tok");
        uploader.upload(dir.path(), options()).await.unwrap();

        let units = uploader.connection().units.lock().unwrap();
        let batches: Vec<Vec<&str>> = units
            .iter()
            .map(|u| match u {
                PayloadUnit::Batch(b) => b.entries.iter().map(|f| f.relative_path.as_str()).collect(),
                PayloadUnit::Chunk(_) => panic!("unexpected chunk"),
            })
            .collect();
        assert_eq!(batches, vec![vec!["a.txt", "b.txt"], vec!["c.txt"]]);
    }

    #[tokio::test]
    async fn nested_paths_use_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "css/site.css", 10);
        write_file(dir.path(), "index.html", 10);

        let uploader = Uploader::new(MockConnection::new(1_000, 1), "tok");
        uploader.upload(dir.path(), options()).await.unwrap();

        let units = uploader.connection().units.lock().unwrap();
        let PayloadUnit::Batch(batch) = &units[0] else {
            panic!("expected batch");
        };
        let paths: Vec<_> = batch.entries.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["css/site.css", "index.html"]);
    }

    #[tokio::test]
    async fn unit_failure_cancels_and_returns_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "big.bin", 10_000);

        let uploader = Uploader::new(MockConnection::new(1_000, 1).fail_unit(3), "tok");
        let err = uploader.upload(dir.path(), options()).await.unwrap_err();

        assert!(matches!(err, UploadError::TransferFailed(_)));
        let conn = uploader.connection();
        assert_eq!(conn.dispatched.load(Ordering::SeqCst), 4);
        assert_eq!(conn.finalize_actions(), vec![FinalizeAction::Cancel]);
    }

    #[tokio::test]
    async fn initiate_failure_skips_finalize() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", 10);

        let uploader = Uploader::new(MockConnection::new(100, 1).fail_initiate(), "tok");
        let err = uploader.upload(dir.path(), options()).await.unwrap_err();

        assert!(matches!(err, UploadError::InitiateFailed(ApiError::Status { status: 404, .. })));
        assert_eq!(uploader.connection().dispatched.load(Ordering::SeqCst), 0);
        assert!(uploader.connection().finalize_actions().is_empty());
    }

    #[tokio::test]
    async fn missing_source_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Uploader::new(MockConnection::new(100, 1), "tok");
        let err = uploader
            .upload(dir.path().join("nope"), options())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::SourceUnavailable(_)));
        assert_eq!(uploader.connection().initiate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn finalize_failure_after_success() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", 10);

        let uploader = Uploader::new(MockConnection::new(100, 1).fail_finalize(), "tok");
        let err = uploader.upload(dir.path(), options()).await.unwrap_err();
        assert!(matches!(err, UploadError::FinalizeFailed(ApiError::Status { status: 503, .. })));
        assert_eq!(uploader.connection().finalize_actions(), vec![FinalizeAction::Upload]);
    }

    #[tokio::test]
    async fn callbacks_report_session_and_status() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.bin", 300);
        write_file(dir.path(), "b.bin", 300);

        let initiated = Arc::new(Mutex::new(None));
        let snapshots: Arc<Mutex<Vec<UploadProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let (i, s) = (initiated.clone(), snapshots.clone());
        let opts = options()
            .organization("org-1")
            .on_upload_initiated(move |id| *i.lock().unwrap() = Some(id.to_string()))
            .on_progress(move |p| s.lock().unwrap().push(p));

        let uploader = Uploader::new(MockConnection::new(100, 2), "tok");
        uploader.upload(dir.path(), opts).await.unwrap();

        assert_eq!(initiated.lock().unwrap().as_deref(), Some("session-1"));
        let snapshots = snapshots.lock().unwrap();
        // One per unit plus the terminal snapshot.
        assert_eq!(snapshots.len(), 7);
        let last = snapshots.last().unwrap();
        assert_eq!(last.status, UploadStatus::Completed);
        assert_eq!(last.transferred_bytes, 600);
        assert_eq!(last.upload_id, "session-1");
    }

    #[tokio::test]
    async fn caller_cancel_before_upload_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", 10);

        let uploader = Uploader::new(MockConnection::new(100, 1), "tok");
        uploader.cancel_token().cancel();
        let err = uploader.upload(dir.path(), options()).await.unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(uploader.connection().initiate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn caller_cancel_mid_transfer_finalizes_with_cancel() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "big.bin", 1_000);

        let uploader = Uploader::new(MockConnection::new(100, 1), "tok");
        let cancel = uploader.cancel_token();
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let s = snapshots.clone();
        let opts = options().on_chunk_uploaded(move |sent, _| {
            if sent >= 300 {
                cancel.cancel();
            }
            s.lock().unwrap().push(sent);
        });

        let err = uploader.upload(dir.path(), opts).await.unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(err.phase(), crate::UploadPhase::Transfer);

        let conn = uploader.connection();
        assert_eq!(conn.dispatched.load(Ordering::SeqCst), 3);
        assert_eq!(conn.finalize_actions(), vec![FinalizeAction::Cancel]);
    }
}
