//! In-memory `StorageConnection` used by the unit tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bucketpush_protocol::messages::{
    FinalizeUploadResponse, InitiateUploadRequest, InitiateUploadResponse,
};
use bucketpush_protocol::types::FinalizeAction;
use bucketpush_transfer::{ByteRange, ChunkUnit, PayloadUnit, SourceFile};

use crate::connection::{ApiFuture, StorageConnection};
use crate::error::ApiError;

/// Records every call and fails on demand.
pub(crate) struct MockConnection {
    budget: u64,
    parallelism: usize,
    upload_token: Option<String>,
    fail_initiate: bool,
    fail_finalize: bool,
    reject_commit: bool,
    fail_units: HashSet<usize>,
    /// Times each in-flight unit yields before completing.
    yields: usize,

    pub initiate_calls: AtomicUsize,
    pub dispatched: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub late_dispatches: AtomicUsize,
    failure_returned: AtomicBool,
    pub units: Mutex<Vec<PayloadUnit>>,
    pub unit_tokens: Mutex<Vec<String>>,
    pub finalize_calls: Mutex<Vec<(String, FinalizeAction, String)>>,
}

impl MockConnection {
    pub fn new(budget: u64, parallelism: usize) -> Self {
        Self {
            budget,
            parallelism,
            upload_token: None,
            fail_initiate: false,
            fail_finalize: false,
            reject_commit: false,
            fail_units: HashSet::new(),
            yields: 3,
            initiate_calls: AtomicUsize::new(0),
            dispatched: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            late_dispatches: AtomicUsize::new(0),
            failure_returned: AtomicBool::new(false),
            units: Mutex::new(Vec::new()),
            unit_tokens: Mutex::new(Vec::new()),
            finalize_calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails the unit dispatched `index`-th (zero-based).
    pub fn fail_unit(mut self, index: usize) -> Self {
        self.fail_units.insert(index);
        self
    }

    pub fn fail_initiate(mut self) -> Self {
        self.fail_initiate = true;
        self
    }

    pub fn fail_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }

    /// Answers `UPLOAD` with `success: false`.
    pub fn reject_commit(mut self) -> Self {
        self.reject_commit = true;
        self
    }

    pub fn with_upload_token(mut self, token: &str) -> Self {
        self.upload_token = Some(token.into());
        self
    }

    pub fn finalize_actions(&self) -> Vec<FinalizeAction> {
        self.finalize_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, action, _)| *action)
            .collect()
    }
}

impl StorageConnection for MockConnection {
    fn initiate<'a>(
        &'a self,
        request: &'a InitiateUploadRequest,
        _token: &'a str,
    ) -> ApiFuture<'a, InitiateUploadResponse> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.fail_initiate {
                return Err(ApiError::Status {
                    status: 404,
                    message: format!("bucket {} not found", request.name),
                });
            }
            Ok(InitiateUploadResponse {
                upload_id: "session-1".into(),
                payload_size: self.budget,
                parallel_upload_count: self.parallelism,
                upload_token: self.upload_token.clone(),
            })
        })
    }

    fn upload_unit<'a>(
        &'a self,
        _session_id: &'a str,
        unit: PayloadUnit,
        token: &'a str,
    ) -> ApiFuture<'a, u64> {
        let index = self.dispatched.fetch_add(1, Ordering::SeqCst);
        if self.failure_returned.load(Ordering::SeqCst) {
            self.late_dispatches.fetch_add(1, Ordering::SeqCst);
        }
        self.unit_tokens.lock().unwrap().push(token.to_string());

        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            for _ in 0..self.yields {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let bytes = unit.byte_len();
            self.units.lock().unwrap().push(unit);
            if self.fail_units.contains(&index) {
                self.failure_returned.store(true, Ordering::SeqCst);
                return Err(ApiError::Status {
                    status: 500,
                    message: format!("unit {index} rejected"),
                });
            }
            Ok(bytes)
        })
    }

    fn finalize<'a>(
        &'a self,
        session_id: &'a str,
        action: FinalizeAction,
        token: &'a str,
    ) -> ApiFuture<'a, FinalizeUploadResponse> {
        self.finalize_calls
            .lock()
            .unwrap()
            .push((session_id.to_string(), action, token.to_string()));

        Box::pin(async move {
            if self.fail_finalize {
                return Err(ApiError::Status {
                    status: 503,
                    message: "finalize unavailable".into(),
                });
            }
            let committed = action == FinalizeAction::Upload && !self.reject_commit;
            Ok(FinalizeUploadResponse {
                success: committed,
                message: if committed {
                    "ok".into()
                } else {
                    "not committed".into()
                },
                upload_id: session_id.to_string(),
                bucket_id: "bucket-1".into(),
                protocol_link: "https://ipfs.example/bafy".into(),
                affected_domains: vec!["site.example".into()],
                cid: Some("bafy".into()),
            })
        })
    }
}

/// `count` chunk units of one virtual file, each `size` bytes.
pub(crate) fn chunk_units(count: usize, size: u64) -> Vec<PayloadUnit> {
    let file = SourceFile {
        relative_path: "big.bin".into(),
        size: size * count as u64,
        local_path: PathBuf::from("/virtual/big.bin"),
    };
    (0..count as u64)
        .map(|i| {
            PayloadUnit::Chunk(ChunkUnit {
                file: file.clone(),
                chunk_index: i,
                chunk_count: count as u64,
                range: ByteRange::new(i * size, (i + 1) * size),
            })
        })
        .collect()
}
