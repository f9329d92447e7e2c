//! Session protocol driver.
//!
//! An upload session moves through `initiate -> transfer -> finalize`.
//! Each state consumes the previous one, so a session cannot be finalized
//! twice or finalized without having run its transfer phase.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bucketpush_protocol::messages::{FinalizeUploadResponse, InitiateUploadRequest};
use bucketpush_protocol::types::FinalizeAction;
use bucketpush_transfer::{SourceTree, pack};

use crate::connection::StorageConnection;
use crate::error::{ApiError, UploadError};
use crate::scheduler::transfer_units;
use crate::types::{TransferReport, UploadResult};

/// Server-assigned parameters of one upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub session_id: String,
    /// Token for every call of this session; the server's single-use
    /// token when it issued one.
    pub token: String,
    pub size_budget: u64,
    pub parallelism: usize,
    pub total_bytes: u64,
}

/// Entry point of the session state machine.
pub struct SessionDriver<'c, C: ?Sized> {
    conn: &'c C,
}

impl<'c, C: StorageConnection + ?Sized> SessionDriver<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// Opens a session. Failure is terminal and nothing needs finalizing.
    pub async fn initiate(
        self,
        request: &InitiateUploadRequest,
        token: &str,
    ) -> Result<Initiated<'c, C>, UploadError> {
        let resp = self
            .conn
            .initiate(request, token)
            .await
            .map_err(UploadError::InitiateFailed)?;

        if resp.payload_size == 0 {
            return Err(UploadError::InitiateFailed(ApiError::InvalidResponse(
                "payload size of 0".into(),
            )));
        }
        if resp.upload_id.is_empty() {
            return Err(UploadError::InitiateFailed(ApiError::InvalidResponse(
                "empty upload id".into(),
            )));
        }

        let token = match resp.upload_token {
            Some(single_use) if !single_use.is_empty() => single_use,
            _ => token.to_string(),
        };
        let session = UploadSession {
            session_id: resp.upload_id,
            token,
            size_budget: resp.payload_size,
            parallelism: resp.parallel_upload_count.max(1),
            total_bytes: 0,
        };
        info!(
            session = %session.session_id,
            budget = session.size_budget,
            parallelism = session.parallelism,
            "upload session initiated"
        );

        Ok(Initiated {
            conn: self.conn,
            session,
        })
    }
}

/// A session that has been opened and not yet transferred.
pub struct Initiated<'c, C: ?Sized> {
    conn: &'c C,
    session: UploadSession,
}

impl<'c, C: StorageConnection + ?Sized> Initiated<'c, C> {
    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Packs `tree` to the session budget and uploads every unit.
    ///
    /// Never fails: unit errors and cancellation end up in the report.
    pub async fn transfer<F>(
        mut self,
        tree: SourceTree,
        abort: &CancellationToken,
        on_unit: F,
    ) -> Transferred<'c, C>
    where
        F: FnMut(u64, &str),
    {
        self.session.total_bytes = tree.total_bytes;

        let report = match pack(tree.files, self.session.size_budget) {
            Ok(units) => {
                transfer_units(
                    self.conn,
                    &self.session.session_id,
                    &self.session.token,
                    units,
                    self.session.parallelism,
                    abort,
                    on_unit,
                )
                .await
            }
            Err(e) => TransferReport {
                first_error: Some(ApiError::InvalidUnit(e.to_string())),
                units_failed: 1,
                ..TransferReport::default()
            },
        };

        Transferred {
            conn: self.conn,
            session: self.session,
            report,
        }
    }
}

/// A session whose transfer phase has finished, successfully or not.
pub struct Transferred<'c, C: ?Sized> {
    conn: &'c C,
    session: UploadSession,
    report: TransferReport,
}

impl<'c, C: StorageConnection + ?Sized> Transferred<'c, C> {
    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    pub fn report(&self) -> &TransferReport {
        &self.report
    }

    /// Commits the session if every unit was sent, cancels it otherwise.
    pub async fn finalize(self) -> Finalized {
        let action = if self.report.success() {
            FinalizeAction::Upload
        } else {
            FinalizeAction::Cancel
        };
        if action == FinalizeAction::Cancel {
            warn!(session = %self.session.session_id, "transfer incomplete, cancelling session");
        }

        let outcome = self
            .conn
            .finalize(&self.session.session_id, action, &self.session.token)
            .await;
        debug!(session = %self.session.session_id, action = %action, ok = outcome.is_ok(), "session finalized");

        Finalized {
            session: self.session,
            report: self.report,
            action,
            outcome,
        }
    }
}

/// Terminal state: the single finalize call has been made.
#[derive(Debug)]
pub struct Finalized {
    session: UploadSession,
    report: TransferReport,
    action: FinalizeAction,
    outcome: Result<FinalizeUploadResponse, ApiError>,
}

impl Finalized {
    pub fn action(&self) -> FinalizeAction {
        self.action
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Resolves the upload outcome.
    ///
    /// A failed transfer always reports its own error; when the cancel
    /// call failed too, both are returned.
    pub fn into_result(self) -> Result<UploadResult, UploadError> {
        if !self.report.success() {
            let transfer = match self.report.first_error {
                Some(e) => UploadError::TransferFailed(e),
                None => UploadError::Cancelled,
            };
            return match self.outcome {
                Ok(_) => Err(transfer),
                Err(finalize) => Err(UploadError::TransferAndFinalizeFailed {
                    transfer: Box::new(transfer),
                    finalize,
                }),
            };
        }

        let resp = self.outcome.map_err(UploadError::FinalizeFailed)?;
        if !resp.success {
            let message = if resp.message.is_empty() {
                "upload was not committed".to_string()
            } else {
                resp.message
            };
            return Err(UploadError::FinalizeFailed(ApiError::Rejected(message)));
        }

        Ok(UploadResult {
            upload_id: if resp.upload_id.is_empty() {
                self.session.session_id
            } else {
                resp.upload_id
            },
            bucket_id: resp.bucket_id,
            protocol_link: resp.protocol_link,
            dynamic_links: resp.affected_domains,
            cid: resp.cid,
        })
    }
}
