//! Bounded-parallel transfer of payload units.
//!
//! At most `parallelism` units are in flight. The first failing unit
//! cancels the abort token: nothing new is dispatched afterwards, but
//! units already in flight run to completion and are still counted.

use std::error::Error;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use bucketpush_transfer::PayloadUnit;

use crate::connection::StorageConnection;
use crate::error::ApiError;
use crate::types::TransferReport;

/// Uploads `units` to `session_id`.
///
/// `on_unit(bytes, lead_path)` runs as each unit succeeds, in completion
/// order. Cancelling `abort` from outside stops dispatch the same way a
/// failure does; the report then has `cancelled` set. Per-unit errors are
/// aggregated into the report, never returned.
pub async fn transfer_units<C, I, F>(
    conn: &C,
    session_id: &str,
    token: &str,
    units: I,
    parallelism: usize,
    abort: &CancellationToken,
    mut on_unit: F,
) -> TransferReport
where
    C: StorageConnection + ?Sized,
    I: IntoIterator<Item = PayloadUnit>,
    F: FnMut(u64, &str),
{
    let parallelism = parallelism.max(1);
    let mut units = units.into_iter();
    let mut in_flight = FuturesUnordered::new();
    let mut report = TransferReport::default();
    let mut exhausted = false;

    loop {
        while !exhausted && in_flight.len() < parallelism {
            if abort.is_cancelled() {
                break;
            }
            let Some(unit) = units.next() else {
                exhausted = true;
                break;
            };
            trace!(
                session = %session_id,
                bytes = unit.byte_len(),
                path = unit.lead_path(),
                "dispatching unit"
            );
            in_flight.push(send_unit(conn, session_id, token, unit));
        }

        let Some((lead_path, result)) = in_flight.next().await else {
            break;
        };

        match result {
            Ok(bytes) => {
                report.bytes_sent += bytes;
                report.units_sent += 1;
                on_unit(bytes, lead_path.as_str());
            }
            Err(e) => {
                report.units_failed += 1;
                if report.first_error.is_none() {
                    warn!(session = %session_id, path = %lead_path, error = &e as &dyn Error, "unit upload failed, aborting transfer");
                    report.first_error = Some(e);
                } else {
                    debug!(session = %session_id, path = %lead_path, error = &e as &dyn Error, "additional unit failure");
                }
                abort.cancel();
            }
        }
    }

    if abort.is_cancelled() {
        report.units_skipped = units.count();
        report.cancelled = report.first_error.is_none();
    }

    debug!(
        session = %session_id,
        sent = report.units_sent,
        failed = report.units_failed,
        skipped = report.units_skipped,
        bytes = report.bytes_sent,
        "transfer phase finished"
    );
    report
}

async fn send_unit<C>(
    conn: &C,
    session_id: &str,
    token: &str,
    unit: PayloadUnit,
) -> (String, Result<u64, ApiError>)
where
    C: StorageConnection + ?Sized,
{
    let lead_path = unit.lead_path().to_string();
    let result = conn.upload_unit(session_id, unit, token).await;
    (lead_path, result)
}
