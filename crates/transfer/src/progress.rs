use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bucketpush_protocol::types::{UploadProgress, UploadStatus};

/// Byte counters for one upload, safe to update from concurrent unit completions.
pub struct TransferProgress {
    upload_id: String,
    total_bytes: u64,
    transferred_bytes: AtomicU64,
    state: Mutex<ProgressState>,
    speed: SpeedCalculator,
}

struct ProgressState {
    status: UploadStatus,
    current_file: String,
}

impl TransferProgress {
    /// Creates a pending tracker for `total_bytes`.
    pub fn new(upload_id: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            upload_id: upload_id.into(),
            total_bytes,
            transferred_bytes: AtomicU64::new(0),
            state: Mutex::new(ProgressState {
                status: UploadStatus::Pending,
                current_file: String::new(),
            }),
            speed: SpeedCalculator::new(None, None),
        }
    }

    /// Adds completed bytes and returns the new running total.
    pub fn record(&self, bytes: u64, file: &str) -> u64 {
        let total = self.transferred_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.speed.add_sample(bytes);
        if let Ok(mut state) = self.state.lock() {
            state.current_file.clear();
            state.current_file.push_str(file);
        }
        total
    }

    pub fn set_status(&self, status: UploadStatus) {
        if let Ok(mut state) = self.state.lock() {
            state.status = status;
        }
    }

    /// Bytes confirmed so far. Only authoritative once the upload completed.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Acquire)
    }

    /// Estimated time to send the remaining bytes.
    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.total_bytes.saturating_sub(self.transferred_bytes());
        self.speed.eta(remaining)
    }

    /// Returns current progress as a protocol-compatible struct.
    pub fn snapshot(&self) -> UploadProgress {
        let (status, current_file) = match self.state.lock() {
            Ok(s) => (s.status, s.current_file.clone()),
            Err(_) => (UploadStatus::Failed, String::new()),
        };
        UploadProgress {
            upload_id: self.upload_id.clone(),
            status,
            total_bytes: self.total_bytes,
            transferred_bytes: self.transferred_bytes(),
            current_file,
            bytes_per_second: self.speed.bytes_per_second(),
            eta_secs: self.eta().map(|eta| eta.as_secs()),
        }
    }
}

/// Throughput over a sliding time window.
///
/// The oldest retained sample only marks the start of the window, so a
/// single sample reports no speed.
pub struct SpeedCalculator {
    window: Duration,
    capacity: usize,
    samples: Mutex<VecDeque<(Instant, u64)>>,
}

impl SpeedCalculator {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(window: Option<Duration>, capacity: Option<usize>) -> Self {
        let capacity = capacity.unwrap_or(Self::DEFAULT_CAPACITY).max(2);
        Self {
            window: window.unwrap_or(Self::DEFAULT_WINDOW),
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn add_sample(&self, bytes: u64) {
        self.add_sample_at(bytes, Instant::now());
    }

    fn add_sample_at(&self, bytes: u64, at: Instant) {
        let Ok(mut samples) = self.samples.lock() else {
            return;
        };
        samples.push_back((at, bytes));

        let cutoff = at.checked_sub(self.window);
        while let Some(&(oldest, _)) = samples.front() {
            let expired = cutoff.is_some_and(|c| oldest < c);
            if !expired && samples.len() <= self.capacity {
                break;
            }
            samples.pop_front();
        }
    }

    pub fn bytes_per_second(&self) -> f64 {
        let Ok(samples) = self.samples.lock() else {
            return 0.0;
        };
        let (Some(&(first, _)), Some(&(last, _))) = (samples.front(), samples.back()) else {
            return 0.0;
        };
        let span = last.saturating_duration_since(first);
        if span.is_zero() {
            return 0.0;
        }
        let bytes: u64 = samples.iter().skip(1).map(|&(_, b)| b).sum();
        bytes as f64 / span.as_secs_f64()
    }

    /// Time to send `remaining_bytes` at the current speed.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        (speed > 0.0).then(|| Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }
}
