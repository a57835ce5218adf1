//! Per-session cancellation and cumulative statistics.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::thermal::Temperature;

/// Why a buffering session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// [`stop_buffering()`](crate::PanicRecorder::stop_buffering) was called.
    UserRequested,
    /// The maximum recording duration elapsed.
    TimeLimit,
    /// The device reported a temperature above the safety threshold.
    Thermal {
        /// The reading that tripped the guard.
        temperature: Temperature,
    },
    /// The capture thread could not keep the device running.
    DeviceFailed {
        /// What went wrong.
        reason: String,
    },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRequested => write!(f, "stopped by user"),
            Self::TimeLimit => write!(f, "time limit reached"),
            Self::Thermal { temperature } => write!(f, "device too hot ({temperature})"),
            Self::DeviceFailed { reason } => write!(f, "device failed: {reason}"),
        }
    }
}

/// Cancellation token owned by a single capture session.
///
/// Each session gets its own token, so a timer left over from an earlier
/// session can never stop a later one. The first `cancel` wins and its
/// reason is kept.
#[derive(Clone)]
pub(crate) struct SessionToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<StopReason>>,
    wake: Condvar,
}

impl SessionToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                wake: Condvar::new(),
            }),
        }
    }

    /// Returns `true` while the session should keep recording.
    pub fn is_active(&self) -> bool {
        !self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels the session. Returns `false` if it was already cancelled.
    pub fn cancel(&self, reason: StopReason) -> bool {
        let mut slot = self.inner.reason.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.wake.notify_all();
        true
    }

    /// The reason the session was cancelled, if it has been.
    pub fn reason(&self) -> Option<StopReason> {
        self.inner.reason.lock().clone()
    }

    /// Blocks until the token is cancelled or `timeout` elapses.
    ///
    /// Returns `true` if the token was cancelled.
    /// A timeout too large to express as a deadline waits with no deadline.
    pub fn wait_cancelled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.inner.reason.lock();
        while slot.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.inner.wake.wait_until(&mut slot, deadline).timed_out() {
                        return slot.is_some();
                    }
                }
                None => self.inner.wake.wait(&mut slot),
            }
        }
        true
    }

    /// Returns `true` if both tokens belong to the same session.
    pub fn same_session(&self, other: &SessionToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Statistics accumulated across all sessions of a recorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Sessions that reached the recording state.
    pub sessions_started: u64,
    /// Device reads that returned samples.
    pub chunks_read: u64,
    /// Device reads that returned nothing.
    pub empty_reads: u64,
    /// Device reads that failed.
    pub read_failures: u64,
    /// Total samples appended to the window.
    pub samples_captured: u64,
    /// Samples evicted from the front of the window.
    pub samples_evicted: u64,
    /// Temperature reads performed by the thermal guard.
    pub thermal_checks: u64,
}

/// Counters shared between the recorder and its capture threads.
#[derive(Default)]
pub(crate) struct StatsCounters {
    pub sessions_started: AtomicU64,
    pub chunks_read: AtomicU64,
    pub empty_reads: AtomicU64,
    pub read_failures: AtomicU64,
    pub samples_captured: AtomicU64,
    pub samples_evicted: AtomicU64,
    pub thermal_checks: AtomicU64,
}

impl StatsCounters {
    pub fn snapshot(&self) -> BufferStats {
        BufferStats {
            sessions_started: self.sessions_started.load(Ordering::SeqCst),
            chunks_read: self.chunks_read.load(Ordering::SeqCst),
            empty_reads: self.empty_reads.load(Ordering::SeqCst),
            read_failures: self.read_failures.load(Ordering::SeqCst),
            samples_captured: self.samples_captured.load(Ordering::SeqCst),
            samples_evicted: self.samples_evicted.load(Ordering::SeqCst),
            thermal_checks: self.thermal_checks.load(Ordering::SeqCst),
        }
    }
}
