//! Capture thread: reads the device, fills the window, watches the temperature.
//!
//! ```text
//! Input device ──read──▶ chunk ──lock──▶ Sample window
//!                          │
//!                          └──▶ Thermal guard ──overheated──▶ cancel session
//! ```
//!
//! The thread owns the device stream for its whole life. It opens and starts
//! the device, reports readiness back to `start_buffering`, loops until the
//! session token is cancelled, then stops and releases the device.

use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::event::EventSink;
use crate::pipeline::SharedWindow;
use crate::session::{SessionToken, StatsCounters, StopReason};
use crate::source::{CaptureFormat, InputDevice, InputStream};
use crate::thermal::{ThermalGuard, ThermalStatus};
use crate::{BufferError, BufferEvent};

/// Result the capture thread sends back once the device is (or isn't) ready.
pub(crate) type ReadySignal = mpsc::Sender<Result<(), BufferError>>;

/// Everything the capture thread needs, moved onto it at spawn.
pub(crate) struct CaptureConfig {
    pub device: Arc<dyn InputDevice>,
    pub format: CaptureFormat,
    pub window: SharedWindow,
    pub token: SessionToken,
    pub guard: ThermalGuard,
    pub stats: Arc<StatsCounters>,
    pub events: EventSink,
    pub clear_on_start: bool,
}

/// Spawns the capture thread.
///
/// Exactly one message is sent on `ready`: `Ok(())` once the device is
/// recording and `BufferingStarted` has been emitted, or the error that kept
/// it from getting there.
pub(crate) fn spawn_capture(
    config: CaptureConfig,
    ready: ReadySignal,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("panic-capture".to_string())
        .spawn(move || run_capture(config, &ready))
}

fn run_capture(config: CaptureConfig, ready: &ReadySignal) {
    let mut stream = match open_and_start(config.device.as_ref(), &config.format) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let window_capacity = {
        let mut window = config.window.lock();
        if config.clear_on_start {
            window.clear();
        }
        window.capacity()
    };

    // Announced before readiness so it precedes every event of the session
    config.stats.sessions_started.fetch_add(1, Ordering::Relaxed);
    tracing::info!(
        sample_rate = config.format.sample_rate,
        window_capacity,
        "Audio buffering started"
    );
    config.events.emit(BufferEvent::BufferingStarted {
        sample_rate: config.format.sample_rate,
        window_capacity,
    });

    if ready.send(Ok(())).is_err() {
        // Nobody is waiting for this session any more
        stream.stop();
        return;
    }

    let CaptureConfig {
        window,
        token,
        guard,
        stats,
        events,
        ..
    } = config;

    let mut capture = CaptureLoop {
        window: window.clone(),
        token: token.clone(),
        guard,
        stats,
        events: events.clone(),
    };
    capture.run(stream.as_mut());

    stream.stop();
    drop(stream);

    let reason = token.reason().unwrap_or(StopReason::UserRequested);
    let buffered_samples = window.lock().len();
    tracing::info!(%reason, buffered_samples, "Audio buffering stopped");
    events.emit(BufferEvent::BufferingStopped {
        reason,
        buffered_samples,
    });
}

/// Opens and starts the device. A stream that fails to start is dropped,
/// which releases it.
fn open_and_start(
    device: &dyn InputDevice,
    format: &CaptureFormat,
) -> Result<Box<dyn InputStream>, BufferError> {
    let mut stream = device.open(format)?;
    stream.start()?;
    tracing::debug!(device = %device.name(), "Input device recording");
    Ok(stream)
}

/// The read/append/check cycle.
struct CaptureLoop {
    window: SharedWindow,
    token: SessionToken,
    guard: ThermalGuard,
    stats: Arc<StatsCounters>,
    events: EventSink,
}

impl CaptureLoop {
    /// Runs until the session token is cancelled or the device overheats.
    fn run(&mut self, stream: &mut dyn InputStream) {
        let mut chunk = vec![0i16; stream.chunk_len().max(1)];

        while self.token.is_active() {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    self.stats.empty_reads.fetch_add(1, Ordering::Relaxed);
                }
                Ok(read) => self.append(&chunk[..read.min(chunk.len())]),
                Err(e) => {
                    self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(error = %e, "Device read failed, skipping chunk");
                    self.events.emit(BufferEvent::ReadFailed {
                        error: e.to_string(),
                    });
                }
            }

            if self.check_temperature(Instant::now()) {
                break;
            }
        }
    }

    fn append(&self, samples: &[i16]) {
        let evicted = self.window.lock().push(samples);

        self.stats.chunks_read.fetch_add(1, Ordering::Relaxed);
        self.stats
            .samples_captured
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
        self.stats
            .samples_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Polls the thermal guard. Returns `true` if capture must stop.
    fn check_temperature(&mut self, now: Instant) -> bool {
        let reading = match self.guard.poll(now) {
            ThermalStatus::NotDue => return false,
            ThermalStatus::Normal(temperature) => {
                tracing::trace!(%temperature, "Device temperature");
                Some(temperature)
            }
            ThermalStatus::Unknown => None,
            ThermalStatus::Overheated(temperature) => {
                self.stats.thermal_checks.fetch_add(1, Ordering::Relaxed);
                self.events.emit(BufferEvent::TemperatureChecked {
                    reading: Some(temperature),
                });
                tracing::warn!(%temperature, "Device too hot, stopping audio buffering");
                self.token.cancel(StopReason::Thermal { temperature });
                return true;
            }
        };

        self.stats.thermal_checks.fetch_add(1, Ordering::Relaxed);
        self.events
            .emit(BufferEvent::TemperatureChecked { reading });
        false
    }
}

/// Spawns the one-shot timer that ends the session after `limit`.
///
/// The timer wakes early and exits if the session is cancelled first.
pub(crate) fn spawn_time_limit(
    token: SessionToken,
    limit: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("panic-time-limit".to_string())
        .spawn(move || {
            if !token.wait_cancelled(limit) && token.cancel(StopReason::TimeLimit) {
                tracing::info!(limit_secs = limit.as_secs(), "Recording time limit reached");
            }
        })
}
