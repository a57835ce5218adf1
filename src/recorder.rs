//! The panic-button recorder: start, stop and read the buffered audio.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::event::EventSink;
use crate::pipeline::{spawn_capture, spawn_time_limit, CaptureConfig, SharedWindow};
use crate::session::{SessionToken, StatsCounters};
use crate::source::{CaptureFormat, InputDevice};
use crate::thermal::{TemperatureSensor, ThermalGuard};
use crate::{
    AudioSnapshot, BufferConfig, BufferError, BufferStats, PanicRecorderBuilder, PermissionGate,
    StopReason,
};

/// What [`PanicRecorder::start_buffering`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session is recording.
    Started,
    /// A session was already recording; nothing changed.
    AlreadyRecording,
}

/// One capture session: its token and the threads serving it.
///
/// `threads` is empty while the session is being started.
struct ActiveSession {
    token: SessionToken,
    threads: SessionThreads,
    started_at: Instant,
}

impl ActiveSession {
    fn take_threads(&mut self) -> SessionThreads {
        std::mem::take(&mut self.threads)
    }
}

#[derive(Default)]
struct SessionThreads {
    capture: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

impl SessionThreads {
    /// Joins both threads. Never call with the session lock held.
    fn join(self) {
        join_quietly(self.capture, "capture");
        join_quietly(self.timer, "time-limit");
    }
}

/// Continuously buffers the most recent microphone audio.
///
/// While a session is active, a capture thread appends audio to a window
/// that holds only the last [`BufferConfig::window`] worth of samples. The
/// session ends when [`stop_buffering()`](Self::stop_buffering) is called,
/// when [`BufferConfig::max_duration`] elapses, or when the thermal guard
/// finds the device too hot. The window survives the stop and can be read
/// at any time.
///
/// All methods take `&self`; share the recorder across threads with an
/// `Arc`. Dropping the recorder stops any running session.
///
/// # Example
///
/// ```
/// use panic_buffer::{MockInput, NoSensor, PanicRecorder, StartOutcome};
/// use std::time::Duration;
///
/// let mic = MockInput::new(8000, 320);
/// mic.feed_sine(440.0, 500);
///
/// let recorder = PanicRecorder::builder()
///     .device(mic.clone())
///     .sensor(NoSensor)
///     .build()?;
///
/// assert_eq!(recorder.start_buffering()?, StartOutcome::Started);
/// mic.wait_until_drained(Duration::from_secs(5));
/// recorder.stop_buffering();
///
/// let bytes = recorder.buffered_audio();
/// assert_eq!(bytes.len(), 2 * 4000);
/// # Ok::<(), panic_buffer::BufferError>(())
/// ```
pub struct PanicRecorder {
    config: BufferConfig,
    device: Arc<dyn InputDevice>,
    sensor: Arc<dyn TemperatureSensor>,
    permission: Box<dyn PermissionGate>,
    window: SharedWindow,
    session: Mutex<Option<ActiveSession>>,
    stats: Arc<StatsCounters>,
    events: EventSink,
}

impl PanicRecorder {
    /// Creates a builder with the default configuration.
    pub fn builder() -> PanicRecorderBuilder {
        PanicRecorderBuilder::new()
    }

    pub(crate) fn from_parts(
        config: BufferConfig,
        device: Arc<dyn InputDevice>,
        sensor: Arc<dyn TemperatureSensor>,
        permission: Box<dyn PermissionGate>,
        window: SharedWindow,
        events: EventSink,
    ) -> Self {
        Self {
            config,
            device,
            sensor,
            permission,
            window,
            session: Mutex::new(None),
            stats: Arc::new(StatsCounters::default()),
            events,
        }
    }

    /// Starts buffering microphone audio.
    ///
    /// Returns once the device is recording. Calling this while a session is
    /// already recording (or being started) does nothing and returns
    /// [`StartOutcome::AlreadyRecording`].
    ///
    /// No thread is joined while the session lock is held, so event
    /// callbacks may call back into the recorder.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if microphone access is not granted; the device
    ///   is not touched and no thread is started
    /// - `DeviceInit` (or another device error) if the input could not be
    ///   opened and started
    /// - `ThreadSpawn` if the capture or timer thread could not be created
    pub fn start_buffering(&self) -> Result<StartOutcome, BufferError> {
        let finished = {
            let mut slot = self.session.lock();
            match slot.as_mut() {
                Some(session) if session.token.is_active() => {
                    tracing::debug!("Buffering already active, start ignored");
                    return Ok(StartOutcome::AlreadyRecording);
                }
                Some(session) => session.take_threads(),
                None => SessionThreads::default(),
            }
        };
        // The previous session ended on its own; reap its threads
        finished.join();

        if !self.permission.microphone_granted() {
            tracing::warn!("Microphone permission not granted, buffering unavailable");
            return Err(BufferError::PermissionDenied);
        }

        let token = SessionToken::new();
        let replaced = {
            let mut slot = self.session.lock();
            if slot.as_ref().is_some_and(|session| session.token.is_active()) {
                tracing::debug!("Buffering started concurrently, start ignored");
                return Ok(StartOutcome::AlreadyRecording);
            }
            slot.replace(ActiveSession {
                token: token.clone(),
                threads: SessionThreads::default(),
                started_at: Instant::now(),
            })
        };
        if let Some(mut replaced) = replaced {
            replaced.take_threads().join();
        }

        let threads = match self.spawn_session(&token) {
            Ok(threads) => threads,
            Err(e) => {
                token.cancel(StopReason::DeviceFailed {
                    reason: e.to_string(),
                });
                tracing::warn!(error = %e, device = %self.device.name(), "Failed to start audio buffering");
                return Err(e);
            }
        };

        let leftover = {
            let mut slot = self.session.lock();
            match slot
                .as_mut()
                .filter(|session| session.token.same_session(&token) && token.is_active())
            {
                Some(session) => {
                    session.threads = threads;
                    None
                }
                None => Some(threads),
            }
        };
        if let Some(threads) = leftover {
            // Stopped before the threads could be recorded
            threads.join();
        }

        tracing::debug!(
            max_duration_secs = self.config.max_duration.as_secs(),
            "Time limit armed"
        );
        Ok(StartOutcome::Started)
    }

    /// Spawns the capture thread, waits for the device, then arms the timer.
    ///
    /// On failure every thread spawned so far has been joined. Called without
    /// the session lock held.
    fn spawn_session(&self, token: &SessionToken) -> Result<SessionThreads, BufferError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let capture = spawn_capture(
            CaptureConfig {
                device: self.device.clone(),
                format: CaptureFormat::mono(self.config.sample_rate),
                window: self.window.clone(),
                token: token.clone(),
                guard: ThermalGuard::new(self.sensor.clone(), self.config.thermal.clone()),
                stats: self.stats.clone(),
                events: self.events.clone(),
                clear_on_start: self.config.clear_on_start,
            },
            ready_tx,
        )
        .map_err(BufferError::ThreadSpawn)?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(BufferError::device_init(
                "capture thread exited before the device was ready",
            ))
        });
        if let Err(e) = ready {
            join_quietly(Some(capture), "capture");
            return Err(e);
        }

        match spawn_time_limit(token.clone(), self.config.max_duration) {
            Ok(timer) => Ok(SessionThreads {
                capture: Some(capture),
                timer: Some(timer),
            }),
            Err(e) => {
                token.cancel(StopReason::DeviceFailed {
                    reason: "time-limit timer unavailable".to_string(),
                });
                join_quietly(Some(capture), "capture");
                Err(BufferError::ThreadSpawn(e))
            }
        }
    }

    /// Stops buffering and releases the device.
    ///
    /// Waits for the capture thread to finish its current read and release
    /// the device, so the window no longer changes once this returns. If a
    /// start is still waiting for the device, that `start_buffering` call
    /// does the waiting instead.
    /// Safe to call any number of times, including before any start.
    pub fn stop_buffering(&self) {
        let (token, threads) = {
            let mut slot = self.session.lock();
            match slot.as_mut() {
                Some(session) => (session.token.clone(), session.take_threads()),
                None => return,
            }
        };

        if token.cancel(StopReason::UserRequested) {
            tracing::debug!("Stop requested");
        }
        threads.join();
    }

    /// Returns `true` while a session is recording or being started.
    pub fn is_recording(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| session.token.is_active())
    }

    /// How long the current session has been recording, if one is.
    pub fn recording_for(&self) -> Option<Duration> {
        self.session
            .lock()
            .as_ref()
            .filter(|session| session.token.is_active())
            .map(|session| session.started_at.elapsed())
    }

    /// Why the most recent session ended, or `None` if it is still running
    /// or no session has been started.
    pub fn last_stop_reason(&self) -> Option<StopReason> {
        self.session
            .lock()
            .as_ref()
            .and_then(|session| session.token.reason())
    }

    /// The window encoded as 16-bit big-endian samples, oldest first.
    ///
    /// The lock is held only while the samples are copied.
    pub fn buffered_audio(&self) -> Vec<u8> {
        self.snapshot().to_be_bytes()
    }

    /// A copy of the window.
    pub fn snapshot(&self) -> AudioSnapshot {
        let samples = self.window.lock().to_vec();
        AudioSnapshot::new(samples, self.config.sample_rate)
    }

    /// Number of samples currently in the window.
    pub fn buffered_len(&self) -> usize {
        self.window.lock().len()
    }

    /// Maximum number of samples the window holds.
    pub fn window_capacity(&self) -> usize {
        self.window.lock().capacity()
    }

    /// Cumulative statistics across all sessions.
    pub fn stats(&self) -> BufferStats {
        self.stats.snapshot()
    }

    /// The configuration this recorder was built with.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }
}

impl Drop for PanicRecorder {
    fn drop(&mut self) {
        self.stop_buffering();
    }
}

/// Joins a session thread, unless called from that thread itself (an event
/// callback stopping the recorder from the capture thread).
fn join_quietly(handle: Option<JoinHandle<()>>, name: &str) {
    let Some(handle) = handle else {
        return;
    };
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::error!(thread = name, "Buffering thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermal::{NoSensor, ScriptedSensor, Temperature};
    use crate::{MockCounters, MockInput, ThermalConfig};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn recorder(mock: &MockInput) -> PanicRecorder {
        PanicRecorder::builder()
            .device(mock.clone())
            .sensor(NoSensor)
            .build()
            .unwrap()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let mock = MockInput::new(8000, 100);
        let recorder = recorder(&mock);

        recorder.stop_buffering();
        recorder.stop_buffering();

        assert!(!recorder.is_recording());
        assert_eq!(recorder.last_stop_reason(), None);
        assert_eq!(mock.counters().opens, 0);
    }

    #[test]
    fn test_start_and_stop() {
        let mock = MockInput::new(8000, 100);
        let recorder = recorder(&mock);

        assert_eq!(recorder.start_buffering().unwrap(), StartOutcome::Started);
        assert!(recorder.is_recording());
        assert!(recorder.recording_for().is_some());

        recorder.stop_buffering();
        assert!(!recorder.is_recording());
        assert_eq!(recorder.recording_for(), None);
        assert_eq!(recorder.last_stop_reason(), Some(StopReason::UserRequested));

        let counters = mock.counters();
        assert_eq!(counters.opens, 1);
        assert_eq!(counters.stops, 1);
        assert_eq!(counters.open_streams(), 0);
    }

    #[test]
    fn test_double_stop_same_end_state() {
        let mock = MockInput::new(8000, 100);
        let recorder = recorder(&mock);
        recorder.start_buffering().unwrap();

        recorder.stop_buffering();
        let once = (recorder.is_recording(), mock.counters(), recorder.last_stop_reason());
        recorder.stop_buffering();
        let twice = (recorder.is_recording(), mock.counters(), recorder.last_stop_reason());

        assert_eq!(once, twice);
    }

    #[test]
    fn test_start_while_recording_is_ignored() {
        let mock = MockInput::new(8000, 100);
        let recorder = recorder(&mock);

        recorder.start_buffering().unwrap();
        assert_eq!(
            recorder.start_buffering().unwrap(),
            StartOutcome::AlreadyRecording
        );
        assert_eq!(mock.counters().opens, 1);
        assert_eq!(recorder.stats().sessions_started, 1);
    }

    #[test]
    fn test_permission_denied_touches_nothing() {
        let mock = MockInput::new(8000, 100);
        let recorder = PanicRecorder::builder()
            .device(mock.clone())
            .sensor(NoSensor)
            .permission(false)
            .build()
            .unwrap();

        assert!(matches!(
            recorder.start_buffering(),
            Err(BufferError::PermissionDenied)
        ));
        assert!(!recorder.is_recording());
        assert_eq!(mock.counters(), MockCounters::default());
    }

    #[test]
    fn test_permission_checked_on_every_start() {
        let granted = Arc::new(AtomicBool::new(true));
        let flag = granted.clone();
        let mock = MockInput::new(8000, 100);
        let recorder = PanicRecorder::builder()
            .device(mock.clone())
            .sensor(NoSensor)
            .permission(move || flag.load(Ordering::SeqCst))
            .build()
            .unwrap();

        recorder.start_buffering().unwrap();
        recorder.stop_buffering();

        granted.store(false, Ordering::SeqCst);
        assert!(recorder.start_buffering().is_err());
        assert_eq!(mock.counters().opens, 1);
    }

    #[test]
    fn test_device_init_failure() {
        let mock = MockInput::new(8000, 100);
        mock.set_fail_start(true);
        let recorder = recorder(&mock);

        assert!(matches!(
            recorder.start_buffering(),
            Err(BufferError::DeviceInit { .. })
        ));
        assert!(!recorder.is_recording());
        assert_eq!(mock.counters().open_streams(), 0);

        // Retryable once the device recovers
        mock.set_fail_start(false);
        assert_eq!(recorder.start_buffering().unwrap(), StartOutcome::Started);
    }

    #[test]
    fn test_time_limit_stops_session() {
        let mock = MockInput::new(8000, 100);
        let recorder = PanicRecorder::builder()
            .config(BufferConfig {
                max_duration: Duration::from_millis(30),
                ..Default::default()
            })
            .device(mock.clone())
            .sensor(NoSensor)
            .build()
            .unwrap();

        recorder.start_buffering().unwrap();
        assert!(wait_for(|| !recorder.is_recording()));
        assert_eq!(recorder.last_stop_reason(), Some(StopReason::TimeLimit));
        assert!(wait_for(|| mock.counters().open_streams() == 0));
    }

    #[test]
    fn test_thermal_stop_keeps_window() {
        let mock = MockInput::new(8000, 100);
        mock.feed(&[5; 200]);
        let recorder = PanicRecorder::builder()
            .config(BufferConfig {
                thermal: ThermalConfig {
                    threshold_celsius: 45,
                    check_interval: Duration::ZERO,
                },
                ..Default::default()
            })
            .device(mock.clone())
            .sensor(ScriptedSensor::new([Some(300), Some(460)]))
            .build()
            .unwrap();

        recorder.start_buffering().unwrap();
        assert!(wait_for(|| !recorder.is_recording()));

        assert_eq!(
            recorder.last_stop_reason(),
            Some(StopReason::Thermal {
                temperature: Temperature::from_tenths(460)
            })
        );
        assert_eq!(recorder.buffered_len(), 200);
        assert_eq!(recorder.stats().thermal_checks, 2);
    }

    #[test]
    fn test_restart_after_thermal_stop() {
        let mock = MockInput::new(8000, 100);
        let recorder = PanicRecorder::builder()
            .config(BufferConfig {
                thermal: ThermalConfig {
                    threshold_celsius: 45,
                    check_interval: Duration::ZERO,
                },
                ..Default::default()
            })
            .device(mock.clone())
            .sensor(ScriptedSensor::new([Some(500), Some(200)]))
            .build()
            .unwrap();

        recorder.start_buffering().unwrap();
        assert!(wait_for(|| !recorder.is_recording()));

        assert_eq!(recorder.start_buffering().unwrap(), StartOutcome::Started);
        assert!(recorder.is_recording());
        assert_eq!(recorder.last_stop_reason(), None);
    }

    #[test]
    fn test_restart_while_stop_callback_uses_recorder() {
        let mock = MockInput::new(8000, 100);
        let handle: Arc<std::sync::OnceLock<std::sync::Weak<PanicRecorder>>> =
            Arc::new(std::sync::OnceLock::new());
        let (seen_tx, seen_rx) = mpsc::channel();
        let first_stop = Arc::new(AtomicBool::new(true));

        let callback_handle = handle.clone();
        let recorder = Arc::new(
            PanicRecorder::builder()
                .config(BufferConfig {
                    thermal: ThermalConfig {
                        threshold_celsius: 45,
                        check_interval: Duration::ZERO,
                    },
                    ..Default::default()
                })
                .device(mock.clone())
                .sensor(ScriptedSensor::new([Some(500), Some(200)]))
                .on_event(move |event| {
                    if !matches!(event, crate::BufferEvent::BufferingStopped { .. })
                        || !first_stop.swap(false, Ordering::SeqCst)
                    {
                        return;
                    }
                    // Still inside the callback when the restart begins
                    thread::sleep(Duration::from_millis(100));
                    if let Some(recorder) = callback_handle.get().and_then(std::sync::Weak::upgrade) {
                        let _ = seen_tx.send(recorder.is_recording());
                    }
                })
                .build()
                .unwrap(),
        );
        handle.set(Arc::downgrade(&recorder)).unwrap();

        recorder.start_buffering().unwrap();
        assert!(wait_for(|| !recorder.is_recording()));

        let (done_tx, done_rx) = mpsc::channel();
        let restarter = recorder.clone();
        thread::spawn(move || {
            let _ = done_tx.send(restarter.start_buffering());
        });

        let outcome = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("restart blocked on the stop callback");
        assert_eq!(outcome.unwrap(), StartOutcome::Started);
        assert!(seen_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(recorder.is_recording());

        recorder.stop_buffering();
        assert_eq!(mock.counters().open_streams(), 0);
    }

    #[test]
    fn test_stop_from_event_callback() {
        let mock = MockInput::new(8000, 100);
        mock.feed(&[1; 300]);
        let handle: Arc<std::sync::OnceLock<std::sync::Weak<PanicRecorder>>> =
            Arc::new(std::sync::OnceLock::new());
        let callback_handle = handle.clone();

        let recorder = Arc::new(
            PanicRecorder::builder()
                .device(mock.clone())
                .sensor(NoSensor)
                .on_event(move |event| {
                    if matches!(event, crate::BufferEvent::ReadFailed { .. }) {
                        if let Some(recorder) =
                            callback_handle.get().and_then(std::sync::Weak::upgrade)
                        {
                            recorder.stop_buffering();
                        }
                    }
                })
                .build()
                .unwrap(),
        );
        handle.set(Arc::downgrade(&recorder)).unwrap();

        recorder.start_buffering().unwrap();
        mock.fail_next_read("overrun");
        assert!(wait_for(|| !recorder.is_recording()));
        assert_eq!(recorder.last_stop_reason(), Some(StopReason::UserRequested));

        recorder.stop_buffering();
        assert!(wait_for(|| mock.counters().open_streams() == 0));
    }

    #[test]
    fn test_failed_start_records_device_failure() {
        let mock = MockInput::new(8000, 100);
        mock.set_fail_open(true);
        let recorder = recorder(&mock);

        assert!(recorder.start_buffering().is_err());
        assert!(matches!(
            recorder.last_stop_reason(),
            Some(StopReason::DeviceFailed { .. })
        ));
        assert_eq!(recorder.stats().sessions_started, 0);
    }

    #[test]
    fn test_unbounded_max_duration() {
        let mock = MockInput::new(8000, 100);
        let recorder = PanicRecorder::builder()
            .config(BufferConfig {
                max_duration: Duration::MAX,
                ..Default::default()
            })
            .device(mock.clone())
            .sensor(NoSensor)
            .build()
            .unwrap();

        recorder.start_buffering().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(recorder.is_recording());
        recorder.stop_buffering();
        assert_eq!(recorder.last_stop_reason(), Some(StopReason::UserRequested));
    }

    #[test]
    fn test_drop_stops_session() {
        let mock = MockInput::new(8000, 100);
        {
            let recorder = recorder(&mock);
            recorder.start_buffering().unwrap();
        }
        assert_eq!(mock.counters().open_streams(), 0);
    }
}
