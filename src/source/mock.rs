//! Mock input device for testing without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{CaptureFormat, InputDevice, InputStream};
use crate::BufferError;

/// How long an idle mock read sleeps before returning zero samples.
const DEFAULT_IDLE: Duration = Duration::from_millis(2);

/// One scripted result for a mock read.
#[derive(Debug, Clone)]
enum MockRead {
    Samples(Vec<i16>),
    Fail(String),
}

/// Call counts recorded by a [`MockInput`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCounters {
    /// Successful `open` calls.
    pub opens: u64,
    /// Successful `start` calls.
    pub starts: u64,
    /// `stop` calls.
    pub stops: u64,
    /// Streams dropped (device released).
    pub releases: u64,
    /// `read` calls, including idle ones.
    pub reads: u64,
}

impl MockCounters {
    /// Number of opened streams that have not been released.
    pub fn open_streams(&self) -> u64 {
        self.opens - self.releases
    }
}

#[derive(Default)]
struct MockState {
    script: Mutex<VecDeque<MockRead>>,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
    opens: AtomicU64,
    starts: AtomicU64,
    stops: AtomicU64,
    releases: AtomicU64,
    reads: AtomicU64,
}

/// A scripted input device that replays synthetic audio.
///
/// This allows testing the recorder without audio hardware, making it
/// suitable for CI environments. Clones share the same script and
/// counters, so a test can keep one handle while the recorder owns another.
///
/// Reads return queued chunks in order; once the queue is empty a read
/// sleeps briefly and returns zero samples, like an idle microphone.
///
/// # Example
///
/// ```
/// use panic_buffer::MockInput;
///
/// let mock = MockInput::new(8000, 320);
///
/// // 100ms of silence, then 100ms of a 440Hz tone
/// mock.feed_silence(100);
/// mock.feed_sine(440.0, 100);
///
/// assert_eq!(mock.queued_samples(), 1600);
/// ```
#[derive(Clone)]
pub struct MockInput {
    sample_rate: u32,
    chunk_len: usize,
    idle: Duration,
    state: Arc<MockState>,
}

impl MockInput {
    /// Creates a mock device producing `sample_rate` mono audio in reads of
    /// `chunk_len` samples.
    pub fn new(sample_rate: u32, chunk_len: usize) -> Self {
        Self {
            sample_rate,
            chunk_len: chunk_len.max(1),
            idle: DEFAULT_IDLE,
            state: Arc::new(MockState::default()),
        }
    }

    /// Sets how long an empty read blocks before returning zero.
    #[must_use]
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Makes subsequent `open` calls fail (or succeed again).
    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `start` calls fail (or succeed again).
    pub fn set_fail_start(&self, fail: bool) {
        self.state.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Queues samples, split into reads of `chunk_len`.
    pub fn feed(&self, samples: &[i16]) {
        let mut script = self.state.script.lock();
        for chunk in samples.chunks(self.chunk_len) {
            script.push_back(MockRead::Samples(chunk.to_vec()));
        }
    }

    /// Queues a read that fails with `reason`.
    pub fn fail_next_read(&self, reason: impl Into<String>) {
        self.state
            .script
            .lock()
            .push_back(MockRead::Fail(reason.into()));
    }

    /// Queues silence for the given duration in milliseconds.
    pub fn feed_silence(&self, duration_ms: u64) {
        let samples = vec![0i16; self.samples_for_duration(duration_ms)];
        self.feed(&samples);
    }

    /// Queues a sine wave at the given frequency for the given duration.
    pub fn feed_sine(&self, frequency: f64, duration_ms: u64) {
        let sample_rate = f64::from(self.sample_rate);
        let samples: Vec<i16> = (0..self.samples_for_duration(duration_ms))
            .map(|i| {
                let t = i as f64 / sample_rate;
                ((2.0 * std::f64::consts::PI * frequency * t).sin() * 32767.0) as i16
            })
            .collect();
        self.feed(&samples);
    }

    /// Samples queued but not yet read.
    pub fn queued_samples(&self) -> usize {
        self.state
            .script
            .lock()
            .iter()
            .map(|entry| match entry {
                MockRead::Samples(samples) => samples.len(),
                MockRead::Fail(_) => 0,
            })
            .sum()
    }

    /// Blocks until every queued read has been consumed or `timeout` elapses.
    ///
    /// Returns `true` if the queue drained.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.state.script.lock().is_empty() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.state.script.lock().is_empty()
    }

    /// Returns the call counts so far.
    pub fn counters(&self) -> MockCounters {
        MockCounters {
            opens: self.state.opens.load(Ordering::SeqCst),
            starts: self.state.starts.load(Ordering::SeqCst),
            stops: self.state.stops.load(Ordering::SeqCst),
            releases: self.state.releases.load(Ordering::SeqCst),
            reads: self.state.reads.load(Ordering::SeqCst),
        }
    }

    fn samples_for_duration(&self, duration_ms: u64) -> usize {
        (u64::from(self.sample_rate) * duration_ms / 1000) as usize
    }
}

impl InputDevice for MockInput {
    fn name(&self) -> String {
        "mock".to_string()
    }

    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn InputStream>, BufferError> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(BufferError::device_init("mock device refused to open"));
        }
        if format.sample_rate != self.sample_rate {
            return Err(BufferError::device_init(format!(
                "mock device runs at {}Hz, {}Hz requested",
                self.sample_rate, format.sample_rate
            )));
        }

        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            chunk_len: self.chunk_len,
            idle: self.idle,
            state: self.state.clone(),
        }))
    }
}

struct MockStream {
    chunk_len: usize,
    idle: Duration,
    state: Arc<MockState>,
}

impl InputStream for MockStream {
    fn start(&mut self) -> Result<(), BufferError> {
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(BufferError::device_init("mock device failed to start"));
        }
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, BufferError> {
        self.state.reads.fetch_add(1, Ordering::SeqCst);

        let next = self.state.script.lock().pop_front();
        match next {
            Some(MockRead::Samples(mut samples)) => {
                let count = samples.len().min(buf.len());
                buf[..count].copy_from_slice(&samples[..count]);
                if count < samples.len() {
                    // Put the remainder back for the next read
                    let rest = samples.split_off(count);
                    self.state
                        .script
                        .lock()
                        .push_front(MockRead::Samples(rest));
                }
                Ok(count)
            }
            Some(MockRead::Fail(reason)) => Err(BufferError::read_failed(reason)),
            None => {
                std::thread::sleep(self.idle);
                Ok(0)
            }
        }
    }

    fn stop(&mut self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.state.releases.fetch_add(1, Ordering::SeqCst);
    }
}
