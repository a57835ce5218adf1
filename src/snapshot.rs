//! Point-in-time copies of the sample window.

use std::time::Duration;

/// A copy of the window taken at one instant, oldest sample first.
///
/// # Example
///
/// ```
/// use panic_buffer::AudioSnapshot;
/// use std::time::Duration;
///
/// let snapshot = AudioSnapshot::new(vec![0i16; 800], 8000);
/// assert_eq!(snapshot.duration(), Duration::from_millis(100));
/// assert_eq!(snapshot.to_be_bytes().len(), 1600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSnapshot {
    /// Mono PCM samples in 16-bit signed integer format.
    pub samples: Vec<i16>,

    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioSnapshot {
    /// Creates a snapshot from samples captured at `sample_rate`.
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the snapshot holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration of the snapshot.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Encodes each sample as two big-endian bytes, in window order.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_be_bytes()).collect()
    }

    /// Encodes each sample as two little-endian bytes, in window order.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}
