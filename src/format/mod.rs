//! Audio format conversion.
//!
//! Input devices rarely capture at 8kHz mono. The CPAL input converts
//! whatever the device delivers into the capture format:
//! - Sample format conversion (f32 → i16) in the audio callback
//! - Channel downmix to mono
//! - Streaming sample rate conversion

mod convert;
mod resample;

pub use convert::{downmix, f32_to_i16};
pub use resample::Resampler;

/// Converts interleaved device audio into mono audio at the target rate.
///
/// Keeps resampler state and any trailing partial frame between calls, so a
/// stream can be fed in arbitrarily sized pieces without clicks at the
/// boundaries.
#[derive(Debug, Clone)]
pub struct FormatConverter {
    channels: u16,
    resampler: Resampler,
    partial: Vec<i16>,
}

impl FormatConverter {
    /// Creates a converter from `source_rate`/`source_channels` to mono `target_rate`.
    pub fn new(source_rate: u32, source_channels: u16, target_rate: u32) -> Self {
        Self {
            channels: source_channels.max(1),
            resampler: Resampler::new(source_rate, target_rate),
            partial: Vec::new(),
        }
    }

    /// Returns `true` if input passes through unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.channels == 1 && self.resampler.is_passthrough()
    }

    /// Converts a block of interleaved samples, appending to `out`.
    pub fn process(&mut self, interleaved: &[i16], out: &mut Vec<i16>) {
        if self.channels == 1 {
            self.resampler.process(interleaved, out);
            return;
        }

        let frame = usize::from(self.channels);
        let mut joined = std::mem::take(&mut self.partial);
        joined.extend_from_slice(interleaved);

        let whole = joined.len() - joined.len() % frame;
        self.partial = joined.split_off(whole);
        let mono = downmix(&joined, self.channels);
        self.resampler.process(&mono, out);
    }
}
