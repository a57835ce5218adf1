//! Streaming sample rate conversion.
//!
//! Linear interpolation, which is fast and adequate for speech. The
//! resampler carries its read position and the last input sample across
//! calls, so consecutive blocks join without gaps or repeated samples.

/// Stateful linear-interpolation resampler for mono audio.
#[derive(Debug, Clone)]
pub struct Resampler {
    from_rate: u32,
    to_rate: u32,
    /// Input samples advanced per output sample.
    step: f64,
    /// Read position relative to the carried sample (index 0) when present.
    position: f64,
    /// Last sample of the previous block.
    carry: Option<i16>,
}

impl Resampler {
    /// Creates a resampler from `from_rate` to `to_rate`.
    ///
    /// A zero rate on either side disables conversion.
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        let step = if from_rate == 0 || to_rate == 0 {
            1.0
        } else {
            f64::from(from_rate) / f64::from(to_rate)
        };
        Self {
            from_rate,
            to_rate,
            step,
            position: 0.0,
            carry: None,
        }
    }

    /// Returns `true` if samples pass through unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.from_rate == self.to_rate || self.from_rate == 0 || self.to_rate == 0
    }

    /// Resamples `input`, appending to `out`.
    pub fn process(&mut self, input: &[i16], out: &mut Vec<i16>) {
        if self.is_passthrough() {
            out.extend_from_slice(input);
            return;
        }
        if input.is_empty() {
            return;
        }

        // View the carried sample (if any) as index 0 in front of the input
        let offset = usize::from(self.carry.is_some());
        let len = input.len() + offset;
        let carry = self.carry;
        let at = |i: usize| -> i16 {
            match (i, carry) {
                (0, Some(sample)) => sample,
                _ => input[i - offset],
            }
        };

        loop {
            let idx = self.position.floor() as usize;
            if idx + 1 >= len {
                break;
            }
            let frac = self.position - idx as f64;
            let s1 = f64::from(at(idx));
            let s2 = f64::from(at(idx + 1));
            out.push((s1 + (s2 - s1) * frac) as i16);
            self.position += self.step;
        }

        // The last input sample becomes index 0 of the next block
        self.carry = Some(at(len - 1));
        self.position -= (len - 1) as f64;
    }
}
