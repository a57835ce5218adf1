//! Configuration types for the capture buffer.

use std::time::Duration;

use crate::BufferError;

/// Sample rate the panic buffer records at.
pub const DEFAULT_SAMPLE_RATE: u32 = 8000;

/// Largest window the recorder will allocate, in samples (128 MiB of audio).
pub const MAX_WINDOW_SAMPLES: usize = 64 * 1024 * 1024;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Configuration for the thermal guard.
///
/// # Example
///
/// ```
/// use panic_buffer::ThermalConfig;
/// use std::time::Duration;
///
/// let thermal = ThermalConfig {
///     threshold_celsius: 42,
///     ..Default::default()
/// };
/// assert_eq!(thermal.check_interval, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalConfig {
    /// Capture stops when the device reports a temperature strictly above this.
    ///
    /// Default: 45°C
    pub threshold_celsius: i32,

    /// Minimum time between two temperature reads.
    ///
    /// Default: 5 seconds
    pub check_interval: Duration,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            threshold_celsius: 45,
            check_interval: Duration::from_secs(5),
        }
    }
}

/// Configuration for buffering behavior.
///
/// Use [`BufferConfig::default()`] for the panic-button defaults, or customize
/// as needed.
///
/// # Example
///
/// ```
/// use panic_buffer::BufferConfig;
/// use std::time::Duration;
///
/// let config = BufferConfig {
///     window: Duration::from_secs(30),
///     ..Default::default()
/// };
/// assert_eq!(config.window_capacity(), 240_000);
/// ```
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Capture sample rate in Hz (mono, 16-bit).
    ///
    /// Default: 8000 Hz
    pub sample_rate: u32,

    /// How much recent audio the window retains.
    ///
    /// Default: 15 seconds
    pub window: Duration,

    /// Capture stops unconditionally after this long.
    ///
    /// Default: 5 minutes
    pub max_duration: Duration,

    /// Thermal guard settings.
    pub thermal: ThermalConfig,

    /// Clear the window when a new session starts.
    ///
    /// When `false`, audio from the previous session stays at the front of
    /// the window until it is evicted.
    /// Default: `true`
    pub clear_on_start: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window: Duration::from_secs(15),
            max_duration: Duration::from_secs(5 * 60),
            thermal: ThermalConfig::default(),
            clear_on_start: true,
        }
    }
}

impl BufferConfig {
    /// Returns the window capacity in samples (`sample_rate × window`),
    /// rounded down to whole samples.
    #[must_use]
    pub fn window_capacity(&self) -> usize {
        let samples = u128::from(self.sample_rate) * self.window.as_nanos() / NANOS_PER_SEC;
        usize::try_from(samples).unwrap_or(usize::MAX)
    }

    /// Checks that the configuration can be used to record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero sample rate, an empty window, a
    /// window larger than [`MAX_WINDOW_SAMPLES`] or a zero maximum duration.
    pub fn validate(&self) -> Result<(), BufferError> {
        if self.sample_rate == 0 {
            return Err(BufferError::invalid_config("sample rate must be non-zero"));
        }
        let capacity = self.window_capacity();
        if capacity == 0 {
            return Err(BufferError::invalid_config(format!(
                "window of {:?} holds no samples at {} Hz",
                self.window, self.sample_rate
            )));
        }
        if capacity > MAX_WINDOW_SAMPLES {
            return Err(BufferError::invalid_config(format!(
                "window of {:?} at {} Hz exceeds {MAX_WINDOW_SAMPLES} samples",
                self.window, self.sample_rate
            )));
        }
        if self.max_duration.is_zero() {
            return Err(BufferError::invalid_config(
                "max duration must be non-zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_config_defaults() {
        let config = BufferConfig::default();
        assert_eq!(config.sample_rate, 8000);
        assert_eq!(config.window, Duration::from_secs(15));
        assert_eq!(config.max_duration, Duration::from_secs(300));
        assert!(config.clear_on_start);
    }

    #[test]
    fn test_thermal_config_defaults() {
        let thermal = ThermalConfig::default();
        assert_eq!(thermal.threshold_celsius, 45);
        assert_eq!(thermal.check_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_default_window_capacity() {
        assert_eq!(BufferConfig::default().window_capacity(), 120_000);
    }

    #[test]
    fn test_fractional_window_capacity() {
        let config = BufferConfig {
            sample_rate: 16000,
            window: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(config.window_capacity(), 4000);
    }

    #[test]
    fn test_window_capacity_is_exact() {
        // 0.29 * 100 is 28.999... in floating point
        let config = BufferConfig {
            sample_rate: 100,
            window: Duration::from_millis(290),
            ..Default::default()
        };
        assert_eq!(config.window_capacity(), 29);
    }

    #[test]
    fn test_validate_rejects_huge_window() {
        let config = BufferConfig {
            window: Duration::from_secs(24 * 60 * 60),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BufferError::InvalidConfig { .. })
        ));

        let config = BufferConfig {
            window: Duration::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_unbounded_max_duration() {
        let config = BufferConfig {
            max_duration: Duration::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_default() {
        assert!(BufferConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let config = BufferConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BufferError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let config = BufferConfig {
            window: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_duration() {
        let config = BufferConfig {
            max_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
