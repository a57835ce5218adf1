//! Error types for panic-buffer.
//!
//! Errors are split into two categories:
//! - **Start errors** ([`BufferError`]): Prevent a buffering session from starting
//! - **Sensor errors** ([`SensorError`]): Failed temperature reads, which the
//!   thermal guard treats as "unknown" rather than as a reason to stop
//!
//! Graceful stops (time limit, overheating) are not errors. They are reported
//! through [`StopReason`](crate::StopReason) and the event callback.

use std::path::PathBuf;

/// Errors that prevent audio buffering from starting.
///
/// These errors are returned from [`PanicRecorder::start_buffering()`] and
/// indicate that no capture session was created. None of them is fatal to
/// the host process; buffering is simply unavailable until the next attempt.
///
/// [`PanicRecorder::start_buffering()`]: crate::PanicRecorder::start_buffering
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// Microphone access has not been granted.
    ///
    /// Not retryable until the permission is granted again.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// The input device could not reach a ready state.
    ///
    /// Retryable on the next start attempt.
    #[error("failed to initialize audio input: {reason}")]
    DeviceInit {
        /// Why the device failed to initialize.
        reason: String,
    },

    /// No default input device is configured on this system.
    #[error("no default input device configured")]
    NoDefaultDevice,

    /// The requested audio device was not found.
    #[error("device not found: {name} (available: {available:?})")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
        /// Input devices that do exist.
        available: Vec<String>,
    },

    /// The device's native sample format cannot be captured.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// A single device read failed. Absorbed by the capture loop.
    #[error("read failed: {reason}")]
    ReadFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The recorder configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The capture or timer thread could not be spawned.
    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),
}

impl BufferError {
    /// Creates a device initialization error with the given reason.
    pub fn device_init(reason: impl Into<String>) -> Self {
        Self::DeviceInit {
            reason: reason.into(),
        }
    }

    /// Creates a read failure with the given reason.
    pub fn read_failed(reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Errors from a [`TemperatureSensor`](crate::TemperatureSensor).
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// No temperature source exists on this device.
    #[error("temperature sensor unavailable")]
    Unavailable,

    /// Reading the sensor file failed.
    #[error("sensor read failed: {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The sensor produced something that is not a temperature.
    #[error("unparseable temperature in {path}: {value:?}")]
    Parse {
        /// Path that was read.
        path: PathBuf,
        /// The raw value.
        value: String,
    },
}

impl SensorError {
    /// Creates an I/O error for the given sensor path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
