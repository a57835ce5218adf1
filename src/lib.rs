//! # panic-buffer
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Bounded microphone capture for "panic button" recording.
//!
//! `panic-buffer` keeps the last few seconds of microphone audio in memory
//! while a session is active, so a host can grab what was just said the
//! moment something goes wrong. Sessions end on request, after a time limit,
//! or when the device gets too hot; the buffered audio survives the stop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use panic_buffer::{BufferConfig, PanicRecorder};
//! use std::time::Duration;
//!
//! let recorder = PanicRecorder::builder()
//!     .config(BufferConfig {
//!         window: Duration::from_secs(15),   // keep the last 15s
//!         max_duration: Duration::from_secs(300),
//!         ..Default::default()
//!     })
//!     .on_event(|e| tracing::info!(?e, "buffer event"))
//!     .build()?;
//!
//! recorder.start_buffering()?;
//!
//! // ... the user presses the panic button ...
//! recorder.stop_buffering();
//!
//! // 16-bit big-endian mono PCM at 8kHz, oldest sample first
//! let audio: Vec<u8> = recorder.buffered_audio();
//! # Ok::<(), panic_buffer::BufferError>(())
//! ```
//!
//! ## Architecture
//!
//! Each session runs on its own threads:
//!
//! - **CPAL Thread**: Audio callback that converts and hands samples off without blocking
//! - **Capture Thread**: Owns the device, reads chunks into the window, polls the thermal guard
//! - **Timer Thread**: Ends the session when the time limit elapses
//!
//! The window is a fixed-capacity ring behind a single lock. Writers append
//! and evict the oldest samples; readers copy it out in one step, so a read
//! never sees a half-applied write.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod error;
mod event;
pub mod format;
mod permission;
mod pipeline;
mod recorder;
mod session;
mod snapshot;
pub mod source;
mod thermal;

pub use builder::PanicRecorderBuilder;
pub use config::{BufferConfig, ThermalConfig, DEFAULT_SAMPLE_RATE, MAX_WINDOW_SAMPLES};
pub use error::{BufferError, SensorError};
pub use event::{event_callback, BufferEvent, EventCallback};
pub use permission::PermissionGate;
pub use recorder::{PanicRecorder, StartOutcome};
pub use session::{BufferStats, StopReason};
pub use snapshot::AudioSnapshot;
pub use source::{
    default_input_device_name, list_input_devices, CaptureFormat, CpalInput, InputDevice,
    InputStream, MockCounters, MockInput,
};
pub use thermal::{
    NoSensor, ScriptedSensor, SysfsBatterySensor, Temperature, TemperatureSensor, ThermalGuard,
    ThermalStatus,
};
