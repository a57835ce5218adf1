//! Capture pipeline components.
//!
//! The pipeline connects the input device to the shared sample window:
//!
//! ```text
//! Capture Thread → Sample Window ← Readers (snapshot)
//!        ↑
//!   Time-limit timer (cancels the session token)
//! ```
//!
//! - **Sample Window**: fixed-capacity ring behind one lock; oldest samples
//!   are evicted first
//! - **Capture Thread**: owns the device stream, appends each chunk, polls
//!   the thermal guard
//! - **Time-limit Timer**: one-shot thread ending the session after the
//!   maximum duration

mod capture;
mod window;

pub(crate) use capture::{spawn_capture, spawn_time_limit, CaptureConfig};
pub(crate) use window::{SampleWindow, SharedWindow};
