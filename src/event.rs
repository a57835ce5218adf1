//! Runtime events for monitoring the capture buffer.
//!
//! Events are non-fatal notifications. Buffering continues (or has already
//! stopped gracefully) after any event is emitted; they are for logging and
//! UI updates, not error handling.

use std::sync::Arc;

use crate::session::StopReason;
use crate::thermal::Temperature;

/// Runtime events emitted by a [`PanicRecorder`](crate::PanicRecorder).
///
/// # Example
///
/// ```
/// use panic_buffer::BufferEvent;
///
/// fn handle_event(event: BufferEvent) {
///     match event {
///         BufferEvent::BufferingStarted { sample_rate, window_capacity } => {
///             eprintln!("Buffering {} samples at {}Hz", window_capacity, sample_rate);
///         }
///         BufferEvent::BufferingStopped { reason, buffered_samples } => {
///             eprintln!("Stopped ({}), {} samples held", reason, buffered_samples);
///         }
///         BufferEvent::TemperatureChecked { reading } => {
///             eprintln!("Temperature: {:?}", reading);
///         }
///         BufferEvent::ReadFailed { error } => {
///             eprintln!("Read failed: {}", error);
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum BufferEvent {
    /// A session reached the recording state.
    BufferingStarted {
        /// Capture sample rate in Hz.
        sample_rate: u32,
        /// Window capacity in samples.
        window_capacity: usize,
    },

    /// A session ended, for whatever reason.
    ///
    /// The window is left intact; read it with
    /// [`buffered_audio()`](crate::PanicRecorder::buffered_audio).
    BufferingStopped {
        /// Why the session ended.
        reason: StopReason,
        /// Samples in the window when the session ended.
        buffered_samples: usize,
    },

    /// The thermal guard read the sensor.
    TemperatureChecked {
        /// The reading, or `None` if the sensor could not be read.
        reading: Option<Temperature>,
    },

    /// A device read failed. Capture continues with the next chunk.
    ReadFailed {
        /// Description of the error.
        error: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Callbacks run on the capture thread (or the thread calling
/// `start_buffering`), so they must return quickly.
pub type EventCallback = Arc<dyn Fn(BufferEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use panic_buffer::{event_callback, BufferEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(BufferEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Optional callback plus the dispatch helper used by the recorder.
#[derive(Clone, Default)]
pub(crate) struct EventSink {
    callback: Option<EventCallback>,
}

impl EventSink {
    pub fn new(callback: Option<EventCallback>) -> Self {
        Self { callback }
    }

    pub fn emit(&self, event: BufferEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_buffer_event_debug() {
        let event = BufferEvent::BufferingStarted {
            sample_rate: 8000,
            window_capacity: 120_000,
        };
        let debug = format!("{:?}", event);
        assert!(debug.contains("BufferingStarted"));
        assert!(debug.contains("120000"));
    }

    #[test]
    fn test_buffer_event_clone() {
        let event = BufferEvent::BufferingStopped {
            reason: StopReason::TimeLimit,
            buffered_samples: 42,
        };
        if let BufferEvent::BufferingStopped {
            reason,
            buffered_samples,
        } = event.clone()
        {
            assert_eq!(reason, StopReason::TimeLimit);
            assert_eq!(buffered_samples, 42);
        } else {
            panic!("Expected BufferingStopped variant");
        }
    }

    #[test]
    fn test_event_sink_dispatches() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = EventSink::new(Some(event_callback(move |e| {
            seen_clone.lock().push(format!("{e:?}"));
        })));

        sink.emit(BufferEvent::ReadFailed {
            error: "overrun".to_string(),
        });

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("overrun"));
    }

    #[test]
    fn test_event_sink_without_callback() {
        // No callback registered: emitting is a no-op
        EventSink::default().emit(BufferEvent::TemperatureChecked { reading: None });
    }
}
