//! Builder pattern for `PanicRecorder`.

use std::sync::Arc;

use crate::event::EventSink;
use crate::pipeline::SampleWindow;
use crate::source::{CpalInput, InputDevice};
use crate::thermal::{NoSensor, SysfsBatterySensor, TemperatureSensor};
use crate::{event_callback, BufferConfig, BufferError, BufferEvent, PanicRecorder, PermissionGate};

/// Builder for configuring and creating a [`PanicRecorder`].
///
/// # Example
///
/// ```no_run
/// use panic_buffer::{BufferConfig, CpalInput, PanicRecorder};
/// use std::time::Duration;
///
/// let recorder = PanicRecorder::builder()
///     .config(BufferConfig {
///         window: Duration::from_secs(30),
///         ..Default::default()
///     })
///     .device(CpalInput::named("USB"))
///     .on_event(|e| tracing::info!(?e, "buffer event"))
///     .build()?;
///
/// recorder.start_buffering()?;
/// # Ok::<(), panic_buffer::BufferError>(())
/// ```
#[must_use]
pub struct PanicRecorderBuilder {
    config: BufferConfig,
    device: Option<Arc<dyn InputDevice>>,
    sensor: Option<Arc<dyn TemperatureSensor>>,
    permission: Option<Box<dyn PermissionGate>>,
    on_event: Option<crate::EventCallback>,
}

impl Default for PanicRecorderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PanicRecorderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: BufferConfig::default(),
            device: None,
            sensor: None,
            permission: None,
            on_event: None,
        }
    }

    /// Sets the buffering configuration.
    pub fn config(mut self, config: BufferConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the input device. Defaults to the system's default microphone.
    pub fn device(mut self, device: impl InputDevice + 'static) -> Self {
        self.device = Some(Arc::new(device));
        self
    }

    /// Sets the temperature sensor.
    ///
    /// Defaults to the first sysfs power supply reporting a temperature, or
    /// [`NoSensor`] if there is none.
    pub fn sensor(mut self, sensor: impl TemperatureSensor + 'static) -> Self {
        self.sensor = Some(Arc::new(sensor));
        self
    }

    /// Sets a temperature sensor the caller keeps a handle to.
    pub fn shared_sensor(mut self, sensor: Arc<dyn TemperatureSensor>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Sets the microphone permission gate. Defaults to always granted.
    pub fn permission(mut self, gate: impl PermissionGate + 'static) -> Self {
        self.permission = Some(Box::new(gate));
        self
    }

    /// Sets the event callback for runtime notifications.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(BufferEvent) + Send + Sync + 'static,
    {
        self.on_event = Some(event_callback(callback));
        self
    }

    /// Validates the configuration and creates the recorder.
    ///
    /// Nothing is opened until
    /// [`start_buffering()`](PanicRecorder::start_buffering) is called.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is unusable.
    pub fn build(self) -> Result<PanicRecorder, BufferError> {
        self.config.validate()?;

        let device = self
            .device
            .unwrap_or_else(|| Arc::new(CpalInput::default_device()));

        let sensor = self.sensor.unwrap_or_else(|| match SysfsBatterySensor::discover() {
            Some(sensor) => Arc::new(sensor),
            None => {
                tracing::debug!("No temperature sensor found, thermal guard disabled");
                Arc::new(NoSensor)
            }
        });

        let permission = self.permission.unwrap_or_else(|| Box::new(true));
        let window = SampleWindow::shared(self.config.window_capacity());

        Ok(PanicRecorder::from_parts(
            self.config,
            device,
            sensor,
            permission,
            window,
            EventSink::new(self.on_event),
        ))
    }
}
