//! CPAL device wrapper for audio capture.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig as CpalStreamConfig, SupportedBufferSize};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;

use super::{CaptureFormat, InputDevice, InputStream};
use crate::format::{f32_to_i16, FormatConverter};
use crate::BufferError;

/// Seconds of native audio the callback hand-off buffer holds.
const HANDOFF_SECONDS: usize = 2;

/// Shortest chunk the capture loop reads, regardless of device buffer size.
const MIN_CHUNK_DURATION: Duration = Duration::from_millis(20);

/// Chunk duration when the device does not report a buffer size range.
const DEFAULT_CHUNK_DURATION: Duration = Duration::from_millis(40);

/// How often a blocked read checks the hand-off buffer.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A blocked read gives up after this many chunk durations and returns
/// whatever it has.
const READ_TIMEOUT_CHUNKS: u32 = 4;

/// Specifies which audio input device to use.
#[derive(Debug, Clone, Default)]
enum DeviceSelection {
    /// Use the system's default input device.
    #[default]
    SystemDefault,
    /// Use a specific device by name.
    ByName(String),
}

/// The microphone, via CPAL.
///
/// The CPAL callback converts to i16 and pushes into a lock-free SPSC ring
/// buffer; [`InputStream::read`] drains it, downmixes and resamples to the
/// capture format, and blocks until a full chunk is ready.
#[derive(Debug, Clone, Default)]
pub struct CpalInput {
    selection: DeviceSelection,
}

impl CpalInput {
    /// Uses the system's default input device.
    pub fn default_device() -> Self {
        Self {
            selection: DeviceSelection::SystemDefault,
        }
    }

    /// Uses the input device with the given name.
    ///
    /// Matching tries an exact match, then a case-insensitive match, then a
    /// case-insensitive substring match.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            selection: DeviceSelection::ByName(name.into()),
        }
    }

    fn resolve(&self) -> Result<Device, BufferError> {
        let host = cpal::default_host();
        match &self.selection {
            DeviceSelection::SystemDefault => host
                .default_input_device()
                .ok_or(BufferError::NoDefaultDevice),
            DeviceSelection::ByName(name) => find_device(&host, name),
        }
    }
}

/// Finds an input device by name: exact, then case-insensitive, then substring.
fn find_device(host: &cpal::Host, wanted: &str) -> Result<Device, BufferError> {
    let devices: Vec<(String, Device)> = host
        .input_devices()
        .map_err(|e| BufferError::BackendError(e.to_string()))?
        .filter_map(|d| d.name().ok().map(|name| (name, d)))
        .collect();

    let wanted_lower = wanted.to_lowercase();
    let position = devices
        .iter()
        .position(|(name, _)| name == wanted)
        .or_else(|| {
            devices
                .iter()
                .position(|(name, _)| name.to_lowercase() == wanted_lower)
        })
        .or_else(|| {
            devices
                .iter()
                .position(|(name, _)| name.to_lowercase().contains(&wanted_lower))
        });

    match position {
        Some(index) => {
            let (name, device) = devices.into_iter().nth(index).ok_or_else(|| {
                BufferError::BackendError("device list changed during lookup".to_string())
            })?;
            tracing::debug!(requested = wanted, found = %name, "Matched audio device");
            Ok(device)
        }
        None => Err(BufferError::DeviceNotFound {
            name: wanted.to_string(),
            available: devices.into_iter().map(|(name, _)| name).collect(),
        }),
    }
}

/// Converts a device buffer size (native frames) to capture samples.
fn chunk_len_for(buffer_size: &SupportedBufferSize, native_rate: u32, target_rate: u32) -> usize {
    let min_len = duration_to_samples(MIN_CHUNK_DURATION, target_rate);
    let len = match buffer_size {
        SupportedBufferSize::Range { min, .. } if native_rate > 0 => {
            (u64::from(*min) * u64::from(target_rate) / u64::from(native_rate)) as usize
        }
        _ => duration_to_samples(DEFAULT_CHUNK_DURATION, target_rate),
    };
    len.max(min_len).max(1)
}

fn duration_to_samples(duration: Duration, rate: u32) -> usize {
    (f64::from(rate) * duration.as_secs_f64()) as usize
}

impl InputDevice for CpalInput {
    fn name(&self) -> String {
        match &self.selection {
            DeviceSelection::SystemDefault => {
                super::default_input_device_name().unwrap_or_else(|| "default".to_string())
            }
            DeviceSelection::ByName(name) => name.clone(),
        }
    }

    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn InputStream>, BufferError> {
        let device = self.resolve()?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| BufferError::device_init(e.to_string()))?;

        let native_rate = supported.sample_rate().0;
        let native_channels = supported.channels();
        let sample_format = supported.sample_format();
        let chunk_len = chunk_len_for(supported.buffer_size(), native_rate, format.sample_rate);
        let cpal_config: CpalStreamConfig = supported.into();

        tracing::info!(
            device = %device_name,
            native_rate,
            native_channels,
            ?sample_format,
            target_rate = format.sample_rate,
            chunk_len,
            "Opening audio input"
        );

        let capacity = native_rate as usize * usize::from(native_channels) * HANDOFF_SECONDS;
        let (producer, consumer) = HeapRb::<i16>::new(capacity.max(1)).split();
        let stream_error = Arc::new(Mutex::new(None));

        let stream = match sample_format {
            SampleFormat::I16 => {
                build_i16_stream(&device, &cpal_config, producer, stream_error.clone())?
            }
            SampleFormat::F32 => {
                build_f32_stream(&device, &cpal_config, producer, stream_error.clone())?
            }
            other => {
                return Err(BufferError::UnsupportedFormat {
                    format: format!("{other:?}"),
                });
            }
        };

        let chunk_duration = Duration::from_secs_f64(chunk_len as f64 / f64::from(format.sample_rate.max(1)));

        Ok(Box::new(CpalStream {
            stream,
            consumer,
            converter: FormatConverter::new(native_rate, native_channels, format.sample_rate),
            scratch: vec![0; capacity.clamp(1, 4096)],
            pending: Vec::new(),
            chunk_len,
            read_timeout: (chunk_duration * READ_TIMEOUT_CHUNKS).max(Duration::from_millis(50)),
            stream_error,
        }))
    }
}

fn build_i16_stream(
    device: &Device,
    config: &CpalStreamConfig,
    mut producer: ringbuf::HeapProd<i16>,
    stream_error: Arc<Mutex<Option<String>>>,
) -> Result<Stream, BufferError> {
    device
        .build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                // Non-blocking push - drops samples if the reader fell behind
                let _ = producer.push_slice(data);
            },
            move |err| {
                tracing::error!("Audio stream error: {}", err);
                *stream_error.lock() = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| BufferError::device_init(e.to_string()))
}

fn build_f32_stream(
    device: &Device,
    config: &CpalStreamConfig,
    mut producer: ringbuf::HeapProd<i16>,
    stream_error: Arc<Mutex<Option<String>>>,
) -> Result<Stream, BufferError> {
    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    let _ = producer.try_push(f32_to_i16(sample));
                }
            },
            move |err| {
                tracing::error!("Audio stream error: {}", err);
                *stream_error.lock() = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| BufferError::device_init(e.to_string()))
}

/// A running CPAL input. Dropping it stops and releases the device.
struct CpalStream {
    stream: Stream,
    consumer: ringbuf::HeapCons<i16>,
    converter: FormatConverter,
    /// Native samples popped from the hand-off buffer.
    scratch: Vec<i16>,
    /// Converted samples not yet handed to the capture loop.
    pending: Vec<i16>,
    chunk_len: usize,
    read_timeout: Duration,
    stream_error: Arc<Mutex<Option<String>>>,
}

impl CpalStream {
    /// Moves everything in the hand-off buffer through the converter.
    fn drain_handoff(&mut self) {
        loop {
            let popped = self.consumer.pop_slice(&mut self.scratch);
            if popped == 0 {
                break;
            }
            self.converter
                .process(&self.scratch[..popped], &mut self.pending);
        }
    }
}

impl InputStream for CpalStream {
    fn start(&mut self) -> Result<(), BufferError> {
        self.stream
            .play()
            .map_err(|e| BufferError::device_init(e.to_string()))
    }

    fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, BufferError> {
        if let Some(reason) = self.stream_error.lock().take() {
            return Err(BufferError::read_failed(reason));
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            self.drain_handoff();
            if self.pending.len() >= buf.len() || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        let count = self.pending.len().min(buf.len());
        buf[..count].copy_from_slice(&self.pending[..count]);
        self.pending.drain(..count);
        Ok(count)
    }

    fn stop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::debug!(error = %e, "Failed to pause audio stream");
        }
    }
}
