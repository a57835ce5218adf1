//! Device temperature sensing and the thermal guard.
//!
//! Long captures heat the device. The capture loop polls a
//! [`ThermalGuard`], which reads a [`TemperatureSensor`] at most once per
//! check interval and reports when the reading crosses the safety threshold.
//!
//! A failed read is [`ThermalStatus::Unknown`], never a temperature: a sensor
//! that cannot be read does not stop capture, and a genuine 0°C reading is
//! just a cold device.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::{SensorError, ThermalConfig};

/// Where Linux exposes batteries and chargers.
const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// A temperature in tenths of a degree Celsius.
///
/// This is the raw unit battery fuel gauges report (`463` is 46.3°C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature {
    tenths: i32,
}

impl Temperature {
    /// Creates a temperature from tenths of a degree Celsius.
    pub const fn from_tenths(tenths: i32) -> Self {
        Self { tenths }
    }

    /// Creates a temperature from whole degrees Celsius.
    pub const fn from_celsius(celsius: i32) -> Self {
        Self {
            tenths: celsius * 10,
        }
    }

    /// The raw reading in tenths of a degree.
    pub const fn tenths(self) -> i32 {
        self.tenths
    }

    /// Whole degrees Celsius, truncated toward zero.
    ///
    /// 45.9°C is 45, so it does not exceed a 45°C threshold.
    pub const fn celsius(self) -> i32 {
        self.tenths / 10
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tenths < 0 { "-" } else { "" };
        let abs = self.tenths.unsigned_abs();
        write!(f, "{sign}{}.{}°C", abs / 10, abs % 10)
    }
}

/// A source of device temperature readings.
///
/// Implementations must be cheap enough to call every few seconds from the
/// capture thread.
pub trait TemperatureSensor: Send + Sync {
    /// Reads the current temperature.
    ///
    /// # Errors
    ///
    /// Returns an error if no reading is available right now.
    fn read_temperature(&self) -> Result<Temperature, SensorError>;
}

/// Reads a Linux power-supply temperature from sysfs.
///
/// `/sys/class/power_supply/<supply>/temp` reports tenths of a degree
/// Celsius, the same unit as a phone's battery temperature.
#[derive(Debug, Clone)]
pub struct SysfsBatterySensor {
    path: PathBuf,
}

impl SysfsBatterySensor {
    /// Uses the given `temp` file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Finds the first power supply that exposes a temperature.
    pub fn discover() -> Option<Self> {
        Self::discover_in(Path::new(POWER_SUPPLY_DIR))
    }

    /// Finds the first supply under `root` that exposes a `temp` file.
    ///
    /// Supplies are tried in name order so discovery is stable across boots.
    pub fn discover_in(root: &Path) -> Option<Self> {
        let mut supplies: Vec<PathBuf> = std::fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        supplies.sort();

        let path = supplies
            .into_iter()
            .map(|supply| supply.join("temp"))
            .find(|temp| temp.is_file())?;

        tracing::debug!(path = %path.display(), "Found battery temperature sensor");
        Some(Self { path })
    }

    /// The file this sensor reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemperatureSensor for SysfsBatterySensor {
    fn read_temperature(&self) -> Result<Temperature, SensorError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| SensorError::io(&self.path, e))?;
        let value = raw.trim();
        value
            .parse::<i32>()
            .map(Temperature::from_tenths)
            .map_err(|_| SensorError::Parse {
                path: self.path.clone(),
                value: value.to_string(),
            })
    }
}

/// A sensor for devices without one. Every read fails, so the guard never trips.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSensor;

impl TemperatureSensor for NoSensor {
    fn read_temperature(&self) -> Result<Temperature, SensorError> {
        Err(SensorError::Unavailable)
    }
}

/// A sensor that replays a fixed sequence of readings.
///
/// `None` entries are failed reads. Once the script runs out the last entry
/// repeats. Intended for tests and demos.
///
/// # Example
///
/// ```
/// use panic_buffer::{ScriptedSensor, TemperatureSensor};
///
/// let sensor = ScriptedSensor::new([Some(300), None, Some(470)]);
/// assert_eq!(sensor.read_temperature().unwrap().celsius(), 30);
/// assert!(sensor.read_temperature().is_err());
/// assert_eq!(sensor.read_temperature().unwrap().celsius(), 47);
/// assert_eq!(sensor.read_temperature().unwrap().celsius(), 47);
/// ```
#[derive(Debug)]
pub struct ScriptedSensor {
    script: Mutex<VecDeque<Option<i32>>>,
    last: Mutex<Option<Option<i32>>>,
    reads: AtomicUsize,
}

impl ScriptedSensor {
    /// Creates a sensor replaying readings given in tenths of a degree.
    pub fn new(readings: impl IntoIterator<Item = Option<i32>>) -> Self {
        Self {
            script: Mutex::new(readings.into_iter().collect()),
            last: Mutex::new(None),
            reads: AtomicUsize::new(0),
        }
    }

    /// A sensor that always reports the same temperature.
    pub fn constant(temperature: Temperature) -> Self {
        Self::new([Some(temperature.tenths())])
    }

    /// A sensor whose reads always fail.
    pub fn failing() -> Self {
        Self::new([None])
    }

    /// How many times the sensor has been read.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn read_temperature(&self) -> Result<Temperature, SensorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut last = self.last.lock();
        let entry = match self.script.lock().pop_front() {
            Some(entry) => {
                *last = Some(entry);
                entry
            }
            None => (*last).ok_or(SensorError::Unavailable)?,
        };
        entry
            .map(Temperature::from_tenths)
            .ok_or(SensorError::Unavailable)
    }
}

/// Outcome of polling the thermal guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalStatus {
    /// The check interval has not elapsed since the last read.
    NotDue,
    /// The device is within limits.
    Normal(Temperature),
    /// The sensor could not be read.
    Unknown,
    /// The device is above the threshold; capture must stop.
    Overheated(Temperature),
}

/// Rate-limited threshold check over a [`TemperatureSensor`].
pub struct ThermalGuard {
    sensor: Arc<dyn TemperatureSensor>,
    config: ThermalConfig,
    last_check: Option<Instant>,
}

impl ThermalGuard {
    /// Creates a guard. The first poll always reads the sensor.
    pub fn new(sensor: Arc<dyn TemperatureSensor>, config: ThermalConfig) -> Self {
        Self {
            sensor,
            config,
            last_check: None,
        }
    }

    /// Reads the sensor if at least `check_interval` has passed since the
    /// last read, and classifies the result.
    pub fn poll(&mut self, now: Instant) -> ThermalStatus {
        if let Some(last) = self.last_check {
            if now.saturating_duration_since(last) < self.config.check_interval {
                return ThermalStatus::NotDue;
            }
        }
        self.last_check = Some(now);

        match self.sensor.read_temperature() {
            Ok(temperature) if temperature.celsius() > self.config.threshold_celsius => {
                ThermalStatus::Overheated(temperature)
            }
            Ok(temperature) => ThermalStatus::Normal(temperature),
            Err(e) => {
                tracing::debug!(error = %e, "Temperature read failed, thermal guard skipped");
                ThermalStatus::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn guard(sensor: ScriptedSensor, interval: Duration) -> ThermalGuard {
        ThermalGuard::new(
            Arc::new(sensor),
            ThermalConfig {
                threshold_celsius: 45,
                check_interval: interval,
            },
        )
    }

    #[test]
    fn test_temperature_units() {
        let t = Temperature::from_tenths(463);
        assert_eq!(t.tenths(), 463);
        assert_eq!(t.celsius(), 46);
        assert_eq!(Temperature::from_celsius(45).tenths(), 450);
    }

    #[test]
    fn test_celsius_truncates() {
        assert_eq!(Temperature::from_tenths(459).celsius(), 45);
        assert_eq!(Temperature::from_tenths(-59).celsius(), -5);
    }

    #[test]
    fn test_temperature_display() {
        assert_eq!(Temperature::from_tenths(463).to_string(), "46.3°C");
        assert_eq!(Temperature::from_tenths(0).to_string(), "0.0°C");
        assert_eq!(Temperature::from_tenths(-5).to_string(), "-0.5°C");
    }

    #[test]
    fn test_first_poll_reads_immediately() {
        let mut guard = guard(ScriptedSensor::constant(Temperature::from_celsius(30)), Duration::from_secs(5));
        assert_eq!(
            guard.poll(Instant::now()),
            ThermalStatus::Normal(Temperature::from_celsius(30))
        );
    }

    #[test]
    fn test_poll_respects_interval() {
        let sensor = Arc::new(ScriptedSensor::constant(Temperature::from_celsius(30)));
        let mut guard = ThermalGuard::new(sensor.clone(), ThermalConfig::default());
        let start = Instant::now();

        guard.poll(start);
        assert_eq!(guard.poll(start + Duration::from_secs(4)), ThermalStatus::NotDue);
        assert_eq!(sensor.reads(), 1);

        assert!(matches!(
            guard.poll(start + Duration::from_secs(5)),
            ThermalStatus::Normal(_)
        ));
        assert_eq!(sensor.reads(), 2);
    }

    #[test]
    fn test_above_threshold_overheats() {
        let mut guard = guard(ScriptedSensor::new([Some(400), Some(460)]), Duration::ZERO);
        let now = Instant::now();

        assert!(matches!(guard.poll(now), ThermalStatus::Normal(_)));
        assert_eq!(
            guard.poll(now),
            ThermalStatus::Overheated(Temperature::from_tenths(460))
        );
    }

    #[test]
    fn test_exactly_threshold_is_normal() {
        let mut guard = guard(ScriptedSensor::new([Some(450), Some(459)]), Duration::ZERO);
        let now = Instant::now();
        assert!(matches!(guard.poll(now), ThermalStatus::Normal(_)));
        assert!(matches!(guard.poll(now), ThermalStatus::Normal(_)));
    }

    #[test]
    fn test_failed_read_is_unknown() {
        let mut guard = guard(ScriptedSensor::failing(), Duration::ZERO);
        assert_eq!(guard.poll(Instant::now()), ThermalStatus::Unknown);
    }

    #[test]
    fn test_zero_celsius_is_a_reading() {
        let mut guard = guard(ScriptedSensor::constant(Temperature::from_tenths(0)), Duration::ZERO);
        assert_eq!(
            guard.poll(Instant::now()),
            ThermalStatus::Normal(Temperature::from_tenths(0))
        );
    }

    #[test]
    fn test_no_sensor_never_reads() {
        assert!(matches!(
            NoSensor.read_temperature(),
            Err(SensorError::Unavailable)
        ));
    }

    #[test]
    fn test_scripted_sensor_empty_script() {
        let sensor = ScriptedSensor::new(std::iter::empty());
        assert!(sensor.read_temperature().is_err());
    }

    #[test]
    fn test_sysfs_sensor_reads_tenths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp");
        std::fs::write(&path, "312\n").unwrap();

        let sensor = SysfsBatterySensor::new(&path);
        assert_eq!(
            sensor.read_temperature().unwrap(),
            Temperature::from_tenths(312)
        );
    }

    #[test]
    fn test_sysfs_sensor_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp");
        std::fs::write(&path, "warm").unwrap();

        let err = SysfsBatterySensor::new(&path).read_temperature().unwrap_err();
        assert!(matches!(err, SensorError::Parse { .. }));
    }

    #[test]
    fn test_sysfs_sensor_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SysfsBatterySensor::new(dir.path().join("temp"))
            .read_temperature()
            .unwrap_err();
        assert!(matches!(err, SensorError::Io { .. }));
    }

    #[test]
    fn test_discover_skips_supplies_without_temp() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("AC")).unwrap();
        std::fs::create_dir(dir.path().join("BAT0")).unwrap();
        std::fs::write(dir.path().join("BAT0").join("temp"), "295").unwrap();

        let sensor = SysfsBatterySensor::discover_in(dir.path()).unwrap();
        assert_eq!(sensor.path(), dir.path().join("BAT0").join("temp"));
    }

    #[test]
    fn test_discover_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SysfsBatterySensor::discover_in(dir.path()).is_none());
    }
}
