//! Telemetry readings
//!
//! The publish loop pulls one reading per interval from a [`ReadingSource`]
//! and sends it JSON-encoded on the telemetry topic. The stock source is a
//! simulated sensor; hardware-backed sources implement the same trait.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Timestamp layout in telemetry payloads, UTC with microseconds
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H:%M:%S%.6fZ";

/// One sensor sample, serialized as the telemetry publish payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReading {
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub timestamp: String,
}

impl TelemetryReading {
    pub fn new(temperature: f64, pressure: f64, humidity: f64, taken_at: DateTime<Utc>) -> Self {
        Self {
            temperature,
            pressure,
            humidity,
            timestamp: taken_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Where telemetry samples come from
pub trait ReadingSource: Send {
    fn next_reading(&mut self) -> TelemetryReading;
}

/// Source producing uniform random samples in `[0, 1)`
///
/// Stands in for an analyzer until one is wired up.
pub struct SimulatedSensor;

impl ReadingSource for SimulatedSensor {
    fn next_reading(&mut self) -> TelemetryReading {
        TelemetryReading::new(
            rand::random::<f64>(),
            rand::random::<f64>(),
            rand::random::<f64>(),
            Utc::now(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_timestamp_uses_compact_utc_layout() {
        let taken_at = Utc
            .with_ymd_and_hms(2024, 3, 9, 14, 30, 5)
            .unwrap()
            .with_nanosecond(123_456_000)
            .unwrap();
        let reading = TelemetryReading::new(0.1, 0.2, 0.3, taken_at);

        assert_eq!(reading.timestamp, "20240309T14:30:05.123456Z");
    }

    #[test]
    fn test_reading_serializes_expected_fields() {
        let taken_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap();
        let reading = TelemetryReading::new(0.25, 0.5, 0.75, taken_at);

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["temperature"], 0.25);
        assert_eq!(value["pressure"], 0.5);
        assert_eq!(value["humidity"], 0.75);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_simulated_sensor_samples_unit_interval() {
        let mut sensor = SimulatedSensor;
        for _ in 0..100 {
            let reading = sensor.next_reading();
            for sample in [reading.temperature, reading.pressure, reading.humidity] {
                assert!((0.0..1.0).contains(&sample), "sample out of range: {sample}");
            }
        }
    }
}
