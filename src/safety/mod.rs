// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Safety monitoring
//!
//! Analog distance sensors are calibrated and classified into zones, digital
//! safety inputs are debounced, and the per-sensor results are aggregated
//! into one system status with a fixed precedence:
//!
//! `CRITICAL > WARNING > ERROR > OK`
//!
//! ## Zone Classification
//!
//! | Distance | Zone | Sensor status | Alarm flag |
//! |----------|------|---------------|------------|
//! | 0 (unreadable) | fault | ERROR | 0x10 |
//! | <= Z1 | zone 1 | CRITICAL | 0x08 |
//! | <= Z2 | zone 2 | WARNING | 0x04 |
//! | <= Z3 | zone 3 | WARNING | 0x02 |
//! | <= Z4 | zone 4 | OK | 0x01 |
//! | > Z4 | clear | OK | 0 |

use serde::{Deserialize, Serialize};

pub mod daemon;
pub mod monitor;
pub mod sensors;
pub mod shared_state;

pub use daemon::{SafetyCommand, SafetyMonitorDaemon};
pub use monitor::{SafetyMonitor, SafetyParameters, SafetySystemState};
pub use sensors::{AnalogSensor, DigitalSensor};
pub use shared_state::{SafetySnapshot, SharedSafetyState};

/// Alarm flag bits published per sensor and OR-ed into the zone status register
pub mod alarm_flags {
    pub const ZONE4_ALERT: u16 = 0x01;
    pub const ZONE3_WARNING: u16 = 0x02;
    pub const ZONE2_WARNING: u16 = 0x04;
    pub const ZONE1_CRITICAL: u16 = 0x08;
    pub const SENSOR_FAULT: u16 = 0x10;
    pub const DIGITAL_TRIGGERED: u16 = 0x08;
}

/// Analog samples at or above this value are saturated
pub const ADC_SATURATED: u16 = 4095;
/// ADC resolution used for the voltage conversion
pub const ADC_RESOLUTION: f32 = 4096.0;
/// Below this voltage the sensor is considered unreadable
pub const MIN_SENSOR_VOLTAGE: f32 = 0.1;

/// Status of a single sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum SensorStatus {
    #[default]
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Error = 4,
}

/// System-wide safety status, as published in the status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum SafetyStatus {
    #[default]
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Emergency = 3,
    Error = 4,
}

impl SafetyStatus {
    pub fn register_value(self) -> u16 {
        self as u16
    }

    /// Statuses that assert and latch the protective outputs
    pub fn is_protective(self) -> bool {
        matches!(self, SafetyStatus::Critical | SafetyStatus::Emergency)
    }
}

impl From<SensorStatus> for SafetyStatus {
    fn from(status: SensorStatus) -> Self {
        match status {
            SensorStatus::Ok => SafetyStatus::Ok,
            SensorStatus::Warning => SafetyStatus::Warning,
            SensorStatus::Critical => SafetyStatus::Critical,
            SensorStatus::Error => SafetyStatus::Error,
        }
    }
}

/// Aggregate sensor statuses in scan order
///
/// This is a precedence chain rather than a numeric maximum: `Error` has the
/// largest register value but the lowest priority after `Ok`.
pub fn aggregate_status<I>(statuses: I) -> SafetyStatus
where
    I: IntoIterator<Item = SensorStatus>,
{
    let mut overall = SafetyStatus::Ok;
    for status in statuses {
        match status {
            SensorStatus::Critical => return SafetyStatus::Critical,
            SensorStatus::Warning => overall = SafetyStatus::Warning,
            SensorStatus::Error if overall == SafetyStatus::Ok => overall = SafetyStatus::Error,
            _ => {}
        }
    }
    overall
}

/// Distance band an analog reading falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyZone {
    Fault,
    Zone1,
    Zone2,
    Zone3,
    Zone4,
    Clear,
}

impl SafetyZone {
    pub fn status(self) -> SensorStatus {
        match self {
            SafetyZone::Fault => SensorStatus::Error,
            SafetyZone::Zone1 => SensorStatus::Critical,
            SafetyZone::Zone2 | SafetyZone::Zone3 => SensorStatus::Warning,
            SafetyZone::Zone4 | SafetyZone::Clear => SensorStatus::Ok,
        }
    }

    pub fn alarm_flag(self) -> u16 {
        match self {
            SafetyZone::Fault => alarm_flags::SENSOR_FAULT,
            SafetyZone::Zone1 => alarm_flags::ZONE1_CRITICAL,
            SafetyZone::Zone2 => alarm_flags::ZONE2_WARNING,
            SafetyZone::Zone3 => alarm_flags::ZONE3_WARNING,
            SafetyZone::Zone4 => alarm_flags::ZONE4_ALERT,
            SafetyZone::Clear => 0,
        }
    }
}

/// Classify a calibrated distance against the ascending zone thresholds
pub fn classify(distance: f32, thresholds: &[u16; 4]) -> SafetyZone {
    if distance <= 0.0 || distance.is_nan() {
        SafetyZone::Fault
    } else if distance <= f32::from(thresholds[0]) {
        SafetyZone::Zone1
    } else if distance <= f32::from(thresholds[1]) {
        SafetyZone::Zone2
    } else if distance <= f32::from(thresholds[2]) {
        SafetyZone::Zone3
    } else if distance <= f32::from(thresholds[3]) {
        SafetyZone::Zone4
    } else {
        SafetyZone::Clear
    }
}

/// Convert a raw ADC sample to a voltage
pub fn raw_to_voltage(raw: u16, reference_voltage: f32) -> f32 {
    f32::from(raw) * reference_voltage / ADC_RESOLUTION
}

/// Calibrated distance of a raw sample
///
/// `distance = gain/100 * voltage^(-offset/100)`; a voltage below 0.1 V
/// yields 0, meaning the sensor is unreadable.
pub fn calibrate(raw: u16, reference_voltage: f32, gain: u16, offset: u16) -> f32 {
    let voltage = raw_to_voltage(raw, reference_voltage);
    if voltage < MIN_SENSOR_VOLTAGE {
        return 0.0;
    }
    f32::from(gain) / 100.0 * voltage.powf(f32::from(offset) / -100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const THRESHOLDS: [u16; 4] = [500, 1000, 1500, 2000];

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(classify(0.0, &THRESHOLDS), SafetyZone::Fault);
        assert_eq!(classify(500.0, &THRESHOLDS), SafetyZone::Zone1);
        assert_eq!(classify(500.001, &THRESHOLDS), SafetyZone::Zone2);
        assert_eq!(classify(1000.0, &THRESHOLDS), SafetyZone::Zone2);
        assert_eq!(classify(1500.0, &THRESHOLDS), SafetyZone::Zone3);
        assert_eq!(classify(2000.0, &THRESHOLDS), SafetyZone::Zone4);
        assert_eq!(classify(2000.001, &THRESHOLDS), SafetyZone::Clear);
    }

    #[test]
    fn test_zone_status_and_flags() {
        assert_eq!(SafetyZone::Zone1.status(), SensorStatus::Critical);
        assert_eq!(SafetyZone::Zone1.alarm_flag(), 0x08);
        assert_eq!(SafetyZone::Zone2.status(), SensorStatus::Warning);
        assert_eq!(SafetyZone::Zone2.alarm_flag(), 0x04);
        assert_eq!(SafetyZone::Zone3.status(), SensorStatus::Warning);
        assert_eq!(SafetyZone::Zone3.alarm_flag(), 0x02);
        assert_eq!(SafetyZone::Zone4.status(), SensorStatus::Ok);
        assert_eq!(SafetyZone::Zone4.alarm_flag(), 0x01);
        assert_eq!(SafetyZone::Clear.alarm_flag(), 0);
        assert_eq!(SafetyZone::Fault.status(), SensorStatus::Error);
    }

    #[test]
    fn test_critical_beats_warning() {
        use SensorStatus::*;
        assert_eq!(aggregate_status([Critical, Warning]), SafetyStatus::Critical);
        assert_eq!(aggregate_status([Warning, Critical]), SafetyStatus::Critical);
        assert_eq!(aggregate_status([Error, Critical, Ok]), SafetyStatus::Critical);
    }

    #[test]
    fn test_error_is_below_warning() {
        use SensorStatus::*;
        assert_eq!(aggregate_status([Error, Warning]), SafetyStatus::Warning);
        assert_eq!(aggregate_status([Warning, Error]), SafetyStatus::Warning);
        assert_eq!(aggregate_status([Ok, Error, Ok]), SafetyStatus::Error);
        assert_eq!(aggregate_status([Ok, Ok]), SafetyStatus::Ok);
        assert_eq!(aggregate_status([]), SafetyStatus::Ok);
    }

    #[test]
    fn test_calibration_formula() {
        // raw 2048 at 3.3 V is 1.65 V
        let distance = calibrate(2048, 3.3, 2786, 115);
        assert_relative_eq!(distance, 27.86 * 1.65f32.powf(-1.15), max_relative = 1e-5);
        assert_relative_eq!(raw_to_voltage(4096, 3.3), 3.3);
    }

    #[test]
    fn test_low_voltage_reads_zero() {
        // 124 * 3.3 / 4096 is just under 0.1 V
        assert_eq!(calibrate(124, 3.3, 2786, 115), 0.0);
        assert_eq!(calibrate(0, 3.3, 2786, 115), 0.0);
        assert!(calibrate(125, 3.3, 2786, 115) > 0.0);
    }

    #[test]
    fn test_register_values() {
        assert_eq!(SafetyStatus::Emergency.register_value(), 3);
        assert_eq!(SafetyStatus::Error.register_value(), 4);
        assert!(SafetyStatus::Emergency.is_protective());
        assert!(!SafetyStatus::Warning.is_protective());
    }
}
