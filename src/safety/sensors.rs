// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-sensor evaluation state
//!
//! [`AnalogSensor`] turns raw ADC samples into calibrated distances, keeps
//! the last good reading across faults and records min/max statistics.
//! [`DigitalSensor`] debounces a raw input level and counts committed edges.

use std::time::{Duration, Instant};

use log::{debug, warn};

use super::{alarm_flags, calibrate, classify, SafetyZone, SensorStatus, ADC_SATURATED};
use crate::io::SensorIoError;

/// Calibration and classification parameters of one analog channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogParameters {
    pub reference_voltage: f32,
    /// Gain ×100
    pub gain: u16,
    /// Exponent offset ×100
    pub offset: u16,
    pub thresholds: [u16; 4],
}

/// Evaluation state of an analog distance sensor
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogSensor {
    /// Last raw sample read from the ADC
    pub raw: u16,
    /// Distance published for this sensor (last good value after a fault)
    pub distance: f32,
    pub zone: SafetyZone,
    pub status: SensorStatus,
    pub alarm_flags: u16,
    pub error_count: u16,
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
    pub last_update: Option<Instant>,
}

impl Default for AnalogSensor {
    fn default() -> Self {
        Self {
            raw: 0,
            distance: 0.0,
            zone: SafetyZone::Clear,
            status: SensorStatus::Ok,
            alarm_flags: 0,
            error_count: 0,
            min_distance: None,
            max_distance: None,
            last_update: None,
        }
    }
}

impl AnalogSensor {
    /// Evaluate one sample
    ///
    /// A failed read, a saturated sample or an unreadable voltage is a fault:
    /// the sensor reports `Error` with the fault flag, its error counter is
    /// incremented and the previous distance is kept.
    pub fn update(
        &mut self,
        channel: usize,
        sample: Result<u16, SensorIoError>,
        params: &AnalogParameters,
        now: Instant,
    ) -> SensorStatus {
        self.last_update = Some(now);

        let raw = match sample {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Analog sensor {} read failed: {}", channel + 1, e);
                self.record_fault();
                return self.status;
            }
        };
        self.raw = raw;

        if raw >= ADC_SATURATED {
            warn!("Analog sensor {} saturated (raw {})", channel + 1, raw);
            self.record_fault();
            return self.status;
        }

        let distance = calibrate(raw, params.reference_voltage, params.gain, params.offset);
        let zone = classify(distance, &params.thresholds);
        if zone == SafetyZone::Fault {
            debug!("Analog sensor {} unreadable (raw {})", channel + 1, raw);
            self.record_fault();
            return self.status;
        }

        self.distance = distance;
        self.zone = zone;
        self.status = zone.status();
        self.alarm_flags = zone.alarm_flag();
        self.min_distance = Some(self.min_distance.map_or(distance, |m| m.min(distance)));
        self.max_distance = Some(self.max_distance.map_or(distance, |m| m.max(distance)));
        self.status
    }

    fn record_fault(&mut self) {
        self.zone = SafetyZone::Fault;
        self.status = SensorStatus::Error;
        self.alarm_flags = alarm_flags::SENSOR_FAULT;
        self.error_count = self.error_count.saturating_add(1);
    }

    /// Distance as published in a 16-bit register
    pub fn distance_register(&self) -> u16 {
        to_register(self.distance)
    }
}

/// Round and saturate a distance into a register value
pub fn to_register(value: f32) -> u16 {
    // `as` saturates floats to the integer range and maps NaN to 0
    value.round() as u16
}

/// Evaluation state of a digital safety input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DigitalSensor {
    /// Debounced level, `None` until the first sample
    pub level: Option<bool>,
    pending: Option<(bool, Instant)>,
    pub triggered: bool,
    pub status: SensorStatus,
    pub change_count: u16,
    pub error_count: u16,
    pub last_edge: Option<Instant>,
    pub rising_edge: bool,
    pub falling_edge: bool,
}

impl DigitalSensor {
    /// Feed one raw sample taken at `now`
    ///
    /// A level that differs from the debounced one becomes a pending edge and
    /// is only committed once it has been observed for at least `debounce`.
    /// The first sample initialises the debounced level without counting an
    /// edge.
    pub fn update(
        &mut self,
        channel: usize,
        sample: Result<bool, SensorIoError>,
        active_level: bool,
        debounce: Duration,
        now: Instant,
    ) -> SensorStatus {
        self.rising_edge = false;
        self.falling_edge = false;

        let raw = match sample {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Digital input {} read failed: {}", channel + 1, e);
                self.error_count = self.error_count.saturating_add(1);
                self.triggered = false;
                self.status = SensorStatus::Error;
                return self.status;
            }
        };

        match self.level {
            None => self.level = Some(raw),
            Some(level) if level == raw => self.pending = None,
            Some(_) => match self.pending {
                Some((pending, since)) if pending == raw => {
                    if now.saturating_duration_since(since) >= debounce {
                        self.commit(channel, raw, now);
                    }
                }
                _ => {
                    if debounce.is_zero() {
                        self.commit(channel, raw, now);
                    } else {
                        self.pending = Some((raw, now));
                    }
                }
            },
        }

        self.triggered = self.level == Some(active_level);
        self.status = if self.triggered {
            SensorStatus::Critical
        } else {
            SensorStatus::Ok
        };
        self.status
    }

    fn commit(&mut self, channel: usize, level: bool, now: Instant) {
        debug!("Digital input {} changed to {}", channel + 1, level);
        self.level = Some(level);
        self.pending = None;
        self.change_count = self.change_count.saturating_add(1);
        self.last_edge = Some(now);
        self.rising_edge = level;
        self.falling_edge = !level;
    }

    /// Alarm flags of this input
    pub fn alarm_flags(&self) -> u16 {
        if self.triggered {
            alarm_flags::DIGITAL_TRIGGERED
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DEBOUNCE: Duration = Duration::from_millis(50);

    fn params() -> AnalogParameters {
        AnalogParameters {
            reference_voltage: 3.3,
            gain: 2786,
            offset: 115,
            thresholds: [10, 20, 30, 40],
        }
    }

    #[test]
    fn test_analog_zone_and_statistics() {
        let mut sensor = AnalogSensor::default();
        let now = Instant::now();

        // about 1.0 V, roughly 28 units away: zone 3
        assert_eq!(sensor.update(0, Ok(1241), &params(), now), SensorStatus::Warning);
        assert_eq!(sensor.zone, SafetyZone::Zone3);
        assert_eq!(sensor.alarm_flags, alarm_flags::ZONE3_WARNING);
        let first = sensor.distance;
        assert_relative_eq!(first, calibrate(1241, 3.3, 2786, 115));

        // about 3.2 V, roughly 7 units away: zone 1
        assert_eq!(sensor.update(0, Ok(4000), &params(), now), SensorStatus::Critical);
        assert_eq!(sensor.alarm_flags, alarm_flags::ZONE1_CRITICAL);
        assert_eq!(sensor.max_distance, Some(first));
        assert_eq!(sensor.min_distance, Some(sensor.distance));
        assert_eq!(sensor.error_count, 0);
    }

    #[test]
    fn test_analog_fault_keeps_last_good_distance() {
        let mut sensor = AnalogSensor::default();
        let now = Instant::now();
        sensor.update(1, Ok(400), &params(), now);
        let good = sensor.distance;
        assert_eq!(sensor.status, SensorStatus::Ok);

        for sample in [
            Ok(ADC_SATURATED),
            Ok(0),
            Err(SensorIoError::InvalidChannel(9)),
        ] {
            assert_eq!(sensor.update(1, sample, &params(), now), SensorStatus::Error);
            assert_eq!(sensor.alarm_flags, alarm_flags::SENSOR_FAULT);
            assert_relative_eq!(sensor.distance, good);
        }
        assert_eq!(sensor.error_count, 3);
        assert_eq!(sensor.min_distance, Some(good));
    }

    #[test]
    fn test_distance_register_saturates() {
        assert_eq!(to_register(27.6), 28);
        assert_eq!(to_register(1.0e9), u16::MAX);
        assert_eq!(to_register(f32::NAN), 0);
    }

    #[test]
    fn test_first_sample_initialises_without_edge() {
        let mut sensor = DigitalSensor::default();
        let now = Instant::now();
        assert_eq!(
            sensor.update(0, Ok(true), true, DEBOUNCE, now),
            SensorStatus::Critical
        );
        assert_eq!(sensor.change_count, 0);
        assert!(sensor.triggered);
        assert_eq!(sensor.alarm_flags(), alarm_flags::DIGITAL_TRIGGERED);
    }

    #[test]
    fn test_glitch_shorter_than_debounce_is_ignored() {
        let mut sensor = DigitalSensor::default();
        let start = Instant::now();
        sensor.update(0, Ok(false), true, DEBOUNCE, start);
        sensor.update(0, Ok(true), true, DEBOUNCE, start + Duration::from_millis(10));
        sensor.update(0, Ok(true), true, DEBOUNCE, start + Duration::from_millis(40));
        assert_eq!(sensor.status, SensorStatus::Ok);
        sensor.update(0, Ok(false), true, DEBOUNCE, start + Duration::from_millis(50));
        sensor.update(0, Ok(false), true, DEBOUNCE, start + Duration::from_millis(200));
        assert_eq!(sensor.change_count, 0);
        assert_eq!(sensor.level, Some(false));
    }

    #[test]
    fn test_persistent_change_counts_once() {
        let mut sensor = DigitalSensor::default();
        let start = Instant::now();
        sensor.update(2, Ok(false), true, DEBOUNCE, start);
        sensor.update(2, Ok(true), true, DEBOUNCE, start + Duration::from_millis(10));
        assert!(!sensor.triggered);
        sensor.update(2, Ok(true), true, DEBOUNCE, start + Duration::from_millis(60));
        assert!(sensor.triggered);
        assert!(sensor.rising_edge);
        assert_eq!(sensor.last_edge, Some(start + Duration::from_millis(60)));
        for ms in [80, 120, 500] {
            sensor.update(2, Ok(true), true, DEBOUNCE, start + Duration::from_millis(ms));
        }
        assert_eq!(sensor.change_count, 1);
        assert!(!sensor.rising_edge);
    }

    #[test]
    fn test_active_low_input() {
        let mut sensor = DigitalSensor::default();
        let now = Instant::now();
        assert_eq!(
            sensor.update(0, Ok(false), false, DEBOUNCE, now),
            SensorStatus::Critical
        );
        assert_eq!(
            sensor.update(0, Ok(true), false, Duration::ZERO, now),
            SensorStatus::Ok
        );
        assert!(sensor.rising_edge);
        assert_eq!(sensor.change_count, 1);
    }

    #[test]
    fn test_digital_read_error() {
        let mut sensor = DigitalSensor::default();
        let now = Instant::now();
        let failure = Err(SensorIoError::DigitalRead {
            channel: 0,
            reason: "open circuit".to_string(),
        });
        assert_eq!(
            sensor.update(0, failure, true, DEBOUNCE, now),
            SensorStatus::Error
        );
        assert_eq!(sensor.error_count, 1);
        assert_eq!(sensor.level, None);
    }

    #[test]
    fn test_read_error_clears_trigger() {
        let mut sensor = DigitalSensor::default();
        let now = Instant::now();
        sensor.update(1, Ok(true), true, DEBOUNCE, now);
        assert!(sensor.triggered);

        let failure = Err(SensorIoError::DigitalRead {
            channel: 1,
            reason: "open circuit".to_string(),
        });
        assert_eq!(
            sensor.update(1, failure, true, DEBOUNCE, now),
            SensorStatus::Error
        );
        assert!(!sensor.triggered);
        assert_eq!(sensor.alarm_flags(), 0);
        // The last debounced level is still reported
        assert_eq!(sensor.level, Some(true));
    }
}
