// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Safety monitor cycle
//!
//! One call to [`SafetyMonitor::process`] runs a complete cycle:
//!
//! 1. snapshot the configuration registers under one lock
//! 2. sample and evaluate every enabled analog sensor, then every enabled
//!    digital input
//! 3. aggregate the sensor statuses (safety mode 4 forces EMERGENCY)
//! 4. update the protective latch
//! 5. publish statuses, diagnostics and output states under one lock
//! 6. drive the relay and indicator outputs
//!
//! The register lock is never held while sensors are sampled or outputs are
//! driven.
//!
//! ## Latching
//!
//! A CRITICAL or EMERGENCY cycle asserts relay 1 and the indicator and sets
//! the reset flag register (0x004C). While the flag is set and the outputs
//! are asserted, the published status stays CRITICAL (or EMERGENCY). The
//! flag is cleared by the master writing 0, by
//! [`SafetyMonitor::acknowledge_latch`], or by an OK cycle when auto reset is
//! enabled. Outputs are released on the first OK cycle with the flag clear.
//!
//! The flag register is only ever set or cleared by the cycle, never copied
//! back from the snapshot, so a write by the master while the sensors are
//! sampled is kept.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use super::sensors::{to_register, AnalogParameters, AnalogSensor, DigitalSensor};
use super::{aggregate_status, SafetyStatus, SensorStatus};
use crate::io::{OutputChannel, SensorIo};
use crate::modbus::register_map::{lock_registers, RegisterMap, SharedRegisterMap};
use crate::modbus::registers::*;

/// Effect of one cycle on the reset flag register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatchFlag {
    Set,
    Clear,
    Keep,
}

/// Default ADC reference voltage
pub const DEFAULT_REFERENCE_VOLTAGE: f32 = 3.3;

/// Configuration registers captured at the start of a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyParameters {
    pub analog_enabled: [bool; ANALOG_CHANNELS],
    pub gain: u16,
    pub shared_offset: u16,
    pub analog_offsets: [u16; ANALOG_CHANNELS],
    pub thresholds: [u16; 4],
    pub proximity_threshold: u16,
    pub digital_enabled: [bool; DIGITAL_CHANNELS],
    pub digital_active_level: [bool; DIGITAL_CHANNELS],
    pub debounce: Duration,
    pub auto_reset: bool,
    pub safety_mode: u16,
    pub relay_control: [bool; RELAY_CHANNELS],
    pub latched: bool,
}

impl SafetyParameters {
    /// Read every parameter from an already locked register map
    pub fn load(map: &RegisterMap) -> Self {
        let flag = |base: u16, i: usize| map.holding(channel(base, i)) != 0;
        Self {
            analog_enabled: std::array::from_fn(|i| flag(REG_ANALOG_1_ENABLE, i)),
            gain: map.holding(REG_ANALOG_COEFFICIENT),
            shared_offset: map.holding(REG_ANALOG_CALIBRATION),
            analog_offsets: std::array::from_fn(|i| map.holding(channel(REG_ANALOG_1_OFFSET, i))),
            thresholds: std::array::from_fn(|i| {
                map.holding(channel(REG_SAFETY_ZONE1_THRESHOLD, i))
            }),
            proximity_threshold: map.holding(REG_PROXIMITY_THRESHOLD),
            digital_enabled: std::array::from_fn(|i| flag(REG_DI1_ENABLE, i)),
            digital_active_level: std::array::from_fn(|i| flag(REG_DI1_ACTIVE_LEVEL, i)),
            debounce: Duration::from_millis(u64::from(map.holding(REG_SAFETY_RESPONSE_TIME))),
            auto_reset: map.holding(REG_AUTO_RESET_ENABLE) != 0,
            safety_mode: map.holding(REG_SAFETY_MODE),
            relay_control: std::array::from_fn(|i| flag(REG_RELAY1_CONTROL, i)),
            latched: map.holding(REG_SAFETY_RESET_FLAG) != 0,
        }
    }

    /// Calibration offset of an analog channel; a non-zero per-channel
    /// offset overrides the shared one
    pub fn offset_for(&self, channel: usize) -> u16 {
        match self.analog_offsets[channel] {
            0 => self.shared_offset,
            offset => offset,
        }
    }
}

/// System-wide result of the latest cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SafetySystemState {
    /// Status as published (held at CRITICAL/EMERGENCY while latched)
    pub status: SafetyStatus,
    /// Raw aggregate of this cycle's sensor statuses
    pub aggregate: SafetyStatus,
    pub emergency_stop_active: bool,
    pub latched: bool,
    pub protective_outputs: bool,
    pub proximity_alert: bool,
    pub zone_status: u16,
    pub error_code: u16,
    pub system_error: u16,
    pub relay_status: u16,
    #[serde(skip)]
    pub uptime: Duration,
    #[serde(skip)]
    pub last_check: Option<Instant>,
    pub warning_count: u16,
    pub critical_count: u16,
    pub emergency_count: u16,
    pub cycle_count: u16,
}

/// Safety state machine evaluating the sensors once per cycle
#[derive(Debug)]
pub struct SafetyMonitor {
    reference_voltage: f32,
    analog: [AnalogSensor; ANALOG_CHANNELS],
    digital: [DigitalSensor; DIGITAL_CHANNELS],
    state: SafetySystemState,
    /// Status held while the latch is set
    latched_status: SafetyStatus,
    started: Instant,
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_VOLTAGE)
    }
}

impl SafetyMonitor {
    pub fn new(reference_voltage: f32) -> Self {
        Self::new_at(reference_voltage, Instant::now())
    }

    /// Create a monitor whose uptime is measured from `started`
    pub fn new_at(reference_voltage: f32, started: Instant) -> Self {
        Self {
            reference_voltage,
            analog: Default::default(),
            digital: Default::default(),
            state: SafetySystemState::default(),
            latched_status: SafetyStatus::Critical,
            started,
        }
    }

    pub fn state(&self) -> &SafetySystemState {
        &self.state
    }

    pub fn analog_sensors(&self) -> &[AnalogSensor; ANALOG_CHANNELS] {
        &self.analog
    }

    pub fn digital_sensors(&self) -> &[DigitalSensor; DIGITAL_CHANNELS] {
        &self.digital
    }

    /// Clear the protective latch as if the master had written 0 to the
    /// reset flag register
    pub fn acknowledge_latch(&self, registers: &SharedRegisterMap) {
        let mut map = lock_registers(registers);
        if map.holding(REG_SAFETY_RESET_FLAG) != 0 {
            info!("Safety latch acknowledged");
        }
        map.set_holding(REG_SAFETY_RESET_FLAG, 0);
    }

    /// Run one cycle now
    pub fn process(
        &mut self,
        io: &mut dyn SensorIo,
        registers: &SharedRegisterMap,
    ) -> SafetySystemState {
        self.process_at(Instant::now(), io, registers)
    }

    /// Run one cycle at the given instant
    pub fn process_at(
        &mut self,
        now: Instant,
        io: &mut dyn SensorIo,
        registers: &SharedRegisterMap,
    ) -> SafetySystemState {
        let params = {
            let map = lock_registers(registers);
            SafetyParameters::load(&map)
        };

        let statuses = self.evaluate_sensors(now, io, &params);
        let mut aggregate = aggregate_status(statuses);
        if params.safety_mode == SAFETY_MODE_EMERGENCY_STOP {
            aggregate = SafetyStatus::Emergency;
        }

        let flag = self.update_latch(aggregate, &params);
        self.update_counters(aggregate, now);

        let relays: [bool; RELAY_CHANNELS] = std::array::from_fn(|i| {
            params.relay_control[i] || (i == 0 && self.state.protective_outputs)
        });
        let indicator = self.state.protective_outputs;

        self.publish(&params, flag, &relays, indicator, registers);
        self.drive_outputs(io, &relays, indicator);

        self.state
    }

    fn evaluate_sensors(
        &mut self,
        now: Instant,
        io: &mut dyn SensorIo,
        params: &SafetyParameters,
    ) -> Vec<SensorStatus> {
        let mut statuses = Vec::with_capacity(ANALOG_CHANNELS + DIGITAL_CHANNELS);

        for (i, sensor) in self.analog.iter_mut().enumerate() {
            if !params.analog_enabled[i] {
                continue;
            }
            let analog_params = AnalogParameters {
                reference_voltage: self.reference_voltage,
                gain: params.gain,
                offset: params.offset_for(i),
                thresholds: params.thresholds,
            };
            statuses.push(sensor.update(i, io.read_raw_analog(i), &analog_params, now));
        }

        for (i, sensor) in self.digital.iter_mut().enumerate() {
            if !params.digital_enabled[i] {
                continue;
            }
            statuses.push(sensor.update(
                i,
                io.read_raw_digital(i),
                params.digital_active_level[i],
                params.debounce,
                now,
            ));
        }

        statuses
    }

    fn update_latch(&mut self, aggregate: SafetyStatus, params: &SafetyParameters) -> LatchFlag {
        let was_latched = self.state.latched;
        let mut latched = params.latched;
        let mut flag = LatchFlag::Keep;

        if aggregate.is_protective() {
            if !latched {
                warn!("Safety {:?} detected, protective outputs latched", aggregate);
            }
            latched = true;
            flag = LatchFlag::Set;
            self.latched_status = aggregate;
            self.state.protective_outputs = true;
        } else if aggregate == SafetyStatus::Ok {
            if latched && params.auto_reset {
                info!("Safety latch cleared by auto reset");
                latched = false;
                flag = LatchFlag::Clear;
            }
            if !latched && self.state.protective_outputs {
                info!("Protective outputs released");
                self.state.protective_outputs = false;
            }
        }

        if was_latched && !params.latched {
            debug!("Safety latch acknowledged through the reset flag register");
        }

        self.state.latched = latched;
        self.state.aggregate = aggregate;
        self.state.emergency_stop_active = aggregate == SafetyStatus::Emergency;

        // A flag set by the master without a hazard holds nothing
        let status = if latched && self.state.protective_outputs && !aggregate.is_protective() {
            self.latched_status
        } else {
            aggregate
        };
        if status != self.state.status {
            info!("Safety status {:?} -> {:?}", self.state.status, status);
        }
        self.state.status = status;
        flag
    }

    fn update_counters(&mut self, aggregate: SafetyStatus, now: Instant) {
        let state = &mut self.state;
        match aggregate {
            SafetyStatus::Warning => state.warning_count = state.warning_count.saturating_add(1),
            SafetyStatus::Critical => state.critical_count = state.critical_count.saturating_add(1),
            SafetyStatus::Emergency => {
                state.emergency_count = state.emergency_count.saturating_add(1)
            }
            SafetyStatus::Ok | SafetyStatus::Error => {}
        }
        state.cycle_count = state.cycle_count.wrapping_add(1);
        state.uptime = now.saturating_duration_since(self.started);
        state.last_check = Some(now);
    }

    fn publish(
        &mut self,
        params: &SafetyParameters,
        flag: LatchFlag,
        relays: &[bool; RELAY_CHANNELS],
        indicator: bool,
        registers: &SharedRegisterMap,
    ) {
        let mut zone_status = 0u16;
        let mut error_code = 0u16;
        let mut proximity_alert = false;

        for (i, sensor) in self.analog.iter().enumerate() {
            if !params.analog_enabled[i] {
                continue;
            }
            zone_status |= sensor.alarm_flags;
            if sensor.status == SensorStatus::Error {
                error_code |= 1 << i;
            } else if sensor.distance <= f32::from(params.proximity_threshold) {
                proximity_alert = true;
            }
        }
        for (i, sensor) in self.digital.iter().enumerate() {
            if params.digital_enabled[i] && sensor.status == SensorStatus::Error {
                error_code |= 1 << (4 + i);
            }
        }

        let relay_status = relays
            .iter()
            .enumerate()
            .fold(u16::from(indicator) << 4, |acc, (i, on)| {
                acc | (u16::from(*on) << i)
            });

        let mut map = lock_registers(registers);

        let system_error = map.holding(REG_SYSTEM_ERROR) | error_code;
        if system_error != map.holding(REG_SYSTEM_ERROR) {
            warn!("System error latched: 0x{:04X}", system_error);
        }
        map.set_holding(REG_SYSTEM_ERROR, system_error);
        map.set_holding(REG_SYSTEM_STATUS, u16::from(system_error != 0));

        map.set_holding(REG_SAFETY_SYSTEM_STATUS, self.state.status.register_value());
        map.set_holding(
            REG_EMERGENCY_STOP_STATUS,
            u16::from(self.state.emergency_stop_active),
        );
        map.set_holding(REG_SAFETY_ZONE_STATUS, zone_status);
        map.set_holding(REG_PROXIMITY_ALERT_STATUS, u16::from(proximity_alert));
        map.set_holding(REG_RELAY_OUTPUT_STATUS, relay_status);
        map.set_holding(REG_SAFETY_ERROR_CODE, error_code);

        let current = map.holding(REG_SAFETY_RESET_FLAG) != 0;
        let latched = match flag {
            LatchFlag::Set => true,
            LatchFlag::Clear => false,
            LatchFlag::Keep => current,
        };
        if flag == LatchFlag::Keep && current != params.latched {
            debug!("Reset flag written during the cycle, now {}", u16::from(current));
        }
        map.set_holding(REG_SAFETY_RESET_FLAG, u16::from(latched));
        self.state.latched = latched;

        for (i, sensor) in self.analog.iter().enumerate() {
            let enabled = params.analog_enabled[i];
            map.set_holding(
                channel(REG_ANALOG_INPUT_1, i),
                if enabled { sensor.distance_register() } else { 0 },
            );
            map.set_input(channel(INPUT_ANALOG_1_RAW, i), sensor.raw);
            map.set_input(
                channel(INPUT_ANALOG_1_ALARM_FLAGS, i),
                if enabled { sensor.alarm_flags } else { 0 },
            );
            map.set_input(channel(INPUT_ANALOG_1_ERROR_COUNT, i), sensor.error_count);
            map.set_input(
                channel(INPUT_ANALOG_1_MIN, i),
                sensor.min_distance.map_or(0, to_register),
            );
            map.set_input(
                channel(INPUT_ANALOG_1_MAX, i),
                sensor.max_distance.map_or(0, to_register),
            );
        }

        for (i, sensor) in self.digital.iter().enumerate() {
            let triggered = params.digital_enabled[i] && sensor.triggered;
            map.set_holding(channel(REG_DI1_STATUS, i), u16::from(triggered));
            map.set_input(channel(INPUT_DI1_CHANGE_COUNT, i), sensor.change_count);
            map.set_discrete_input(
                channel(DISCRETE_DI1_LEVEL, i),
                sensor.level.unwrap_or(false),
            );
            map.set_discrete_input(channel(DISCRETE_DI1_TRIGGERED, i), triggered);
        }

        for (i, on) in relays.iter().enumerate() {
            map.set_coil(channel(COIL_RELAY_1, i), *on);
        }
        map.set_coil(COIL_INDICATOR, indicator);

        let uptime = u32::try_from(self.state.uptime.as_secs()).unwrap_or(u32::MAX);
        map.set_input(INPUT_WARNING_COUNT, self.state.warning_count);
        map.set_input(INPUT_CRITICAL_COUNT, self.state.critical_count);
        map.set_input(INPUT_EMERGENCY_COUNT, self.state.emergency_count);
        map.set_input(INPUT_UPTIME_LOW, (uptime & 0xFFFF) as u16);
        map.set_input(INPUT_UPTIME_HIGH, (uptime >> 16) as u16);
        map.set_input(INPUT_CYCLE_COUNT, self.state.cycle_count);

        self.state.zone_status = zone_status;
        self.state.error_code = error_code;
        self.state.system_error = system_error;
        self.state.proximity_alert = proximity_alert;
        self.state.relay_status = relay_status;
    }

    fn drive_outputs(
        &self,
        io: &mut dyn SensorIo,
        relays: &[bool; RELAY_CHANNELS],
        indicator: bool,
    ) {
        for (i, on) in relays.iter().enumerate() {
            if let Err(e) = io.write_output(OutputChannel::Relay(i as u8), *on) {
                warn!("Failed to drive relay {}: {}", i + 1, e);
            }
        }
        if let Err(e) = io.write_output(OutputChannel::Indicator, indicator) {
            warn!("Failed to drive safety indicator: {}", e);
        }
    }
}
