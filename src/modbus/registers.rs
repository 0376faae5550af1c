// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Canonical register address map of the safety I/O module
//!
//! Addresses are zero-based Modbus protocol addresses. Per-channel blocks are
//! laid out contiguously, so channel `n` (0..3) of a block lives at
//! `BLOCK_BASE + n`; use [`channel`] to compute it.
//!
//! ## Holding Registers
//!
//! | Address | Description | Default |
//! |---------|-------------|---------|
//! | 0x0000 | Safety system status | 0 |
//! | 0x0001 | Emergency stop status | 0 |
//! | 0x0002 | Safety zone status (alarm flags) | 0 |
//! | 0x0003 | Proximity alert status | 0 |
//! | 0x0004 | Relay output status (bitmask) | 0 |
//! | 0x0005 | Safety error code (bitmask) | 0 |
//! | 0x0010-0x0013 | Analog 1-4 processed value | 0 |
//! | 0x0014 | Analog coefficient (shared gain) | 2786 |
//! | 0x0015 | Analog calibration (shared offset) | 115 |
//! | 0x001A-0x001D | Analog 1-4 enable | 0 |
//! | 0x001E-0x0021 | Analog 1-4 offset override | 0 |
//! | 0x0022-0x0025 | Digital 1-4 status | 0 |
//! | 0x0026-0x0029 | Digital 1-4 enable | 0 |
//! | 0x002A-0x002D | Digital 1-4 active level | 0 |
//! | 0x0040-0x0043 | Relay 1-4 control | 0 |
//! | 0x0044-0x0047 | Safety zone 1-4 threshold | 500/1000/1500/2000 |
//! | 0x0048 | Proximity threshold | 100 |
//! | 0x0049 | Safety response time (ms) | 50 |
//! | 0x004A | Auto reset enable | 0 |
//! | 0x004B | Safety mode | 1 |
//! | 0x004C | Safety latch reset flag | 0 |
//! | 0x0100-0x0109 | Device identity, serial codes, system status/error, reset command | see constants |
//!
//! ## Input Registers
//!
//! Diagnostic mirrors refreshed by the safety monitor once per cycle: raw ADC
//! samples, alarm flags, error and state-change counters, status counters,
//! uptime, min/max statistics and the cycle counter.

/// Number of holding registers (0x0000-0x010F)
pub const HOLDING_REG_COUNT: usize = 0x0110;
/// Number of input registers
pub const INPUT_REG_COUNT: usize = 0x0020;
/// Number of coils
pub const COIL_COUNT: usize = 16;
/// Number of discrete inputs
pub const DISCRETE_INPUT_COUNT: usize = 16;

/// Number of analog distance sensors
pub const ANALOG_CHANNELS: usize = 4;
/// Number of digital safety inputs
pub const DIGITAL_CHANNELS: usize = 4;
/// Number of relay outputs
pub const RELAY_CHANNELS: usize = 4;

// Safety system status
pub const REG_SAFETY_SYSTEM_STATUS: u16 = 0x0000;
pub const REG_EMERGENCY_STOP_STATUS: u16 = 0x0001;
pub const REG_SAFETY_ZONE_STATUS: u16 = 0x0002;
pub const REG_PROXIMITY_ALERT_STATUS: u16 = 0x0003;
pub const REG_RELAY_OUTPUT_STATUS: u16 = 0x0004;
pub const REG_SAFETY_ERROR_CODE: u16 = 0x0005;

// Analog inputs
pub const REG_ANALOG_INPUT_1: u16 = 0x0010;
pub const REG_ANALOG_COEFFICIENT: u16 = 0x0014;
pub const REG_ANALOG_CALIBRATION: u16 = 0x0015;
pub const REG_ANALOG_1_ENABLE: u16 = 0x001A;
pub const REG_ANALOG_1_OFFSET: u16 = 0x001E;

// Digital inputs
pub const REG_DI1_STATUS: u16 = 0x0022;
pub const REG_DI1_ENABLE: u16 = 0x0026;
pub const REG_DI1_ACTIVE_LEVEL: u16 = 0x002A;

// Relay output control
pub const REG_RELAY1_CONTROL: u16 = 0x0040;

// Safety configuration
pub const REG_SAFETY_ZONE1_THRESHOLD: u16 = 0x0044;
pub const REG_PROXIMITY_THRESHOLD: u16 = 0x0048;
pub const REG_SAFETY_RESPONSE_TIME: u16 = 0x0049;
pub const REG_AUTO_RESET_ENABLE: u16 = 0x004A;
pub const REG_SAFETY_MODE: u16 = 0x004B;
pub const REG_SAFETY_RESET_FLAG: u16 = 0x004C;

// System registers
pub const REG_DEVICE_ID: u16 = 0x0100;
pub const REG_CONFIG_BAUDRATE: u16 = 0x0101;
pub const REG_CONFIG_PARITY: u16 = 0x0102;
pub const REG_CONFIG_STOP_BIT: u16 = 0x0103;
pub const REG_MODULE_TYPE: u16 = 0x0104;
pub const REG_FIRMWARE_VERSION: u16 = 0x0105;
pub const REG_HARDWARE_VERSION: u16 = 0x0106;
pub const REG_SYSTEM_STATUS: u16 = 0x0107;
pub const REG_SYSTEM_ERROR: u16 = 0x0108;
pub const REG_RESET_ERROR_COMMAND: u16 = 0x0109;

// Input register mirrors
pub const INPUT_ANALOG_1_RAW: u16 = 0x0000;
pub const INPUT_ANALOG_1_ALARM_FLAGS: u16 = 0x0004;
pub const INPUT_ANALOG_1_ERROR_COUNT: u16 = 0x0008;
pub const INPUT_DI1_CHANGE_COUNT: u16 = 0x000C;
pub const INPUT_WARNING_COUNT: u16 = 0x0010;
pub const INPUT_CRITICAL_COUNT: u16 = 0x0011;
pub const INPUT_EMERGENCY_COUNT: u16 = 0x0012;
pub const INPUT_UPTIME_LOW: u16 = 0x0013;
pub const INPUT_UPTIME_HIGH: u16 = 0x0014;
pub const INPUT_ANALOG_1_MIN: u16 = 0x0015;
pub const INPUT_ANALOG_1_MAX: u16 = 0x0019;
pub const INPUT_CYCLE_COUNT: u16 = 0x001D;

// Coils and discrete inputs
pub const COIL_RELAY_1: u16 = 0;
pub const COIL_INDICATOR: u16 = 4;
pub const DISCRETE_DI1_LEVEL: u16 = 0;
pub const DISCRETE_DI1_TRIGGERED: u16 = 4;

// Default values
pub const DEFAULT_DEVICE_ID: u16 = 5;
pub const DEFAULT_CONFIG_BAUDRATE: u16 = 5;
pub const DEFAULT_CONFIG_PARITY: u16 = 0;
pub const DEFAULT_CONFIG_STOP_BIT: u16 = 1;
pub const DEFAULT_MODULE_TYPE: u16 = 6;
pub const DEFAULT_FIRMWARE_VERSION: u16 = 0x0001;
pub const DEFAULT_HARDWARE_VERSION: u16 = 0x0001;

pub const DEFAULT_ANALOG_COEFFICIENT: u16 = 2786;
pub const DEFAULT_ANALOG_CALIBRATION: u16 = 115;
pub const DEFAULT_SAFETY_ZONE_THRESHOLDS: [u16; 4] = [500, 1000, 1500, 2000];
pub const DEFAULT_PROXIMITY_THRESHOLD: u16 = 100;
pub const DEFAULT_SAFETY_RESPONSE_TIME: u16 = 50;
pub const DEFAULT_AUTO_RESET_ENABLE: u16 = 0;
pub const DEFAULT_SAFETY_MODE: u16 = SAFETY_MODE_NORMAL;

// Safety mode values
pub const SAFETY_MODE_NORMAL: u16 = 1;
pub const SAFETY_MODE_WARNING: u16 = 2;
pub const SAFETY_MODE_PROTECTIVE_STOP: u16 = 3;
pub const SAFETY_MODE_EMERGENCY_STOP: u16 = 4;

/// Address of channel `index` inside a per-channel block starting at `base`.
pub const fn channel(base: u16, index: usize) -> u16 {
    base + index as u16
}
