// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Safety monitor configuration
//!
//! Most fields seed the configuration holding registers at startup. Once
//! running, the master owns those registers and may change them; the file is
//! not written back.

use serde::{Deserialize, Serialize};

use crate::modbus::registers::{
    ANALOG_CHANNELS, DEFAULT_ANALOG_CALIBRATION, DEFAULT_ANALOG_COEFFICIENT,
    DEFAULT_PROXIMITY_THRESHOLD, DEFAULT_SAFETY_MODE, DEFAULT_SAFETY_RESPONSE_TIME,
    DEFAULT_SAFETY_ZONE_THRESHOLDS, DIGITAL_CHANNELS,
};

/// Configuration of the safety monitor and its initial register values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Run the safety monitor task
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Period of one monitor cycle in milliseconds
    #[serde(default = "default_cycle_period_ms")]
    pub cycle_period_ms: u64,

    /// ADC reference voltage in volts
    #[serde(default = "default_adc_reference_voltage")]
    pub adc_reference_voltage: f32,

    /// Shared gain ×100 (register 0x0014)
    #[serde(default = "default_analog_coefficient")]
    pub analog_coefficient: u16,

    /// Shared exponent offset ×100 (register 0x0015)
    #[serde(default = "default_analog_calibration")]
    pub analog_calibration: u16,

    /// Per-channel offset overrides, 0 uses the shared offset
    #[serde(default)]
    pub analog_offsets: [u16; ANALOG_CHANNELS],

    /// Zone 1-4 thresholds, strictly ascending
    #[serde(default = "default_zone_thresholds")]
    pub zone_thresholds: [u16; 4],

    #[serde(default = "default_proximity_threshold")]
    pub proximity_threshold: u16,

    /// Safety response time in milliseconds, used as the digital debounce interval
    #[serde(default = "default_response_time_ms")]
    pub response_time_ms: u16,

    /// Clear the protective latch automatically on the first OK cycle
    #[serde(default)]
    pub auto_reset: bool,

    /// Initial safety mode (1 normal, 2 warning, 3 protective stop, 4 emergency stop)
    #[serde(default = "default_safety_mode")]
    pub safety_mode: u16,

    #[serde(default)]
    pub analog_enabled: [bool; ANALOG_CHANNELS],

    #[serde(default)]
    pub digital_enabled: [bool; DIGITAL_CHANNELS],

    /// Level at which each digital input counts as triggered
    #[serde(default)]
    pub digital_active_level: [bool; DIGITAL_CHANNELS],
}

fn default_enabled() -> bool {
    true
}

fn default_cycle_period_ms() -> u64 {
    20
}

fn default_adc_reference_voltage() -> f32 {
    3.3
}

fn default_analog_coefficient() -> u16 {
    DEFAULT_ANALOG_COEFFICIENT
}

fn default_analog_calibration() -> u16 {
    DEFAULT_ANALOG_CALIBRATION
}

fn default_zone_thresholds() -> [u16; 4] {
    DEFAULT_SAFETY_ZONE_THRESHOLDS
}

fn default_proximity_threshold() -> u16 {
    DEFAULT_PROXIMITY_THRESHOLD
}

fn default_response_time_ms() -> u16 {
    DEFAULT_SAFETY_RESPONSE_TIME
}

fn default_safety_mode() -> u16 {
    DEFAULT_SAFETY_MODE
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cycle_period_ms: default_cycle_period_ms(),
            adc_reference_voltage: default_adc_reference_voltage(),
            analog_coefficient: default_analog_coefficient(),
            analog_calibration: default_analog_calibration(),
            analog_offsets: [0; ANALOG_CHANNELS],
            zone_thresholds: default_zone_thresholds(),
            proximity_threshold: default_proximity_threshold(),
            response_time_ms: default_response_time_ms(),
            auto_reset: false,
            safety_mode: default_safety_mode(),
            analog_enabled: [false; ANALOG_CHANNELS],
            digital_enabled: [false; DIGITAL_CHANNELS],
            digital_active_level: [false; DIGITAL_CHANNELS],
        }
    }
}
