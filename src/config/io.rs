// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor I/O driver selection

use serde::{Deserialize, Serialize};

use crate::modbus::registers::{ANALOG_CHANNELS, DIGITAL_CHANNELS};

/// Available sensor drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoDriver {
    /// In-memory inputs and outputs
    #[default]
    Simulated,
}

/// Initial state of the simulated driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedIoConfig {
    /// Raw 12-bit ADC samples of analog channels 1-4
    pub analog_raw: [u16; ANALOG_CHANNELS],
    /// Levels of digital inputs 1-4
    pub digital_levels: [bool; DIGITAL_CHANNELS],
}

impl Default for SimulatedIoConfig {
    fn default() -> Self {
        Self {
            analog_raw: [400; ANALOG_CHANNELS],
            digital_levels: [false; DIGITAL_CHANNELS],
        }
    }
}

/// Sensor I/O section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoConfig {
    #[serde(default)]
    pub driver: IoDriver,
    #[serde(default)]
    pub simulated: SimulatedIoConfig,
}
