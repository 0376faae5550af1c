// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared register map
//!
//! The [`RegisterMap`] holds the four Modbus data spaces of the module. It is
//! the single source of truth shared between the protocol engine, which
//! services master requests, and the safety monitor, which consumes
//! configuration registers and publishes results.
//!
//! Both sides access the map through [`SharedRegisterMap`] and must take the
//! lock exactly once per logical operation so that a multi-register read or
//! write is never interleaved with a safety cycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use super::registers::*;
use crate::config::Config;

/// The four Modbus data spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterSpace {
    Holding,
    Input,
    Coil,
    DiscreteInput,
}

impl RegisterSpace {
    /// Number of addressable entries in this space
    pub fn size(self) -> usize {
        match self {
            RegisterSpace::Holding => HOLDING_REG_COUNT,
            RegisterSpace::Input => INPUT_REG_COUNT,
            RegisterSpace::Coil => COIL_COUNT,
            RegisterSpace::DiscreteInput => DISCRETE_INPUT_COUNT,
        }
    }
}

/// Errors raised by register map accessors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("{space:?} access out of range: address 0x{address:04X}, count {count}")]
    OutOfRange {
        space: RegisterSpace,
        address: u16,
        count: usize,
    },
}

/// Modbus data model of the safety I/O module
///
/// Holding and input registers are 16-bit words; coils and discrete inputs
/// store one bit per byte (`0` or `1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    holding: [u16; HOLDING_REG_COUNT],
    input: [u16; INPUT_REG_COUNT],
    coils: [u8; COIL_COUNT],
    discrete_inputs: [u8; DISCRETE_INPUT_COUNT],
}

/// Register map shared between the Modbus engine and the safety monitor
pub type SharedRegisterMap = Arc<Mutex<RegisterMap>>;

impl Default for RegisterMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterMap {
    /// Create a register map populated with the factory defaults
    ///
    /// Every register not listed in the register table is zero.
    pub fn new() -> Self {
        let mut map = Self {
            holding: [0; HOLDING_REG_COUNT],
            input: [0; INPUT_REG_COUNT],
            coils: [0; COIL_COUNT],
            discrete_inputs: [0; DISCRETE_INPUT_COUNT],
        };

        map.set_holding(REG_DEVICE_ID, DEFAULT_DEVICE_ID);
        map.set_holding(REG_CONFIG_BAUDRATE, DEFAULT_CONFIG_BAUDRATE);
        map.set_holding(REG_CONFIG_PARITY, DEFAULT_CONFIG_PARITY);
        map.set_holding(REG_CONFIG_STOP_BIT, DEFAULT_CONFIG_STOP_BIT);
        map.set_holding(REG_MODULE_TYPE, DEFAULT_MODULE_TYPE);
        map.set_holding(REG_FIRMWARE_VERSION, DEFAULT_FIRMWARE_VERSION);
        map.set_holding(REG_HARDWARE_VERSION, DEFAULT_HARDWARE_VERSION);

        map.set_holding(REG_ANALOG_COEFFICIENT, DEFAULT_ANALOG_COEFFICIENT);
        map.set_holding(REG_ANALOG_CALIBRATION, DEFAULT_ANALOG_CALIBRATION);
        for (i, threshold) in DEFAULT_SAFETY_ZONE_THRESHOLDS.iter().enumerate() {
            map.set_holding(channel(REG_SAFETY_ZONE1_THRESHOLD, i), *threshold);
        }
        map.set_holding(REG_PROXIMITY_THRESHOLD, DEFAULT_PROXIMITY_THRESHOLD);
        map.set_holding(REG_SAFETY_RESPONSE_TIME, DEFAULT_SAFETY_RESPONSE_TIME);
        map.set_holding(REG_AUTO_RESET_ENABLE, DEFAULT_AUTO_RESET_ENABLE);
        map.set_holding(REG_SAFETY_MODE, DEFAULT_SAFETY_MODE);

        map
    }

    /// Create a register map from the factory defaults, overlaid with the
    /// device and safety sections of the configuration
    pub fn from_config(config: &Config) -> Self {
        let mut map = Self::new();

        let device = &config.device;
        map.set_holding(REG_DEVICE_ID, device.device_id);
        map.set_holding(REG_CONFIG_BAUDRATE, device.baud_code);
        map.set_holding(REG_CONFIG_PARITY, device.parity);
        map.set_holding(REG_CONFIG_STOP_BIT, device.stop_bits);
        map.set_holding(REG_MODULE_TYPE, device.module_type);
        map.set_holding(REG_FIRMWARE_VERSION, device.firmware_version);
        map.set_holding(REG_HARDWARE_VERSION, device.hardware_version);

        let safety = &config.safety;
        map.set_holding(REG_ANALOG_COEFFICIENT, safety.analog_coefficient);
        map.set_holding(REG_ANALOG_CALIBRATION, safety.analog_calibration);
        for i in 0..ANALOG_CHANNELS {
            map.set_holding(
                channel(REG_ANALOG_1_ENABLE, i),
                u16::from(safety.analog_enabled[i]),
            );
            map.set_holding(channel(REG_ANALOG_1_OFFSET, i), safety.analog_offsets[i]);
        }
        for i in 0..DIGITAL_CHANNELS {
            map.set_holding(
                channel(REG_DI1_ENABLE, i),
                u16::from(safety.digital_enabled[i]),
            );
            map.set_holding(
                channel(REG_DI1_ACTIVE_LEVEL, i),
                u16::from(safety.digital_active_level[i]),
            );
        }
        for (i, threshold) in safety.zone_thresholds.iter().enumerate() {
            map.set_holding(channel(REG_SAFETY_ZONE1_THRESHOLD, i), *threshold);
        }
        map.set_holding(REG_PROXIMITY_THRESHOLD, safety.proximity_threshold);
        map.set_holding(REG_SAFETY_RESPONSE_TIME, safety.response_time_ms);
        map.set_holding(REG_AUTO_RESET_ENABLE, u16::from(safety.auto_reset));
        map.set_holding(REG_SAFETY_MODE, safety.safety_mode);

        map
    }

    /// Wrap this map for sharing between tasks
    pub fn into_shared(self) -> SharedRegisterMap {
        Arc::new(Mutex::new(self))
    }

    fn check_range(space: RegisterSpace, address: u16, count: usize) -> Result<usize, RegisterError> {
        let start = address as usize;
        match start.checked_add(count) {
            Some(end) if end <= space.size() => Ok(start),
            _ => Err(RegisterError::OutOfRange {
                space,
                address,
                count,
            }),
        }
    }

    /// Read a single entry; coils and discrete inputs read as `0` or `1`
    pub fn read(&self, space: RegisterSpace, address: u16) -> Result<u16, RegisterError> {
        let index = Self::check_range(space, address, 1)?;
        Ok(match space {
            RegisterSpace::Holding => self.holding[index],
            RegisterSpace::Input => self.input[index],
            RegisterSpace::Coil => u16::from(self.coils[index]),
            RegisterSpace::DiscreteInput => u16::from(self.discrete_inputs[index]),
        })
    }

    /// Write a single entry; for bit spaces any non-zero value stores `1`
    pub fn write(
        &mut self,
        space: RegisterSpace,
        address: u16,
        value: u16,
    ) -> Result<(), RegisterError> {
        let index = Self::check_range(space, address, 1)?;
        match space {
            RegisterSpace::Holding => self.holding[index] = value,
            RegisterSpace::Input => self.input[index] = value,
            RegisterSpace::Coil => self.coils[index] = u8::from(value != 0),
            RegisterSpace::DiscreteInput => self.discrete_inputs[index] = u8::from(value != 0),
        }
        Ok(())
    }

    /// Read `count` consecutive entries starting at `address`
    ///
    /// The whole range is validated before anything is read.
    pub fn read_block(
        &self,
        space: RegisterSpace,
        address: u16,
        count: usize,
    ) -> Result<Vec<u16>, RegisterError> {
        let start = Self::check_range(space, address, count)?;
        let range = start..start + count;
        Ok(match space {
            RegisterSpace::Holding => self.holding[range].to_vec(),
            RegisterSpace::Input => self.input[range].to_vec(),
            RegisterSpace::Coil => self.coils[range].iter().map(|b| u16::from(*b)).collect(),
            RegisterSpace::DiscreteInput => self.discrete_inputs[range]
                .iter()
                .map(|b| u16::from(*b))
                .collect(),
        })
    }

    /// Write consecutive entries starting at `address`
    ///
    /// Either every value is stored or, if the range is invalid, none is.
    pub fn write_block(
        &mut self,
        space: RegisterSpace,
        address: u16,
        values: &[u16],
    ) -> Result<(), RegisterError> {
        let start = Self::check_range(space, address, values.len())?;
        for (offset, value) in values.iter().enumerate() {
            let index = start + offset;
            match space {
                RegisterSpace::Holding => self.holding[index] = *value,
                RegisterSpace::Input => self.input[index] = *value,
                RegisterSpace::Coil => self.coils[index] = u8::from(*value != 0),
                RegisterSpace::DiscreteInput => {
                    self.discrete_inputs[index] = u8::from(*value != 0)
                }
            }
        }
        Ok(())
    }

    /// Holding register accessor for addresses known to be in range
    ///
    /// Out-of-range addresses read as zero.
    pub fn holding(&self, address: u16) -> u16 {
        self.holding.get(address as usize).copied().unwrap_or(0)
    }

    /// Holding register setter for addresses known to be in range
    ///
    /// Out-of-range addresses are ignored.
    pub fn set_holding(&mut self, address: u16, value: u16) {
        if let Some(slot) = self.holding.get_mut(address as usize) {
            *slot = value;
        }
    }

    /// Input register accessor; out-of-range addresses read as zero
    pub fn input(&self, address: u16) -> u16 {
        self.input.get(address as usize).copied().unwrap_or(0)
    }

    /// Input register setter; out-of-range addresses are ignored
    pub fn set_input(&mut self, address: u16, value: u16) {
        if let Some(slot) = self.input.get_mut(address as usize) {
            *slot = value;
        }
    }

    pub fn coil(&self, address: u16) -> bool {
        self.coils.get(address as usize).is_some_and(|b| *b != 0)
    }

    pub fn set_coil(&mut self, address: u16, value: bool) {
        if let Some(slot) = self.coils.get_mut(address as usize) {
            *slot = u8::from(value);
        }
    }

    pub fn discrete_input(&self, address: u16) -> bool {
        self.discrete_inputs
            .get(address as usize)
            .is_some_and(|b| *b != 0)
    }

    pub fn set_discrete_input(&mut self, address: u16, value: bool) {
        if let Some(slot) = self.discrete_inputs.get_mut(address as usize) {
            *slot = u8::from(value);
        }
    }
}

/// Lock the shared register map
///
/// A panic in another holder does not leave the map in a torn state (every
/// mutation is a plain store), so a poisoned lock is recovered rather than
/// propagated.
pub fn lock_registers(registers: &SharedRegisterMap) -> MutexGuard<'_, RegisterMap> {
    registers.lock().unwrap_or_else(PoisonError::into_inner)
}
