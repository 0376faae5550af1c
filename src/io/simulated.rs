// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-memory sensor driver
//!
//! [`SimulatedIo`] keeps the analog samples, digital levels and output states
//! behind a shared mutex. Clones share the same state, so a test (or an
//! operator tool) can keep a handle, change the inputs and watch the outputs
//! while the safety monitor owns another clone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use super::{OutputChannel, SensorIo, SensorIoError};
use crate::config::SimulatedIoConfig;
use crate::modbus::registers::{ANALOG_CHANNELS, DIGITAL_CHANNELS, RELAY_CHANNELS};

#[derive(Debug, Default)]
struct SimulatedState {
    analog_raw: [u16; ANALOG_CHANNELS],
    digital_levels: [bool; DIGITAL_CHANNELS],
    analog_failures: [bool; ANALOG_CHANNELS],
    outputs: HashMap<OutputChannel, bool>,
}

/// Shared in-memory implementation of [`SensorIo`]
#[derive(Debug, Clone, Default)]
pub struct SimulatedIo {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SimulatedIoConfig) -> Self {
        let io = Self::new();
        {
            let mut state = io.lock();
            state.analog_raw = config.analog_raw;
            state.digital_levels = config.digital_levels;
        }
        io
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the raw ADC sample returned for an analog channel
    pub fn set_analog_raw(&self, channel: usize, raw: u16) {
        if let Some(slot) = self.lock().analog_raw.get_mut(channel) {
            *slot = raw;
        }
    }

    /// Set the level returned for a digital input
    pub fn set_digital_level(&self, channel: usize, level: bool) {
        if let Some(slot) = self.lock().digital_levels.get_mut(channel) {
            *slot = level;
        }
    }

    /// Make reads of an analog channel fail until cleared
    pub fn set_analog_failure(&self, channel: usize, failing: bool) {
        if let Some(slot) = self.lock().analog_failures.get_mut(channel) {
            *slot = failing;
        }
    }

    /// Last state written to an output, `false` if never driven
    pub fn output(&self, channel: OutputChannel) -> bool {
        self.lock().outputs.get(&channel).copied().unwrap_or(false)
    }
}

impl SensorIo for SimulatedIo {
    fn read_raw_analog(&mut self, channel: usize) -> Result<u16, SensorIoError> {
        let state = self.lock();
        if state.analog_failures.get(channel).copied().unwrap_or(false) {
            return Err(SensorIoError::AnalogRead {
                channel,
                reason: "simulated failure".to_string(),
            });
        }
        state
            .analog_raw
            .get(channel)
            .copied()
            .ok_or(SensorIoError::InvalidChannel(channel))
    }

    fn read_raw_digital(&mut self, channel: usize) -> Result<bool, SensorIoError> {
        self.lock()
            .digital_levels
            .get(channel)
            .copied()
            .ok_or(SensorIoError::InvalidChannel(channel))
    }

    fn write_output(&mut self, channel: OutputChannel, on: bool) -> Result<(), SensorIoError> {
        if let OutputChannel::Relay(index) = channel {
            if usize::from(index) >= RELAY_CHANNELS {
                return Err(SensorIoError::InvalidChannel(usize::from(index)));
            }
        }
        let previous = self.lock().outputs.insert(channel, on);
        if previous != Some(on) {
            debug!("Simulated output {:?} -> {}", channel, on);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let io = SimulatedIo::new();
        let mut driver = io.clone();
        io.set_analog_raw(2, 1234);
        io.set_digital_level(3, true);
        assert_eq!(driver.read_raw_analog(2).unwrap(), 1234);
        assert!(driver.read_raw_digital(3).unwrap());

        driver.write_output(OutputChannel::Relay(0), true).unwrap();
        assert!(io.output(OutputChannel::Relay(0)));
        assert!(!io.output(OutputChannel::Indicator));
    }

    #[test]
    fn test_invalid_channels() {
        let mut io = SimulatedIo::new();
        assert_eq!(
            io.read_raw_analog(ANALOG_CHANNELS),
            Err(SensorIoError::InvalidChannel(ANALOG_CHANNELS))
        );
        assert!(io.read_raw_digital(9).is_err());
        assert!(io.write_output(OutputChannel::Relay(4), true).is_err());
    }

    #[test]
    fn test_injected_failure() {
        let mut io = SimulatedIo::new();
        io.set_analog_failure(1, true);
        assert!(matches!(
            io.read_raw_analog(1),
            Err(SensorIoError::AnalogRead { channel: 1, .. })
        ));
        io.set_analog_failure(1, false);
        assert_eq!(io.read_raw_analog(1), Ok(0));
    }

    #[test]
    fn test_from_config() {
        let config = SimulatedIoConfig {
            analog_raw: [100, 200, 300, 400],
            digital_levels: [true, false, false, true],
        };
        let mut io = SimulatedIo::from_config(&config);
        assert_eq!(io.read_raw_analog(3), Ok(400));
        assert_eq!(io.read_raw_digital(0), Ok(true));
    }
}
