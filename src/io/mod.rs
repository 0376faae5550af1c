// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor and output abstraction
//!
//! The safety monitor never touches hardware directly. Raw ADC samples,
//! digital input levels and output pins are reached through the [`SensorIo`]
//! trait so that the monitor can run against real drivers, the in-memory
//! [`SimulatedIo`] or a mock in tests.

use anyhow::Result;
use log::info;
use thiserror::Error;

pub mod simulated;

pub use simulated::SimulatedIo;

use crate::config::{IoConfig, IoDriver};

/// Physical output driven by the safety monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    /// Relay output, zero-based (relay 1 is `Relay(0)`)
    Relay(u8),
    /// Safety indicator lamp
    Indicator,
}

/// Failure reported by a sensor or output driver
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SensorIoError {
    #[error("channel {0} does not exist")]
    InvalidChannel(usize),
    #[error("analog channel {channel} read failed: {reason}")]
    AnalogRead { channel: usize, reason: String },
    #[error("digital channel {channel} read failed: {reason}")]
    DigitalRead { channel: usize, reason: String },
    #[error("output {channel:?} write failed: {reason}")]
    OutputWrite {
        channel: OutputChannel,
        reason: String,
    },
}

/// Collaborator interface for sampling inputs and driving outputs
#[cfg_attr(test, mockall::automock)]
pub trait SensorIo: Send {
    /// Read a raw 12-bit ADC sample (0..=4095) from an analog channel
    fn read_raw_analog(&mut self, channel: usize) -> Result<u16, SensorIoError>;

    /// Read the raw level of a digital input
    fn read_raw_digital(&mut self, channel: usize) -> Result<bool, SensorIoError>;

    /// Drive an output pin
    fn write_output(&mut self, channel: OutputChannel, on: bool) -> Result<(), SensorIoError>;
}

/// Build the sensor driver selected in the configuration
pub fn get_sensor_io_from_config(config: &IoConfig) -> Result<Box<dyn SensorIo>> {
    match config.driver {
        IoDriver::Simulated => {
            info!("Using simulated sensor I/O");
            Ok(Box::new(SimulatedIo::from_config(&config.simulated)))
        }
    }
}
