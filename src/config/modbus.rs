// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus RTU slave configuration
//!
//! The RTU byte stream is served over TCP (serial device server style), so
//! the section carries both the listening socket and the RTU framing
//! parameters.

use serde::{Deserialize, Serialize};

/// Configuration for the Modbus RTU slave.
///
/// # Example
///
/// ```
/// use rust_safety_io::config::ModbusConfig;
///
/// let modbus_config = ModbusConfig {
///     enabled: true,
///     port: 5020,
///     slave_address: 5,
///     ..Default::default()
/// };
/// assert_eq!(modbus_config.response_timeout_ms, 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Flag to enable or disable the Modbus slave.
    pub enabled: bool,

    /// The TCP port the RTU stream is served on.
    pub port: u16,

    /// The network address the server binds to.
    ///
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    pub address: String,

    /// Slave address this device answers to (1-247).
    #[serde(default = "default_slave_address")]
    pub slave_address: u8,

    /// Upper bound for transmitting one response, in milliseconds.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Silence after which a partially received frame is discarded.
    ///
    /// `0` disables the silence timer.
    #[serde(default)]
    pub inter_frame_timeout_ms: u64,
}

fn default_slave_address() -> u8 {
    1
}

fn default_response_timeout_ms() -> u64 {
    100
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5020,
            address: "127.0.0.1".to_string(), // Localhost for security
            slave_address: default_slave_address(),
            response_timeout_ms: default_response_timeout_ms(),
            inter_frame_timeout_ms: 0,
        }
    }
}
