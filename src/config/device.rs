// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Device identity registers (0x0100-0x0106)

use serde::{Deserialize, Serialize};

use crate::modbus::registers::{
    DEFAULT_CONFIG_BAUDRATE, DEFAULT_CONFIG_PARITY, DEFAULT_CONFIG_STOP_BIT, DEFAULT_DEVICE_ID,
    DEFAULT_FIRMWARE_VERSION, DEFAULT_HARDWARE_VERSION, DEFAULT_MODULE_TYPE,
};

/// Identity and serial link codes published in the system registers.
///
/// The serial codes are informational: the link itself is configured by the
/// transport, not by this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub device_id: u16,
    /// Baud rate code as understood by the master tooling
    pub baud_code: u16,
    /// 0 none, 1 odd, 2 even
    pub parity: u16,
    pub stop_bits: u16,
    pub module_type: u16,
    pub firmware_version: u16,
    pub hardware_version: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID,
            baud_code: DEFAULT_CONFIG_BAUDRATE,
            parity: DEFAULT_CONFIG_PARITY,
            stop_bits: DEFAULT_CONFIG_STOP_BIT,
            module_type: DEFAULT_MODULE_TYPE,
            firmware_version: DEFAULT_FIRMWARE_VERSION,
            hardware_version: DEFAULT_HARDWARE_VERSION,
        }
    }
}
