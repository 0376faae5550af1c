// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus RTU slave
//!
//! Layers, from the wire up:
//!
//! - [`crc`]: CRC-16/MODBUS
//! - [`frame`]: byte-at-a-time frame reassembly
//! - [`protocol`]: validation, function code dispatch and exception responses
//! - [`register_map`]: the shared data model
//! - [`modbus_server`]: the session loop over an async byte stream

pub mod crc;
pub mod frame;
pub mod modbus_server;
pub mod protocol;
pub mod register_map;
pub mod registers;

pub use modbus_server::{SafetyModbusServer, TransportError};
pub use protocol::{ExceptionCode, ProtocolEngine, Request, Response};
pub use register_map::{
    lock_registers, RegisterError, RegisterMap, RegisterSpace, SharedRegisterMap,
};
