// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus RTU protocol engine
//!
//! The [`ProtocolEngine`] turns a completed request frame into a response
//! frame. Validation happens in a fixed order:
//!
//! 1. slave address match, otherwise the frame is dropped silently
//! 2. CRC-16, otherwise the frame is dropped silently
//! 3. function code, otherwise exception 0x01
//! 4. address range (and write-multiple byte count), otherwise exception 0x02
//! 5. quantity limits and payload length, otherwise exception 0x03
//!
//! ## Supported Function Codes
//!
//! | Code | Operation | Normal response |
//! |------|-----------|-----------------|
//! | 0x03 | Read holding registers | byte count + big-endian values |
//! | 0x04 | Read input registers | byte count + big-endian values |
//! | 0x06 | Write single holding register | echo address + value |
//! | 0x10 | Write multiple holding registers | echo address + quantity |
//!
//! Registers are only modified after the whole request has been validated,
//! and every request is serviced under a single lock of the register map.

use log::{debug, info, warn};
use thiserror::Error;

use super::crc::{append_crc, verify_crc};
use super::register_map::{lock_registers, RegisterMap, RegisterSpace, SharedRegisterMap};
use super::registers::{
    HOLDING_REG_COUNT, INPUT_REG_COUNT, REG_RESET_ERROR_COMMAND, REG_SYSTEM_ERROR,
    REG_SYSTEM_STATUS,
};

pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Largest quantity accepted by the read functions
pub const MAX_READ_QUANTITY: u16 = 125;
/// Largest quantity accepted by write multiple registers
pub const MAX_WRITE_QUANTITY: u16 = 123;

/// Modbus exception codes returned to the master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[repr(u8)]
pub enum ExceptionCode {
    #[error("illegal function")]
    IllegalFunction = 0x01,
    #[error("illegal data address")]
    IllegalDataAddress = 0x02,
    #[error("illegal data value")]
    IllegalDataValue = 0x03,
}

impl ExceptionCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Decoded request PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadHoldingRegisters { address: u16, quantity: u16 },
    ReadInputRegisters { address: u16, quantity: u16 },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

impl Request {
    /// Decode the PDU (function code and payload, without address and CRC)
    ///
    /// Address ranges are checked here because the byte count of a write
    /// multiple request is only meaningful once its range is known.
    pub fn parse(function: u8, payload: &[u8]) -> Result<Self, ExceptionCode> {
        match function {
            FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS => {
                let (address, quantity) = read_pair(payload)?;
                let limit = if function == FC_READ_HOLDING_REGISTERS {
                    HOLDING_REG_COUNT
                } else {
                    INPUT_REG_COUNT
                };
                check_range(address, quantity, limit)?;
                if quantity == 0 || quantity > MAX_READ_QUANTITY {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                Ok(if function == FC_READ_HOLDING_REGISTERS {
                    Request::ReadHoldingRegisters { address, quantity }
                } else {
                    Request::ReadInputRegisters { address, quantity }
                })
            }
            FC_WRITE_SINGLE_REGISTER => {
                let (address, value) = read_pair(payload)?;
                check_range(address, 1, HOLDING_REG_COUNT)?;
                Ok(Request::WriteSingleRegister { address, value })
            }
            FC_WRITE_MULTIPLE_REGISTERS => {
                let (address, quantity) = read_pair(payload)?;
                let byte_count = *payload.get(4).ok_or(ExceptionCode::IllegalDataValue)?;
                check_range(address, quantity, HOLDING_REG_COUNT)?;
                if usize::from(byte_count) != usize::from(quantity) * 2 {
                    return Err(ExceptionCode::IllegalDataAddress);
                }
                if quantity == 0 || quantity > MAX_WRITE_QUANTITY {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let data = payload
                    .get(5..5 + usize::from(byte_count))
                    .ok_or(ExceptionCode::IllegalDataValue)?;
                let values = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(Request::WriteMultipleRegisters { address, values })
            }
            _ => Err(ExceptionCode::IllegalFunction),
        }
    }

    pub fn function_code(&self) -> u8 {
        match self {
            Request::ReadHoldingRegisters { .. } => FC_READ_HOLDING_REGISTERS,
            Request::ReadInputRegisters { .. } => FC_READ_INPUT_REGISTERS,
            Request::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Request::WriteMultipleRegisters { .. } => FC_WRITE_MULTIPLE_REGISTERS,
        }
    }
}

fn read_pair(payload: &[u8]) -> Result<(u16, u16), ExceptionCode> {
    match payload {
        [a_hi, a_lo, b_hi, b_lo, ..] => Ok((
            u16::from_be_bytes([*a_hi, *a_lo]),
            u16::from_be_bytes([*b_hi, *b_lo]),
        )),
        _ => Err(ExceptionCode::IllegalDataValue),
    }
}

fn check_range(address: u16, quantity: u16, limit: usize) -> Result<(), ExceptionCode> {
    if usize::from(address) + usize::from(quantity) > limit {
        Err(ExceptionCode::IllegalDataAddress)
    } else {
        Ok(())
    }
}

/// Response PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadHoldingRegisters(Vec<u16>),
    ReadInputRegisters(Vec<u16>),
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { address: u16, quantity: u16 },
    Exception { function: u8, code: ExceptionCode },
}

impl Response {
    /// Encode as a complete RTU frame for `slave_address`, CRC included
    pub fn encode(&self, slave_address: u8) -> Vec<u8> {
        let mut frame = vec![slave_address];
        match self {
            Response::ReadHoldingRegisters(values) | Response::ReadInputRegisters(values) => {
                let function = if matches!(self, Response::ReadHoldingRegisters(_)) {
                    FC_READ_HOLDING_REGISTERS
                } else {
                    FC_READ_INPUT_REGISTERS
                };
                frame.push(function);
                // quantity is capped at 125, so the byte count fits in a u8
                frame.push((values.len() * 2) as u8);
                for value in values {
                    frame.extend_from_slice(&value.to_be_bytes());
                }
            }
            Response::WriteSingleRegister { address, value } => {
                frame.push(FC_WRITE_SINGLE_REGISTER);
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&value.to_be_bytes());
            }
            Response::WriteMultipleRegisters { address, quantity } => {
                frame.push(FC_WRITE_MULTIPLE_REGISTERS);
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&quantity.to_be_bytes());
            }
            Response::Exception { function, code } => {
                frame.push(function | 0x80);
                frame.push(code.code());
            }
        }
        append_crc(&mut frame);
        frame
    }
}

/// Validates request frames and services them against the shared register map
#[derive(Debug, Clone)]
pub struct ProtocolEngine {
    slave_address: u8,
    registers: SharedRegisterMap,
}

impl ProtocolEngine {
    pub fn new(slave_address: u8, registers: SharedRegisterMap) -> Self {
        Self {
            slave_address,
            registers,
        }
    }

    pub fn slave_address(&self) -> u8 {
        self.slave_address
    }

    pub fn registers(&self) -> &SharedRegisterMap {
        &self.registers
    }

    /// Process one complete request frame
    ///
    /// Returns the encoded response, or `None` when the frame must be dropped
    /// without answering (foreign slave address, bad CRC, truncated frame).
    pub fn handle_frame(&self, frame: &[u8]) -> Option<Vec<u8>> {
        if frame.len() < 4 {
            debug!("Dropping truncated frame of {} bytes", frame.len());
            return None;
        }
        if frame[0] != self.slave_address {
            debug!(
                "Ignoring frame for slave {} (this device is {})",
                frame[0], self.slave_address
            );
            return None;
        }
        if !verify_crc(frame) {
            warn!("CRC mismatch, dropping frame {:02X?}", frame);
            return None;
        }

        let function = frame[1];
        let payload = &frame[2..frame.len() - 2];
        let response = match Request::parse(function, payload) {
            Ok(request) => {
                debug!("Received Modbus request: {:?}", request);
                let mut registers = lock_registers(&self.registers);
                execute(&mut registers, request)
            }
            Err(code) => {
                warn!("Modbus exception {:?} for function 0x{:02X}", code, function);
                Response::Exception { function, code }
            }
        };

        Some(response.encode(self.slave_address))
    }
}

/// Apply a validated request to the register map
///
/// The caller holds the register lock for the whole call.
pub fn execute(registers: &mut RegisterMap, request: Request) -> Response {
    let function = request.function_code();
    let result = match request {
        Request::ReadHoldingRegisters { address, quantity } => registers
            .read_block(RegisterSpace::Holding, address, usize::from(quantity))
            .map(Response::ReadHoldingRegisters),
        Request::ReadInputRegisters { address, quantity } => registers
            .read_block(RegisterSpace::Input, address, usize::from(quantity))
            .map(Response::ReadInputRegisters),
        Request::WriteSingleRegister { address, value } => registers
            .write(RegisterSpace::Holding, address, value)
            .map(|_| {
                apply_write_side_effects(registers, address, std::slice::from_ref(&value));
                Response::WriteSingleRegister { address, value }
            }),
        Request::WriteMultipleRegisters { address, values } => registers
            .write_block(RegisterSpace::Holding, address, &values)
            .map(|_| {
                apply_write_side_effects(registers, address, &values);
                Response::WriteMultipleRegisters {
                    address,
                    quantity: values.len() as u16,
                }
            }),
    };

    result.unwrap_or_else(|e| {
        // Ranges were validated during parsing; keep the master informed anyway
        warn!("Register access rejected: {}", e);
        Response::Exception {
            function,
            code: ExceptionCode::IllegalDataAddress,
        }
    })
}

fn apply_write_side_effects(registers: &mut RegisterMap, address: u16, values: &[u16]) {
    let reset_requested = values
        .iter()
        .enumerate()
        .any(|(i, v)| usize::from(address) + i == usize::from(REG_RESET_ERROR_COMMAND) && *v == 1);
    if reset_requested {
        info!("Reset error command received, clearing system error");
        registers.set_holding(REG_SYSTEM_ERROR, 0);
        registers.set_holding(REG_SYSTEM_STATUS, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::crc::crc16;
    use crate::modbus::registers::*;

    fn engine() -> ProtocolEngine {
        ProtocolEngine::new(1, RegisterMap::new().into_shared())
    }

    fn frame(bytes: &[u8]) -> Vec<u8> {
        let mut frame = bytes.to_vec();
        append_crc(&mut frame);
        frame
    }

    fn write_multiple(address: u16, values: &[u16], byte_count: u8) -> Vec<u8> {
        let mut pdu = vec![0x01, FC_WRITE_MULTIPLE_REGISTERS];
        pdu.extend_from_slice(&address.to_be_bytes());
        pdu.extend_from_slice(&(values.len() as u16).to_be_bytes());
        pdu.push(byte_count);
        for v in values {
            pdu.extend_from_slice(&v.to_be_bytes());
        }
        frame(&pdu)
    }

    fn exception_of(response: &[u8]) -> Option<u8> {
        (response[1] & 0x80 != 0).then_some(response[2])
    }

    #[test]
    fn test_read_holding_registers() {
        let engine = engine();
        {
            let mut map = lock_registers(engine.registers());
            for i in 0..4 {
                map.set_holding(channel(REG_ANALOG_INPUT_1, i), 0x1000 + i as u16);
            }
        }
        let response = engine
            .handle_frame(&frame(&[0x01, 0x03, 0x00, 0x10, 0x00, 0x04]))
            .unwrap();
        assert_eq!(
            &response[..11],
            &[0x01, 0x03, 0x08, 0x10, 0x00, 0x10, 0x01, 0x10, 0x02, 0x10, 0x03]
        );
        assert!(verify_crc(&response));
    }

    #[test]
    fn test_foreign_address_is_dropped() {
        let engine = engine();
        assert!(engine
            .handle_frame(&frame(&[0x02, 0x03, 0x00, 0x00, 0x00, 0x01]))
            .is_none());
    }

    #[test]
    fn test_corrupted_crc_is_dropped() {
        let engine = engine();
        let requests = [
            frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]),
            frame(&[0x01, 0x06, 0x00, 0x40, 0x00, 0x01]),
            frame(&[0x01, 0x2B, 0x0E, 0x01, 0x00, 0x00]),
        ];
        for mut request in requests {
            let last = request.len() - 1;
            request[last] ^= 0xA5;
            assert!(engine.handle_frame(&request).is_none());
        }
    }

    #[test]
    fn test_read_past_end_is_illegal_address() {
        let engine = engine();
        let cases = [
            (0x0000u16, 0x0111u16),
            (0x010F, 2),
            (0x0100, 0x11),
            (0xFFFF, 1),
        ];
        for (address, quantity) in cases {
            let mut pdu = vec![0x01, 0x03];
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&quantity.to_be_bytes());
            let response = engine.handle_frame(&frame(&pdu)).unwrap();
            assert_eq!(response[1], 0x83);
            assert_eq!(exception_of(&response), Some(0x02), "{address} {quantity}");
        }
        let response = engine
            .handle_frame(&frame(&[0x01, 0x04, 0x00, 0x1F, 0x00, 0x02]))
            .unwrap();
        assert_eq!(exception_of(&response), Some(0x02));
    }

    #[test]
    fn test_quantity_limits_are_illegal_value() {
        let engine = engine();
        let response = engine
            .handle_frame(&frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x00]))
            .unwrap();
        assert_eq!(exception_of(&response), Some(0x03));
        let response = engine
            .handle_frame(&frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x7E]))
            .unwrap();
        assert_eq!(exception_of(&response), Some(0x03));
    }

    #[test]
    fn test_unsupported_function_is_illegal_function() {
        let engine = engine();
        for function in [0x01u8, 0x02, 0x05, 0x0F, 0x2B] {
            let response = engine
                .handle_frame(&frame(&[0x01, function, 0x00, 0x00, 0x00, 0x01]))
                .unwrap();
            assert_eq!(response.len(), 5);
            assert_eq!(response[1], function | 0x80);
            assert_eq!(response[2], 0x01);
            assert!(verify_crc(&response));
        }
    }

    #[test]
    fn test_write_single_round_trip() {
        let engine = engine();
        for address in [0x0000u16, 0x0044, 0x004B, 0x010F] {
            let mut pdu = vec![0x01, 0x06];
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&0xBEEFu16.to_be_bytes());
            let request = frame(&pdu);
            let response = engine.handle_frame(&request).unwrap();
            assert_eq!(response, request);

            let mut read = vec![0x01, 0x03];
            read.extend_from_slice(&address.to_be_bytes());
            read.extend_from_slice(&1u16.to_be_bytes());
            let response = engine.handle_frame(&frame(&read)).unwrap();
            assert_eq!(&response[..5], &[0x01, 0x03, 0x02, 0xBE, 0xEF]);
        }
    }

    #[test]
    fn test_write_single_out_of_range() {
        let engine = engine();
        let response = engine
            .handle_frame(&frame(&[0x01, 0x06, 0x01, 0x10, 0x00, 0x01]))
            .unwrap();
        assert_eq!(exception_of(&response), Some(0x02));
    }

    #[test]
    fn test_write_multiple_updates_block() {
        let engine = engine();
        let request = write_multiple(REG_SAFETY_ZONE1_THRESHOLD, &[300, 600, 900, 1200], 8);
        let response = engine.handle_frame(&request).unwrap();
        assert_eq!(
            &response[..6],
            &[0x01, 0x10, 0x00, 0x44, 0x00, 0x04],
            "echo address and quantity"
        );
        let map = lock_registers(engine.registers());
        assert_eq!(
            map.read_block(RegisterSpace::Holding, REG_SAFETY_ZONE1_THRESHOLD, 4)
                .unwrap(),
            vec![300, 600, 900, 1200]
        );
    }

    #[test]
    fn test_write_multiple_byte_count_mismatch_leaves_map_unchanged() {
        let engine = engine();
        let before = lock_registers(engine.registers()).clone();
        for byte_count in [0u8, 2, 3, 5, 6] {
            let request = write_multiple(0x0040, &[1, 1], byte_count);
            let response = engine.handle_frame(&request).unwrap();
            assert_eq!(response[1], 0x90);
            assert_eq!(exception_of(&response), Some(0x02), "byte count {byte_count}");
        }
        assert_eq!(*lock_registers(engine.registers()), before);
    }

    #[test]
    fn test_write_multiple_past_end_leaves_map_unchanged() {
        let engine = engine();
        let before = lock_registers(engine.registers()).clone();
        let request = write_multiple(0x010E, &[7, 7, 7], 6);
        let response = engine.handle_frame(&request).unwrap();
        assert_eq!(exception_of(&response), Some(0x02));
        assert_eq!(*lock_registers(engine.registers()), before);
    }

    #[test]
    fn test_reset_error_command_clears_system_error() {
        let engine = engine();
        {
            let mut map = lock_registers(engine.registers());
            map.set_holding(REG_SYSTEM_ERROR, 0x0011);
            map.set_holding(REG_SYSTEM_STATUS, 1);
        }
        engine
            .handle_frame(&frame(&[0x01, 0x06, 0x01, 0x09, 0x00, 0x01]))
            .unwrap();
        let map = lock_registers(engine.registers());
        assert_eq!(map.holding(REG_SYSTEM_ERROR), 0);
        assert_eq!(map.holding(REG_SYSTEM_STATUS), 0);
    }

    #[test]
    fn test_reset_error_command_through_write_multiple() {
        let engine = engine();
        lock_registers(engine.registers()).set_holding(REG_SYSTEM_ERROR, 0x0002);
        engine
            .handle_frame(&write_multiple(REG_SYSTEM_ERROR, &[0x0002, 1], 4))
            .unwrap();
        assert_eq!(lock_registers(engine.registers()).holding(REG_SYSTEM_ERROR), 0);
    }

    #[test]
    fn test_other_values_do_not_reset() {
        let engine = engine();
        lock_registers(engine.registers()).set_holding(REG_SYSTEM_ERROR, 0x0004);
        engine
            .handle_frame(&frame(&[0x01, 0x06, 0x01, 0x09, 0x00, 0x02]))
            .unwrap();
        assert_eq!(
            lock_registers(engine.registers()).holding(REG_SYSTEM_ERROR),
            0x0004
        );
    }

    #[test]
    fn test_exception_frame_layout() {
        let bytes = Response::Exception {
            function: 0x03,
            code: ExceptionCode::IllegalDataAddress,
        }
        .encode(7);
        assert_eq!(&bytes[..3], &[0x07, 0x83, 0x02]);
        assert_eq!(crc16(&bytes[..3]).to_le_bytes(), [bytes[3], bytes[4]]);
    }

    #[test]
    fn test_truncated_payload_is_illegal_value() {
        assert_eq!(
            Request::parse(FC_READ_HOLDING_REGISTERS, &[0x00, 0x00, 0x00]),
            Err(ExceptionCode::IllegalDataValue)
        );
        assert_eq!(
            Request::parse(FC_WRITE_MULTIPLE_REGISTERS, &[0x00, 0x40, 0x00, 0x02, 0x04, 0x00]),
            Err(ExceptionCode::IllegalDataValue)
        );
    }
}
