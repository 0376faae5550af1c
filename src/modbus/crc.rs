// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! CRC-16/MODBUS
//!
//! Reflected polynomial 0xA001 (0x8005), initial value 0xFFFF, no final XOR.
//! The checksum is transmitted low byte first.

/// Compute the CRC-16/MODBUS of `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the CRC of the current contents of `frame`, low byte first
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Check the trailing two CRC bytes of a complete frame
///
/// Frames shorter than 4 bytes (address, function, CRC) never verify.
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < 4 {
        return false;
    }
    let (body, trailer) = frame.split_at(frame.len() - 2);
    crc16(body) == u16::from_le_bytes([trailer[0], trailer[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // Read 4 holding registers from 0x0010 on slave 1
        let frame = [0x01, 0x03, 0x00, 0x10, 0x00, 0x04];
        assert_eq!(crc16(&frame).to_le_bytes(), [0x45, 0xCC]);
        // "123456789" check value of CRC-16/MODBUS
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_append_then_verify() {
        let samples: [&[u8]; 4] = [
            &[0x00, 0x00],
            &[0x01, 0x06, 0x01, 0x09, 0x00, 0x01],
            &[0xFF; 32],
            b"rtu frame payload",
        ];
        for sample in samples {
            let mut frame = sample.to_vec();
            append_crc(&mut frame);
            assert_eq!(frame.len(), sample.len() + 2);
            assert!(verify_crc(&frame), "{sample:02X?}");
        }
    }

    #[test]
    fn test_corrupted_trailer_fails() {
        let mut frame = vec![0x01, 0x03, 0x00, 0x10, 0x00, 0x04];
        append_crc(&mut frame);
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(!verify_crc(&frame));
        frame[last] ^= 0x01;
        frame[last - 1] = frame[last - 1].wrapping_add(1);
        assert!(!verify_crc(&frame));
    }

    #[test]
    fn test_short_frames_never_verify() {
        assert!(!verify_crc(&[]));
        assert!(!verify_crc(&[0xFF, 0xFF]));
        assert!(!verify_crc(&[0x01, 0x40, 0xBF]));
    }
}
