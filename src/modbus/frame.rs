// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RTU frame reassembly
//!
//! Bytes arrive one at a time from the transport. The [`FrameReceiver`]
//! accumulates them into a bounded buffer and works out the expected frame
//! length from the function code:
//!
//! | Function code | Expected length |
//! |---------------|-----------------|
//! | 0x03, 0x04, 0x06 | 8 |
//! | 0x10 | 9 + byte count (known once byte 6 arrived) |
//! | anything else | 8 |
//!
//! Once the accumulated length reaches the expected length the frame is
//! complete and must be handed to the protocol engine before the receiver is
//! re-armed with [`FrameReceiver::reset`].

/// Size of the reassembly buffer, the largest RTU frame
pub const FRAME_BUFFER_SIZE: usize = 256;

/// Receiver state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for the first byte of a frame
    Idle,
    /// Part of a frame has been received
    Accumulating,
    /// A full frame is available through [`FrameReceiver::frame`]
    Complete,
    /// The partial frame was discarded (overflow or transport error)
    Error,
}

/// Outcome of feeding one byte into the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// More bytes are needed
    Pending,
    /// The frame is complete
    FrameComplete,
    /// The buffer overflowed and the partial frame was discarded
    Overflow,
}

/// Bounded RTU frame accumulator
#[derive(Debug)]
pub struct FrameReceiver {
    buffer: [u8; FRAME_BUFFER_SIZE],
    len: usize,
    expected: Option<usize>,
    state: ReceiverState,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReceiver {
    pub fn new() -> Self {
        Self {
            buffer: [0; FRAME_BUFFER_SIZE],
            len: 0,
            expected: None,
            state: ReceiverState::Idle,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// True while a frame is partially received
    pub fn is_accumulating(&self) -> bool {
        self.state == ReceiverState::Accumulating
    }

    /// Feed one byte
    ///
    /// A byte arriving after completion or after an error starts a new frame.
    pub fn push(&mut self, byte: u8) -> ReceiverEvent {
        if matches!(self.state, ReceiverState::Complete | ReceiverState::Error) {
            self.reset();
        }

        if self.len >= FRAME_BUFFER_SIZE {
            self.abort();
            return ReceiverEvent::Overflow;
        }

        self.buffer[self.len] = byte;
        self.len += 1;
        self.state = ReceiverState::Accumulating;

        if self.expected.is_none() {
            self.expected = expected_frame_len(&self.buffer[..self.len]);
        }

        match self.expected {
            Some(expected) if expected > FRAME_BUFFER_SIZE => {
                self.abort();
                ReceiverEvent::Overflow
            }
            Some(expected) if self.len >= expected => {
                self.state = ReceiverState::Complete;
                ReceiverEvent::FrameComplete
            }
            _ => ReceiverEvent::Pending,
        }
    }

    /// The completed frame, if any
    pub fn frame(&self) -> Option<&[u8]> {
        match self.state {
            ReceiverState::Complete => Some(&self.buffer[..self.len]),
            _ => None,
        }
    }

    /// Bytes accumulated so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Re-arm for a new frame
    pub fn reset(&mut self) {
        self.len = 0;
        self.expected = None;
        self.state = ReceiverState::Idle;
    }

    /// Discard the partial frame after a transport-level error
    pub fn abort(&mut self) {
        self.len = 0;
        self.expected = None;
        self.state = ReceiverState::Error;
    }
}

/// Expected total length of the frame starting with `buf`, once enough of
/// the header is known
pub fn expected_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    match buf[1] {
        0x03 | 0x04 | 0x06 => Some(8),
        0x10 => {
            if buf.len() < 7 {
                None
            } else {
                Some(9 + buf[6] as usize)
            }
        }
        _ => Some(8),
    }
}
