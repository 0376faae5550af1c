// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus RTU slave session
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" as well. The server is the device that provides data
//! (the Modbus slave), while the client is the device that requests data (the master).
//!
//! The RTU byte stream is read from any `AsyncRead + AsyncWrite` transport, one byte
//! at a time, into a [`FrameReceiver`]. A completed frame is dispatched synchronously
//! to the [`ProtocolEngine`] and the response, if any, is written back within the
//! configured response timeout.
//!
//! [`SafetyModbusServer::serve`] accepts RTU-over-TCP connections (serial device
//! servers, gateways) and serves them one at a time, since a Modbus RTU line has a
//! single master.
//!
//! ## Register Map
//!
//! See [`crate::modbus::registers`] for the complete address table.

use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use super::frame::{FrameReceiver, ReceiverEvent, FRAME_BUFFER_SIZE};
use super::protocol::ProtocolEngine;
use super::register_map::SharedRegisterMap;
use crate::config::ModbusConfig;

/// Failure of the underlying byte transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("response transmission timed out after {0:?}")]
    ResponseTimeout(Duration),
}

/// Modbus RTU slave of the safety I/O module
#[derive(Debug, Clone)]
pub struct SafetyModbusServer {
    engine: ProtocolEngine,
    response_timeout: Duration,
    inter_frame_timeout: Option<Duration>,
}

impl SafetyModbusServer {
    /// Create a server answering as `config.slave_address` over the shared register map
    pub fn new(registers: SharedRegisterMap, config: &ModbusConfig) -> Self {
        let inter_frame_timeout = match config.inter_frame_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Self {
            engine: ProtocolEngine::new(config.slave_address, registers),
            response_timeout: Duration::from_millis(config.response_timeout_ms),
            inter_frame_timeout,
        }
    }

    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    /// Serve one RTU byte stream until the peer closes it
    ///
    /// A response that cannot be transmitted within the response timeout is
    /// abandoned and reception restarts from a clean state.
    pub async fn serve_connection<T>(&self, mut stream: T) -> Result<(), TransportError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut receiver = FrameReceiver::new();
        let mut buffer = [0u8; FRAME_BUFFER_SIZE];

        loop {
            let read = match self.inter_frame_timeout {
                Some(silence) if receiver.is_accumulating() => {
                    match timeout(silence, stream.read(&mut buffer)).await {
                        Ok(read) => read,
                        Err(_) => {
                            debug!(
                                "Inter-frame silence exceeded, discarding {} bytes",
                                receiver.len()
                            );
                            receiver.abort();
                            continue;
                        }
                    }
                }
                _ => stream.read(&mut buffer).await,
            };

            let count = match read {
                Ok(0) => {
                    debug!("Modbus peer closed the connection");
                    return Ok(());
                }
                Ok(count) => count,
                Err(e) => {
                    receiver.abort();
                    return Err(TransportError::Io(e));
                }
            };

            for byte in &buffer[..count] {
                match receiver.push(*byte) {
                    ReceiverEvent::Pending => {}
                    ReceiverEvent::Overflow => {
                        warn!("RTU frame buffer overflow, partial frame discarded");
                    }
                    ReceiverEvent::FrameComplete => {
                        let response = receiver
                            .frame()
                            .and_then(|frame| self.engine.handle_frame(frame));
                        receiver.reset();
                        if let Some(response) = response {
                            match self.transmit(&mut stream, &response).await {
                                Ok(()) => {}
                                Err(TransportError::ResponseTimeout(limit)) => {
                                    warn!("Response not sent within {:?}, abandoned", limit);
                                    receiver.reset();
                                }
                                Err(e) => return Err(e),
                            }
                        }
                    }
                }
            }
        }
    }

    async fn transmit<T>(&self, stream: &mut T, response: &[u8]) -> Result<(), TransportError>
    where
        T: AsyncWrite + Unpin,
    {
        let write = async {
            stream.write_all(response).await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        };
        match timeout(self.response_timeout, write).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TransportError::ResponseTimeout(self.response_timeout)),
        }
    }

    /// Accept RTU-over-TCP connections and serve them one at a time
    ///
    /// Runs until the listener fails; the caller cancels the task to stop it.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            info!("Modbus master connected from {}", peer);
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not disable Nagle on {}: {}", peer, e);
            }
            match self.serve_connection(stream).await {
                Ok(()) => info!("Modbus master {} disconnected", peer),
                Err(e) => error!("Modbus connection with {} failed: {}", peer, e),
            }
        }
    }
}
