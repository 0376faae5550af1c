// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Periodic safety monitor task
//!
//! [`SafetyMonitorDaemon`] runs a [`SafetyMonitor`] cycle on a fixed tokio
//! interval and accepts commands over an unbounded channel. After each cycle
//! the diagnostic [`SafetySnapshot`] is refreshed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::monitor::SafetyMonitor;
use super::shared_state::{SafetySnapshot, SharedSafetyState};
use crate::config::SafetyConfig;
use crate::io::SensorIo;
use crate::modbus::register_map::SharedRegisterMap;

/// Commands accepted by the safety monitor task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyCommand {
    /// Clear the protective latch
    AcknowledgeLatch,
    /// Stop the monitor loop
    Stop,
}

/// Safety monitor running as a periodic tokio task
pub struct SafetyMonitorDaemon {
    cycle_period: Duration,
    reference_voltage: f32,
    registers: SharedRegisterMap,
    shared_state: SharedSafetyState,
    running: Arc<AtomicBool>,
    task_handle: Option<JoinHandle<Result<()>>>,
    command_sender: Option<mpsc::UnboundedSender<SafetyCommand>>,
}

impl SafetyMonitorDaemon {
    pub fn new(
        config: &SafetyConfig,
        registers: SharedRegisterMap,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cycle_period: Duration::from_millis(config.cycle_period_ms),
            reference_voltage: config.adc_reference_voltage,
            registers,
            shared_state: Arc::new(RwLock::new(SafetySnapshot::default())),
            running,
            task_handle: None,
            command_sender: None,
        }
    }

    pub fn shared_state(&self) -> &SharedSafetyState {
        &self.shared_state
    }

    /// Start the monitor loop with the given sensor driver
    pub fn start(&mut self, mut io: Box<dyn SensorIo>) -> Result<()> {
        if self.task_handle.is_some() {
            return Err(anyhow!("Safety monitor already started"));
        }

        let cycle_period = self.cycle_period;
        info!(
            "Starting safety monitor with cycle period {:?}",
            cycle_period
        );

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<SafetyCommand>();
        self.command_sender = Some(command_tx);

        let registers = self.registers.clone();
        let shared_state = self.shared_state.clone();
        let running = self.running.clone();
        let mut monitor = SafetyMonitor::new(self.reference_voltage);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(cycle_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while running.load(Ordering::Relaxed) {
                tokio::select! {
                    command = command_rx.recv() => {
                        match command {
                            Some(SafetyCommand::AcknowledgeLatch) => {
                                monitor.acknowledge_latch(&registers);
                            }
                            Some(SafetyCommand::Stop) | None => {
                                info!("Safety monitor received stop command");
                                break;
                            }
                        }
                    }

                    _ = interval.tick() => {
                        let state = monitor.process(io.as_mut(), &registers);
                        let snapshot = SafetySnapshot::from_monitor(&monitor);
                        *shared_state.write().await = snapshot;

                        // Every 1000 cycles
                        if state.cycle_count % 1000 == 0 {
                            debug!(
                                "Safety monitor completed {} cycles, status {:?}",
                                state.cycle_count, state.status
                            );
                        }
                    }
                }
            }

            info!("Safety monitor stopped");
            Ok(())
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Send a command to the running loop
    pub fn send(&self, command: SafetyCommand) -> Result<()> {
        match self.command_sender {
            Some(ref sender) => sender
                .send(command)
                .map_err(|e| anyhow!("Failed to send safety command: {}", e)),
            None => Err(anyhow!("Safety monitor not started")),
        }
    }

    /// Clear the protective latch
    pub fn acknowledge_latch(&self) -> Result<()> {
        self.send(SafetyCommand::AcknowledgeLatch)
    }

    /// Take the task handle so that the caller can await it alongside other tasks
    pub fn take_handle(&mut self) -> Option<JoinHandle<Result<()>>> {
        self.task_handle.take()
    }

    /// Stop the loop and wait for it to finish
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(ref sender) = self.command_sender {
            // The loop may already be gone if the running flag was cleared
            let _ = sender.send(SafetyCommand::Stop);
        }
        if let Some(handle) = self.task_handle.take() {
            handle.await??;
        }
        Ok(())
    }
}
