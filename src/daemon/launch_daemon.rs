// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::Config;
use crate::io::{get_sensor_io_from_config, SensorIo};
use crate::modbus::register_map::{lock_registers, RegisterMap, SharedRegisterMap};
use crate::modbus::registers::{REG_SAFETY_SYSTEM_STATUS, REG_SYSTEM_ERROR};
use crate::modbus::SafetyModbusServer;
use crate::safety::{SafetyMonitorDaemon, SharedSafetyState};

/// Represents a daemon task that can be started and managed
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    registers: SharedRegisterMap,
    safety: Option<SafetyMonitorDaemon>,
    modbus_addr: Option<SocketAddr>,
    heartbeat_period: Duration,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            registers: RegisterMap::new().into_shared(),
            safety: None,
            modbus_addr: None,
            heartbeat_period: Duration::from_secs(60),
        }
    }

    /// Register map shared by the Modbus slave and the safety monitor
    pub fn registers(&self) -> &SharedRegisterMap {
        &self.registers
    }

    /// Address the Modbus slave actually listens on, once launched
    pub fn modbus_addr(&self) -> Option<SocketAddr> {
        self.modbus_addr
    }

    /// Diagnostic snapshot of the safety monitor, once launched
    pub fn safety_state(&self) -> Option<&SharedSafetyState> {
        self.safety.as_ref().map(|s| s.shared_state())
    }

    /// Clear the protective latch through the safety monitor
    pub fn acknowledge_latch(&self) -> Result<()> {
        match &self.safety {
            Some(safety) => safety.acknowledge_latch(),
            None => anyhow::bail!("Safety monitor is not running"),
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// The sensor driver is built from the `io` section.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let io = get_sensor_io_from_config(&config.io)?;
        self.launch_with_io(config, io).await
    }

    /// Launch all configured tasks with an explicit sensor driver
    pub async fn launch_with_io(&mut self, config: &Config, io: Box<dyn SensorIo>) -> Result<()> {
        *lock_registers(&self.registers) = RegisterMap::from_config(config);

        if config.modbus.enabled {
            self.start_modbus_server(config).await?;
        }

        if config.safety.enabled {
            self.start_safety_monitor(config, io)?;
        }

        self.start_heartbeat()?;

        Ok(())
    }

    /// Start the Modbus RTU slave
    async fn start_modbus_server(&mut self, config: &Config) -> Result<()> {
        let host = match config.modbus.address.as_str() {
            "localhost" => "127.0.0.1",
            address => address,
        };
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("Invalid Modbus bind address {}", config.modbus.address))?;
        let socket_addr = SocketAddr::new(ip, config.modbus.port);

        let listener = TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("Failed to bind Modbus server on {}", socket_addr))?;
        let local_addr = listener.local_addr()?;
        self.modbus_addr = Some(local_addr);
        info!(
            "Starting Modbus RTU slave {} on {}",
            config.modbus.slave_address, local_addr
        );

        let server = SafetyModbusServer::new(self.registers.clone(), &config.modbus);
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            let server_handle = tokio::spawn(async move {
                if let Err(e) = server.serve(listener).await {
                    error!("Modbus server error: {}", e);
                }
            });

            while running.load(Ordering::SeqCst) && !server_handle.is_finished() {
                // Check every 100 ms if we should continue running
                time::sleep(Duration::from_millis(100)).await;
            }

            info!("Shutting down Modbus server...");
            server_handle.abort();

            match time::timeout(Duration::from_secs(5), server_handle).await {
                Ok(_) => info!("Modbus server shut down successfully"),
                Err(_) => warn!("Modbus server shutdown timed out, forcing termination"),
            }

            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start the periodic safety monitor
    fn start_safety_monitor(&mut self, config: &Config, io: Box<dyn SensorIo>) -> Result<()> {
        let mut safety =
            SafetyMonitorDaemon::new(&config.safety, self.registers.clone(), self.running.clone());
        safety.start(io)?;
        if let Some(handle) = safety.take_handle() {
            self.tasks.push(handle);
        }
        self.safety = Some(safety);
        Ok(())
    }

    /// Start a heartbeat task that logs system status periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let registers = self.registers.clone();
        let period = self.heartbeat_period;
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                let (status, system_error) = {
                    let map = lock_registers(&registers);
                    (
                        map.holding(REG_SAFETY_SYSTEM_STATUS),
                        map.holding(REG_SYSTEM_ERROR),
                    )
                };
                debug!(
                    "Daemon heartbeat: safety status {}, system error 0x{:04X}",
                    status, system_error
                );
                // Sleep in short steps so that shutdown is not delayed by a full period
                let mut slept = Duration::ZERO;
                while slept < period && running.load(Ordering::SeqCst) {
                    time::sleep(Duration::from_millis(100)).await;
                    slept += Duration::from_millis(100);
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        // Tasks should check the running flag and terminate gracefully
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Task failed: {}", e),
                Err(e) => error!("Task panicked: {}", e),
            }
        }
        Ok(())
    }
}
