// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! Background services of the safety I/O module: the Modbus RTU slave, the
//! periodic safety monitor and a heartbeat. All of them share one register
//! map and stop together when the running flag is cleared.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_safety_io::{config::Config, daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!     println!("RTU slave listening on {:?}", daemon.modbus_addr());
//!
//!     tokio::signal::ctrl_c().await?;
//!     daemon.shutdown();
//!     daemon.join().await
//! }
//! ```

pub mod launch_daemon;

pub use launch_daemon::Daemon;
