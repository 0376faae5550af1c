// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust safety I/O library
//!
//! Industrial I/O safety module: a Modbus RTU slave exposing a register map,
//! and a safety monitor that classifies distance sensors and digital safety
//! inputs into zones and drives latching protective outputs. The register
//! map is the only state shared between the two.

pub mod config;
pub mod daemon;
pub mod io;
pub mod modbus;
pub mod safety;

pub use config::Config;
