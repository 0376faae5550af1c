// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the safety I/O module
//!
//! The configuration is backed by a YAML file and validated against an
//! embedded JSON schema before it is deserialized.
//!
//! ## Sections
//!
//! - `modbus`: RTU slave endpoint, slave address and timeouts
//! - `device`: identity registers published at 0x0100-0x0106
//! - `safety`: monitor period, calibration, zones and input enables
//! - `io`: sensor driver selection
//!
//! Every section may be omitted; the factory defaults are used instead.
//! The same values seed the configuration registers at start-up, after which
//! a Modbus master may change them at run time.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_safety_io::config::Config;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut config = Config::from_file("config.yaml")?;
//!
//! // Listen on every interface as slave 5
//! config.apply_args(None, Some("0.0.0.0".to_string()), None, Some(5), None);
//!
//! assert_eq!(config.modbus.slave_address, 5);
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod io;
pub mod modbus;
pub mod safety;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

pub use device::DeviceConfig;
pub use io::{IoConfig, IoDriver, SimulatedIoConfig};
pub use modbus::ModbusConfig;
pub use safety::SafetyConfig;

const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration of the safety I/O module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Modbus RTU slave settings.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Identity registers.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Safety monitor settings and initial configuration registers.
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Sensor driver settings.
    #[serde(default)]
    pub io: IoConfig,
}

/// The embedded configuration schema
pub fn config_schema() -> Result<serde_json::Value> {
    serde_json::from_str(CONFIG_SCHEMA).context("Embedded configuration schema is not valid JSON")
}

impl Config {
    /// Write a default configuration next to a rejected one
    ///
    /// `config.yaml` gives `config.sample.yaml`.
    fn write_sample_next_to(path: &Path) -> Result<()> {
        let sample_path = path.with_extension("sample.yaml");

        if let Some(dir) = sample_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Cannot create directory {:?}", dir))?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Cannot write sample configuration {:?}", sample_path))?;

        warn!(
            "A valid sample configuration was written to {:?}, edit it and use it instead",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. A file that
    /// fails validation produces a `.sample.yaml` next to it and an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("No configuration at {:?}, writing the defaults there", path);
            let config = Self::default();
            config.save_to_file(path)?;
            return Ok(config);
        }

        debug!("Reading configuration {:?}", path);
        let contents =
            fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))?;

        Self::from_yaml_str(&contents).inspect_err(|_| {
            if let Err(e) = Self::write_sample_next_to(path) {
                error!("Sample configuration not written: {}", e);
            }
        })
    }

    /// Parse, validate and deserialize a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let yaml: serde_yml::Value =
            serde_yml::from_str(contents).context("Configuration is not valid YAML")?;

        // The schema is checked on the JSON form of the document
        let mut document =
            serde_json::to_value(&yaml).context("Configuration cannot be represented as JSON")?;
        if document.is_null() {
            document = serde_json::Value::Object(Default::default());
        }

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&config_schema()?)?;
        if let Err(error) = validator.validate(&document) {
            error!("Configuration rejected by the schema: {}", error);
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = serde_json::from_value(document)
            .context("Configuration does not match the expected structure")?;

        utils::validate_specific_rules(&config)
            .inspect_err(|err| error!("Configuration rejected: {}", err))?;

        Ok(config)
    }

    /// Save the configuration as YAML
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yml::to_string(self).context("Cannot serialize configuration")?;

        let mut file = File::create(path).with_context(|| format!("Cannot create {:?}", path))?;
        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Cannot write {:?}", path))?;

        Ok(())
    }

    /// Override configuration values from the command line
    ///
    /// `None` keeps the value loaded from the file.
    pub fn apply_args(
        &mut self,
        modbus_enabled: Option<bool>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        slave_address: Option<u8>,
        cycle_period_ms: Option<u64>,
    ) {
        if let Some(enabled) = modbus_enabled {
            debug!("modbus.enabled = {} (command line)", enabled);
            self.modbus.enabled = enabled;
        }
        if let Some(address) = modbus_address {
            debug!("modbus.address = {} (command line)", address);
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            debug!("modbus.port = {} (command line)", port);
            self.modbus.port = port;
        }
        if let Some(slave) = slave_address {
            debug!("modbus.slave_address = {} (command line)", slave);
            self.modbus.slave_address = slave;
        }
        if let Some(period) = cycle_period_ms {
            debug!("safety.cycle_period_ms = {} (command line)", period);
            self.safety.cycle_period_ms = period;
        }
    }
}
