// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::Config;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_safety_io --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema = serde_json::to_string_pretty(&super::config_schema()?)
        .context("Cannot format the configuration schema")?;
    println!("{}", schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Accepts IPv4/IPv6 literals and the special value "localhost".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost")
}

/// Validates the configuration against rules the JSON schema cannot express.
///
/// # Validation Rules
///
/// - **Zone thresholds**: strictly ascending, Z1 < Z2 < Z3 < Z4
/// - **Slave address**: 1-247 (0 is broadcast, 248-255 are reserved)
/// - **Cycle period**: non-zero
/// - **Bind address**: a valid IP address when the Modbus slave is enabled
/// - **Reference voltage**: strictly positive
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let thresholds = &config.safety.zone_thresholds;
    if !thresholds.windows(2).all(|pair| pair[0] < pair[1]) {
        anyhow::bail!(
            "Safety zone thresholds must be strictly ascending: {:?}",
            thresholds
        );
    }

    if !(1..=247).contains(&config.modbus.slave_address) {
        anyhow::bail!(
            "Invalid Modbus slave address: {} (expected 1-247)",
            config.modbus.slave_address
        );
    }

    if config.safety.cycle_period_ms == 0 {
        anyhow::bail!("Safety cycle period must be greater than zero");
    }

    let reference = config.safety.adc_reference_voltage;
    if reference.is_nan() || reference <= 0.0 {
        anyhow::bail!(
            "Invalid ADC reference voltage: {}",
            config.safety.adc_reference_voltage
        );
    }

    if config.modbus.enabled && !is_valid_ip_address(&config.modbus.address) {
        anyhow::bail!("Invalid Modbus bind address: {}", config.modbus.address);
    }

    if config.safety.proximity_threshold > thresholds[3] {
        warn!(
            "Proximity threshold {} is beyond the outermost safety zone {}",
            config.safety.proximity_threshold, thresholds[3]
        );
    }

    Ok(())
}
