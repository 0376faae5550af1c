// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_safety_io::config::{utils, Config, ModbusConfig};
use rust_safety_io::modbus::register_map::RegisterMap;
use rust_safety_io::modbus::registers::*;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    // Create a temporary directory
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Create a custom config
    let mut config = Config {
        modbus: ModbusConfig {
            enabled: true,
            port: 1502,
            address: "192.168.1.1".to_string(),
            slave_address: 12,
            ..Default::default()
        },
        ..Default::default()
    };
    config.safety.zone_thresholds = [300, 600, 900, 1200];
    config.safety.analog_enabled = [true, true, false, false];
    config.device.device_id = 42;

    // Save config to file
    config.save_to_file(&config_path)?;

    // Load config from file
    let loaded_config = Config::from_file(&config_path)?;

    // Loaded values match what was saved
    assert_eq!(loaded_config.modbus.port, 1502);
    assert_eq!(loaded_config.modbus.address, "192.168.1.1");
    assert_eq!(loaded_config.modbus.slave_address, 12);
    assert_eq!(loaded_config.safety.zone_thresholds, [300, 600, 900, 1200]);
    assert_eq!(
        loaded_config.safety.analog_enabled,
        [true, true, false, false]
    );
    assert_eq!(loaded_config.device.device_id, 42);

    // Test loading default config for non-existent file
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;

    // Verify default config was created
    assert!(non_existent_path.exists());
    assert_eq!(default_config.modbus.port, 5020);
    assert_eq!(default_config.modbus.address, "127.0.0.1");
    assert_eq!(default_config.modbus.slave_address, 1);
    assert_eq!(default_config.safety.cycle_period_ms, 20);

    // The file written for the missing path loads back
    let reloaded = Config::from_file(&non_existent_path)?;
    assert_eq!(reloaded.safety.zone_thresholds, [500, 1000, 1500, 2000]);

    Ok(())
}

#[test]
fn test_apply_args() {
    let mut config = Config::default();
    assert!(config.modbus.enabled);
    assert_eq!(config.modbus.port, 5020);

    // Only provided values override
    config.apply_args(None, None, Some(1502), None, None);
    assert_eq!(config.modbus.port, 1502);
    assert_eq!(config.modbus.address, "127.0.0.1");

    config.apply_args(
        Some(false),
        Some("0.0.0.0".to_string()),
        None,
        Some(7),
        Some(50),
    );
    assert!(!config.modbus.enabled);
    assert_eq!(config.modbus.address, "0.0.0.0");
    assert_eq!(config.modbus.port, 1502);
    assert_eq!(config.modbus.slave_address, 7);
    assert_eq!(config.safety.cycle_period_ms, 50);
}

#[test]
fn test_config_validation() -> Result<()> {
    // Valid config
    let valid_config = Config::default();
    assert!(utils::validate_specific_rules(&valid_config).is_ok());

    // Broadcast address cannot be a slave address
    let mut config = Config::default();
    config.modbus.slave_address = 0;
    assert!(utils::validate_specific_rules(&config).is_err());

    // Thresholds must be strictly ascending
    let mut config = Config::default();
    config.safety.zone_thresholds = [500, 500, 1500, 2000];
    assert!(utils::validate_specific_rules(&config).is_err());

    // Zero cycle period
    let mut config = Config::default();
    config.safety.cycle_period_ms = 0;
    assert!(utils::validate_specific_rules(&config).is_err());

    // Invalid bind address only matters when the slave is enabled
    let mut config = Config::default();
    config.modbus.address = "not-an-ip".to_string();
    assert!(utils::validate_specific_rules(&config).is_err());
    config.modbus.enabled = false;
    assert!(utils::validate_specific_rules(&config).is_ok());

    Ok(())
}

#[test]
fn test_partial_yaml_uses_defaults() -> Result<()> {
    let config = Config::from_yaml_str(
        r#"
modbus:
  enabled: true
  port: 1502
  address: "::1"
safety:
  auto_reset: true
  analog_enabled: [true, false, false, false]
"#,
    )?;

    assert_eq!(config.modbus.address, "::1");
    assert_eq!(config.modbus.slave_address, 1);
    assert!(config.safety.auto_reset);
    assert_eq!(config.safety.cycle_period_ms, 20);
    assert_eq!(config.device.device_id, DEFAULT_DEVICE_ID);

    // A null document is the default configuration
    let empty = Config::from_yaml_str("~")?;
    assert_eq!(empty.modbus.port, 5020);

    Ok(())
}

#[test]
fn test_register_map_from_config() {
    let mut config = Config::default();
    config.device.device_id = 9;
    config.safety.zone_thresholds = [100, 200, 300, 400];
    config.safety.analog_enabled = [false, true, false, true];
    config.safety.digital_active_level = [true, false, false, false];
    config.safety.auto_reset = true;
    config.safety.analog_offsets = [0, 120, 0, 0];

    let map = RegisterMap::from_config(&config);

    assert_eq!(map.holding(REG_DEVICE_ID), 9);
    assert_eq!(map.holding(REG_SAFETY_ZONE1_THRESHOLD), 100);
    assert_eq!(map.holding(channel(REG_SAFETY_ZONE1_THRESHOLD, 3)), 400);
    assert_eq!(map.holding(REG_ANALOG_1_ENABLE), 0);
    assert_eq!(map.holding(channel(REG_ANALOG_1_ENABLE, 1)), 1);
    assert_eq!(map.holding(REG_DI1_ACTIVE_LEVEL), 1);
    assert_eq!(map.holding(REG_AUTO_RESET_ENABLE), 1);
    assert_eq!(map.holding(channel(REG_ANALOG_1_OFFSET, 1)), 120);
    assert_eq!(map.holding(REG_SAFETY_MODE), SAFETY_MODE_NORMAL);
    assert_eq!(map.holding(REG_SAFETY_RESET_FLAG), 0);
}
