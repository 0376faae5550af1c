// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_safety_io::config::Config;
use std::fs;
use std::path::Path;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

#[test]
fn test_config_deserialization_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Valid YAML with the wrong types
    let invalid_yaml = r#"
modbus:
  port: "not-an-integer"
  address: 12345
  enabled: "true"
"#;
    fs::write(&config_path, invalid_yaml)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");

    let sample_path = config_path.with_extension("sample.yaml");
    assert!(
        Path::new(&sample_path).exists(),
        "Sample config file was not created"
    );

    // The sample file is a valid configuration
    let sample_config = Config::from_file(&sample_path)?;
    assert_eq!(sample_config.modbus.port, 5020);

    Ok(())
}

#[test]
fn test_config_validation_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Port out of range
    let invalid_config = r#"
modbus:
  enabled: true
  port: 99999
  address: "127.0.0.1"
"#;
    fs::write(&config_path, invalid_config)?;

    match Config::from_file(&config_path) {
        Ok(_) => panic!("Config loading should have failed"),
        Err(e) => assert!(e.to_string().contains("validation failed"), "{}", e),
    }
    assert!(config_path.with_extension("sample.yaml").exists());

    Ok(())
}

#[test]
fn test_unknown_field_is_rejected() -> Result<()> {
    setup();
    let result = Config::from_yaml_str(
        r#"
safety:
  cycle_period_ms: 20
  zone_thershold: [1, 2, 3, 4]
"#,
    );
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_specific_rules_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Schema-valid but thresholds are not ascending
    let invalid_config = r#"
safety:
  zone_thresholds: [1500, 1000, 500, 2000]
"#;
    fs::write(&config_path, invalid_config)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err());
    assert!(config_path.with_extension("sample.yaml").exists());

    // The invalid file is left untouched
    assert_eq!(fs::read_to_string(&config_path)?, invalid_config);

    Ok(())
}

#[test]
fn test_analog_raw_out_of_range() {
    setup();
    let result = Config::from_yaml_str(
        r#"
io:
  driver: simulated
  simulated:
    analog_raw: [400, 400, 5000, 400]
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_invalid_yaml_syntax() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "modbus: [unclosed")?;

    assert!(Config::from_file(&config_path).is_err());
    assert!(config_path.with_extension("sample.yaml").exists());
    Ok(())
}
