// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use std::path::PathBuf;
use tokio::signal;

use rust_safety_io::config::{self, Config};
use rust_safety_io::daemon::Daemon;

/// Industrial I/O safety module: Modbus RTU slave with zone-based safety monitoring
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file, created with defaults when missing
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Check a configuration file and exit
    #[arg(long, value_name = "FILE")]
    validate_config: Option<PathBuf>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Enable or disable the Modbus slave
    #[arg(long)]
    modbus_enabled: Option<bool>,

    /// Bind address of the RTU-over-TCP listener
    #[arg(long)]
    modbus_address: Option<String>,

    /// TCP port of the RTU-over-TCP listener
    #[arg(long)]
    modbus_port: Option<u16>,

    /// RTU slave address (1-247)
    #[arg(long)]
    slave_address: Option<u8>,

    /// Safety monitor cycle period in milliseconds
    #[arg(long)]
    cycle_period_ms: Option<u64>,

    /// Debug level logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// No logging at all
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Off,
            (false, true) => LevelFilter::Debug,
            (false, false) => LevelFilter::Info,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(args.log_level())
        .init();

    if args.show_config_schema {
        return config::utils::output_config_schema();
    }

    if let Some(path) = &args.validate_config {
        if !path.exists() {
            bail!("{} not found", path.display());
        }
        Config::from_file(path).with_context(|| format!("{} is not valid", path.display()))?;
        println!("{} is valid", path.display());
        return Ok(());
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(
        args.modbus_enabled,
        args.modbus_address.clone(),
        args.modbus_port,
        args.slave_address,
        args.cycle_period_ms,
    );
    // Command line values obey the same rules as the file
    config::utils::validate_specific_rules(&config)?;

    info!(
        "Safety I/O module starting (slave {}, cycle {} ms)",
        config.modbus.slave_address, config.safety.cycle_period_ms
    );
    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    if let Err(err) = signal::ctrl_c().await {
        log::error!("Cannot wait for Ctrl-C: {}", err);
    } else {
        info!("Ctrl-C received, stopping");
    }
    daemon.shutdown();
    daemon.join().await
}
