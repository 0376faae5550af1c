// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_modbus::prelude::*;

use rust_safety_io::modbus::registers::{REG_RESET_ERROR_COMMAND, REG_SAFETY_RESET_FLAG};

/// Modbus RTU-over-TCP master for inspecting a safety I/O module
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "5020")]
    port: u16,

    /// RTU slave address
    #[clap(long, default_value = "1")]
    slave: u8,

    /// Starting register address
    #[clap(long, default_value = "0")]
    register: u16,

    /// Number of registers to read
    #[clap(long, default_value = "6")]
    quantity: u16,

    /// Read input registers instead of holding registers
    #[clap(long)]
    input: bool,

    /// Write this value to `--register` before reading
    #[clap(long)]
    write: Option<u16>,

    /// Acknowledge the safety latch
    #[clap(long)]
    acknowledge: bool,

    /// Clear the latched system error
    #[clap(long)]
    reset_error: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port)
        .parse()
        .with_context(|| format!("Invalid socket address {}:{}", args.address, args.port))?;
    println!("Connecting to Modbus server at {}", socket_addr);

    let stream = TcpStream::connect(socket_addr).await?;
    let mut ctx = rtu::attach_slave(stream, Slave(args.slave));

    if args.acknowledge {
        ctx.write_single_register(REG_SAFETY_RESET_FLAG, 0)
            .await?
            .map_err(|e| anyhow!("Modbus exception: {:?}", e))?;
        println!("Safety latch acknowledged");
    }

    if args.reset_error {
        ctx.write_single_register(REG_RESET_ERROR_COMMAND, 1)
            .await?
            .map_err(|e| anyhow!("Modbus exception: {:?}", e))?;
        println!("System error cleared");
    }

    if let Some(value) = args.write {
        ctx.write_single_register(args.register, value)
            .await?
            .map_err(|e| anyhow!("Modbus exception: {:?}", e))?;
        println!("Wrote {} to register 0x{:04X}", value, args.register);
    }

    let kind = if args.input { "input" } else { "holding" };
    println!(
        "Reading {} {} registers starting at address 0x{:04X}",
        args.quantity, kind, args.register
    );
    let response = if args.input {
        ctx.read_input_registers(args.register, args.quantity).await?
    } else {
        ctx.read_holding_registers(args.register, args.quantity)
            .await?
    }
    .map_err(|e| anyhow!("Modbus exception: {:?}", e))?;

    for (offset, value) in response.iter().enumerate() {
        println!(
            "0x{:04X}: {:5} (0x{:04X})",
            args.register as usize + offset,
            value,
            value
        );
    }

    ctx.disconnect().await?;
    Ok(())
}
