// This file is part of riohal, a user-space hardware abstraction layer for RIO FPGA devices.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// riohal is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// riohal is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.


//! riohal_cli - inspect bitfiles and drive RIO FPGA devices from the shell.
//!
//! Every subcommand works on one device, selected with `--device` (`RIO0` by default), and
//! prints a short report on success.
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (`trace`, `debug`, `info`, `warn`, `error`
//!   or `off`). Defaults to `info`
//!
//! # Examples
//!
//! ```bash
//! # Show what a bitfile exposes
//! riohal_cli info /opt/app/counter.lvbitx
//!
//! # Download it to the second board and leave it idle
//! riohal_cli --device RIO1 load --no-run /opt/app/counter.lvbitx
//!
//! # Poke a control
//! riohal_cli write /opt/app/counter.lvbitx Threshold 12
//! ```

use clap::{Parser, Subcommand, ValueEnum, arg, command};
use log::debug;
use riohal::config::DEFAULT_DEVICE;
use std::path::PathBuf;

mod control;
mod info;
mod load;
mod register;
mod status;

#[derive(Parser, Debug)]
#[command(name = "riohal_cli")]
#[command(bin_name = "riohal_cli")]
struct Cli {
    #[arg(
        long = "device",
        default_value = DEFAULT_DEVICE,
        help = r#"RIO device to operate on, as named under /sys/class/nirio
(without the "!board" suffix)."#
    )]
    device: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the signature, target and resources of a bitfile
    Info { bitfile: PathBuf },
    /// List RIO devices and the state of their personalities
    Status,
    /// Download a bitfile to the device
    Load {
        bitfile: PathBuf,
        /// Download even if the device already holds this personality
        #[arg(long)]
        force: bool,
        /// Do not start the personality
        #[arg(long)]
        no_run: bool,
    },
    /// Read a scalar control or indicator
    Read { bitfile: PathBuf, register: String },
    /// Write a scalar control or indicator
    Write {
        bitfile: PathBuf,
        register: String,
        #[arg(allow_negative_numbers = true)]
        value: String,
    },
    /// Run, abort or reset the personality
    Control {
        bitfile: PathBuf,
        #[arg(value_enum)]
        action: ControlAction,
    },
    /// Clear the FPGA image. Fails while any session is open on the device
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ControlAction {
    Run,
    Abort,
    Reset,
}

/// Main entry point for riohal_cli.
///
/// # Returns: `Result<(), Box<dyn Error>>`
/// * `Ok(())` - The subcommand succeeded and its report was printed
/// * `Err(Box<dyn Error>)` - The subcommand failed; the error names the failing status kind
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    debug!("parsed cli command with {cli:?}");
    let result = match &cli.command {
        Commands::Info { bitfile } => info::info_handler(bitfile),
        Commands::Status => status::status_handler(),
        Commands::Load {
            bitfile,
            force,
            no_run,
        } => load::load_handler(&cli.device, bitfile, *force, *no_run),
        Commands::Read { bitfile, register } => {
            register::read_handler(&cli.device, bitfile, register)
        }
        Commands::Write {
            bitfile,
            register,
            value,
        } => register::write_handler(&cli.device, bitfile, register, value),
        Commands::Control { bitfile, action } => {
            control::control_handler(&cli.device, bitfile, *action)
        }
        Commands::Clear => control::clear_handler(&cli.device),
    };
    println!("{}", result?);
    Ok(())
}
