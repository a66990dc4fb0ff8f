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


use riohal::bitfile::Bitfile;
use riohal::error::RioError;
use std::fmt::Write;
use std::path::Path;

/// Argument parser for the info command
///
/// # Arguments
///
/// * `bitfile` - Path to the `.lvbitx` file to describe
///
/// # Returns: `Result<String, RioError>`
/// * `Ok(String)` - Header fields followed by the register and FIFO tables
/// * `Err(RioError)` - The bitfile could not be read or is not usable
pub fn info_handler(bitfile: &Path) -> Result<String, RioError> {
    let bitfile = Bitfile::open(bitfile)?;
    let mut ret_string = format!(
        "signature: {}\ntarget: {}\nbase address: {:#x}\nauto-run: {}\nbitstream version: {}\n",
        bitfile.signature(),
        bitfile.target_class(),
        bitfile.base_address_on_device(),
        bitfile.auto_run_when_downloaded(),
        bitfile.bitstream_version(),
    );
    let _ = writeln!(
        ret_string,
        "fifos support clear: {}\nfifos support bridge flush: {}\nreset auto-clears: {}",
        bitfile.fifos_support_clear(),
        bitfile.fifos_support_bridge_flush(),
        bitfile.reset_auto_clears(),
    );
    ret_string += "\n---- REGISTERS ----\n| name | type | kind | offset |\n";
    for register in bitfile.registers() {
        let kind = match (register.is_indicator(), register.is_array()) {
            (true, false) => "indicator",
            (true, true) => "indicator array",
            (false, false) => "control",
            (false, true) => "control array",
        };
        let _ = writeln!(
            ret_string,
            "| {} | {} | {}{} | {:#x} |",
            register.name(),
            register.ty().describe(),
            kind,
            if register.access_may_timeout() {
                " (may time out)"
            } else {
                ""
            },
            register.offset(),
        );
    }
    ret_string += "\n---- FIFOS ----\n| number | name | type | direction |\n";
    for fifo in bitfile.fifos() {
        let direction = if fifo.is_host_to_target() {
            "host to target"
        } else {
            "target to host"
        };
        let _ = writeln!(
            ret_string,
            "| {} | {} | {} | {} |",
            fifo.number(),
            fifo.name(),
            fifo.ty().describe(),
            direction,
        );
    }
    Ok(ret_string)
}
