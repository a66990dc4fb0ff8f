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


use riohal::config::DevicePaths;
use riohal::devices::device::Device;
use riohal::devices::rio::{RioDevice, list_devices};
use riohal::error::RioError;

/// One table row: model and personality state, or the error that hid them
fn device_row(name: &str) -> String {
    let device = RioDevice::new(name);
    let model = device
        .model_name()
        .unwrap_or_else(|e| format!("unknown ({e})"));
    let state = match (device.vi_started(), device.vi_finished()) {
        (Ok(true), Ok(false)) => String::from("running"),
        (Ok(true), Ok(true)) => String::from("finished"),
        (Ok(false), _) => String::from("idle"),
        (Err(e), _) | (_, Err(e)) => format!("unknown ({e})"),
    };
    format!("| {name} | {model} | {state} |\n")
}

/// Argument parser for the status command
pub fn status_handler() -> Result<String, RioError> {
    let mut ret_string = String::from(
        "---- DEVICES ----\n\
        | dev | model | personality |\n",
    );
    for name in list_devices(&DevicePaths::default())? {
        ret_string += &device_row(&name);
    }
    Ok(ret_string)
}
