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


use crate::ControlAction;
use crate::load::open_session;
use riohal::devices::device::Device;
use riohal::devices::rio::RioDevice;
use riohal::error::RioError;
use riohal::session::OpenOptions;
use std::path::Path;

/// Argument parser for the control command
pub fn control_handler(
    device: &str,
    bitfile: &Path,
    action: ControlAction,
) -> Result<String, RioError> {
    let options = OpenOptions {
        no_run: true,
        ..OpenOptions::default()
    };
    let session = open_session(device, bitfile, &options)?;
    let message = match action {
        ControlAction::Run => {
            if session.run()?.is_warning() {
                format!("Personality on {device} was already running")
            } else {
                format!("Started personality on {device}")
            }
        }
        ControlAction::Abort => {
            session.abort()?;
            format!("Aborted personality on {device}")
        }
        ControlAction::Reset => {
            session.reset()?;
            format!("Reset personality on {device}")
        }
    };
    session.close(false)?;
    Ok(message)
}

/// Clears the FPGA image; refused while any session holds the device
pub fn clear_handler(device: &str) -> Result<String, RioError> {
    RioDevice::new(device).clear_image()?;
    Ok(format!("Cleared the FPGA image of {device}"))
}
