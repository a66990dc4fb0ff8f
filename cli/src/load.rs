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


use riohal::devices::rio::RioDevice;
use riohal::error::RioError;
use riohal::session::{OpenOptions, Session};
use std::path::Path;
use std::sync::Arc;

/// Opens a session for `bitfile` on the named device
pub fn open_session(
    device: &str,
    bitfile: &Path,
    options: &OpenOptions,
) -> Result<Session, RioError> {
    Session::open(bitfile, Arc::new(RioDevice::new(device)), options)
}

/// Argument parser for the load command
pub fn load_handler(
    device: &str,
    bitfile: &Path,
    force: bool,
    no_run: bool,
) -> Result<String, RioError> {
    let options = OpenOptions {
        no_run,
        ..OpenOptions::default()
    };
    let session = open_session(device, bitfile, &options)?;
    if force {
        session.download(true)?;
        if !no_run {
            session.run()?;
        }
    }
    let state = if session.is_running()? {
        "running"
    } else {
        "idle"
    };
    let signature = session.bitfile().signature().to_owned();
    session.close(false)?;
    Ok(format!("Loaded {signature} onto {device}, personality is {state}"))
}
