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

#![allow(dead_code)]

use riohal::devices::mock::MockDevice;
use riohal::error::RioError;
use riohal::session::{OpenOptions, Session};
use rstest::fixture;
use std::path::PathBuf;
use std::sync::Arc;

pub const MODEL: &str = "PXIe-7971R";
pub const COUNTER_SIGNATURE: &str = "A1B2C3D4E5F60718293A4B5C6D7E8F90";

/// FIFO numbers in `counter.lvbitx`.
pub const SAMPLES: u32 = 0;
pub const COMMANDS: u32 = 1;

pub fn test_data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test_data")
        .join(name)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A mock board matching `counter.lvbitx`, with 4 byte FIFO elements and page sized alignment.
#[fixture]
pub fn device() -> MockDevice {
    init_logging();
    MockDevice::new("RIO0", MODEL)
        .with_fifo_element_bytes(SAMPLES, 4)
        .with_fifo_element_bytes(COMMANDS, 4)
        .with_buffer_alignment(4096)
}

pub fn open_with(
    device: &MockDevice,
    bitfile: &str,
    options: &OpenOptions,
) -> Result<Session, RioError> {
    Session::open(&test_data(bitfile), Arc::new(device.clone()), options)
}

pub fn open_counter(device: &MockDevice) -> Session {
    match open_with(device, "counter.lvbitx", &OpenOptions::default()) {
        Ok(session) => session,
        Err(e) => panic!("opening counter.lvbitx failed: {e}"),
    }
}
