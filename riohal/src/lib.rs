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

//! riohal - user-space hardware abstraction layer for RIO FPGA devices.
//!
//! riohal loads a compiled FPGA personality onto a RIO board through the `nirio` kernel driver
//! and gives host programs typed access to what the personality exposes:
//! - controls and indicators (registers), through a mapped register window or the driver's
//!   atomic array transfer
//! - DMA FIFOs, through ring buffers shared with the hardware, either zero-copy
//!   (acquire/release) or by copying (read/write)
//! - interrupts, and the run/abort/reset controls of the personality
//!
//! # Architecture
//!
//! - [`bitfile`] - Parses `.lvbitx` bitfiles into a resource catalogue
//! - [`personality`] - Builds the download blob the driver expects from a bitfile
//! - [`session`] - One bitfile on one device: registers, FIFOs and personality control
//! - [`fifo`] - The DMA FIFO engine behind each FIFO of a session
//! - [`handle`] - A table handing out opaque handles to sessions
//! - [`devices`] - The [`devices::device::Device`] seam, the sysfs/character device
//!   implementation and an in-memory mock
//! - [`error`] / [`status`] - Typed errors and the integer status domain they map onto
//!
//! # Environment Variables
//!
//! The library logs through the `log` facade and never installs a logger. The command-line tool
//! honours `RUST_LOG`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use riohal::devices::rio::RioDevice;
//! use riohal::resource::ResourceQuery;
//! use riohal::session::{OpenOptions, Session};
//! use riohal::timer::Timeout;
//! use riohal::types::Type;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), riohal::error::RioError> {
//! let session = Session::open(
//!     Path::new("/opt/app/acquisition.lvbitx"),
//!     Arc::new(RioDevice::new("RIO0")),
//!     &OpenOptions::default(),
//! )?;
//! let samples = session.find_resource("Samples", &ResourceQuery::target_to_host_fifo(Type::U32))?;
//! let mut data = [0u32; 256];
//! let remaining = session.read_fifo(samples, &mut data, 256, Timeout::Millis(500))?;
//! println!("read 256 samples, {remaining} more waiting");
//! session.close(true)?;
//! # Ok(())
//! # }
//! ```

pub mod bitfile;
pub mod config;
pub mod devices;
pub mod error;
pub mod fifo;
pub mod handle;
pub mod personality;
pub mod resource;
pub mod ring;
pub mod session;
pub mod status;
pub mod system_io;
pub mod timer;
pub mod types;
