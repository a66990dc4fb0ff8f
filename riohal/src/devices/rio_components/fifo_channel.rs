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

//! A DMA FIFO channel backed by the `/dev/<device>fifo<N>` character device.
//!
//! Every errno reported by the channel goes through [`ErrnoMap::Fifo`], so a reset behind the
//! caller's back (`EPERM`) becomes [`RioError::TransferAborted`] and starting a started FIFO
//! (`EALREADY`) succeeds.

use super::ioctl::{
    FIFO_ACQUIRE_WAIT, FIFO_GET_AVAIL, FIFO_RELEASE, FIFO_SET_BUFFER, FIFO_START, FifoSetBuffer,
    FifoWait, MEMORY_TYPE_USER, ioctl_none, ioctl_with,
};
use crate::devices::device::{AcquireWait, FifoChannel};
use crate::error::{ErrnoMap, RioError};
use crate::resource::Direction;
use crate::ring::RingBuffer;
use crate::system_io::{open_device_file, translate_io_error};
use crate::timer::Timeout;
use log::trace;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub struct RioFifoChannel {
    path: PathBuf,
    file: File,
    element_bytes: usize,
    _ring: Option<Arc<RingBuffer>>,
}

impl RioFifoChannel {
    /// Open the channel, reserving the FIFO. The node is opened write-only for host-to-target
    /// FIFOs and read-only otherwise.
    ///
    /// # Arguments
    ///
    /// * `path` - The FIFO character device
    /// * `direction` - Direction of the FIFO
    /// * `element_bytes` - Hardware element width, used to convert byte counts
    ///
    /// # Returns: `Result<RioFifoChannel, RioError>`
    /// * `Ok(RioFifoChannel)` - The reserved channel
    /// * `Err(RioError::FifoReserved)` - Another process has the FIFO open
    pub fn open(
        path: &Path,
        direction: Direction,
        element_bytes: usize,
    ) -> Result<RioFifoChannel, RioError> {
        let mut options = OpenOptions::new();
        if direction.is_host_to_target() {
            options.write(true);
        } else {
            options.read(true);
        }
        let file = match open_device_file(path, &options) {
            Ok(file) => file,
            Err(e) => {
                translate_io_error(e, ErrnoMap::Fifo)?;
                return Err(RioError::SoftwareFault(format!("{path:?} could not be opened")));
            }
        };
        Ok(RioFifoChannel {
            path: path.into(),
            file,
            element_bytes,
            _ring: None,
        })
    }

    fn context(&self, what: &str) -> String {
        format!("{what} on {:?}", self.path)
    }

    fn check(&self, result: std::io::Result<()>, what: &str) -> Result<(), RioError> {
        match result {
            Ok(()) => Ok(()),
            Err(e) => ErrnoMap::Fifo.translate_io(&e, &self.context(what)),
        }
    }
}

impl FifoChannel for RioFifoChannel {
    fn set_buffer(&mut self, ring: Arc<RingBuffer>) -> Result<(), RioError> {
        let mut info = FifoSetBuffer {
            bytes: ring.len() as u64,
            buff_ptr: ring.as_ptr() as u64,
            memory_type: MEMORY_TYPE_USER,
        };
        trace!("Binding {} byte ring to {:?}", ring.len(), self.path);
        let result = ioctl_with(&self.file, FIFO_SET_BUFFER, &mut info);
        self.check(result, "set buffer")?;
        self._ring = Some(ring);
        Ok(())
    }

    fn start(&mut self) -> Result<(), RioError> {
        let result = ioctl_none(&self.file, FIFO_START);
        self.check(result, "start")
    }

    fn available(&mut self) -> Result<usize, RioError> {
        let mut available: u64 = 0;
        let result = ioctl_with(&self.file, FIFO_GET_AVAIL, &mut available);
        self.check(result, "get available")?;
        Ok(usize::try_from(available).unwrap_or(usize::MAX))
    }

    fn acquire_wait(
        &mut self,
        elements: usize,
        timeout: Timeout,
    ) -> Result<AcquireWait, RioError> {
        let mut wait = FifoWait {
            wait_num_elem: elements as u64,
            num_elem_avail: 0,
            timeout_ms: timeout.as_millis(),
            timed_out: 0,
        };
        let result = ioctl_with(&self.file, FIFO_ACQUIRE_WAIT, &mut wait);
        self.check(result, "acquire")?;
        Ok(AcquireWait {
            available: usize::try_from(wait.num_elem_avail).unwrap_or(usize::MAX),
            timed_out: wait.timed_out != 0,
        })
    }

    fn release(&mut self, elements: usize) -> Result<(), RioError> {
        let mut count = elements as u64;
        let result = ioctl_with(&self.file, FIFO_RELEASE, &mut count);
        self.check(result, "release")
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), RioError> {
        trace!(
            "Reading {} elements from {:?}",
            buf.len() / self.element_bytes.max(1),
            self.path
        );
        let result = self.file.read_exact(buf);
        self.check(result, "read")
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), RioError> {
        trace!(
            "Writing {} elements to {:?}",
            buf.len() / self.element_bytes.max(1),
            self.path
        );
        let result = self.file.write_all(buf);
        self.check(result, "write")
    }
}
