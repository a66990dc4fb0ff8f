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

//! RIO device implementation over the kernel driver's sysfs and character device interface.
//!
//! # A sysfs map of a RIO device
//!
//! ```text
//! /sys/class/nirio
//! ├── RIO0!board
//! │   ├── device -> ../../../0000:03:00.0
//! │   ├── nirio_clear
//! │   ├── nirio_fpga_address_space_size
//! │   ├── nirio_mmap_registers
//! │   └── nirio_serial_number
//! ├── RIO0!personality
//! │   ├── nirio_abort_vi
//! │   ├── nirio_irq_mask
//! │   ├── nirio_irq_status
//! │   ├── nirio_reset_vi
//! │   ├── nirio_run_vi
//! │   ├── nirio_vi_finished
//! │   └── nirio_vi_started
//! └── RIO0!fifo0
//!     └── element_bytes
//! ```
//!
//! with the character devices `/dev/RIO0` (downloads and the whole-device lock),
//! `/dev/RIO0personality` (register window and array transfers) and `/dev/RIO0fifo<N>`.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use riohal::devices::device::Device;
//! # use riohal::devices::rio::{RioDevice, list_devices};
//! # use riohal::config::DevicePaths;
//! # fn example() -> Result<(), riohal::error::RioError> {
//! for name in list_devices(&DevicePaths::default())? {
//!     let device = RioDevice::new(&name);
//!     println!("{name}: {}", device.model_name()?);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::DevicePaths;
use crate::devices::device::{
    Device, FifoChannel, FifoModes, IrqWait, LockGuard, RegisterWindow, ViControl,
};
use crate::devices::rio_components::fifo_channel::RioFifoChannel;
use crate::devices::rio_components::file_lock::{FileLock, LockKind};
use crate::devices::rio_components::ioctl::{
    ARRAY_READ, ARRAY_WRITE, NirioArray, array_buffer, ioctl_array,
};
use crate::devices::rio_components::model;
use crate::devices::rio_components::register_window::MappedRegisters;
use crate::error::{ErrnoMap, RioError};
use crate::resource::FifoInfo;
use crate::system_io::{
    fs_read, fs_read_dir, fs_write_bytes, open_device_file, parse_u32_hex, read_attribute_bool,
    read_attribute_u32, translate_io_error, write_attribute,
};
use crate::timer::{Timeout, Timer};
use log::{debug, info, trace};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A RIO device reached through the kernel driver.
///
/// The personality character device is opened on first use and kept for array transfers until
/// the next download.
#[derive(Debug)]
pub struct RioDevice {
    name: String,
    paths: DevicePaths,
    personality: Mutex<Option<Arc<File>>>,
}

impl RioDevice {
    /// A device rooted at the live sysfs and `/dev` trees.
    ///
    /// No file is touched until a method needs it, so a missing device is only reported then.
    pub fn new(name: &str) -> RioDevice {
        RioDevice::with_paths(name, DevicePaths::default())
    }

    pub fn with_paths(name: &str, paths: DevicePaths) -> RioDevice {
        RioDevice {
            name: name.to_owned(),
            paths,
            personality: Mutex::new(None),
        }
    }

    fn board(&self, attribute: &str) -> PathBuf {
        self.paths.board_attribute(&self.name, attribute)
    }

    fn personality_attribute(&self, attribute: &str) -> PathBuf {
        self.paths.personality_attribute(&self.name, attribute)
    }

    /// The board serial number as the driver reports it.
    pub fn serial_number(&self) -> Result<String, RioError> {
        fs_read(&self.board("nirio_serial_number")).map(|s| s.trim().to_owned())
    }

    /// Take the whole-device lock exclusively, for actions that require no open sessions.
    ///
    /// # Returns: `Result<LockGuard, RioError>`
    /// * `Ok(LockGuard)` - The lock, held until dropped
    /// * `Err(RioError::FpgaBusy)` - A session or another administrative action holds the lock
    pub fn lock_exclusive(&self) -> Result<LockGuard, RioError> {
        self.try_lock_exclusive()?.ok_or(RioError::FpgaBusy)
    }

    fn personality_file(&self) -> Result<Arc<File>, RioError> {
        let mut cached = self.personality.lock().map_err(|_| {
            RioError::SoftwareFault(format!("couldn't lock the personality file of {}", self.name))
        })?;
        if let Some(file) = cached.as_ref() {
            return Ok(Arc::clone(file));
        }
        let path = self.paths.personality_cdev(&self.name);
        let file = Arc::new(open_device_file(
            &path,
            OpenOptions::new().read(true).write(true),
        )?);
        *cached = Some(Arc::clone(&file));
        Ok(file)
    }

    fn forget_personality_file(&self) -> Result<(), RioError> {
        let mut cached = self.personality.lock().map_err(|_| {
            RioError::SoftwareFault(format!("couldn't lock the personality file of {}", self.name))
        })?;
        *cached = None;
        Ok(())
    }

    fn lock(&self, kind: LockKind) -> Result<Option<LockGuard>, RioError> {
        let lock = FileLock::try_lock(&self.paths.board_cdev(&self.name), kind)?;
        Ok(lock.map(|l| Box::new(l) as LockGuard))
    }

    fn trigger(&self, attribute: &str, value: &str, map: ErrnoMap) -> Result<(), RioError> {
        match write_attribute(&self.personality_attribute(attribute), value) {
            Ok(()) => Ok(()),
            Err(e) => translate_io_error(e, map),
        }
    }
}

fn read_hex_from(file: &mut File, path: &std::path::Path) -> Result<u32, RioError> {
    let mut contents = String::new();
    let read = file
        .seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_string(&mut contents));
    if let Err(e) = read {
        return Err(RioError::IORead {
            file: path.into(),
            e,
        });
    }
    parse_u32_hex(contents.trim_end_matches('\0').trim()).ok_or_else(|| {
        RioError::SoftwareFault(format!("{path:?} holds {contents:?}, not a hex number"))
    })
}

impl Device for RioDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> Result<String, RioError> {
        model::model_name(&self.paths, &self.name)
    }

    fn try_lock_shared(&self) -> Result<Option<LockGuard>, RioError> {
        self.lock(LockKind::Shared)
    }

    fn try_lock_exclusive(&self) -> Result<Option<LockGuard>, RioError> {
        self.lock(LockKind::Exclusive)
    }

    fn download(&self, blob: &[u8]) -> Result<bool, RioError> {
        self.forget_personality_file()?;
        let board = self.paths.board_cdev(&self.name);
        info!("Downloading {} byte personality to {}", blob.len(), self.name);
        match fs_write_bytes(&board, blob) {
            Ok(()) => Ok(false),
            Err(RioError::IOWrite { e, .. }) if e.raw_os_error() == Some(libc::EALREADY) => {
                debug!("{} already holds this personality", self.name);
                Ok(true)
            }
            Err(e) => translate_io_error(e, ErrnoMap::Run).map(|()| false),
        }
    }

    fn clear_image(&self) -> Result<(), RioError> {
        let _lock = self.lock_exclusive()?;
        info!("Clearing the FPGA image of {}", self.name);
        match write_attribute(&self.board("nirio_clear"), "1") {
            Ok(()) => Ok(()),
            Err(e) => translate_io_error(e, ErrnoMap::General),
        }
    }

    fn address_space_size(&self) -> Result<usize, RioError> {
        read_attribute_u32(&self.board("nirio_fpga_address_space_size")).map(|s| s as usize)
    }

    fn registers_mappable(&self) -> Result<bool, RioError> {
        read_attribute_bool(&self.board("nirio_mmap_registers"))
    }

    fn map_registers(&self, size: usize) -> Result<Box<dyn RegisterWindow>, RioError> {
        let window = MappedRegisters::map(&self.paths.personality_cdev(&self.name), size)?;
        Ok(Box::new(window))
    }

    fn read_array(
        &self,
        offset: u32,
        bits_per_elem: u32,
        count: usize,
        out: &mut [u8],
    ) -> Result<(), RioError> {
        let file = self.personality_file()?;
        let num_elem = u32::try_from(count).map_err(|_| RioError::BadReadWriteCount {
            requested: count,
            limit: u32::MAX as usize,
        })?;
        let mut buffer = array_buffer(offset, bits_per_elem, num_elem, out);
        trace!("Array read of {count} x {bits_per_elem} bits at {offset:#x}");
        let result = ioctl_array(&*file, ARRAY_READ, &mut buffer);
        ErrnoMap::General.check_io(result, &format!("array read at {offset:#x}"))?;
        out.copy_from_slice(&buffer[std::mem::size_of::<NirioArray>()..]);
        Ok(())
    }

    fn write_array(
        &self,
        offset: u32,
        bits_per_elem: u32,
        count: usize,
        data: &[u8],
    ) -> Result<(), RioError> {
        let file = self.personality_file()?;
        let num_elem = u32::try_from(count).map_err(|_| RioError::BadReadWriteCount {
            requested: count,
            limit: u32::MAX as usize,
        })?;
        let mut buffer = array_buffer(offset, bits_per_elem, num_elem, data);
        trace!("Array write of {count} x {bits_per_elem} bits at {offset:#x}");
        let result = ioctl_array(&*file, ARRAY_WRITE, &mut buffer);
        ErrnoMap::General.check_io(result, &format!("array write at {offset:#x}"))
    }

    fn vi_started(&self) -> Result<bool, RioError> {
        read_attribute_bool(&self.personality_attribute("nirio_vi_started"))
            .or_else(|e| translate_io_error(e, ErrnoMap::General).map(|()| false))
    }

    fn vi_finished(&self) -> Result<bool, RioError> {
        read_attribute_bool(&self.personality_attribute("nirio_vi_finished"))
    }

    fn control(&self, action: ViControl) -> Result<(), RioError> {
        info!("{action:?} on {}", self.name);
        match action {
            ViControl::Run => self.trigger("nirio_run_vi", "1", ErrnoMap::Run),
            ViControl::Abort => self.trigger("nirio_abort_vi", "1", ErrnoMap::General),
            ViControl::Reset => self.trigger("nirio_reset_vi", "1", ErrnoMap::General),
            ViControl::ResetIfLastSession => {
                self.trigger("nirio_reset_vi", "2", ErrnoMap::General)
            }
        }
    }

    fn acknowledge_irqs(&self, irqs: u32) -> Result<(), RioError> {
        self.trigger("nirio_irq_status", &irqs.to_string(), ErrnoMap::General)
    }

    fn wait_on_irqs(&self, irqs: u32, timeout: Timeout) -> Result<IrqWait, RioError> {
        self.trigger("nirio_irq_mask", &irqs.to_string(), ErrnoMap::General)?;
        let status_path = self.personality_attribute("nirio_irq_status");
        let mut status = open_device_file(&status_path, OpenOptions::new().read(true))?;

        let asserted = read_hex_from(&mut status, &status_path)? & irqs;
        if timeout.is_zero() || asserted != 0 {
            return Ok(IrqWait {
                asserted,
                timed_out: false,
            });
        }

        let timer = Timer::start(timeout);
        // Woken by any IRQ, not only the awaited ones.
        loop {
            let mut fds = libc::pollfd {
                fd: status.as_raw_fd(),
                events: libc::POLLPRI,
                revents: 0,
            };
            // SAFETY: `fds` is a single live pollfd and `status` outlives the call.
            if unsafe { libc::poll(&mut fds, 1, timer.remaining_poll_ms()) } == -1 {
                let e = std::io::Error::last_os_error();
                ErrnoMap::General.translate_io(&e, &format!("poll {status_path:?}"))?;
            }
            let asserted = read_hex_from(&mut status, &status_path)? & irqs;
            if asserted != 0 {
                return Ok(IrqWait {
                    asserted,
                    timed_out: false,
                });
            }
            if timer.is_timed_out() {
                break;
            }
        }
        trace!("Timed out waiting for IRQs {irqs:#x} on {}", self.name);
        Ok(IrqWait {
            asserted: 0,
            timed_out: true,
        })
    }

    fn fifo_element_bytes(&self, fifo: u32) -> Result<usize, RioError> {
        let path = self.paths.fifo_attribute(&self.name, fifo, "element_bytes");
        read_attribute_u32(&path).map(|b| b as usize)
    }

    fn fifo_modes(&self) -> FifoModes {
        FifoModes::default()
    }

    fn open_fifo(&self, fifo: &FifoInfo) -> Result<Box<dyn FifoChannel>, RioError> {
        let element_bytes = self.fifo_element_bytes(fifo.number())?;
        let path = self.paths.fifo_cdev(&self.name, fifo.number());
        debug!("Opening FIFO {} ({}) at {path:?}", fifo.number(), fifo.name());
        let channel = RioFifoChannel::open(&path, fifo.direction(), element_bytes)?;
        Ok(Box::new(channel))
    }
}

/// Names of the RIO devices the driver has registered, sorted.
///
/// # Returns: `Result<Vec<String>, RioError>`
/// * `Ok(Vec<String>)` - Device names such as `RIO0`
/// * `Err(RioError::IOReadDir)` - The class directory could not be read
pub fn list_devices(paths: &DevicePaths) -> Result<Vec<String>, RioError> {
    let mut devices: Vec<String> = fs_read_dir(paths.sysfs_root())?
        .into_iter()
        .filter_map(|entry| entry.strip_suffix("!board").map(str::to_owned))
        .collect();
    devices.sort();
    Ok(devices)
}
