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

//! The personality's register space mapped into the process.

use crate::devices::device::RegisterWindow;
use crate::error::{ErrnoMap, RioError};
use crate::system_io::open_device_file;
use log::trace;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::Path;

pub struct MappedRegisters {
    _map: MmapMut,
    base: *mut u8,
    len: usize,
}

// SAFETY: every access is a single volatile 32-bit load or store to device memory; the mapping
// lives as long as the struct.
unsafe impl Send for MappedRegisters {}
unsafe impl Sync for MappedRegisters {}

impl MappedRegisters {
    /// Map `len` bytes of the personality character device at `path`.
    ///
    /// # Returns: `Result<MappedRegisters, RioError>`
    /// * `Ok(MappedRegisters)` - The mapped window
    /// * `Err(RioError::IORead)` - The device could not be opened
    /// * `Err(RioError)` - The mapping failed; the errno is translated
    pub fn map(path: &Path, len: usize) -> Result<MappedRegisters, RioError> {
        trace!("Mapping {len} bytes of registers from {path:?}");
        let file = open_device_file(path, OpenOptions::new().read(true).write(true))?;
        // SAFETY: the mapping is of device memory owned by the driver; it is only touched through
        // volatile accesses below.
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) };
        let mut map = ErrnoMap::General.check_io(map, &format!("mmap {path:?}"))?;
        let base = map.as_mut_ptr();
        Ok(MappedRegisters {
            _map: map,
            base,
            len,
        })
    }

    fn slot(&self, offset: u32) -> Result<*mut u32, RioError> {
        let offset = offset as usize;
        if offset % 4 != 0 || offset + 4 > self.len {
            return Err(RioError::InvalidParameter(format!(
                "register offset {offset:#x} is outside the {:#x} byte window",
                self.len
            )));
        }
        // SAFETY: offset is in bounds and 4-byte aligned within a page-aligned mapping.
        Ok(unsafe { self.base.add(offset).cast::<u32>() })
    }
}

impl RegisterWindow for MappedRegisters {
    fn len(&self) -> usize {
        self.len
    }

    fn read32(&self, offset: u32) -> Result<u32, RioError> {
        let slot = self.slot(offset)?;
        // SAFETY: `slot` points at an aligned u32 inside the live mapping.
        Ok(unsafe { slot.read_volatile() })
    }

    fn write32(&self, offset: u32, value: u32) -> Result<(), RioError> {
        let slot = self.slot(offset)?;
        // SAFETY: as for `read32`.
        unsafe { slot.write_volatile(value) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use std::io::Write;

    #[gtest]
    fn file_backed_window_reads_and_writes() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&[0u8; 64])?;
        let window = MappedRegisters::map(file.path(), 64)?;
        window.write32(0x10, 0xDEAD_BEEF)?;
        expect_that!(window.read32(0x10), ok(eq(&0xDEAD_BEEF)));
        expect_that!(
            window.read32(0x3E),
            err(displays_as(contains_substring("RioError::InvalidParameter")))
        );
        expect_that!(
            window.write32(64, 0),
            err(displays_as(contains_substring("outside")))
        );
        Ok(())
    }
}
