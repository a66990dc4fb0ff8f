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

//! Ring buffer memory shared between the host and a DMA channel.
//!
//! The host and the device own disjoint parts of the ring at any time: the host owns acquired
//! elements until it releases them, the device owns everything else. Nothing in the type
//! enforces that split; the FIFO engine's `acquired`/`next` bookkeeping does. The memory is
//! reference counted so that a region handed to a caller stays mapped even if the FIFO is torn
//! down by a reset while the caller still holds it.

use crate::error::RioError;
use memmap2::MmapMut;
use std::sync::Arc;

pub struct RingBuffer {
    // Keeps the mapping alive; all access goes through `base`.
    _map: MmapMut,
    base: *mut u8,
    len: usize,
}

// SAFETY: the mapping is owned by the RingBuffer and freed only on drop. Concurrent access is
// split into disjoint byte ranges by the FIFO protocol described in the module docs.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("base", &self.base)
            .field("len", &self.len)
            .finish()
    }
}

impl RingBuffer {
    /// Allocate `len` bytes of zeroed, page-aligned anonymous memory.
    ///
    /// # Returns: `Result<Arc<RingBuffer>, RioError>`
    /// * `Ok(Arc<RingBuffer>)` - The new ring
    /// * `Err(RioError::MemoryFull)` - The mapping could not be created
    pub fn allocate(len: usize) -> Result<Arc<RingBuffer>, RioError> {
        let mut map = MmapMut::map_anon(len).map_err(|_| RioError::MemoryFull)?;
        let base = map.as_mut_ptr();
        Ok(Arc::new(RingBuffer {
            _map: map,
            base,
            len,
        }))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address, as handed to the kernel driver.
    pub fn as_ptr(&self) -> *mut u8 {
        self.base
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), RioError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(RioError::SoftwareFault(format!(
                "ring access {offset}+{len} outside {} bytes",
                self.len
            ))),
        }
    }

    /// Copy bytes into the ring at `offset`, on behalf of the side that owns that range.
    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<(), RioError> {
        self.check(offset, data.len())?;
        // SAFETY: the range is in bounds and, by protocol, not owned by anyone else right now.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.base.add(offset), data.len());
        }
        Ok(())
    }

    /// Copy bytes out of the ring at `offset`.
    pub fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<(), RioError> {
        self.check(offset, out.len())?;
        // SAFETY: as for `write_at`.
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.add(offset), out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    /// Pointer to `len` bytes at `offset`, checked against the ring size.
    pub(crate) fn region(&self, offset: usize, len: usize) -> Result<*mut u8, RioError> {
        self.check(offset, len)?;
        // SAFETY: in bounds of the mapping.
        Ok(unsafe { self.base.add(offset) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn copies_stay_in_bounds() -> Result<()> {
        let ring = RingBuffer::allocate(4096)?;
        ring.write_at(4092, &[1, 2, 3, 4])?;
        let mut out = [0u8; 4];
        ring.read_at(4092, &mut out)?;
        expect_that!(out, eq([1, 2, 3, 4]));
        expect_that!(
            ring.write_at(4093, &[0; 4]),
            err(displays_as(contains_substring("RioError::SoftwareFault")))
        );
        Ok(())
    }
}
