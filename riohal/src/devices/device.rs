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

//! Device abstraction layer.
//!
//! Sessions and FIFO engines never touch files directly. They talk to a RIO device through the
//! traits in this module, which describe what the kernel driver offers: administrative
//! attributes and triggers, a mappable register window, atomic array transfers and one DMA
//! channel per FIFO.
//!
//! # Architecture
//!
//! - [`Device`] - One RIO device: locking, downloads, personality control, IRQs and factories
//!   for the other two traits
//! - [`RegisterWindow`] - The memory-mapped register space of the running personality
//! - [`FifoChannel`] - One opened DMA FIFO channel
//!
//! Two implementations exist: [`crate::devices::rio::RioDevice`] drives the real sysfs and
//! character device interface, [`crate::devices::mock::MockDevice`] keeps everything in memory.
//!
//! Every method returns errors already translated to [`RioError`]; implementations pick the
//! errno table that applies to the surface they used.

use crate::error::RioError;
use crate::resource::FifoInfo;
use crate::ring::RingBuffer;
use crate::timer::Timeout;
use std::any::Any;
use std::sync::Arc;

/// A held whole-device lock. The lock is released when the guard is dropped.
pub type LockGuard = Box<dyn Any + Send + Sync>;

/// The personality control triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViControl {
    Run,
    Abort,
    Reset,
    /// Reset, but only when the caller holds the last open session.
    ResetIfLastSession,
}

/// Outcome of waiting on interrupts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqWait {
    /// The awaited IRQs that are asserted.
    pub asserted: u32,
    pub timed_out: bool,
}

/// Which transfer modes a device's FIFO channels support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoModes {
    pub acquire_release: bool,
    pub read_write: bool,
}

impl Default for FifoModes {
    fn default() -> Self {
        FifoModes {
            acquire_release: true,
            read_write: true,
        }
    }
}

/// Result of a bounded wait for FIFO elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireWait {
    /// Elements still available after the wait. On timeout nothing was acquired and this is
    /// fewer than were requested.
    pub available: usize,
    pub timed_out: bool,
}

/// The memory-mapped register window of a downloaded personality.
///
/// Offsets are relative to the start of the FPGA address space and must be 4-byte aligned.
pub trait RegisterWindow: Send + Sync {
    /// Size of the window in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A single 32-bit load.
    ///
    /// # Returns: `Result<u32, RioError>`
    /// * `Ok(u32)` - The register slot
    /// * `Err(RioError::InvalidParameter)` - `offset` is outside the window or misaligned
    fn read32(&self, offset: u32) -> Result<u32, RioError>;

    /// A single 32-bit store.
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - Stored
    /// * `Err(RioError::InvalidParameter)` - `offset` is outside the window or misaligned
    fn write32(&self, offset: u32, value: u32) -> Result<(), RioError>;
}

/// One opened DMA FIFO channel.
///
/// Opening the channel reserves the FIFO for the caller; dropping it hands the FIFO back and
/// makes the driver stop it. Errors reported with [`RioError::TransferAborted`] mean the device
/// was reset behind the caller's back and the channel must be reopened.
pub trait FifoChannel: Send {
    /// Bind a ring buffer to the channel. The channel keeps the ring alive while bound.
    fn set_buffer(&mut self, ring: Arc<RingBuffer>) -> Result<(), RioError>;

    /// Start the FIFO. Starting a started FIFO succeeds.
    fn start(&mut self) -> Result<(), RioError>;

    /// Elements ready for the host: filled elements for target-to-host, free space for
    /// host-to-target.
    fn available(&mut self) -> Result<usize, RioError>;

    /// Wait for `elements` to become available and acquire them.
    fn acquire_wait(&mut self, elements: usize, timeout: Timeout)
    -> Result<AcquireWait, RioError>;

    /// Hand acquired elements back to the device.
    fn release(&mut self, elements: usize) -> Result<(), RioError>;

    /// Copy `buf.len()` bytes out of the FIFO. The caller makes sure they are available.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), RioError>;

    /// Copy `buf.len()` bytes into the FIFO. The caller makes sure there is room.
    fn write(&mut self, buf: &[u8]) -> Result<(), RioError>;
}

/// Trait for a RIO device.
pub trait Device: Send + Sync {
    /// The device name, e.g. `RIO0`.
    fn name(&self) -> &str;

    /// The product name of the board, compared against a bitfile's target class.
    ///
    /// # Returns: `Result<String, RioError>`
    /// * `Ok(String)` - Model name such as `PXIe-7971R`
    /// * `Err(RioError::SoftwareFault)` - The board identifiers are unknown
    fn model_name(&self) -> Result<String, RioError>;

    /// Take the whole-device lock shared, without blocking. Every open session holds it.
    ///
    /// # Returns: `Result<Option<LockGuard>, RioError>`
    /// * `Ok(Some(LockGuard))` - The lock is held until the guard is dropped
    /// * `Ok(None)` - Someone holds the lock exclusively
    fn try_lock_shared(&self) -> Result<Option<LockGuard>, RioError>;

    /// Take the whole-device lock exclusively, without blocking. Held by administrative actions
    /// that require no open sessions.
    ///
    /// # Returns: `Result<Option<LockGuard>, RioError>`
    /// * `Ok(Some(LockGuard))` - The lock is held until the guard is dropped
    /// * `Ok(None)` - The lock is held by someone else
    fn try_lock_exclusive(&self) -> Result<Option<LockGuard>, RioError>;

    /// Write a personality blob to the board.
    ///
    /// # Returns: `Result<bool, RioError>`
    /// * `Ok(true)` - The device already held this personality and nothing was written
    /// * `Ok(false)` - The personality was downloaded
    fn download(&self, blob: &[u8]) -> Result<bool, RioError>;

    /// Forced image clear. Takes the whole-device lock exclusively for the duration.
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - The FPGA was cleared
    /// * `Err(RioError::FpgaBusy)` - A session is open on the device
    fn clear_image(&self) -> Result<(), RioError>;

    /// Size in bytes of the FPGA address space.
    fn address_space_size(&self) -> Result<usize, RioError>;

    /// Whether the driver lets user space map the register window.
    fn registers_mappable(&self) -> Result<bool, RioError>;

    /// Map `size` bytes of the register window.
    fn map_registers(&self, size: usize) -> Result<Box<dyn RegisterWindow>, RioError>;

    /// Atomically read `count` elements of `bits_per_elem` bits starting at `offset` into `out`,
    /// which holds the elements packed as host values.
    fn read_array(
        &self,
        offset: u32,
        bits_per_elem: u32,
        count: usize,
        out: &mut [u8],
    ) -> Result<(), RioError>;

    /// Atomically write `count` elements; the counterpart of [`Device::read_array`].
    fn write_array(
        &self,
        offset: u32,
        bits_per_elem: u32,
        count: usize,
        data: &[u8],
    ) -> Result<(), RioError>;

    /// Whether the personality has been started. Reading it also reports a control register
    /// access failure, such as [`RioError::CommunicationTimeout`].
    fn vi_started(&self) -> Result<bool, RioError>;

    fn vi_finished(&self) -> Result<bool, RioError>;

    /// Pull one of the personality control triggers.
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - The trigger was accepted
    /// * `Err(RioError::FpgaAlreadyRunning)` - [`ViControl::Run`] on a running personality
    /// * `Err(RioError::FpgaBusyFpgaInterfaceCApi)` - [`ViControl::ResetIfLastSession`] while
    ///   other sessions are open
    fn control(&self, action: ViControl) -> Result<(), RioError>;

    /// Clear the given asserted IRQs.
    fn acknowledge_irqs(&self, irqs: u32) -> Result<(), RioError>;

    /// Unmask `irqs` and wait until any of them is asserted or the timeout expires.
    ///
    /// A zero timeout only samples the status.
    fn wait_on_irqs(&self, irqs: u32, timeout: Timeout) -> Result<IrqWait, RioError>;

    /// Width in bytes of one element as the FIFO hardware stores it.
    fn fifo_element_bytes(&self, fifo: u32) -> Result<usize, RioError>;

    /// The transfer modes of this device's FIFO channels.
    fn fifo_modes(&self) -> FifoModes;

    /// Open and reserve the channel of `fifo`.
    fn open_fifo(&self, fifo: &FifoInfo) -> Result<Box<dyn FifoChannel>, RioError>;

    /// Granularity that ring buffer sizes are rounded up to. Defaults to the page size.
    fn buffer_alignment(&self) -> usize {
        page_size()
    }
}

/// The system page size.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(size).ok().filter(|s| *s > 0).unwrap_or(4096)
}
