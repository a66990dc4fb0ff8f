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

//! The DMA FIFO engine.
//!
//! A [`Fifo`] owns the host side of one DMA channel: a ring buffer shared with the hardware and
//! the bookkeeping of which part of it the caller currently holds.
//!
//! # State machine
//!
//! ```text
//! Unconfigured --configure--> Configured --start--> Started
//!      ^                                               |
//!      +------------------- stop / set_stopped --------+
//! ```
//!
//! `acquire_*`, `read` and `write` configure and start the FIFO on demand, using the last
//! requested depth. Stopping closes the channel and frees the ring but remembers the depth.
//!
//! # Transfer modes
//!
//! Elements move either zero-copy, by acquiring a window of the ring with
//! [`Fifo::acquire_read`]/[`Fifo::acquire_write`] and handing it back with [`Fifo::release`],
//! or by copying with [`Fifo::read`]/[`Fifo::write`]. The device reports which modes its
//! channels support; the other one fails with [`RioError::FeatureNotSupported`].
//!
//! Releasing takes the window by `&mut` and cuts the released elements off its front, so no
//! slice of the window can outlive the release of the elements it covers:
//!
//! ```rust,compile_fail
//! # use riohal::devices::mock::MockDevice;
//! # use riohal::fifo::Fifo;
//! # use riohal::resource::{Direction, FifoInfo};
//! # use riohal::timer::Timeout;
//! # use riohal::types::Type;
//! # use std::sync::Arc;
//! # fn example() -> Result<(), riohal::error::RioError> {
//! # let device = MockDevice::new("RIO0", "PXIe-7971R").with_fifo_element_bytes(1, 4);
//! # let info = FifoInfo::new("commands", Type::U32, 1, 1, Direction::HostToTarget, "dma1");
//! # let fifo = Fifo::new(info, Arc::new(device))?;
//! let mut window = fifo.acquire_write::<u32>(4, Timeout::Millis(100))?;
//! let held = window.elements_mut();
//! fifo.release(&mut window, 4)?;
//! held[0] = 42;
//! # Ok(())
//! # }
//! ```
//!
//! Windows are released in the order they were acquired.
//!
//! # Aborted transfers
//!
//! An abort or reset of the personality stops every channel behind the engine's back. Blocking
//! operations, the lazy start and the ring binding notice through
//! [`RioError::TransferAborted`], reopen and restart the FIFO and retry once. A release that
//! notices records the abort instead, and the next acquire, read or write reports it once.
//!
//! # Examples
//!
//! ```rust
//! # use riohal::devices::mock::MockDevice;
//! # use riohal::fifo::Fifo;
//! # use riohal::resource::{Direction, FifoInfo};
//! # use riohal::timer::Timeout;
//! # use riohal::types::Type;
//! # use std::sync::Arc;
//! # fn example() -> Result<(), riohal::error::RioError> {
//! let device = MockDevice::new("RIO0", "PXIe-7971R").with_fifo_element_bytes(0, 4);
//! let info = FifoInfo::new("samples", Type::U32, 0, 1, Direction::TargetToHost, "dma0");
//! let fifo = Fifo::new(info, Arc::new(device.clone()))?;
//! device.push_fifo_data(0, &[1u32, 2, 3]);
//!
//! let mut elements = fifo.acquire_read::<u32>(3, Timeout::Millis(100))?;
//! assert_eq!(elements.elements(), &[1, 2, 3]);
//! fifo.release(&mut elements, 3)?;
//! assert!(elements.is_empty());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::config::MINIMUM_FIFO_DEPTH;
use crate::devices::device::{Device, FifoChannel, FifoModes};
use crate::error::RioError;
use crate::resource::FifoInfo;
use crate::ring::RingBuffer;
use crate::timer::{Timeout, Timer};
use crate::types::{Element, bytes_of, bytes_of_mut};
use log::{debug, trace, warn};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct FifoState {
    channel: Option<Box<dyn FifoChannel>>,
    ring: Option<Arc<RingBuffer>>,
    started: bool,
    /// Depth in elements, kept across stops.
    depth: usize,
    /// Ring size in bytes, kept across stops.
    size: usize,
    acquired: usize,
    /// Ring index of the next element to acquire.
    next: usize,
    pending_abort: bool,
}

impl FifoState {
    fn channel(&mut self) -> Result<&mut (dyn FifoChannel + 'static), RioError> {
        self.channel
            .as_deref_mut()
            .ok_or_else(|| RioError::SoftwareFault(String::from("FIFO has no open channel")))
    }

    fn take_pending_abort(&mut self) -> Result<(), RioError> {
        if self.pending_abort {
            self.pending_abort = false;
            return Err(RioError::TransferAborted);
        }
        Ok(())
    }

    fn set_stopped(&mut self) {
        if self.channel.is_some() {
            self.channel = None;
            self.ring = None;
            self.started = false;
            self.next = 0;
            self.acquired = 0;
        }
    }
}

/// A window of acquired FIFO elements inside the ring buffer.
///
/// [`Fifo::release`] shrinks the window from the front; released elements are no longer
/// reachable through it.
pub struct FifoElements<T: Element> {
    ring: Option<Arc<RingBuffer>>,
    ptr: *mut T,
    len: usize,
    remaining: usize,
    fifo: u32,
    /// Ring index of the first element of the window.
    start: usize,
    _marker: PhantomData<T>,
}

// SAFETY: the pointer targets the ring kept alive by `ring`, which is itself Send + Sync.
unsafe impl<T: Element> Send for FifoElements<T> {}

impl<T: Element> FifoElements<T> {
    fn empty(fifo: u32, remaining: usize) -> Self {
        FifoElements {
            ring: None,
            ptr: std::ptr::NonNull::dangling().as_ptr(),
            len: 0,
            remaining,
            fifo,
            start: 0,
            _marker: PhantomData,
        }
    }

    /// Drop the first `elements` from the window.
    fn advance(&mut self, elements: usize) {
        self.ptr = self.ptr.wrapping_add(elements);
        self.len -= elements;
        self.start += elements;
        if self.len == 0 {
            self.clear();
        }
    }

    fn clear(&mut self) {
        self.ring = None;
        self.ptr = std::ptr::NonNull::dangling().as_ptr();
        self.len = 0;
    }

    /// Number of elements acquired.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements still available after this acquisition.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn elements(&self) -> &[T] {
        // SAFETY: `ptr` is aligned and covers `len` elements inside the live ring (checked when
        // the window was created), or is dangling with `len == 0`.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn elements_mut(&mut self) -> &mut [T] {
        // SAFETY: as for `elements`. Windows of one engine never overlap while acquired, and
        // released elements are cut off the window before the hardware may reuse them.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl<T: Element> std::fmt::Debug for FifoElements<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoElements")
            .field("len", &self.len)
            .field("remaining", &self.remaining)
            .field("ring", &self.ring.as_ref().map(|r| r.len()))
            .finish()
    }
}

/// The host side of one DMA FIFO.
pub struct Fifo {
    info: FifoInfo,
    device: Arc<dyn Device>,
    modes: FifoModes,
    hardware_element_bytes: usize,
    alignment: usize,
    state: Mutex<FifoState>,
}

impl std::fmt::Debug for Fifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fifo")
            .field("info", &self.info)
            .field("modes", &self.modes)
            .field("hardware_element_bytes", &self.hardware_element_bytes)
            .field("depth", &self.depth())
            .field("acquired", &self.acquired())
            .finish()
    }
}

impl Fifo {
    /// Create an unconfigured engine for `info` on `device`.
    ///
    /// # Returns: `Result<Fifo, RioError>`
    /// * `Ok(Fifo)` - The engine, sized for [`MINIMUM_FIFO_DEPTH`] elements
    /// * `Err(RioError::IORead)` - The hardware element width could not be read
    pub fn new(info: FifoInfo, device: Arc<dyn Device>) -> Result<Fifo, RioError> {
        let hardware_element_bytes = device.fifo_element_bytes(info.number())?;
        if hardware_element_bytes == 0 {
            return Err(RioError::SoftwareFault(format!(
                "FIFO {} reports zero byte elements",
                info.number()
            )));
        }
        let mut fifo = Fifo {
            modes: device.fifo_modes(),
            alignment: device.buffer_alignment().max(1),
            info,
            device,
            hardware_element_bytes,
            state: Mutex::new(FifoState::default()),
        };
        let (depth, size) = fifo.dimensions(MINIMUM_FIFO_DEPTH)?;
        let state = fifo.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.depth = depth;
        state.size = size;
        Ok(fifo)
    }

    fn lock(&self) -> MutexGuard<'_, FifoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn info(&self) -> &FifoInfo {
        &self.info
    }

    pub fn modes(&self) -> FifoModes {
        self.modes
    }

    pub fn hardware_element_bytes(&self) -> usize {
        self.hardware_element_bytes
    }

    pub fn depth(&self) -> usize {
        self.lock().depth
    }

    pub fn acquired(&self) -> usize {
        self.lock().acquired
    }

    pub fn next(&self) -> usize {
        self.lock().next
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn is_configured(&self) -> bool {
        self.lock().channel.is_some()
    }

    /// Ring size and depth for a requested depth: the size is rounded up to the alignment.
    fn dimensions(&self, requested_depth: usize) -> Result<(usize, usize), RioError> {
        let bytes = requested_depth
            .checked_mul(self.hardware_element_bytes)
            .and_then(|b| b.checked_add(self.alignment - 1))
            .ok_or(RioError::BadDepth)?;
        let size = bytes / self.alignment * self.alignment;
        Ok((size / self.hardware_element_bytes, size))
    }

    fn check_element<T: Element>(&self, host_to_target: bool) -> Result<(), RioError> {
        if T::TYPE != self.info.ty() || host_to_target != self.info.is_host_to_target() {
            return Err(RioError::InvalidParameter(format!(
                "FIFO {} carries {} {:?}, not {} {}",
                self.info.name(),
                self.info.ty().describe(),
                self.info.direction(),
                T::TYPE.describe(),
                if host_to_target {
                    "HostToTarget"
                } else {
                    "TargetToHost"
                }
            )));
        }
        Ok(())
    }

    /// Size the ring for at least `requested_depth` elements.
    ///
    /// Reconfiguring to the same ring size keeps the current ring and channel untouched.
    ///
    /// # Arguments
    ///
    /// * `requested_depth` - Minimum number of elements, not zero
    ///
    /// # Returns: `Result<usize, RioError>`
    /// * `Ok(usize)` - The actual depth
    /// * `Err(RioError::InvalidParameter)` - `requested_depth` is zero
    /// * `Err(RioError::FifoElementsCurrentlyAcquired)` - Elements are acquired
    /// * `Err(RioError::FifoReserved)` - Another process has the FIFO open
    pub fn configure(&self, requested_depth: usize) -> Result<usize, RioError> {
        if requested_depth == 0 {
            return Err(RioError::InvalidParameter(format!(
                "FIFO {} cannot be configured with depth 0",
                self.info.name()
            )));
        }
        let mut state = self.lock();
        self.configure_locked(&mut state, requested_depth)
    }

    fn configure_locked(
        &self,
        state: &mut FifoState,
        requested_depth: usize,
    ) -> Result<usize, RioError> {
        if state.acquired > 0 {
            return Err(RioError::FifoElementsCurrentlyAcquired(state.acquired));
        }
        let (depth, size) = self.dimensions(requested_depth)?;
        if state.channel.is_some() && size == state.size {
            return Ok(state.depth);
        }

        let bound = match self.bind_ring(state, size) {
            Err(e) if e.is_transfer_aborted() => {
                warn!(
                    "FIFO {} was stopped behind our back while configuring, reopening it",
                    self.info.name()
                );
                state.set_stopped();
                self.bind_ring(state, size)
            }
            result => result,
        };
        if let Err(e) = bound {
            // a channel without a ring must not look configured
            state.set_stopped();
            return Err(e);
        }
        state.next = 0;
        state.acquired = 0;
        state.depth = depth;
        state.size = size;
        debug!(
            "FIFO {} configured for {depth} elements ({size} bytes)",
            self.info.name()
        );
        Ok(depth)
    }

    /// Open the channel if needed and bind a fresh ring of `size` bytes to it.
    fn bind_ring(&self, state: &mut FifoState, size: usize) -> Result<(), RioError> {
        state.started = false;
        // an open channel is kept so no one can reserve the FIFO in between
        if state.channel.is_none() {
            state.channel = Some(self.device.open_fifo(&self.info)?);
        }
        let ring = RingBuffer::allocate(size)?;
        state.ring = None;
        state.channel()?.set_buffer(Arc::clone(&ring))?;
        state.ring = Some(ring);
        Ok(())
    }

    fn ensure_configured(&self, state: &mut FifoState) -> Result<(), RioError> {
        if state.channel.is_none() {
            let depth = state.depth;
            self.configure_locked(state, depth)?;
        }
        Ok(())
    }

    /// Start the FIFO, configuring it first if needed.
    ///
    /// The start request is always sent, since the channel may have been stopped by a reset the
    /// engine has not noticed yet. Starting a started FIFO succeeds.
    pub fn start(&self) -> Result<(), RioError> {
        let mut state = self.lock();
        self.start_locked(&mut state)
    }

    fn start_locked(&self, state: &mut FifoState) -> Result<(), RioError> {
        self.ensure_configured(state)?;
        if let Err(e) = state.channel()?.start() {
            if !e.is_transfer_aborted() {
                return Err(e);
            }
            warn!(
                "FIFO {} was stopped behind our back before starting, reopening it",
                self.info.name()
            );
            state.set_stopped();
            self.ensure_configured(state)?;
            state.channel()?.start()?;
        }
        if !state.started {
            debug!("FIFO {} started", self.info.name());
        }
        state.started = true;
        Ok(())
    }

    fn ensure_started(&self, state: &mut FifoState) -> Result<(), RioError> {
        self.ensure_configured(state)?;
        if !state.started {
            self.start_locked(state)?;
        }
        Ok(())
    }

    /// Stop the FIFO and free its ring. Stopping a stopped FIFO succeeds.
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - The FIFO is unconfigured
    /// * `Err(RioError::FifoElementsCurrentlyAcquired)` - Elements are acquired
    pub fn stop(&self) -> Result<(), RioError> {
        let mut state = self.lock();
        if state.acquired > 0 {
            return Err(RioError::FifoElementsCurrentlyAcquired(state.acquired));
        }
        state.set_stopped();
        debug!("FIFO {} stopped", self.info.name());
        Ok(())
    }

    /// Forget the channel after the device stopped it, regardless of acquired elements.
    pub fn set_stopped(&self) {
        let mut state = self.lock();
        state.set_stopped();
        state.pending_abort = false;
        trace!("FIFO {} marked stopped", self.info.name());
    }

    /// Run a channel operation, restarting the FIFO and retrying once if the transfer was
    /// aborted underneath.
    fn retry_aborted<R>(
        &self,
        state: &mut FifoState,
        mut op: impl FnMut(&mut dyn FifoChannel) -> Result<R, RioError>,
    ) -> Result<R, RioError> {
        match op(state.channel()?) {
            Err(e) if e.is_transfer_aborted() => {
                self.restart(state)?;
                op(state.channel()?)
            }
            result => result,
        }
    }

    fn restart(&self, state: &mut FifoState) -> Result<(), RioError> {
        warn!(
            "FIFO {} was stopped behind our back, restarting it",
            self.info.name()
        );
        state.set_stopped();
        self.start_locked(state)
    }

    /// Run a bulk copy. If the transfer was aborted, restart, wait for the elements again and
    /// copy once more. Returns the elements available before the copy that went through.
    fn copy_with_retry(
        &self,
        state: &mut FifoState,
        elements: usize,
        timer: &Timer,
        available: usize,
        mut copy: impl FnMut(&mut dyn FifoChannel) -> Result<(), RioError>,
    ) -> Result<usize, RioError> {
        match copy(state.channel()?) {
            Ok(()) => Ok(available),
            Err(e) if e.is_transfer_aborted() => {
                self.restart(state)?;
                let available = self.poll_until_available(state, elements, timer)?;
                copy(state.channel()?)?;
                Ok(available)
            }
            Err(e) => Err(e),
        }
    }

    fn available(&self, state: &mut FifoState) -> Result<usize, RioError> {
        self.retry_aborted(state, |channel| channel.available())
    }

    fn acquire_with_wait(
        &self,
        state: &mut FifoState,
        elements: usize,
        timeout: Timeout,
    ) -> Result<usize, RioError> {
        let wait = self.retry_aborted(state, |channel| channel.acquire_wait(elements, timeout))?;
        if wait.timed_out {
            return Err(RioError::FifoTimeout);
        }
        Ok(wait.available)
    }

    /// Poll until `elements` are available, giving up with [`RioError::FifoTimeout`] once the
    /// timer has expired and a last probe still falls short.
    fn poll_until_available(
        &self,
        state: &mut FifoState,
        elements: usize,
        timer: &Timer,
    ) -> Result<usize, RioError> {
        loop {
            let timed_out = timer.is_timed_out();
            let available = self.available(state)?;
            if available >= elements {
                return Ok(available);
            }
            if timed_out {
                return Err(RioError::FifoTimeout);
            }
            std::thread::yield_now();
        }
    }

    /// Acquire target-to-host elements for reading in place.
    ///
    /// # Arguments
    ///
    /// * `elements` - How many to acquire. Never more than up to the physical end of the ring is
    ///   acquired in one call; the rest needs another call once the ring wraps.
    /// * `timeout` - How long to wait for them
    ///
    /// # Returns: `Result<FifoElements<T>, RioError>`
    /// * `Ok(FifoElements<T>)` - The acquired window, possibly shorter than requested
    /// * `Err(RioError::FifoTimeout)` - Not enough elements arrived in time
    /// * `Err(RioError::ElementsNotPermissibleToBeAcquired)` - Too many are held already
    pub fn acquire_read<T: Element>(
        &self,
        elements: usize,
        timeout: Timeout,
    ) -> Result<FifoElements<T>, RioError> {
        self.acquire(false, elements, timeout)
    }

    /// Acquire free host-to-target elements for writing in place.
    ///
    /// The same rules as [`Fifo::acquire_read`] apply.
    pub fn acquire_write<T: Element>(
        &self,
        elements: usize,
        timeout: Timeout,
    ) -> Result<FifoElements<T>, RioError> {
        self.acquire(true, elements, timeout)
    }

    fn acquire<T: Element>(
        &self,
        host_to_target: bool,
        requested: usize,
        timeout: Timeout,
    ) -> Result<FifoElements<T>, RioError> {
        self.check_element::<T>(host_to_target)?;
        if !self.modes.acquire_release {
            return Err(RioError::FeatureNotSupported(format!(
                "FIFO {} does not support acquire/release",
                self.info.name()
            )));
        }
        let mut state = self.lock();
        state.take_pending_abort()?;
        if requested > state.depth {
            return Err(RioError::BadReadWriteCount {
                requested,
                limit: state.depth,
            });
        }
        let requested = requested.min(state.depth - state.next);
        if requested + state.acquired > state.depth {
            return Err(RioError::ElementsNotPermissibleToBeAcquired {
                requested,
                acquired: state.acquired,
                depth: state.depth,
            });
        }
        self.ensure_started(&mut state)?;
        if requested == 0 {
            let remaining = self.available(&mut state)?;
            return Ok(FifoElements::empty(self.info.number(), remaining));
        }

        let remaining = self.acquire_with_wait(&mut state, requested, timeout)?;
        let ring = state
            .ring
            .clone()
            .ok_or_else(|| RioError::SoftwareFault(String::from("FIFO has no ring")))?;
        let stride = std::mem::size_of::<T>();
        let start = state.next;
        let ptr = ring.region(start * stride, requested * stride)?.cast::<T>();
        state.acquired += requested;
        state.next += requested;
        if state.next == state.depth {
            state.next = 0;
        }
        trace!(
            "FIFO {} acquired {requested}, {} held, next {}",
            self.info.name(),
            state.acquired,
            state.next
        );
        Ok(FifoElements {
            ring: Some(ring),
            ptr,
            len: requested,
            remaining,
            fifo: self.info.number(),
            start,
            _marker: PhantomData,
        })
    }

    /// Hand the first `elements` of `window` back to the hardware and cut them off the window.
    /// Releasing zero elements always succeeds.
    ///
    /// # Arguments
    ///
    /// * `window` - A window acquired from this FIFO, the oldest one still holding elements
    /// * `elements` - How many of its elements to release
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - Released. Also when a stop already took the elements back, or when the
    ///   channel turned out to be aborted; that abort is reported by the next acquire, read or
    ///   write
    /// * `Err(RioError::BadReadWriteCount)` - More elements than the window holds
    /// * `Err(RioError::InvalidParameter)` - The window belongs to another FIFO, or an older
    ///   window still holds elements
    pub fn release<T: Element>(
        &self,
        window: &mut FifoElements<T>,
        elements: usize,
    ) -> Result<(), RioError> {
        if elements == 0 {
            return Ok(());
        }
        if elements > window.len {
            return Err(RioError::BadReadWriteCount {
                requested: elements,
                limit: window.len,
            });
        }
        if window.fifo != self.info.number() {
            return Err(RioError::InvalidParameter(format!(
                "elements of FIFO {} cannot be released to FIFO {}",
                window.fifo,
                self.info.number()
            )));
        }
        let mut state = self.lock();
        let current = match (&window.ring, &state.ring) {
            (Some(held), Some(ring)) => Arc::ptr_eq(held, ring),
            _ => false,
        };
        if !current {
            debug!(
                "FIFO {} was stopped since these elements were acquired, nothing to release",
                self.info.name()
            );
            window.clear();
            return Ok(());
        }
        let oldest = (state.next + state.depth - state.acquired) % state.depth;
        if window.start != oldest {
            return Err(RioError::InvalidParameter(format!(
                "FIFO {} elements must be released in the order they were acquired",
                self.info.name()
            )));
        }
        match state.channel()?.release(elements) {
            Ok(()) => {
                state.acquired -= elements;
                window.advance(elements);
                Ok(())
            }
            Err(e) if e.is_transfer_aborted() => {
                warn!(
                    "FIFO {} was stopped behind our back while releasing",
                    self.info.name()
                );
                state.set_stopped();
                state.pending_abort = true;
                window.clear();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Copy `elements` target-to-host elements into `data`.
    ///
    /// # Returns: `Result<usize, RioError>`
    /// * `Ok(usize)` - Elements still available afterwards
    /// * `Err(RioError::BufferInvalidSize)` - `data` holds fewer than `elements`
    /// * `Err(RioError::FifoElementsCurrentlyAcquired)` - Elements are acquired
    /// * `Err(RioError::FifoTimeout)` - Not enough elements arrived in time
    pub fn read<T: Element>(
        &self,
        data: &mut [T],
        elements: usize,
        timeout: Timeout,
    ) -> Result<usize, RioError> {
        self.check_copy::<T>(false, data.len(), elements)?;
        let mut state = self.lock();
        let timer = Timer::start(timeout);
        let available = self.prepare_copy(&mut state, elements, &timer)?;
        if elements == 0 {
            return Ok(available);
        }
        let bytes = &mut bytes_of_mut(data)[..elements * std::mem::size_of::<T>()];
        let available = self.copy_with_retry(&mut state, elements, &timer, available, |channel| {
            channel.read(&mut *bytes)
        })?;
        Ok(available - elements)
    }

    /// Copy `elements` host-to-target elements out of `data`.
    ///
    /// The same rules as [`Fifo::read`] apply.
    pub fn write<T: Element>(
        &self,
        data: &[T],
        elements: usize,
        timeout: Timeout,
    ) -> Result<usize, RioError> {
        self.check_copy::<T>(true, data.len(), elements)?;
        let mut state = self.lock();
        let timer = Timer::start(timeout);
        let available = self.prepare_copy(&mut state, elements, &timer)?;
        if elements == 0 {
            return Ok(available);
        }
        let bytes = &bytes_of(data)[..elements * std::mem::size_of::<T>()];
        let available = self.copy_with_retry(&mut state, elements, &timer, available, |channel| {
            channel.write(bytes)
        })?;
        Ok(available - elements)
    }

    fn check_copy<T: Element>(
        &self,
        host_to_target: bool,
        buffer_len: usize,
        elements: usize,
    ) -> Result<(), RioError> {
        self.check_element::<T>(host_to_target)?;
        if !self.modes.read_write {
            return Err(RioError::FeatureNotSupported(format!(
                "FIFO {} does not support read/write",
                self.info.name()
            )));
        }
        if buffer_len < elements {
            return Err(RioError::BufferInvalidSize {
                expected: elements,
                actual: buffer_len,
            });
        }
        Ok(())
    }

    /// The checks and wait shared by read and write. Returns the elements available.
    fn prepare_copy(
        &self,
        state: &mut FifoState,
        elements: usize,
        timer: &Timer,
    ) -> Result<usize, RioError> {
        state.take_pending_abort()?;
        if state.acquired > 0 {
            return Err(RioError::FifoElementsCurrentlyAcquired(state.acquired));
        }
        if elements > state.depth {
            return Err(RioError::BadReadWriteCount {
                requested: elements,
                limit: state.depth,
            });
        }
        self.ensure_started(state)?;
        if elements == 0 {
            return self.available(state);
        }
        self.poll_until_available(state, elements, timer)
    }
}
