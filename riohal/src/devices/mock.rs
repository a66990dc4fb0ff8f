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

//! An in-memory RIO device.
//!
//! [`MockDevice`] behaves like the kernel driver as far as sessions and FIFO engines can tell:
//! whole-device locks are counted, downloads are recorded and compared by signature, run/abort
//! and reset follow the driver's rules and an abort or reset makes every open FIFO channel report
//! [`RioError::TransferAborted`] until it is reopened. Register memory is a flat byte store shared
//! by the mapped window and the array transfers.
//!
//! Clones share the same device, so a test can keep one clone to play the hardware side while a
//! session owns another.
//!
//! # Examples
//!
//! ```rust
//! # use riohal::devices::device::{Device, ViControl};
//! # use riohal::devices::mock::MockDevice;
//! # fn example() -> Result<(), riohal::error::RioError> {
//! let device = MockDevice::new("RIO0", "PXIe-7971R");
//! device.control(ViControl::Run)?;
//! assert!(device.vi_started()?);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::devices::device::{
    AcquireWait, Device, FifoChannel, FifoModes, IrqWait, LockGuard, RegisterWindow, ViControl,
    page_size,
};
use crate::error::RioError;
use crate::personality::{DOWNLOAD_FORCE, PERSONALITY_RUN_WHEN_LOADED, SIGNATURE_LEN};
use crate::resource::{Direction, FifoInfo};
use crate::ring::RingBuffer;
use crate::timer::{Timeout, Timer};
use crate::types::{Element, bytes_of, bytes_of_mut};
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const DEFAULT_ADDRESS_SPACE_SIZE: usize = 0x1_0000;
const DEFAULT_FIFO_ELEMENT_BYTES: usize = 8;
const SIGNATURE_RANGE: std::ops::Range<usize> = 8..8 + SIGNATURE_LEN;

#[derive(Debug, Default)]
struct MockFifo {
    reserved: bool,
    /// Target-to-host elements the hardware has produced but the host has not taken yet.
    incoming: VecDeque<u8>,
    /// Host-to-target elements the hardware has consumed.
    received: Vec<u8>,
    abort: bool,
    /// Abort the next bulk read or write, after availability was already seen.
    copy_abort: bool,
}

#[derive(Debug)]
struct MockState {
    model: String,
    fifo_modes: FifoModes,
    element_bytes: HashMap<u32, usize>,
    alignment: usize,
    registers_mappable: bool,
    memory: Vec<u8>,
    image: Option<Vec<u8>>,
    downloads: usize,
    started: bool,
    finished: bool,
    shared_locks: usize,
    exclusive_lock: bool,
    irq_status: u32,
    irq_mask: u32,
    communication_timeout: bool,
    /// Bumped by anything that aborts DMA; channels opened under an older generation are dead.
    generation: u64,
    fifos: HashMap<u32, MockFifo>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockState>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the state changes or `remaining` runs out.
    fn wait<'a>(
        &'a self,
        guard: MutexGuard<'a, MockState>,
        remaining: Timeout,
    ) -> MutexGuard<'a, MockState> {
        match remaining {
            Timeout::Infinite => self
                .changed
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner),
            Timeout::Millis(ms) => {
                self.changed
                    .wait_timeout(guard, Duration::from_millis(u64::from(ms)))
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        }
    }
}

fn le_word(blob: &[u8], index: usize) -> u32 {
    let start = index * 4;
    blob.get(start..start + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .unwrap_or(0)
}

fn memory_range(memory: &[u8], offset: u32, len: usize) -> Result<std::ops::Range<usize>, RioError> {
    let start = offset as usize;
    let end = start.checked_add(len).unwrap_or(usize::MAX);
    if end > memory.len() {
        return Err(RioError::InvalidParameter(format!(
            "{len} bytes at {offset:#x} are outside the {:#x} byte address space",
            memory.len()
        )));
    }
    Ok(start..end)
}

/// A device that lives in memory.
#[derive(Debug, Clone)]
pub struct MockDevice {
    name: String,
    shared: Arc<Shared>,
}

impl MockDevice {
    /// A device of the given model with no image, both FIFO modes and a mappable 64 KiB register
    /// window.
    pub fn new(name: &str, model: &str) -> MockDevice {
        let state = MockState {
            model: model.to_owned(),
            fifo_modes: FifoModes::default(),
            element_bytes: HashMap::new(),
            alignment: page_size(),
            registers_mappable: true,
            memory: vec![0; DEFAULT_ADDRESS_SPACE_SIZE],
            image: None,
            downloads: 0,
            started: false,
            finished: false,
            shared_locks: 0,
            exclusive_lock: false,
            irq_status: 0,
            irq_mask: 0,
            communication_timeout: false,
            generation: 0,
            fifos: HashMap::new(),
        };
        MockDevice {
            name: name.to_owned(),
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                changed: Condvar::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.shared.lock()
    }

    fn notify(&self) {
        self.shared.changed.notify_all();
    }

    pub fn with_fifo_modes(self, modes: FifoModes) -> Self {
        self.state().fifo_modes = modes;
        self
    }

    /// Hardware element width of one FIFO. FIFOs without an entry use 8 bytes.
    pub fn with_fifo_element_bytes(self, fifo: u32, bytes: usize) -> Self {
        self.state().element_bytes.insert(fifo, bytes);
        self
    }

    pub fn with_buffer_alignment(self, bytes: usize) -> Self {
        self.state().alignment = bytes;
        self
    }

    pub fn with_registers_mappable(self, mappable: bool) -> Self {
        self.state().registers_mappable = mappable;
        self
    }

    pub fn with_address_space_size(self, bytes: usize) -> Self {
        self.state().memory = vec![0; bytes];
        self
    }

    /// Produce target-to-host elements on `fifo`, as the FPGA would.
    pub fn push_fifo_data<T: Element>(&self, fifo: u32, elements: &[T]) {
        let mut state = self.state();
        let entry = state.fifos.entry(fifo).or_default();
        entry.incoming.extend(bytes_of(elements));
        trace!("Mock FIFO {fifo} has {} bytes pending", entry.incoming.len());
        drop(state);
        self.notify();
    }

    /// Host-to-target elements that reached the FPGA through `fifo`, oldest first.
    pub fn received_fifo_data<T: Element>(&self, fifo: u32) -> Vec<T> {
        let state = self.state();
        let bytes = state
            .fifos
            .get(&fifo)
            .map(|f| f.received.as_slice())
            .unwrap_or_default();
        let mut elements = vec![T::default(); bytes.len() / std::mem::size_of::<T>()];
        let len = std::mem::size_of_val(elements.as_slice());
        bytes_of_mut(&mut elements).copy_from_slice(&bytes[..len]);
        elements
    }

    /// Make the next operation on the open channel of `fifo` report an aborted transfer.
    pub fn inject_fifo_abort(&self, fifo: u32) {
        self.state().fifos.entry(fifo).or_default().abort = true;
        self.notify();
    }

    /// Make the next bulk read or write on `fifo` report an aborted transfer, leaving the
    /// availability checks before it untouched.
    pub fn inject_fifo_copy_abort(&self, fifo: u32) {
        self.state().fifos.entry(fifo).or_default().copy_abort = true;
    }

    pub fn is_fifo_reserved(&self, fifo: u32) -> bool {
        self.state().fifos.get(&fifo).is_some_and(|f| f.reserved)
    }

    /// Raise IRQs, waking anyone waiting on them.
    pub fn assert_irqs(&self, irqs: u32) {
        self.state().irq_status |= irqs;
        self.notify();
    }

    pub fn irq_mask(&self) -> u32 {
        self.state().irq_mask
    }

    /// While set, reading the control register status reports a communication timeout.
    pub fn set_communication_timeout(&self, timeout: bool) {
        self.state().communication_timeout = timeout;
    }

    /// Let the personality report that it stopped on its own.
    pub fn set_finished(&self, finished: bool) {
        self.state().finished = finished;
    }

    /// Number of blobs actually written, not counting downloads of an image already present.
    pub fn download_count(&self) -> usize {
        self.state().downloads
    }

    pub fn image(&self) -> Option<Vec<u8>> {
        self.state().image.clone()
    }

    pub fn shared_lock_count(&self) -> usize {
        self.state().shared_locks
    }

    /// Raw register memory, as the FPGA sees it.
    pub fn peek(&self, offset: u32, len: usize) -> Result<Vec<u8>, RioError> {
        let state = self.state();
        let range = memory_range(&state.memory, offset, len)?;
        Ok(state.memory[range].to_vec())
    }

    /// Set raw register memory, as the FPGA would.
    pub fn poke(&self, offset: u32, data: &[u8]) -> Result<(), RioError> {
        let mut state = self.state();
        let range = memory_range(&state.memory, offset, data.len())?;
        state.memory[range].copy_from_slice(data);
        Ok(())
    }

    fn abort_dma(state: &mut MockState) {
        state.generation += 1;
    }
}

struct MockLock {
    shared: Arc<Shared>,
    exclusive: bool,
}

impl Drop for MockLock {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if self.exclusive {
            state.exclusive_lock = false;
        } else {
            state.shared_locks = state.shared_locks.saturating_sub(1);
        }
    }
}

struct MockWindow {
    shared: Arc<Shared>,
    len: usize,
}

impl MockWindow {
    fn slot(&self, offset: u32) -> Result<std::ops::Range<usize>, RioError> {
        let start = offset as usize;
        if start % 4 != 0 || start + 4 > self.len {
            return Err(RioError::InvalidParameter(format!(
                "register offset {offset:#x} is outside the {:#x} byte window",
                self.len
            )));
        }
        Ok(start..start + 4)
    }
}

impl RegisterWindow for MockWindow {
    fn len(&self) -> usize {
        self.len
    }

    fn read32(&self, offset: u32) -> Result<u32, RioError> {
        let range = self.slot(offset)?;
        let state = self.shared.lock();
        let mut word = [0u8; 4];
        word.copy_from_slice(&state.memory[range]);
        Ok(u32::from_ne_bytes(word))
    }

    fn write32(&self, offset: u32, value: u32) -> Result<(), RioError> {
        let range = self.slot(offset)?;
        self.shared.lock().memory[range].copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }
}

impl Device for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> Result<String, RioError> {
        Ok(self.state().model.clone())
    }

    fn try_lock_shared(&self) -> Result<Option<LockGuard>, RioError> {
        let mut state = self.state();
        if state.exclusive_lock {
            return Ok(None);
        }
        state.shared_locks += 1;
        Ok(Some(Box::new(MockLock {
            shared: Arc::clone(&self.shared),
            exclusive: false,
        })))
    }

    fn try_lock_exclusive(&self) -> Result<Option<LockGuard>, RioError> {
        let mut state = self.state();
        if state.exclusive_lock || state.shared_locks > 0 {
            return Ok(None);
        }
        state.exclusive_lock = true;
        Ok(Some(Box::new(MockLock {
            shared: Arc::clone(&self.shared),
            exclusive: true,
        })))
    }

    fn download(&self, blob: &[u8]) -> Result<bool, RioError> {
        let signature = blob.get(SIGNATURE_RANGE).ok_or_else(|| {
            RioError::InvalidParameter(format!("{} byte blob has no signature", blob.len()))
        })?;
        let force = le_word(blob, 0) & DOWNLOAD_FORCE != 0;
        let mut state = self.state();
        let present = state
            .image
            .as_ref()
            .and_then(|image| image.get(SIGNATURE_RANGE))
            .is_some_and(|s| s == signature);
        if present && !force {
            debug!("{} already holds this image", self.name);
            return Ok(true);
        }
        state.image = Some(blob.to_vec());
        state.downloads += 1;
        state.started = le_word(blob, 1) & PERSONALITY_RUN_WHEN_LOADED != 0;
        state.finished = false;
        state.memory.fill(0);
        MockDevice::abort_dma(&mut state);
        drop(state);
        self.notify();
        Ok(false)
    }

    fn clear_image(&self) -> Result<(), RioError> {
        let _lock = self.try_lock_exclusive()?.ok_or(RioError::FpgaBusy)?;
        let mut state = self.state();
        state.image = None;
        state.started = false;
        state.finished = false;
        MockDevice::abort_dma(&mut state);
        drop(state);
        self.notify();
        Ok(())
    }

    fn address_space_size(&self) -> Result<usize, RioError> {
        Ok(self.state().memory.len())
    }

    fn registers_mappable(&self) -> Result<bool, RioError> {
        Ok(self.state().registers_mappable)
    }

    fn map_registers(&self, size: usize) -> Result<Box<dyn RegisterWindow>, RioError> {
        let state = self.state();
        if !state.registers_mappable {
            return Err(RioError::FeatureNotSupported(format!(
                "{} does not map registers",
                self.name
            )));
        }
        Ok(Box::new(MockWindow {
            shared: Arc::clone(&self.shared),
            len: size.min(state.memory.len()),
        }))
    }

    fn read_array(
        &self,
        offset: u32,
        _bits_per_elem: u32,
        _count: usize,
        out: &mut [u8],
    ) -> Result<(), RioError> {
        let state = self.state();
        let range = memory_range(&state.memory, offset, out.len())?;
        out.copy_from_slice(&state.memory[range]);
        Ok(())
    }

    fn write_array(
        &self,
        offset: u32,
        _bits_per_elem: u32,
        _count: usize,
        data: &[u8],
    ) -> Result<(), RioError> {
        let mut state = self.state();
        let range = memory_range(&state.memory, offset, data.len())?;
        state.memory[range].copy_from_slice(data);
        Ok(())
    }

    fn vi_started(&self) -> Result<bool, RioError> {
        let state = self.state();
        if state.communication_timeout {
            return Err(RioError::CommunicationTimeout);
        }
        Ok(state.started)
    }

    fn vi_finished(&self) -> Result<bool, RioError> {
        Ok(self.state().finished)
    }

    fn control(&self, action: ViControl) -> Result<(), RioError> {
        let mut state = self.state();
        match action {
            ViControl::Run => {
                if state.started && !state.finished {
                    return Err(RioError::FpgaAlreadyRunning);
                }
                state.started = true;
                state.finished = false;
            }
            ViControl::Abort => {
                state.started = false;
                MockDevice::abort_dma(&mut state);
            }
            ViControl::ResetIfLastSession if state.shared_locks > 1 => {
                return Err(RioError::FpgaBusyFpgaInterfaceCApi);
            }
            ViControl::Reset | ViControl::ResetIfLastSession => {
                state.started = false;
                state.finished = false;
                MockDevice::abort_dma(&mut state);
            }
        }
        debug!("{action:?} on {}", self.name);
        drop(state);
        self.notify();
        Ok(())
    }

    fn acknowledge_irqs(&self, irqs: u32) -> Result<(), RioError> {
        self.state().irq_status &= !irqs;
        Ok(())
    }

    fn wait_on_irqs(&self, irqs: u32, timeout: Timeout) -> Result<IrqWait, RioError> {
        let timer = Timer::start(timeout);
        let mut state = self.state();
        state.irq_mask = irqs;
        loop {
            let timed_out = timer.is_timed_out();
            let asserted = state.irq_status & irqs;
            if asserted != 0 || timeout.is_zero() {
                return Ok(IrqWait {
                    asserted,
                    timed_out: false,
                });
            }
            if timed_out {
                return Ok(IrqWait {
                    asserted: 0,
                    timed_out: true,
                });
            }
            state = self.shared.wait(state, timer.remaining());
        }
    }

    fn fifo_element_bytes(&self, fifo: u32) -> Result<usize, RioError> {
        Ok(self
            .state()
            .element_bytes
            .get(&fifo)
            .copied()
            .unwrap_or(DEFAULT_FIFO_ELEMENT_BYTES))
    }

    fn fifo_modes(&self) -> FifoModes {
        self.state().fifo_modes
    }

    fn open_fifo(&self, fifo: &FifoInfo) -> Result<Box<dyn FifoChannel>, RioError> {
        let hardware_bytes = self.fifo_element_bytes(fifo.number())?;
        let mut state = self.state();
        let generation = state.generation;
        let entry = state.fifos.entry(fifo.number()).or_default();
        if entry.reserved {
            return Err(RioError::FifoReserved);
        }
        entry.reserved = true;
        entry.abort = false;
        entry.copy_abort = false;
        Ok(Box::new(MockFifoChannel {
            shared: Arc::clone(&self.shared),
            number: fifo.number(),
            direction: fifo.direction(),
            stride: fifo.ty().element_bytes(),
            hardware_bytes,
            generation,
            ring: None,
            position: 0,
            held: 0,
        }))
    }

    fn buffer_alignment(&self) -> usize {
        self.state().alignment
    }
}

/// The host end of a mock DMA channel. Target-to-host elements are copied into the ring when the
/// host acquires them; host-to-target elements are taken out of the ring when it releases them.
struct MockFifoChannel {
    shared: Arc<Shared>,
    number: u32,
    direction: Direction,
    /// Host bytes per element, the stride of the ring as the host uses it.
    stride: usize,
    hardware_bytes: usize,
    generation: u64,
    ring: Option<Arc<RingBuffer>>,
    /// Hardware position in the ring, in elements.
    position: usize,
    /// Elements acquired by the host and not yet released.
    held: usize,
}

impl MockFifoChannel {
    fn check(&self, state: &mut MockState) -> Result<(), RioError> {
        if state.generation != self.generation {
            return Err(RioError::TransferAborted);
        }
        let fifo = state.fifos.entry(self.number).or_default();
        if fifo.abort {
            fifo.abort = false;
            return Err(RioError::TransferAborted);
        }
        Ok(())
    }

    fn check_copy(&self, state: &mut MockState) -> Result<(), RioError> {
        self.check(state)?;
        let fifo = state.fifos.entry(self.number).or_default();
        if fifo.copy_abort {
            fifo.copy_abort = false;
            return Err(RioError::TransferAborted);
        }
        Ok(())
    }

    fn ring(&self) -> Result<&Arc<RingBuffer>, RioError> {
        self.ring.as_ref().ok_or_else(|| {
            RioError::SoftwareFault(format!("mock FIFO {} has no buffer", self.number))
        })
    }

    fn depth(&self) -> Result<usize, RioError> {
        Ok(self.ring()?.len() / self.hardware_bytes.max(1))
    }

    fn available_in(&self, state: &MockState) -> Result<usize, RioError> {
        let free = self.depth()?.saturating_sub(self.held);
        Ok(match self.direction {
            Direction::TargetToHost => {
                let pending = state
                    .fifos
                    .get(&self.number)
                    .map_or(0, |f| f.incoming.len() / self.stride.max(1));
                pending.min(free)
            }
            Direction::HostToTarget => free,
        })
    }

    fn ring_offset(&self, element: usize, depth: usize) -> usize {
        (element % depth) * self.stride
    }
}

impl Drop for MockFifoChannel {
    fn drop(&mut self) {
        if let Some(fifo) = self.shared.lock().fifos.get_mut(&self.number) {
            fifo.reserved = false;
        }
    }
}

impl FifoChannel for MockFifoChannel {
    fn set_buffer(&mut self, ring: Arc<RingBuffer>) -> Result<(), RioError> {
        self.check(&mut self.shared.lock())?;
        self.ring = Some(ring);
        self.position = 0;
        self.held = 0;
        Ok(())
    }

    fn start(&mut self) -> Result<(), RioError> {
        self.check(&mut self.shared.lock())
    }

    fn available(&mut self) -> Result<usize, RioError> {
        let mut state = self.shared.lock();
        self.check(&mut state)?;
        self.available_in(&state)
    }

    fn acquire_wait(
        &mut self,
        elements: usize,
        timeout: Timeout,
    ) -> Result<AcquireWait, RioError> {
        let timer = Timer::start(timeout);
        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock();
        loop {
            let timed_out = timer.is_timed_out();
            self.check(&mut state)?;
            let available = self.available_in(&state)?;
            if available >= elements {
                if self.direction == Direction::TargetToHost {
                    let depth = self.depth()?;
                    let ring = Arc::clone(self.ring()?);
                    let fifo = state.fifos.entry(self.number).or_default();
                    for i in 0..elements {
                        let element: Vec<u8> = fifo.incoming.drain(..self.stride).collect();
                        ring.write_at(self.ring_offset(self.position + i, depth), &element)?;
                    }
                    self.position = (self.position + elements) % depth;
                }
                self.held += elements;
                return Ok(AcquireWait {
                    available: available - elements,
                    timed_out: false,
                });
            }
            if timed_out {
                return Ok(AcquireWait {
                    available,
                    timed_out: true,
                });
            }
            state = shared.wait(state, timer.remaining());
        }
    }

    fn release(&mut self, elements: usize) -> Result<(), RioError> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock();
        self.check(&mut state)?;
        if elements > self.held {
            return Err(RioError::ElementsNotPermissibleToBeAcquired {
                requested: elements,
                acquired: self.held,
                depth: self.depth()?,
            });
        }
        if self.direction == Direction::HostToTarget {
            let depth = self.depth()?;
            let ring = Arc::clone(self.ring()?);
            let fifo = state.fifos.entry(self.number).or_default();
            let mut element = vec![0u8; self.stride];
            for i in 0..elements {
                ring.read_at(self.ring_offset(self.position + i, depth), &mut element)?;
                fifo.received.extend_from_slice(&element);
            }
            self.position = (self.position + elements) % depth;
        }
        self.held -= elements;
        drop(state);
        shared.changed.notify_all();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), RioError> {
        let mut state = self.shared.lock();
        self.check_copy(&mut state)?;
        if self.direction != Direction::TargetToHost {
            return Err(RioError::InvalidParameter(format!(
                "mock FIFO {} is host-to-target",
                self.number
            )));
        }
        let fifo = state.fifos.entry(self.number).or_default();
        if fifo.incoming.len() < buf.len() {
            return Err(RioError::SoftwareFault(format!(
                "mock FIFO {} holds {} bytes, {} were read",
                self.number,
                fifo.incoming.len(),
                buf.len()
            )));
        }
        let len = buf.len();
        for (dst, src) in buf.iter_mut().zip(fifo.incoming.drain(..len)) {
            *dst = src;
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), RioError> {
        let mut state = self.shared.lock();
        self.check_copy(&mut state)?;
        if self.direction != Direction::HostToTarget {
            return Err(RioError::InvalidParameter(format!(
                "mock FIFO {} is target-to-host",
                self.number
            )));
        }
        state
            .fifos
            .entry(self.number)
            .or_default()
            .received
            .extend_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use googletest::prelude::*;

    fn blob(signature: u8, download_flags: u32, personality_flags: u32) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(&download_flags.to_le_bytes());
        blob.extend_from_slice(&personality_flags.to_le_bytes());
        blob.extend_from_slice(&[signature; SIGNATURE_LEN]);
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob
    }

    #[gtest]
    fn exclusive_lock_waits_for_every_shared_holder() -> Result<()> {
        let device = MockDevice::new("RIO0", "PXIe-7971R");
        let first = device.try_lock_shared()?;
        let second = device.try_lock_shared()?;
        expect_that!(device.shared_lock_count(), eq(2));
        expect_that!(device.try_lock_exclusive()?.is_none(), eq(true));
        drop(first);
        drop(second);
        let exclusive = device.try_lock_exclusive()?;
        expect_that!(exclusive.is_some(), eq(true));
        expect_that!(device.try_lock_shared()?.is_none(), eq(true));
        Ok(())
    }

    #[gtest]
    fn same_signature_is_not_downloaded_twice_unless_forced() -> Result<()> {
        let device = MockDevice::new("RIO0", "PXIe-7971R");
        expect_that!(device.download(&blob(0xAA, 0, 0)), ok(eq(&false)));
        expect_that!(device.download(&blob(0xAA, 0, 0)), ok(eq(&true)));
        expect_that!(device.download(&blob(0xAA, DOWNLOAD_FORCE, 0)), ok(eq(&false)));
        expect_that!(device.download(&blob(0xBB, 0, 0)), ok(eq(&false)));
        expect_that!(device.download_count(), eq(3));
        Ok(())
    }

    #[gtest]
    fn run_when_loaded_starts_the_personality() -> Result<()> {
        let device = MockDevice::new("RIO0", "PXIe-7971R");
        device.download(&blob(0xAA, 0, PERSONALITY_RUN_WHEN_LOADED))?;
        expect_that!(device.vi_started(), ok(eq(&true)));
        expect_that!(
            device.control(ViControl::Run),
            err(displays_as(contains_substring("RioError::FpgaAlreadyRunning")))
        );
        device.set_finished(true);
        expect_that!(device.control(ViControl::Run), ok(eq(&())));
        Ok(())
    }

    #[gtest]
    fn conditional_reset_is_refused_with_other_sessions_open() -> Result<()> {
        let device = MockDevice::new("RIO0", "PXIe-7971R");
        let _first = device.try_lock_shared()?;
        let second = device.try_lock_shared()?;
        expect_that!(
            device.control(ViControl::ResetIfLastSession),
            err(displays_as(contains_substring(
                "RioError::FpgaBusyFpgaInterfaceCApi"
            )))
        );
        drop(second);
        expect_that!(device.control(ViControl::ResetIfLastSession), ok(eq(&())));
        Ok(())
    }

    #[gtest]
    fn irq_wait_wakes_on_assertion_from_another_thread() -> Result<()> {
        let device = MockDevice::new("RIO0", "PXIe-7971R");
        let hardware = device.clone();
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            hardware.assert_irqs(0x3);
        });
        let wait = device.wait_on_irqs(0x2, Timeout::Millis(5000))?;
        raiser.join().map_err(|_| RioError::SoftwareFault("raiser panicked".into()))?;
        expect_that!(
            wait,
            eq(IrqWait {
                asserted: 0x2,
                timed_out: false
            })
        );
        expect_that!(device.irq_mask(), eq(0x2));
        Ok(())
    }

    #[gtest]
    fn fifo_is_reserved_while_its_channel_is_open() -> Result<()> {
        let device = MockDevice::new("RIO0", "PXIe-7971R");
        let info = FifoInfo::new("samples", Type::U32, 0, 1, Direction::TargetToHost, "dma0");
        let channel = device.open_fifo(&info)?;
        expect_that!(device.is_fifo_reserved(0), eq(true));
        expect_that!(
            device.open_fifo(&info).err(),
            some(displays_as(contains_substring("RioError::FifoReserved")))
        );
        drop(channel);
        expect_that!(device.is_fifo_reserved(0), eq(false));
        Ok(())
    }

    #[gtest]
    fn abort_kills_open_channels() -> Result<()> {
        let device = MockDevice::new("RIO0", "PXIe-7971R");
        let info = FifoInfo::new("samples", Type::U32, 0, 1, Direction::TargetToHost, "dma0");
        let mut channel = device.open_fifo(&info)?;
        channel.set_buffer(RingBuffer::allocate(4096)?)?;
        channel.start()?;
        device.control(ViControl::Abort)?;
        expect_that!(
            channel.available(),
            err(displays_as(contains_substring("RioError::TransferAborted")))
        );
        Ok(())
    }
}
