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

//! A session: one bitfile downloaded to one device, with its registers and FIFOs.
//!
//! # Opening
//!
//! [`Session::open`] parses the bitfile, takes the device lock shared, checks that the board is
//! the model the bitfile was compiled for, downloads the personality (a no-op when the board
//! already holds it), maps the register window when the driver allows it and builds one
//! [`Fifo`] engine per DMA channel. Unless [`OpenOptions::no_run`] is set, the personality is
//! then started if it was already on the board or does not start itself.
//!
//! # Registers
//!
//! Resources are looked up by name with [`Session::find_resource`], which returns a register
//! address or a FIFO number. Scalar registers of 32 bits or fewer go through the mapped window
//! as a single 32-bit load or store; anything wider, and every access when the window is not
//! mapped, goes through the driver's atomic array transfer.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use riohal::devices::rio::RioDevice;
//! # use riohal::resource::ResourceQuery;
//! # use riohal::session::{OpenOptions, Session};
//! # use riohal::types::Type;
//! # use std::path::Path;
//! # use std::sync::Arc;
//! # fn example() -> Result<(), riohal::error::RioError> {
//! let device = Arc::new(RioDevice::new("RIO0"));
//! let session = Session::open(Path::new("/opt/app/counter.lvbitx"), device, &OpenOptions::default())?;
//! let count = session.find_resource("Count", &ResourceQuery::indicator(Type::U32))?;
//! let value: u32 = session.read(count)?;
//! session.close(false)?;
//! # Ok(())
//! # }
//! ```

use crate::bitfile::Bitfile;
use crate::devices::device::{Device, IrqWait, LockGuard, RegisterWindow, ViControl};
use crate::error::RioError;
use crate::fifo::{Fifo, FifoElements};
use crate::personality::build_blob;
use crate::resource::ResourceQuery;
use crate::status::{Status, codes};
use crate::timer::Timeout;
use crate::types::{Element, bytes_of, bytes_of_mut};
use log::{debug, error, info, warn};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// Set on register handles whose accesses may time out; such accesses are followed by a check of
/// the control register status.
pub const ACCESS_MAY_TIMEOUT_FLAG: u32 = 1 << 31;

/// How [`Session::open`] treats the personality.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Never start the personality on open.
    pub no_run: bool,
    /// Refuse bitfiles whose signature differs from this one (compared case-insensitively).
    pub expected_signature: Option<String>,
}

pub struct Session {
    bitfile: Bitfile,
    device: Arc<dyn Device>,
    window: RwLock<Option<Box<dyn RegisterWindow>>>,
    fifos: Vec<Fifo>,
    // must stay last: FIFO channels close before the device lock is released
    _lock: LockGuard,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device.name())
            .field("bitfile", &self.bitfile.path())
            .field("signature", &self.bitfile.signature())
            .field("fifos", &self.fifos.len())
            .finish()
    }
}

impl Session {
    /// Open a session on `device` for the bitfile at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.lvbitx` bitfile
    /// * `device` - The board to download to
    /// * `options` - Run and signature policy
    ///
    /// # Returns: `Result<Session, RioError>`
    /// * `Ok(Session)` - The personality is downloaded, and running unless told otherwise
    /// * `Err(RioError::SignatureMismatch)` - The bitfile is not the expected one
    /// * `Err(RioError::InvalidResourceName)` - The device is locked for an administrative action
    /// * `Err(RioError::DeviceTypeMismatch)` - The bitfile targets another model
    /// * `Err(RioError::CorruptBitfile)` and friends - The bitfile is unusable
    pub fn open(
        path: &Path,
        device: Arc<dyn Device>,
        options: &OpenOptions,
    ) -> Result<Session, RioError> {
        let bitfile = Bitfile::open(path)?;
        Session::with_bitfile(bitfile, device, options)
    }

    /// Open a session for an already parsed bitfile. See [`Session::open`].
    pub fn with_bitfile(
        bitfile: Bitfile,
        device: Arc<dyn Device>,
        options: &OpenOptions,
    ) -> Result<Session, RioError> {
        if let Some(expected) = &options.expected_signature {
            if !expected.eq_ignore_ascii_case(bitfile.signature()) {
                error!(
                    "Bitfile {:?} has signature {}, expected {expected}",
                    bitfile.path(),
                    bitfile.signature()
                );
                return Err(RioError::SignatureMismatch {
                    expected: expected.clone(),
                    found: bitfile.signature().to_owned(),
                });
            }
        }

        let lock = device.try_lock_shared()?.ok_or_else(|| {
            RioError::InvalidResourceName(format!(
                "{} is locked for exclusive use",
                device.name()
            ))
        })?;

        let model = device.model_name()?;
        if model != bitfile.target_class() {
            error!(
                "{} is a {model} but the bitfile targets {}",
                device.name(),
                bitfile.target_class()
            );
            return Err(RioError::DeviceTypeMismatch {
                expected: bitfile.target_class().to_owned(),
                found: model,
            });
        }

        let already_downloaded = download_personality(&bitfile, &*device, false)?;
        let window = map_window(&*device)?;
        let fifos = bitfile
            .fifos()
            .iter()
            .map(|info| Fifo::new(info.clone(), Arc::clone(&device)))
            .collect::<Result<Vec<_>, _>>()?;

        let session = Session {
            bitfile,
            device,
            window: RwLock::new(window),
            fifos,
            _lock: lock,
        };
        info!(
            "Opened session on {} for {:?}",
            session.device.name(),
            session.bitfile.path()
        );

        if !options.no_run && (already_downloaded || !session.bitfile.auto_run_when_downloaded()) {
            session.run()?;
        }
        Ok(session)
    }

    pub fn bitfile(&self) -> &Bitfile {
        &self.bitfile
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn fifos(&self) -> &[Fifo] {
        &self.fifos
    }

    /// The engine of `fifo`, or [`RioError::InvalidParameter`] if there is no such FIFO.
    pub fn fifo(&self, fifo: u32) -> Result<&Fifo, RioError> {
        usize::try_from(fifo)
            .ok()
            .and_then(|index| self.fifos.get(index))
            .ok_or_else(|| {
                RioError::InvalidParameter(format!(
                    "FIFO {fifo} does not exist, the bitfile has {}",
                    self.fifos.len()
                ))
            })
    }

    /// Look up a register or FIFO by name.
    ///
    /// Registers are searched before FIFOs. A register handle is its address on the device,
    /// tagged with [`ACCESS_MAY_TIMEOUT_FLAG`] when needed; a FIFO handle is its number.
    ///
    /// # Arguments
    ///
    /// * `name` - Resource name as written in the bitfile
    /// * `query` - Which kind of resource is wanted
    ///
    /// # Returns: `Result<u32, RioError>`
    /// * `Ok(u32)` - The resource handle
    /// * `Err(RioError::InvalidResourceName)` - More than one register matches
    /// * `Err(RioError::ResourceNotFound)` - Nothing matches
    pub fn find_resource(&self, name: &str, query: &ResourceQuery) -> Result<u32, RioError> {
        if query.searches_registers() {
            let mut matches = self
                .bitfile
                .registers()
                .iter()
                .filter(|r| r.matches(name, query));
            if let Some(register) = matches.next() {
                if matches.next().is_some() {
                    return Err(RioError::InvalidResourceName(format!(
                        "more than one register is named {name:?}"
                    )));
                }
                let mut handle = self
                    .bitfile
                    .base_address_on_device()
                    .checked_add(register.offset())
                    .ok_or_else(|| {
                        RioError::CorruptBitfile(format!("register {name:?} is out of range"))
                    })?;
                if register.access_may_timeout() {
                    handle |= ACCESS_MAY_TIMEOUT_FLAG;
                }
                return Ok(handle);
            }
        }
        if query.searches_fifos() {
            if let Some(fifo) = self.bitfile.fifos().iter().find(|f| f.matches(name, query)) {
                return Ok(fifo.number());
            }
        }
        Err(RioError::ResourceNotFound(format!(
            "no resource named {name:?} matches {query:?}"
        )))
    }

    /// Offset of a register handle in the FPGA address space, aligned down to its 32-bit slot.
    fn register_offset(&self, handle: u32) -> Result<u32, RioError> {
        let address = handle & !ACCESS_MAY_TIMEOUT_FLAG & !3;
        address
            .checked_sub(self.bitfile.base_address_on_device())
            .ok_or_else(|| {
                RioError::InvalidParameter(format!(
                    "register {handle:#x} is below the base address {:#x}",
                    self.bitfile.base_address_on_device()
                ))
            })
    }

    fn window(&self) -> RwLockReadGuard<'_, Option<Box<dyn RegisterWindow>>> {
        self.window.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_access(&self, handle: u32) -> Result<(), RioError> {
        if handle & ACCESS_MAY_TIMEOUT_FLAG != 0 {
            self.device.vi_started()?;
        }
        Ok(())
    }

    /// Read a scalar register.
    pub fn read<T: Element>(&self, handle: u32) -> Result<T, RioError> {
        let mut value = [T::default()];
        self.read_array(handle, &mut value)?;
        Ok(value[0])
    }

    /// Write a scalar register.
    pub fn write<T: Element>(&self, handle: u32, value: T) -> Result<(), RioError> {
        self.write_array(handle, &[value])
    }

    /// Read a whole array register; `values.len()` is its element count.
    pub fn read_array<T: Element>(&self, handle: u32, values: &mut [T]) -> Result<(), RioError> {
        let offset = self.register_offset(handle)?;
        let window = self.window();
        match window.as_deref() {
            Some(window) if values.len() == 1 && T::TYPE.element_bytes() <= 4 => {
                values[0] = T::from_slot(window.read32(offset)?);
            }
            _ => {
                self.device.read_array(
                    offset,
                    T::TYPE.logical_bits(),
                    values.len(),
                    bytes_of_mut(values),
                )?;
            }
        }
        self.check_access(handle)
    }

    /// Write a whole array register; `values.len()` is its element count.
    pub fn write_array<T: Element>(&self, handle: u32, values: &[T]) -> Result<(), RioError> {
        let offset = self.register_offset(handle)?;
        let window = self.window();
        match window.as_deref() {
            Some(window) if values.len() == 1 && T::TYPE.element_bytes() <= 4 => {
                window.write32(offset, values[0].to_slot())?;
            }
            _ => {
                self.device.write_array(
                    offset,
                    T::TYPE.logical_bits(),
                    values.len(),
                    bytes_of(values),
                )?;
            }
        }
        self.check_access(handle)
    }

    pub fn configure_fifo(&self, fifo: u32, requested_depth: usize) -> Result<usize, RioError> {
        self.fifo(fifo)?.configure(requested_depth)
    }

    pub fn start_fifo(&self, fifo: u32) -> Result<(), RioError> {
        self.fifo(fifo)?.start()
    }

    pub fn stop_fifo(&self, fifo: u32) -> Result<(), RioError> {
        self.fifo(fifo)?.stop()
    }

    pub fn acquire_fifo_read<T: Element>(
        &self,
        fifo: u32,
        elements: usize,
        timeout: Timeout,
    ) -> Result<FifoElements<T>, RioError> {
        self.fifo(fifo)?.acquire_read(elements, timeout)
    }

    pub fn acquire_fifo_write<T: Element>(
        &self,
        fifo: u32,
        elements: usize,
        timeout: Timeout,
    ) -> Result<FifoElements<T>, RioError> {
        self.fifo(fifo)?.acquire_write(elements, timeout)
    }

    pub fn release_fifo<T: Element>(
        &self,
        fifo: u32,
        window: &mut FifoElements<T>,
        elements: usize,
    ) -> Result<(), RioError> {
        self.fifo(fifo)?.release(window, elements)
    }

    pub fn read_fifo<T: Element>(
        &self,
        fifo: u32,
        data: &mut [T],
        elements: usize,
        timeout: Timeout,
    ) -> Result<usize, RioError> {
        self.fifo(fifo)?.read(data, elements, timeout)
    }

    pub fn write_fifo<T: Element>(
        &self,
        fifo: u32,
        data: &[T],
        elements: usize,
        timeout: Timeout,
    ) -> Result<usize, RioError> {
        self.fifo(fifo)?.write(data, elements, timeout)
    }

    /// Start the personality.
    ///
    /// # Returns: `Result<Status, RioError>`
    /// * `Ok(Status)` - Success, or the already-running warning
    /// * `Err(RioError)` - The run trigger failed
    pub fn run(&self) -> Result<Status, RioError> {
        let mut status = Status::default();
        match self.device.control(ViControl::Run) {
            Ok(()) => info!("Started personality on {}", self.device.name()),
            Err(RioError::FpgaAlreadyRunning) => {
                warn!("Personality on {} is already running", self.device.name());
                status.merge_code(codes::FPGA_ALREADY_RUNNING_WARNING);
            }
            Err(e) => {
                error!("Failed to run personality on {}: {e}", self.device.name());
                return Err(e);
            }
        }
        Ok(status)
    }

    /// Abort the personality. Every FIFO is stopped, whether or not the abort succeeded.
    pub fn abort(&self) -> Result<(), RioError> {
        self.control_and_stop_fifos(ViControl::Abort)
    }

    /// Reset the personality. Every FIFO is stopped, whether or not the reset succeeded.
    pub fn reset(&self) -> Result<(), RioError> {
        self.control_and_stop_fifos(ViControl::Reset)
    }

    fn control_and_stop_fifos(&self, action: ViControl) -> Result<(), RioError> {
        let mut status = Status::default();
        status.merge(self.device.control(action));
        self.stop_all_fifos();
        info!("{action:?} on {}: status {}", self.device.name(), status.code());
        status.into_result()
    }

    fn stop_all_fifos(&self) {
        for fifo in &self.fifos {
            fifo.set_stopped();
        }
    }

    /// Download the personality again.
    ///
    /// The register window is dropped and every FIFO stopped first; the window is mapped again
    /// afterwards even if the download failed.
    ///
    /// # Returns: `Result<bool, RioError>`
    /// * `Ok(true)` - The board already held the personality and `force` was not set
    /// * `Ok(false)` - The personality was written
    pub fn download(&self, force: bool) -> Result<bool, RioError> {
        let mut window = self.window.write().unwrap_or_else(PoisonError::into_inner);
        *window = None;
        self.stop_all_fifos();
        let result = download_personality(&self.bitfile, &*self.device, force);
        *window = map_window(&*self.device)?;
        result
    }

    pub fn is_started(&self) -> Result<bool, RioError> {
        self.device.vi_started()
    }

    pub fn is_finished(&self) -> Result<bool, RioError> {
        self.device.vi_finished()
    }

    /// Started and not yet finished.
    pub fn is_running(&self) -> Result<bool, RioError> {
        Ok(self.is_started()? && !self.is_finished()?)
    }

    pub fn acknowledge_irqs(&self, irqs: u32) -> Result<(), RioError> {
        self.device.acknowledge_irqs(irqs)
    }

    pub fn wait_on_irqs(&self, irqs: u32, timeout: Timeout) -> Result<IrqWait, RioError> {
        self.device.wait_on_irqs(irqs, timeout)
    }

    /// Close the session, optionally resetting the personality if no other session is open.
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - Closed; other open sessions suppress the reset silently
    /// * `Err(RioError)` - The reset request failed
    pub fn close(self, reset_if_last_session: bool) -> Result<(), RioError> {
        self.stop_all_fifos();
        if reset_if_last_session {
            match self.device.control(ViControl::ResetIfLastSession) {
                Ok(()) | Err(RioError::FpgaBusyFpgaInterfaceCApi) => {}
                Err(e) => {
                    error!("Failed to reset {} on close: {e}", self.device.name());
                    return Err(e);
                }
            }
        }
        debug!("Closed session on {}", self.device.name());
        Ok(())
    }
}

/// Build the blob for `bitfile` and write it to `device`. Returns whether it was already there.
fn download_personality(
    bitfile: &Bitfile,
    device: &dyn Device,
    force: bool,
) -> Result<bool, RioError> {
    let bitstream = bitfile.bitstream()?;
    let blob = build_blob(bitfile, &bitstream, force)?;
    let already = device.download(&blob)?;
    if already {
        debug!("{} already holds {}", device.name(), bitfile.signature());
    } else {
        info!(
            "Downloaded {} ({} bytes) to {}",
            bitfile.signature(),
            blob.len(),
            device.name()
        );
    }
    Ok(already)
}

fn map_window(device: &dyn Device) -> Result<Option<Box<dyn RegisterWindow>>, RioError> {
    if !device.registers_mappable()? {
        debug!("{} registers are accessed through the driver", device.name());
        return Ok(None);
    }
    let size = device.address_space_size()?;
    Ok(Some(device.map_registers(size)?))
}
