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

use crate::status::codes;
use log::trace;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RioError {
    #[error("RioError::FifoTimeout: Timed out waiting for FIFO elements")]
    FifoTimeout,
    #[error("RioError::TransferAborted: The DMA transfer was aborted by a device reset")]
    TransferAborted,
    #[error("RioError::MemoryFull: Not enough memory")]
    MemoryFull,
    #[error("RioError::SoftwareFault: An unexpected software error occurred: {0}")]
    SoftwareFault(String),
    #[error("RioError::InvalidParameter: {0}")]
    InvalidParameter(String),
    #[error("RioError::ResourceNotFound: {0}")]
    ResourceNotFound(String),
    #[error("RioError::HardwareFault: The device reported a hardware fault")]
    HardwareFault,
    #[error("RioError::FpgaAlreadyRunning: The FPGA is already running")]
    FpgaAlreadyRunning,
    #[error(
        "RioError::DeviceTypeMismatch: Bitfile targets {expected:?} but the device is {found:?}"
    )]
    DeviceTypeMismatch { expected: String, found: String },
    #[error("RioError::CommunicationTimeout: Register access timed out")]
    CommunicationTimeout,
    #[error("RioError::IrqTimeout: Timed out waiting for interrupts")]
    IrqTimeout,
    #[error("RioError::CorruptBitfile: {0}")]
    CorruptBitfile(String),
    #[error("RioError::BadDepth: The requested FIFO depth is not supported")]
    BadDepth,
    #[error("RioError::BadReadWriteCount: Requested {requested} elements but only {limit} allowed")]
    BadReadWriteCount { requested: usize, limit: usize },
    #[error("RioError::ClockLostLock: A clock lost its lock")]
    ClockLostLock,
    #[error("RioError::FpgaBusy: The FPGA is in use by another session")]
    FpgaBusy,
    #[error("RioError::FpgaBusyFpgaInterfaceCApi: The FPGA is busy")]
    FpgaBusyFpgaInterfaceCApi,
    #[error(
        "RioError::ElementsNotPermissibleToBeAcquired: Cannot acquire {requested} elements with {acquired} of {depth} still acquired"
    )]
    ElementsNotPermissibleToBeAcquired {
        requested: usize,
        acquired: usize,
        depth: usize,
    },
    #[error("RioError::AccessDenied: Access denied")]
    AccessDenied,
    #[error("RioError::BufferInvalidSize: Buffer holds {actual} elements, needs {expected}")]
    BufferInvalidSize { expected: usize, actual: usize },
    #[error("RioError::FifoReserved: The FIFO is reserved by another session")]
    FifoReserved,
    #[error("RioError::FifoElementsCurrentlyAcquired: {0} elements are still acquired")]
    FifoElementsCurrentlyAcquired(usize),
    #[error("RioError::BitfileReadError: Failed to read bitfile {file:?}: {reason}")]
    BitfileReadError { file: PathBuf, reason: String },
    #[error("RioError::SignatureMismatch: Expected signature {expected} but bitfile has {found}")]
    SignatureMismatch { expected: String, found: String },
    #[error("RioError::IncompatibleBitfile: {0}")]
    IncompatibleBitfile(String),
    #[error("RioError::InvalidResourceName: {0}")]
    InvalidResourceName(String),
    #[error("RioError::FeatureNotSupported: {0}")]
    FeatureNotSupported(String),
    #[error("RioError::VersionMismatch: Driver and library versions do not match")]
    VersionMismatch,
    #[error("RioError::InvalidSession: The session handle is not valid")]
    InvalidSession,
    #[error("RioError::OutOfHandles: No more session handles are available")]
    OutOfHandles,
    #[error("RioError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("RioError::IOWrite: An IO error occurred when writing {data:?} to {file:?}: {e}")]
    IOWrite {
        data: String,
        file: PathBuf,
        e: std::io::Error,
    },
    #[error("RioError::IOReadDir: An IO error occurred when reading directory {dir:?}: {e}")]
    IOReadDir { dir: PathBuf, e: std::io::Error },
}

impl RioError {
    /// The value of this error in the integer status domain.
    ///
    /// I/O errors are classified by their OS error number through [`ErrnoMap::General`].
    pub fn code(&self) -> i32 {
        match self {
            RioError::FifoTimeout => codes::FIFO_TIMEOUT,
            RioError::TransferAborted => codes::TRANSFER_ABORTED,
            RioError::MemoryFull => codes::MEMORY_FULL,
            RioError::SoftwareFault(..) => codes::SOFTWARE_FAULT,
            RioError::InvalidParameter(..) => codes::INVALID_PARAMETER,
            RioError::ResourceNotFound(..) => codes::RESOURCE_NOT_FOUND,
            RioError::HardwareFault => codes::HARDWARE_FAULT,
            RioError::FpgaAlreadyRunning => codes::FPGA_ALREADY_RUNNING,
            RioError::DeviceTypeMismatch { .. } => codes::DEVICE_TYPE_MISMATCH,
            RioError::CommunicationTimeout => codes::COMMUNICATION_TIMEOUT,
            RioError::IrqTimeout => codes::IRQ_TIMEOUT,
            RioError::CorruptBitfile(..) => codes::CORRUPT_BITFILE,
            RioError::BadDepth => codes::BAD_DEPTH,
            RioError::BadReadWriteCount { .. } => codes::BAD_READ_WRITE_COUNT,
            RioError::ClockLostLock => codes::CLOCK_LOST_LOCK,
            RioError::FpgaBusy => codes::FPGA_BUSY,
            RioError::FpgaBusyFpgaInterfaceCApi => codes::FPGA_BUSY_FPGA_INTERFACE_C_API,
            RioError::ElementsNotPermissibleToBeAcquired { .. } => {
                codes::ELEMENTS_NOT_PERMISSIBLE_TO_BE_ACQUIRED
            }
            RioError::AccessDenied => codes::ACCESS_DENIED,
            RioError::BufferInvalidSize { .. } => codes::BUFFER_INVALID_SIZE,
            RioError::FifoReserved => codes::FIFO_RESERVED,
            RioError::FifoElementsCurrentlyAcquired(..) => codes::FIFO_ELEMENTS_CURRENTLY_ACQUIRED,
            RioError::BitfileReadError { .. } => codes::BITFILE_READ_ERROR,
            RioError::SignatureMismatch { .. } => codes::SIGNATURE_MISMATCH,
            RioError::IncompatibleBitfile(..) => codes::INCOMPATIBLE_BITFILE,
            RioError::InvalidResourceName(..) => codes::INVALID_RESOURCE_NAME,
            RioError::FeatureNotSupported(..) => codes::FEATURE_NOT_SUPPORTED,
            RioError::VersionMismatch => codes::VERSION_MISMATCH,
            RioError::InvalidSession => codes::INVALID_SESSION,
            RioError::OutOfHandles => codes::OUT_OF_HANDLES,
            RioError::IORead { e, .. }
            | RioError::IOWrite { e, .. }
            | RioError::IOReadDir { e, .. } => io_code(e),
        }
    }

    /// Rebuild a typed error from a bare status code, for codes produced outside this crate.
    ///
    /// # Returns: `Option<RioError>`
    /// * `Some(RioError)` - `code` is a known error code
    /// * `None` - `code` is success, a warning, or unknown
    pub fn from_code(code: i32) -> Option<RioError> {
        let err = match code {
            codes::FIFO_TIMEOUT => RioError::FifoTimeout,
            codes::TRANSFER_ABORTED => RioError::TransferAborted,
            codes::MEMORY_FULL => RioError::MemoryFull,
            codes::SOFTWARE_FAULT => RioError::SoftwareFault(String::from("reported by status")),
            codes::INVALID_PARAMETER => {
                RioError::InvalidParameter(String::from("reported by status"))
            }
            codes::RESOURCE_NOT_FOUND => {
                RioError::ResourceNotFound(String::from("reported by status"))
            }
            codes::HARDWARE_FAULT => RioError::HardwareFault,
            codes::FPGA_ALREADY_RUNNING => RioError::FpgaAlreadyRunning,
            codes::DEVICE_TYPE_MISMATCH => RioError::DeviceTypeMismatch {
                expected: String::new(),
                found: String::new(),
            },
            codes::COMMUNICATION_TIMEOUT => RioError::CommunicationTimeout,
            codes::IRQ_TIMEOUT => RioError::IrqTimeout,
            codes::CORRUPT_BITFILE => RioError::CorruptBitfile(String::from("reported by status")),
            codes::BAD_DEPTH => RioError::BadDepth,
            codes::BAD_READ_WRITE_COUNT => RioError::BadReadWriteCount {
                requested: 0,
                limit: 0,
            },
            codes::CLOCK_LOST_LOCK => RioError::ClockLostLock,
            codes::FPGA_BUSY => RioError::FpgaBusy,
            codes::FPGA_BUSY_FPGA_INTERFACE_C_API => RioError::FpgaBusyFpgaInterfaceCApi,
            codes::ELEMENTS_NOT_PERMISSIBLE_TO_BE_ACQUIRED => {
                RioError::ElementsNotPermissibleToBeAcquired {
                    requested: 0,
                    acquired: 0,
                    depth: 0,
                }
            }
            codes::ACCESS_DENIED => RioError::AccessDenied,
            codes::BUFFER_INVALID_SIZE => RioError::BufferInvalidSize {
                expected: 0,
                actual: 0,
            },
            codes::FIFO_RESERVED => RioError::FifoReserved,
            codes::FIFO_ELEMENTS_CURRENTLY_ACQUIRED => RioError::FifoElementsCurrentlyAcquired(0),
            codes::BITFILE_READ_ERROR => RioError::BitfileReadError {
                file: PathBuf::new(),
                reason: String::from("reported by status"),
            },
            codes::SIGNATURE_MISMATCH => RioError::SignatureMismatch {
                expected: String::new(),
                found: String::new(),
            },
            codes::INCOMPATIBLE_BITFILE => {
                RioError::IncompatibleBitfile(String::from("reported by status"))
            }
            codes::INVALID_RESOURCE_NAME => {
                RioError::InvalidResourceName(String::from("reported by status"))
            }
            codes::FEATURE_NOT_SUPPORTED => {
                RioError::FeatureNotSupported(String::from("reported by status"))
            }
            codes::VERSION_MISMATCH => RioError::VersionMismatch,
            codes::INVALID_SESSION => RioError::InvalidSession,
            codes::OUT_OF_HANDLES => RioError::OutOfHandles,
            _ => return None,
        };
        Some(err)
    }

    /// True for the recoverable "device was reset under us" condition that blocking FIFO
    /// operations retry once.
    pub fn is_transfer_aborted(&self) -> bool {
        matches!(self, RioError::TransferAborted)
    }
}

fn io_code(e: &std::io::Error) -> i32 {
    match e.raw_os_error() {
        Some(errno) => match ErrnoMap::General.translate(errno, "") {
            Ok(()) => codes::SUCCESS,
            Err(err) => err.code(),
        },
        None => codes::SOFTWARE_FAULT,
    }
}

/// Translation tables from OS error numbers reported by the kernel driver to [`RioError`].
///
/// The driver overloads a few errno values per surface, so FIFO channels and the run/download
/// triggers each refine the general table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrnoMap {
    General,
    Fifo,
    Run,
}

impl ErrnoMap {
    /// Translate one OS error number.
    ///
    /// # Arguments
    ///
    /// * `errno` - The raw OS error number
    /// * `context` - What was being done, carried into errors that hold a message
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - The errno means "nothing to do" for this surface (`EALREADY` on a FIFO)
    /// * `Err(RioError)` - The translated error
    pub fn translate(self, errno: i32, context: &str) -> Result<(), RioError> {
        trace!("translating errno {errno} with {self:?} map ({context})");
        match (self, errno) {
            (ErrnoMap::Fifo, libc::EALREADY) => return Ok(()),
            (ErrnoMap::Fifo, libc::EBUSY) => return Err(RioError::FifoReserved),
            (ErrnoMap::Fifo, libc::EPERM) => return Err(RioError::TransferAborted),
            (ErrnoMap::Fifo, libc::ENODATA) => {
                return Err(RioError::ElementsNotPermissibleToBeAcquired {
                    requested: 0,
                    acquired: 0,
                    depth: 0,
                });
            }
            (ErrnoMap::Fifo, libc::ENOTCONN) => {
                return Err(RioError::ResourceNotFound(format!(
                    "FIFO channel is not connected: {context}"
                )));
            }
            (ErrnoMap::Run, libc::EALREADY) => return Err(RioError::FpgaAlreadyRunning),
            _ => {}
        }
        Err(match errno {
            libc::EIO => RioError::HardwareFault,
            libc::ENOMEM => RioError::MemoryFull,
            libc::EBUSY => RioError::FpgaBusyFpgaInterfaceCApi,
            libc::E2BIG => RioError::BadDepth,
            libc::EINVAL => RioError::InvalidParameter(format!("rejected by the driver: {context}")),
            libc::EOPNOTSUPP => {
                RioError::FeatureNotSupported(format!("not supported by the driver: {context}"))
            }
            libc::EMFILE => RioError::OutOfHandles,
            libc::ENOENT | libc::EACCES => {
                RioError::InvalidResourceName(format!("cannot access {context}"))
            }
            libc::ETIMEDOUT => RioError::CommunicationTimeout,
            libc::ENOLCK => RioError::ClockLostLock,
            _ => RioError::SoftwareFault(format!(
                "unexpected errno {errno} ({}): {context}",
                std::io::Error::from_raw_os_error(errno)
            )),
        })
    }

    /// Translate an `std::io::Error`. Errors without an OS error number are a software fault.
    pub fn translate_io(self, e: &std::io::Error, context: &str) -> Result<(), RioError> {
        match e.raw_os_error() {
            Some(errno) => self.translate(errno, context),
            None => Err(RioError::SoftwareFault(format!("{context}: {e}"))),
        }
    }

    /// Like [`ErrnoMap::translate_io`] but for results that must carry a value: an ignored errno
    /// still leaves no value to return, so it becomes a software fault.
    pub fn check_io<T>(self, result: std::io::Result<T>, context: &str) -> Result<T, RioError> {
        match result {
            Ok(v) => Ok(v),
            Err(e) => match self.translate_io(&e, context) {
                Ok(()) => Err(RioError::SoftwareFault(format!(
                    "{context}: ignored error {e} left no result"
                ))),
                Err(err) => Err(err),
            },
        }
    }
}
