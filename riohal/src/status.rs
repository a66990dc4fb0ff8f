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

//! Integer Status Domain
//!
//! Every [`RioError`] has a fixed integer code. Zero is success, negative codes are errors and
//! positive codes are warnings. Callers that need to report one status for a sequence of
//! operations (for example tearing down every FIFO after an abort) fold each outcome into a
//! [`Status`] with [`Status::merge`], which keeps the most severe outcome and never lets a later
//! error replace the first one.
//!
//! # Examples
//!
//! ```rust
//! # use riohal::error::RioError;
//! # use riohal::status::{codes, Status};
//! let mut status = Status::default();
//! status.merge_code(codes::FPGA_ALREADY_RUNNING_WARNING);
//! status.merge(Err(RioError::FifoTimeout));
//! status.merge(Err(RioError::HardwareFault));
//! assert_eq!(status.code(), codes::FIFO_TIMEOUT);
//! ```

use crate::error::RioError;

/// Fixed status values shared with every other consumer of the RIO status domain.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const FIFO_TIMEOUT: i32 = -50400;
    pub const TRANSFER_ABORTED: i32 = -50405;
    pub const MEMORY_FULL: i32 = -52000;
    pub const SOFTWARE_FAULT: i32 = -52003;
    pub const INVALID_PARAMETER: i32 = -52005;
    pub const RESOURCE_NOT_FOUND: i32 = -52006;
    pub const HARDWARE_FAULT: i32 = -52018;
    pub const FPGA_ALREADY_RUNNING: i32 = -61003;
    pub const FPGA_ALREADY_RUNNING_WARNING: i32 = 61003;
    pub const DEVICE_TYPE_MISMATCH: i32 = -61024;
    pub const COMMUNICATION_TIMEOUT: i32 = -61046;
    pub const IRQ_TIMEOUT: i32 = -61060;
    pub const CORRUPT_BITFILE: i32 = -61070;
    pub const BAD_DEPTH: i32 = -61072;
    pub const BAD_READ_WRITE_COUNT: i32 = -61073;
    pub const CLOCK_LOST_LOCK: i32 = -61083;
    pub const FPGA_BUSY: i32 = -61141;
    pub const FPGA_BUSY_FPGA_INTERFACE_C_API: i32 = -61200;
    pub const ELEMENTS_NOT_PERMISSIBLE_TO_BE_ACQUIRED: i32 = -61219;
    pub const ACCESS_DENIED: i32 = -63033;
    pub const BUFFER_INVALID_SIZE: i32 = -63080;
    pub const FIFO_RESERVED: i32 = -63082;
    pub const FIFO_ELEMENTS_CURRENTLY_ACQUIRED: i32 = -63083;
    pub const BITFILE_READ_ERROR: i32 = -63101;
    pub const SIGNATURE_MISMATCH: i32 = -63106;
    pub const INCOMPATIBLE_BITFILE: i32 = -63107;
    pub const INVALID_RESOURCE_NAME: i32 = -63192;
    pub const FEATURE_NOT_SUPPORTED: i32 = -63193;
    pub const VERSION_MISMATCH: i32 = -63194;
    pub const INVALID_SESSION: i32 = -63195;
    pub const OUT_OF_HANDLES: i32 = -63198;
}

/// An accumulated outcome: the integer code plus the typed error that produced it, if any.
#[derive(Debug, Default)]
pub struct Status {
    code: i32,
    error: Option<RioError>,
}

impl Status {
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn is_success(&self) -> bool {
        self.code == codes::SUCCESS
    }

    pub fn is_error(&self) -> bool {
        self.code < 0
    }

    pub fn is_warning(&self) -> bool {
        self.code > 0
    }

    pub fn is_not_error(&self) -> bool {
        !self.is_error()
    }

    fn overwrites(&self, new_code: i32) -> bool {
        self.is_not_error() && (self.is_success() || new_code < 0)
    }

    /// Fold a raw status code into this one.
    ///
    /// A warning replaces success, an error replaces a warning or success, and once an error is
    /// held nothing replaces it.
    ///
    /// # Arguments
    ///
    /// * `code` - The new status code
    ///
    /// # Returns: `&mut Status`
    /// * `self`, for chaining
    pub fn merge_code(&mut self, code: i32) -> &mut Self {
        if self.overwrites(code) {
            self.code = code;
            self.error = RioError::from_code(code);
        }
        self
    }

    /// Fold the outcome of one operation into this status, keeping its typed error when it wins.
    pub fn merge(&mut self, result: Result<(), RioError>) -> &mut Self {
        if let Err(e) = result {
            let code = e.code();
            if self.overwrites(code) {
                self.code = code;
                self.error = Some(e);
            }
        }
        self
    }

    /// Convert back to a `Result`, returning the held error when the status is an error.
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - Success or a warning
    /// * `Err(RioError)` - The first error that was merged
    pub fn into_result(self) -> Result<(), RioError> {
        match (self.is_error(), self.error) {
            (false, _) => Ok(()),
            (true, Some(e)) => Err(e),
            (true, None) => Err(RioError::SoftwareFault(format!(
                "unrecognised status code {}",
                self.code
            ))),
        }
    }
}
