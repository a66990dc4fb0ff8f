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

//! Advisory reader/writer locks on a device file, using `flock(2)`.
//!
//! The lock belongs to the open file description, so it is released when the [`FileLock`] is
//! dropped and its file closed.

use crate::error::{ErrnoMap, RioError};
use crate::system_io::open_device_file;
use log::trace;
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct FileLock {
    _file: File,
    kind: LockKind,
}

impl FileLock {
    /// Try to lock `path` without blocking.
    ///
    /// # Arguments
    ///
    /// * `path` - The file to lock, opened read-only
    /// * `kind` - Shared (reader) or exclusive (writer)
    ///
    /// # Returns: `Result<Option<FileLock>, RioError>`
    /// * `Ok(Some(FileLock))` - The lock is held
    /// * `Ok(None)` - A conflicting lock is held elsewhere
    /// * `Err(RioError)` - The file could not be opened or locked
    pub fn try_lock(path: &Path, kind: LockKind) -> Result<Option<FileLock>, RioError> {
        let file = open_device_file(path, OpenOptions::new().read(true))?;
        let operation = match kind {
            LockKind::Shared => libc::LOCK_SH,
            LockKind::Exclusive => libc::LOCK_EX,
        } | libc::LOCK_NB;
        // SAFETY: the descriptor is owned by `file`, which is alive for the call.
        if unsafe { libc::flock(file.as_raw_fd(), operation) } == 0 {
            trace!("Locked {path:?} {kind:?}");
            return Ok(Some(FileLock { _file: file, kind }));
        }
        let e = std::io::Error::last_os_error();
        match e.raw_os_error() {
            Some(libc::EWOULDBLOCK) => {
                trace!("{path:?} is already locked, {kind:?} lock refused");
                Ok(None)
            }
            _ => {
                ErrnoMap::General.translate_io(&e, &format!("flock {path:?}"))?;
                Ok(None)
            }
        }
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn shared_excludes_exclusive() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        let reader = FileLock::try_lock(file.path(), LockKind::Shared)?;
        expect_that!(reader.as_ref().map(FileLock::kind), some(eq(LockKind::Shared)));
        let second_reader = FileLock::try_lock(file.path(), LockKind::Shared)?;
        expect_that!(second_reader.is_some(), eq(true));
        expect_that!(
            FileLock::try_lock(file.path(), LockKind::Exclusive)?.is_none(),
            eq(true)
        );
        drop(reader);
        drop(second_reader);
        expect_that!(
            FileLock::try_lock(file.path(), LockKind::Exclusive)?.is_some(),
            eq(true)
        );
        Ok(())
    }
}
