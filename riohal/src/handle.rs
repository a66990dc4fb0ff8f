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

//! Opaque session handles for callers that cannot hold a [`Session`] themselves.
//!
//! A [`SessionHandle`] packs a slot index with the generation of the slot when the session was
//! inserted. Removing a session bumps the generation, so a handle that outlived its session is
//! refused with [`RioError::InvalidSession`] instead of reaching whatever session reused the slot.
//!
//! The table lock is only held to look a session up; the call itself runs on a cloned
//! `Arc<Session>`, so a FIFO read blocking on one session does not stall the others.

use crate::error::RioError;
use crate::session::Session;
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};

const INDEX_BITS: u32 = 16;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Slot count of [`SessionTable::default`].
pub const DEFAULT_CAPACITY: usize = 1 << INDEX_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u32);

impl SessionHandle {
    fn new(index: usize, generation: u16) -> SessionHandle {
        SessionHandle((u32::from(generation) << INDEX_BITS) | (index as u32 & INDEX_MASK))
    }

    fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    fn generation(self) -> u16 {
        (self.0 >> INDEX_BITS) as u16
    }

    /// The handle as a plain integer. Never zero.
    pub fn into_raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> SessionHandle {
        SessionHandle(raw)
    }
}

#[derive(Debug)]
struct Slot {
    // starts at 1 so that no handle is 0
    generation: u16,
    session: Option<Arc<Session>>,
}

#[derive(Debug)]
pub struct SessionTable {
    capacity: usize,
    slots: Mutex<Vec<Slot>>,
}

impl Default for SessionTable {
    fn default() -> Self {
        SessionTable::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SessionTable {
    /// A table holding at most `capacity` sessions at once, capped at [`DEFAULT_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> SessionTable {
        SessionTable {
            capacity: capacity.min(DEFAULT_CAPACITY),
            slots: Mutex::new(Vec::new()),
        }
    }

    fn slots(&self) -> Result<MutexGuard<'_, Vec<Slot>>, RioError> {
        self.slots.lock().map_err(|e| {
            RioError::SoftwareFault(format!("session table lock is poisoned: {e}"))
        })
    }

    /// Number of sessions in the table.
    pub fn len(&self) -> usize {
        self.slots()
            .map(|slots| slots.iter().filter(|s| s.session.is_some()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take ownership of `session` and hand out its handle.
    ///
    /// # Returns: `Result<SessionHandle, RioError>`
    /// * `Ok(SessionHandle)` - The handle of the new entry
    /// * `Err(RioError::OutOfHandles)` - Every slot is in use
    pub fn insert(&self, session: Session) -> Result<SessionHandle, RioError> {
        let mut slots = self.slots()?;
        let index = match slots.iter().position(|s| s.session.is_none()) {
            Some(index) => index,
            None if slots.len() < self.capacity => {
                slots.push(Slot {
                    generation: 1,
                    session: None,
                });
                slots.len() - 1
            }
            None => {
                warn!("Session table is full at {} sessions", self.capacity);
                return Err(RioError::OutOfHandles);
            }
        };
        let slot = &mut slots[index];
        slot.session = Some(Arc::new(session));
        let handle = SessionHandle::new(index, slot.generation);
        debug!("Session stored as handle {:#x}", handle.into_raw());
        Ok(handle)
    }

    /// The session behind `handle`.
    ///
    /// # Returns: `Result<Arc<Session>, RioError>`
    /// * `Ok(Arc<Session>)` - The session
    /// * `Err(RioError::InvalidSession)` - The handle is unknown or its session was removed
    pub fn get(&self, handle: SessionHandle) -> Result<Arc<Session>, RioError> {
        let slots = self.slots()?;
        slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.session.clone())
            .ok_or(RioError::InvalidSession)
    }

    /// Run `f` on the session behind `handle` without holding the table lock.
    pub fn with<R>(
        &self,
        handle: SessionHandle,
        f: impl FnOnce(&Session) -> Result<R, RioError>,
    ) -> Result<R, RioError> {
        let session = self.get(handle)?;
        f(&session)
    }

    fn take(slots: &mut [Slot], handle: SessionHandle) -> Result<Arc<Session>, RioError> {
        let slot = slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .ok_or(RioError::InvalidSession)?;
        let session = slot.session.take().ok_or(RioError::InvalidSession)?;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        Ok(session)
    }

    /// Take the session behind `handle` out of the table. The handle is dead afterwards.
    pub fn remove(&self, handle: SessionHandle) -> Result<Arc<Session>, RioError> {
        Self::take(&mut self.slots()?, handle)
    }

    /// Remove the session behind `handle` and close it.
    ///
    /// # Returns: `Result<(), RioError>`
    /// * `Ok(())` - The session is closed and the handle is dead
    /// * `Err(RioError::FpgaBusy)` - Another thread still uses the session; it stays in the
    ///   table and the handle stays valid
    /// * `Err(RioError::InvalidSession)` - The handle is unknown or its session was removed
    pub fn close(&self, handle: SessionHandle, reset_if_last_session: bool) -> Result<(), RioError> {
        let session = {
            let mut slots = self.slots()?;
            // clones are only made under this lock, so the count cannot grow meanwhile
            let in_use = slots
                .get(handle.index())
                .filter(|slot| slot.generation == handle.generation())
                .and_then(|slot| slot.session.as_ref())
                .is_some_and(|session| Arc::strong_count(session) > 1);
            if in_use {
                warn!(
                    "Session {:#x} is still in use and cannot be closed",
                    handle.into_raw()
                );
                return Err(RioError::FpgaBusy);
            }
            Self::take(&mut slots, handle)?
        };
        match Arc::try_unwrap(session) {
            Ok(session) => session.close(reset_if_last_session),
            Err(_) => Err(RioError::SoftwareFault(format!(
                "session {:#x} was shared while closing",
                handle.into_raw()
            ))),
        }
    }
}
