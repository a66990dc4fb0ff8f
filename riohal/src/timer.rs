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

//! Bounded waits.
//!
//! Every blocking call in the crate takes a [`Timeout`] and measures it with a [`Timer`] on the
//! monotonic clock. Wait loops read [`Timer::is_timed_out`] *before* probing the condition they
//! wait for and only give up after that probe fails, so a probe that runs just past the deadline
//! still counts.

use crate::config::INFINITE_TIMEOUT;
use std::time::{Duration, Instant};

/// How long a blocking call may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Millis(u32),
    Infinite,
}

impl Timeout {
    /// Interpret a raw millisecond count, treating `0xFFFF_FFFF` as [`Timeout::Infinite`].
    pub fn from_millis(ms: u32) -> Self {
        match ms {
            INFINITE_TIMEOUT => Timeout::Infinite,
            ms => Timeout::Millis(ms),
        }
    }

    /// The raw millisecond count handed to the kernel driver.
    pub fn as_millis(self) -> u32 {
        match self {
            Timeout::Millis(ms) => ms,
            Timeout::Infinite => INFINITE_TIMEOUT,
        }
    }

    pub fn is_zero(self) -> bool {
        self == Timeout::Millis(0)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::Millis(u32::try_from(d.as_millis()).unwrap_or(INFINITE_TIMEOUT - 1))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
    timeout: Timeout,
}

impl Timer {
    pub fn start(timeout: Timeout) -> Self {
        Timer {
            start: Instant::now(),
            timeout,
        }
    }

    /// Time left before the deadline, as a timeout that can be passed on to a nested wait.
    pub fn remaining(&self) -> Timeout {
        match self.timeout {
            Timeout::Infinite => Timeout::Infinite,
            Timeout::Millis(ms) => {
                let elapsed = self.start.elapsed().as_millis();
                Timeout::Millis(u32::try_from(u128::from(ms).saturating_sub(elapsed)).unwrap_or(0))
            }
        }
    }

    /// Remaining time in the form `poll(2)` expects: `-1` for infinite.
    pub fn remaining_poll_ms(&self) -> i32 {
        match self.remaining() {
            Timeout::Infinite => -1,
            Timeout::Millis(ms) => i32::try_from(ms).unwrap_or(i32::MAX),
        }
    }

    pub fn is_timed_out(&self) -> bool {
        self.remaining() == Timeout::Millis(0)
    }
}
