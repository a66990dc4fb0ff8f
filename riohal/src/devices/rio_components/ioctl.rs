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

//! ioctl requests understood by the RIO kernel driver.
//!
//! Request numbers follow the generic Linux `_IOC` encoding: direction in bits 30-31, argument
//! size in bits 16-29, type (the driver's magic number) in bits 8-15 and the command number in
//! bits 0-7.

use crate::config::IOC_MAGIC;
use libc::{c_ulong, c_void};
use std::os::fd::AsRawFd;

const IOC_NONE: c_ulong = 0;
const IOC_WRITE: c_ulong = 1;
const IOC_READ: c_ulong = 2;

const fn ioc(dir: c_ulong, nr: c_ulong, size: usize) -> c_ulong {
    (dir << 30) | ((size as c_ulong) << 16) | ((IOC_MAGIC as c_ulong) << 8) | nr
}

/// Header of an array transfer. The payload follows it directly.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NirioArray {
    pub offset: u32,
    pub bits_per_elem: u32,
    pub num_elem: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoSetBuffer {
    pub bytes: u64,
    pub buff_ptr: u64,
    pub memory_type: u32,
}

/// `memory_type` of an ordinary user-space buffer.
pub const MEMORY_TYPE_USER: u32 = 0;

#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoWait {
    pub wait_num_elem: u64,
    pub num_elem_avail: u64,
    pub timeout_ms: u32,
    pub timed_out: u32,
}

pub const ARRAY_READ: c_ulong = ioc(
    IOC_READ | IOC_WRITE,
    0,
    std::mem::size_of::<NirioArray>(),
);
pub const ARRAY_WRITE: c_ulong = ioc(IOC_WRITE, 1, std::mem::size_of::<NirioArray>());
pub const FIFO_SET_BUFFER: c_ulong = ioc(IOC_WRITE, 2, std::mem::size_of::<FifoSetBuffer>());
pub const FIFO_ACQUIRE_WAIT: c_ulong =
    ioc(IOC_READ | IOC_WRITE, 3, std::mem::size_of::<FifoWait>());
pub const FIFO_START: c_ulong = ioc(IOC_NONE, 4, 0);
pub const FIFO_GET_AVAIL: c_ulong = ioc(IOC_READ, 5, std::mem::size_of::<u64>());
pub const FIFO_RELEASE: c_ulong = ioc(IOC_WRITE, 6, std::mem::size_of::<u64>());

/// Issue an ioctl with a raw argument pointer.
///
/// # Safety
///
/// `arg` must be valid for whatever the driver reads or writes for `request`.
unsafe fn ioctl_ptr(fd: &impl AsRawFd, request: c_ulong, arg: *mut c_void) -> std::io::Result<()> {
    // SAFETY: forwarded to the caller.
    let ret = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, arg) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Issue an ioctl whose argument is a single plain struct or integer.
pub fn ioctl_with<A>(fd: &impl AsRawFd, request: c_ulong, arg: &mut A) -> std::io::Result<()> {
    // SAFETY: `arg` is a live, exclusively borrowed value of exactly the size encoded in
    // `request` for every request this module defines.
    unsafe { ioctl_ptr(fd, request, (arg as *mut A).cast()) }
}

/// Issue an ioctl without an argument.
pub fn ioctl_none(fd: &impl AsRawFd, request: c_ulong) -> std::io::Result<()> {
    // SAFETY: the driver reads no argument for requests without one.
    unsafe { ioctl_ptr(fd, request, std::ptr::null_mut()) }
}

/// Issue an array transfer. `buffer` starts with a [`NirioArray`] header followed by room for the
/// payload.
pub fn ioctl_array(fd: &impl AsRawFd, request: c_ulong, buffer: &mut [u8]) -> std::io::Result<()> {
    if buffer.len() < std::mem::size_of::<NirioArray>() {
        return Err(std::io::Error::from_raw_os_error(libc::EINVAL));
    }
    // SAFETY: the buffer holds the header plus the payload length the header announces.
    unsafe { ioctl_ptr(fd, request, buffer.as_mut_ptr().cast()) }
}

/// Build the buffer of an array transfer: header followed by `payload`.
pub fn array_buffer(offset: u32, bits_per_elem: u32, num_elem: u32, payload: &[u8]) -> Vec<u8> {
    let header_len = std::mem::size_of::<NirioArray>();
    let mut buffer = Vec::with_capacity(header_len + payload.len());
    buffer.extend_from_slice(&offset.to_ne_bytes());
    buffer.extend_from_slice(&bits_per_elem.to_ne_bytes());
    buffer.extend_from_slice(&num_elem.to_ne_bytes());
    buffer.extend_from_slice(payload);
    buffer
}
