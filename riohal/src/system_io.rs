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

//! Error Wrapping File System I/O Helpers
//!
//! Wrappers around the file operations used to talk to the RIO driver's sysfs attributes and
//! character devices, with automatic conversion to `RioError`. All functions include trace
//! logging and keep the path of the file involved in the error.
//!
//! Includes: plain read/write, directory listing, typed sysfs attribute access and opening a
//! device node that udev may not have finished creating.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use riohal::system_io::{read_attribute_bool, write_attribute};
//! # use std::path::Path;
//!
//! # fn example() -> Result<(), riohal::error::RioError> {
//! let started = read_attribute_bool(Path::new("/sys/class/nirio/RIO0!personality/nirio_vi_started"))?;
//! if !started {
//!     write_attribute(Path::new("/sys/class/nirio/RIO0!personality/nirio_run_vi"), "1")?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::DEVICE_FILE_OPEN_TIMEOUT_MS;
use crate::error::{ErrnoMap, RioError};
use crate::timer::{Timeout, Timer};
use log::trace;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

/// Read the contents of a file to a String.
///
/// # Arguments
///
/// * `file_path` - Path to the file to read
///
/// # Returns: `Result<String, RioError>`
/// * `Ok(String)` - The complete contents of the file
/// * `Err(RioError::IORead)` - If the file cannot be read (doesn't exist, permissions, etc.)
pub fn fs_read(file_path: &Path) -> Result<String, RioError> {
    trace!("Attempting to read from {file_path:?}");
    let mut buf: String = String::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_string(&mut buf));

    match result {
        Ok(_) => {
            trace!("Reading done");
            Ok(buf)
        }
        Err(e) => Err(RioError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Write a string value to an existing file, such as a sysfs attribute.
///
/// Attributes are written with a single `write(2)` so the driver sees the whole value at once.
///
/// # Arguments
///
/// * `file_path` - Path to the file to write
/// * `value` - The string value to write (implements `AsRef<str>`)
///
/// # Returns: `Result<(), RioError>`
/// * `Ok(())` - Write succeeded
/// * `Err(RioError::IOWrite)` - If the write fails. The driver reports failed triggers (for
///   example a busy reset) through the errno of the write, which is kept in the error.
pub fn write_attribute(file_path: &Path, value: impl AsRef<str>) -> Result<(), RioError> {
    trace!(
        "Attempting to write {:?} to {:?}",
        value.as_ref(),
        file_path
    );
    let result = OpenOptions::new()
        .read(false)
        .write(true)
        .open(file_path)
        .and_then(|mut f| f.write_all(value.as_ref().as_bytes()));
    match result {
        Ok(_) => {
            trace!("Write done.");
            Ok(())
        }
        Err(e) => Err(RioError::IOWrite {
            data: value.as_ref().to_owned(),
            file: file_path.into(),
            e,
        }),
    }
}

/// Write binary data to an existing file, such as the board character device.
///
/// # Arguments
///
/// * `file_path` - Path to the file to write
/// * `data` - The binary data to write as a byte slice
///
/// # Returns: `Result<(), RioError>`
/// * `Ok(())` - Write succeeded
/// * `Err(RioError::IOWrite)` - If the write fails
pub fn fs_write_bytes(file_path: &Path, data: &[u8]) -> Result<(), RioError> {
    trace!("Attempting to write {} bytes to {file_path:?}", data.len());
    let result = open_device_file(file_path, OpenOptions::new().write(true))
        .map_err(|e| match e {
            RioError::IORead { file, e } => RioError::IOWrite {
                data: format!("<{} bytes>", data.len()),
                file,
                e,
            },
            other => other,
        })?
        .write_all(data);
    match result {
        Ok(_) => {
            trace!("Write done.");
            Ok(())
        }
        Err(e) => Err(RioError::IOWrite {
            data: format!("<{} bytes>", data.len()),
            file: file_path.into(),
            e,
        }),
    }
}

/// Read the contents of a directory and return entry names.
///
/// Entries that cannot be read are silently skipped.
///
/// # Arguments
///
/// * `dir` - The directory path to list
///
/// # Returns: `Result<Vec<String>, RioError>`
/// * `Ok(Vec<String>)` - List of entry names in the directory (files and subdirectories)
/// * `Err(RioError::IOReadDir)` - If the directory cannot be read (doesn't exist, permissions, etc.)
pub fn fs_read_dir(dir: &Path) -> Result<Vec<String>, RioError> {
    trace!("Attempting to read directory '{dir:?}'");
    std::fs::read_dir(dir).map_or_else(
        |e| {
            Err(RioError::IOReadDir {
                dir: dir.to_owned(),
                e,
            })
        },
        |iter| {
            let ret = iter
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            trace!("Dir reading done.");
            Ok(ret)
        },
    )
}

/// Read an unsigned attribute. Values with a `0x` prefix are hex, anything else decimal.
///
/// # Returns: `Result<u32, RioError>`
/// * `Ok(u32)` - The parsed value
/// * `Err(RioError::IORead)` - Failed to read the attribute
/// * `Err(RioError::SoftwareFault)` - The attribute did not hold a number
pub fn read_attribute_u32(file_path: &Path) -> Result<u32, RioError> {
    let contents = fs_read(file_path)?;
    let trimmed = contents.trim_end_matches('\0').trim();
    let parsed = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        parse_u32_hex(trimmed)
    } else {
        trimmed.parse::<u32>().ok()
    };
    parsed.ok_or_else(|| {
        RioError::SoftwareFault(format!("{file_path:?} holds {trimmed:?}, not a number"))
    })
}

/// Read a hexadecimal attribute, with or without a `0x` prefix.
pub fn read_attribute_u32_hex(file_path: &Path) -> Result<u32, RioError> {
    let contents = fs_read(file_path)?;
    parse_u32_hex(contents.trim_end_matches('\0').trim()).ok_or_else(|| {
        RioError::SoftwareFault(format!(
            "{file_path:?} holds {:?}, not a hex number",
            contents.trim()
        ))
    })
}

pub(crate) fn parse_u32_hex(s: &str) -> Option<u32> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).ok()
}

/// Read a boolean attribute. The driver writes `1` for true; anything else is false.
pub fn read_attribute_bool(file_path: &Path) -> Result<bool, RioError> {
    let contents = fs_read(file_path)?;
    Ok(contents.starts_with('1'))
}

/// Open a device node, retrying while it is missing or not yet accessible.
///
/// Device nodes and their permissions are created asynchronously by udev after the driver
/// registers them, so `ENOENT` and `EACCES` are retried for up to
/// [`DEVICE_FILE_OPEN_TIMEOUT_MS`] before giving up. `O_CLOEXEC` is always set by the
/// standard library.
///
/// # Arguments
///
/// * `file_path` - The device node to open
/// * `options` - Access mode to open with
///
/// # Returns: `Result<File, RioError>`
/// * `Ok(File)` - The opened node
/// * `Err(RioError::IORead)` - Opening failed with any other error, or the retry window expired
pub fn open_device_file(file_path: &Path, options: &OpenOptions) -> Result<File, RioError> {
    trace!("Opening device file {file_path:?}");
    let timer = Timer::start(Timeout::Millis(DEVICE_FILE_OPEN_TIMEOUT_MS));
    loop {
        let timed_out = timer.is_timed_out();
        match options.open(file_path) {
            Ok(f) => return Ok(f),
            Err(e)
                if !timed_out
                    && matches!(e.raw_os_error(), Some(libc::ENOENT) | Some(libc::EACCES)) =>
            {
                std::thread::yield_now();
            }
            Err(e) => {
                return Err(RioError::IORead {
                    file: file_path.into(),
                    e,
                });
            }
        }
    }
}

/// Translate an I/O error from a device attribute or node through an errno table.
///
/// Driver triggers report their outcome through errno values that mean different things per
/// surface, so callers choose the [`ErrnoMap`] that applies.
///
/// # Returns: `Result<(), RioError>`
/// * `Ok(())` - The errno is benign for this surface
/// * `Err(RioError)` - The translated error; errors that carry no OS error are returned as is
pub fn translate_io_error(err: RioError, map: ErrnoMap) -> Result<(), RioError> {
    let (e, file) = match &err {
        RioError::IORead { e, file } => (e, file),
        RioError::IOWrite { e, file, .. } => (e, file),
        RioError::IOReadDir { e, dir } => (e, dir),
        _ => return Err(err),
    };
    match e.raw_os_error() {
        Some(errno) => map.translate(errno, &file.display().to_string()),
        None => Err(err),
    }
}
