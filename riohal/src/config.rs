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

use std::path::{Path, PathBuf};

/// The driver-decided location of RIO device attributes. Typically `/sys/class/nirio/`.
pub static NIRIO_CLASS_DIR: &str = "/sys/class/nirio/";

/// The location of the RIO character devices created by udev. Typically `/dev/`.
pub static DEVICE_DIR: &str = "/dev/";

/// The device used by the command line tool when `--device` is not given.
pub static DEFAULT_DEVICE: &str = "RIO0";

/// Smallest ring a FIFO gets before the caller configures one, in elements.
pub const MINIMUM_FIFO_DEPTH: usize = 1 << 14;

/// Highest `BitfileVersion` major number the parser understands.
pub const MAX_BITFILE_VERSION_MAJOR: u32 = 4;

/// How long to keep retrying to open a device file that udev may still be creating.
pub const DEVICE_FILE_OPEN_TIMEOUT_MS: u32 = 2000;

/// Timeout value, in milliseconds, meaning "wait forever". Matches the kernel driver's sentinel.
pub const INFINITE_TIMEOUT: u32 = 0xFFFF_FFFF;

/// The 8-bit ioctl type number used by the RIO kernel driver.
pub const IOC_MAGIC: u8 = 93;

/// Roots of the sysfs class directory and device node directory used to reach a RIO device.
///
/// The default points at the live system. Tests root a [`crate::devices::rio::RioDevice`] in a
/// temporary tree instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    pub sysfs_root: PathBuf,
    pub dev_root: PathBuf,
}

impl Default for DevicePaths {
    fn default() -> Self {
        DevicePaths {
            sysfs_root: PathBuf::from(NIRIO_CLASS_DIR),
            dev_root: PathBuf::from(DEVICE_DIR),
        }
    }
}

impl DevicePaths {
    pub fn new(sysfs_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        DevicePaths {
            sysfs_root: sysfs_root.into(),
            dev_root: dev_root.into(),
        }
    }

    /// Directory of one sub-device in the class directory, e.g. `/sys/class/nirio/RIO0!board`.
    pub fn subdevice_dir(&self, device: &str, subdevice: &str) -> PathBuf {
        self.sysfs_root.join(format!("{device}!{subdevice}"))
    }

    pub fn board_attribute(&self, device: &str, attribute: &str) -> PathBuf {
        self.subdevice_dir(device, "board").join(attribute)
    }

    pub fn personality_attribute(&self, device: &str, attribute: &str) -> PathBuf {
        self.subdevice_dir(device, "personality").join(attribute)
    }

    pub fn fifo_attribute(&self, device: &str, fifo: u32, attribute: &str) -> PathBuf {
        self.subdevice_dir(device, &format!("fifo{fifo}"))
            .join(attribute)
    }

    /// The PCI function backing the board, which carries the `device` and `subsystem_device` ids.
    pub fn board_pci_dir(&self, device: &str) -> PathBuf {
        self.board_attribute(device, "device")
    }

    /// Board character device. Downloads go through it and it doubles as the whole-device lock.
    pub fn board_cdev(&self, device: &str) -> PathBuf {
        self.dev_root.join(device)
    }

    pub fn personality_cdev(&self, device: &str) -> PathBuf {
        self.dev_root.join(format!("{device}personality"))
    }

    pub fn fifo_cdev(&self, device: &str, fifo: u32) -> PathBuf {
        self.dev_root.join(format!("{device}fifo{fifo}"))
    }

    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn default_paths_point_at_the_live_system() {
        let paths = DevicePaths::default();
        expect_that!(
            paths.personality_attribute("RIO0", "nirio_run_vi"),
            eq(&PathBuf::from("/sys/class/nirio/RIO0!personality/nirio_run_vi"))
        );
        expect_that!(
            paths.fifo_attribute("RIO0", 3, "element_bytes"),
            eq(&PathBuf::from("/sys/class/nirio/RIO0!fifo3/element_bytes"))
        );
        expect_that!(paths.fifo_cdev("RIO1", 2), eq(&PathBuf::from("/dev/RIO1fifo2")));
        expect_that!(paths.board_cdev("RIO1"), eq(&PathBuf::from("/dev/RIO1")));
    }
}
