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

//! Board identification from PCI ids.

use crate::config::DevicePaths;
use crate::error::RioError;
use crate::system_io::read_attribute_u32_hex;

/// `(device, subsystem_device, model name)`.
static PCI_MODELS: &[(u32, u32, &str)] = &[
    (0x7626, 0x7626, "NI 9154"),
    (0x7627, 0x7627, "NI 9155"),
    (0x7539, 0x7539, "NI 9157"),
    (0x753A, 0x753A, "NI 9159"),
    (0x7391, 0x7391, "PXI-7842R"),
    (0x73E1, 0x73E1, "PXI-7854R"),
    (0xC4C4, 0x74D0, "PXIe-7961R"),
    (0xC4C4, 0x74E2, "PXIe-7962R"),
    (0xC4C4, 0x74E3, "PXIe-7965R"),
    (0xC4C4, 0x75CE, "PXIe-7966R"),
    (0xC4C4, 0x74F3, "PCIe-5140R"),
    (0xC4C4, 0x7553, "PCIe-1473R"),
    (0xC4C4, 0x76FB, "PCIe-1473R-LX110"),
    (0xC4C4, 0x7570, "PCIe-1474R"),
    (0xC4C4, 0x7571, "PCIe-1475R"),
    (0xC4C4, 0x7572, "PCIe-1476R"),
    (0xC4C4, 0x76B5, "PXIe-7971R"),
    (0xC4C4, 0x76B6, "PXIe-7972R"),
    (0xC4C4, 0x76B7, "PXIe-7975R"),
    (0xC4C4, 0x7777, "PXIe-7976R"),
    (0xC4C4, 0x7790, "PXIe-5170R (4CH)"),
    (0xC4C4, 0x7791, "PXIe-5170R (8CH)"),
    (0xC4C4, 0x7793, "PXIe-5171R (8CH)"),
    (0xC4C4, 0x7820, "PXIe-5164"),
    (0xC4C4, 0x78F8, "PXIe-7981R"),
    (0xC4C4, 0x78F9, "PXIe-7982R"),
    (0xC4C4, 0x78FA, "PXIe-7985R"),
    (0xC4C4, 0x798C, "PXIe-7986R"),
    (0xC4C4, 0x79D3, "PCIe-7981R"),
    (0xC4C4, 0x79D4, "PCIe-7982R"),
    (0xC4C4, 0x79D5, "PCIe-7985R"),
];

/// Look up a model name by PCI ids.
pub fn model_for_ids(device: u32, subsystem_device: u32) -> Option<&'static str> {
    PCI_MODELS
        .iter()
        .find(|(d, s, _)| *d == device && *s == subsystem_device)
        .map(|(_, _, name)| *name)
}

/// Read the board's PCI ids and resolve them to a model name.
///
/// # Returns: `Result<String, RioError>`
/// * `Ok(String)` - The model name
/// * `Err(RioError::IORead)` - The PCI id attributes could not be read
/// * `Err(RioError::SoftwareFault)` - The ids are not a known RIO board
pub fn model_name(paths: &DevicePaths, device: &str) -> Result<String, RioError> {
    let pci = paths.board_pci_dir(device);
    let device_id = read_attribute_u32_hex(&pci.join("device"))?;
    let subsystem_id = read_attribute_u32_hex(&pci.join("subsystem_device"))?;
    model_for_ids(device_id, subsystem_id)
        .map(str::to_owned)
        .ok_or_else(|| {
            RioError::SoftwareFault(format!(
                "{device} has unknown PCI ids {device_id:#06x}:{subsystem_id:#06x}"
            ))
        })
}
