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

//! The personality blob written to the board device to download an image.
//!
//! Layout, all integers little-endian `u32`:
//!
//! ```text
//! download_flags | personality_flags | signature[32] | num_fifos
//! num_fifos × { channel | control_set | offset | direction | bits_per_elem }
//! bitstream_len | bitstream bytes
//! ```

use crate::bitfile::Bitfile;
use crate::error::RioError;
use crate::resource::FifoInfo;

/// Length of a bitfile signature in characters.
pub const SIGNATURE_LEN: usize = 32;

pub const DOWNLOAD_FORCE: u32 = 1 << 0;

pub const PERSONALITY_FIFOS_SUPPORT_CLEAR: u32 = 1 << 0;
pub const PERSONALITY_FIFOS_SUPPORT_BRIDGE_FLUSH: u32 = 1 << 1;
pub const PERSONALITY_RESET_AUTO_CLEARS: u32 = 1 << 2;
pub const PERSONALITY_RUN_WHEN_LOADED: u32 = 1 << 3;

/// The capability flags the driver needs to manage a personality.
pub fn personality_flags(bitfile: &Bitfile) -> u32 {
    let mut flags = 0;
    if bitfile.fifos_support_clear() {
        flags |= PERSONALITY_FIFOS_SUPPORT_CLEAR;
    }
    if bitfile.fifos_support_bridge_flush() {
        flags |= PERSONALITY_FIFOS_SUPPORT_BRIDGE_FLUSH;
    }
    if bitfile.reset_auto_clears() {
        flags |= PERSONALITY_RESET_AUTO_CLEARS;
    }
    if bitfile.auto_run_when_downloaded() {
        flags |= PERSONALITY_RUN_WHEN_LOADED;
    }
    flags
}

/// Serialize a download request.
///
/// # Arguments
///
/// * `bitfile` - The personality being downloaded
/// * `bitstream` - The decoded bitstream, as returned by [`Bitfile::bitstream`]
/// * `force` - Download even if the device already holds this signature
///
/// # Returns: `Result<Vec<u8>, RioError>`
/// * `Ok(Vec<u8>)` - The blob to write to the board device
/// * `Err(RioError::CorruptBitfile)` - The signature is not 32 characters long
/// * `Err(RioError::MemoryFull)` - The bitstream does not fit the length field
pub fn build_blob(bitfile: &Bitfile, bitstream: &[u8], force: bool) -> Result<Vec<u8>, RioError> {
    let signature = bitfile.signature().as_bytes();
    if signature.len() != SIGNATURE_LEN {
        return Err(RioError::CorruptBitfile(format!(
            "signature {:?} is not {SIGNATURE_LEN} characters",
            bitfile.signature()
        )));
    }
    let bitstream_len = u32::try_from(bitstream.len()).map_err(|_| RioError::MemoryFull)?;
    let fifos = bitfile.fifos();
    let num_fifos = u32::try_from(fifos.len())
        .map_err(|_| RioError::CorruptBitfile(String::from("too many FIFOs")))?;

    let mut blob = Vec::with_capacity(4 * 3 + SIGNATURE_LEN + fifos.len() * 20 + 4 + bitstream.len());
    let download_flags = if force { DOWNLOAD_FORCE } else { 0 };
    put_u32(&mut blob, download_flags);
    put_u32(&mut blob, personality_flags(bitfile));
    blob.extend_from_slice(signature);
    put_u32(&mut blob, num_fifos);
    for fifo in fifos {
        put_fifo(&mut blob, fifo);
    }
    put_u32(&mut blob, bitstream_len);
    blob.extend_from_slice(bitstream);
    Ok(blob)
}

fn put_fifo(blob: &mut Vec<u8>, fifo: &FifoInfo) {
    put_u32(blob, fifo.number());
    put_u32(blob, fifo.control_set());
    put_u32(blob, fifo.offset());
    put_u32(blob, u32::from(fifo.is_host_to_target()));
    put_u32(blob, fifo.ty().logical_bits());
}

fn put_u32(blob: &mut Vec<u8>, value: u32) {
    blob.extend_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use std::path::Path;

    fn bitfile(signature: &str, bitstream_version: u32) -> Bitfile {
        let text = format!(
            r#"<Bitfile>
  <BitfileVersion>4.0</BitfileVersion>
  <SignatureRegister>{signature}</SignatureRegister>
  <VI><RegisterList>
    <Register><Name>ViSignature</Name><Offset>0</Offset><Internal>true</Internal></Register>
    <Register><Name>ViControl</Name><Offset>4</Offset><Internal>true</Internal></Register>
    <Register><Name>DiagramReset</Name><Offset>8</Offset><Internal>true</Internal></Register>
  </RegisterList></VI>
  <Project>
    <TargetClass>NI 9154</TargetClass>
    <AutoRunWhenDownloaded>true</AutoRunWhenDownloaded>
    <CompilationResultsTree><CompilationResults><NiFpga>
      <BaseAddressOnDevice>0</BaseAddressOnDevice>
      <DmaChannelAllocationList>
        <Channel name="Out">
          <Number>0</Number><ControlSet>3</ControlSet><Direction>HostToTarget</Direction>
          <DataType><SubType>I16</SubType></DataType><BaseAddressTag>b</BaseAddressTag>
        </Channel>
      </DmaChannelAllocationList>
      <RegisterBlockList><RegisterBlock name="b"><Offset>0x40</Offset></RegisterBlock></RegisterBlockList>
    </NiFpga></CompilationResults></CompilationResultsTree>
  </Project>
  <BitstreamVersion>{bitstream_version}</BitstreamVersion>
</Bitfile>"#
        );
        match Bitfile::parse(Path::new("blob.lvbitx"), &text) {
            Ok(b) => b,
            Err(e) => panic!("fixture does not parse: {e}"),
        }
    }

    fn word(blob: &[u8], index: usize) -> u32 {
        let start = index * 4;
        u32::from_le_bytes([blob[start], blob[start + 1], blob[start + 2], blob[start + 3]])
    }

    #[gtest]
    fn blob_layout() -> Result<()> {
        let bitfile = bitfile("00112233445566778899AABBCCDDEEFF", 2);
        let blob = build_blob(&bitfile, &[0xAA, 0xBB, 0xCC], true)?;

        expect_that!(word(&blob, 0), eq(DOWNLOAD_FORCE));
        expect_that!(word(&blob, 1), eq(0b1111));
        expect_that!(&blob[8..40], eq(b"00112233445566778899AABBCCDDEEFF".as_slice()));
        let fifo = &blob[40..];
        expect_that!(word(fifo, 0), eq(1));
        expect_that!(word(fifo, 1), eq(0));
        expect_that!(word(fifo, 2), eq(3));
        expect_that!(word(fifo, 3), eq(0x40));
        expect_that!(word(fifo, 4), eq(1));
        expect_that!(word(fifo, 5), eq(16));
        expect_that!(word(fifo, 6), eq(3));
        expect_that!(&blob[blob.len() - 3..], eq([0xAAu8, 0xBB, 0xCC].as_slice()));
        Ok(())
    }

    #[gtest]
    fn old_bitstreams_only_report_run_when_loaded() {
        expect_that!(
            personality_flags(&bitfile("00112233445566778899AABBCCDDEEFF", 0)),
            eq(PERSONALITY_RUN_WHEN_LOADED)
        );
    }

    #[gtest]
    fn short_signature_is_corrupt() {
        expect_that!(
            build_blob(&bitfile("DEADBEEF", 1), &[], false),
            err(displays_as(contains_substring("RioError::CorruptBitfile")))
        );
    }
}
