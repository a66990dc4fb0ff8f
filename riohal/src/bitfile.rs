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

//! Bitfile parsing.
//!
//! A bitfile (`.lvbitx`) is an XML document that describes one FPGA personality: its signature,
//! the hardware class it was compiled for, the registers and DMA FIFOs it exposes and the
//! base64-encoded configuration bitstream itself. [`Bitfile::open`] validates the whole document
//! once and keeps only the derived catalogue. The bitstream is large and only needed when
//! downloading, so [`Bitfile::bitstream`] reads and decodes it again on every call.
//!
//! # Document outline
//!
//! Only the elements below are interpreted; anything else is ignored.
//!
//! ```text
//! Bitfile
//! ├── BitfileVersion                "major.minor"
//! ├── SignatureRegister             32 hex characters
//! ├── VI/RegisterList/Register*     Name, Offset, Internal, Indicator, AccessMayTimeout, Datatype
//! ├── Project
//! │   ├── TargetClass
//! │   ├── AutoRunWhenDownloaded
//! │   └── CompilationResultsTree/CompilationResults
//! │       ├── deviceTreeOverlay     optional, hex pairs
//! │       └── NiFpga
//! │           ├── BaseAddressOnDevice
//! │           ├── DmaChannelAllocationList/Channel*
//! │           └── RegisterBlockList/RegisterBlock*   optional
//! ├── BitstreamVersion
//! ├── BitstreamEncoding             optional, "base64"
//! └── Bitstream
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! # use riohal::bitfile::Bitfile;
//! # use std::path::Path;
//! # fn example() -> Result<(), riohal::error::RioError> {
//! let bitfile = Bitfile::open(Path::new("/opt/app/personality.lvbitx"))?;
//! println!("{} for {}", bitfile.signature(), bitfile.target_class());
//! for fifo in bitfile.fifos() {
//!     println!("fifo {} {}", fifo.number(), fifo.name());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::MAX_BITFILE_VERSION_MAJOR;
use crate::error::RioError;
use crate::resource::{Direction, FifoInfo, RegisterInfo, ResourceInfo};
use crate::types::Type;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, trace};
use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};

/// Offsets of the interrupt registers, when the personality has them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqRegisters {
    pub enable: Option<u32>,
    pub mask: Option<u32>,
    pub status: Option<u32>,
}

/// The validated contents of one bitfile.
#[derive(Debug, Clone)]
pub struct Bitfile {
    path: PathBuf,
    signature: String,
    target_class: String,
    base_address_on_device: u32,
    signature_register: u32,
    control_register: u32,
    reset_register: u32,
    irq_registers: IrqRegisters,
    bitstream_version: u32,
    auto_run_when_downloaded: bool,
    registers: Vec<RegisterInfo>,
    fifos: Vec<FifoInfo>,
    device_tree_overlay: Option<Vec<u8>>,
}

impl Bitfile {
    /// Read and validate the bitfile at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.lvbitx` document
    ///
    /// # Returns: `Result<Bitfile, RioError>`
    /// * `Ok(Bitfile)` - The parsed catalogue
    /// * `Err(RioError::BitfileReadError)` - The file could not be read or is not well-formed XML
    /// * `Err(RioError::IncompatibleBitfile)` - The document version is newer than supported
    /// * `Err(RioError::CorruptBitfile)` - A required element is missing or malformed
    pub fn open(path: &Path) -> Result<Bitfile, RioError> {
        debug!("Parsing bitfile {path:?}");
        let text = read_document(path)?;
        Bitfile::parse(path, &text)
    }

    /// Validate bitfile contents that were already read from `path`.
    ///
    /// `path` is kept so that [`Bitfile::bitstream`] can read the document again later.
    pub fn parse(path: &Path, text: &str) -> Result<Bitfile, RioError> {
        let document = Document::parse(text).map_err(|e| RioError::BitfileReadError {
            file: path.into(),
            reason: e.to_string(),
        })?;
        let root = document.root_element();
        if root.tag_name().name() != "Bitfile" {
            return Err(corrupt(format!(
                "root element is <{}>, not <Bitfile>",
                root.tag_name().name()
            )));
        }

        let (major, minor) = parse_version(value(child(root, "BitfileVersion")?))?;
        if major > MAX_BITFILE_VERSION_MAJOR {
            return Err(RioError::IncompatibleBitfile(format!(
                "bitfile version {major}.{minor} is newer than {MAX_BITFILE_VERSION_MAJOR}.x"
            )));
        }
        let signature = value(child(root, "SignatureRegister")?).to_owned();

        let mut internal = InternalRegisters::default();
        let mut registers = Vec::new();
        let register_list = descend(root, &["VI", "RegisterList"])?;
        for register in children(register_list, "Register") {
            if let Some(info) = parse_register(register, &mut internal)? {
                registers.push(info);
            }
        }
        let (Some(signature_register), Some(control_register), Some(reset_register)) =
            (internal.signature, internal.control, internal.reset)
        else {
            return Err(corrupt(
                "the register list lacks ViSignature, ViControl or DiagramReset",
            ));
        };

        let project = child(root, "Project")?;
        let target_class = value(child(project, "TargetClass")?).to_owned();
        let auto_run_when_downloaded =
            parse_bool(value(child(project, "AutoRunWhenDownloaded")?))?;
        let results = descend(project, &["CompilationResultsTree", "CompilationResults"])?;
        let device_tree_overlay = match find_child(results, "deviceTreeOverlay") {
            Some(node) => Some(decode_hex(value(node))?),
            None => None,
        };

        let nifpga = child(results, "NiFpga")?;
        let base_address_on_device = parse_uint(value(child(nifpga, "BaseAddressOnDevice")?))?;
        let bitstream_version = parse_uint(value(child(root, "BitstreamVersion")?))?;

        let mut fifos = Vec::new();
        for channel in children(child(nifpga, "DmaChannelAllocationList")?, "Channel") {
            if let Some(fifo) = parse_channel(channel, fifos.len())? {
                fifos.push(fifo);
            }
        }
        if let Some(block_list) = find_child(nifpga, "RegisterBlockList") {
            for block in children(block_list, "RegisterBlock") {
                assign_block_offset(block, &mut fifos)?;
            }
        }
        if let Some(fifo) = fifos.iter().find(|f| !f.is_offset_set()) {
            return Err(corrupt(format!(
                "FIFO {:?} has no register block offset",
                fifo.name()
            )));
        }

        debug!(
            "Bitfile {path:?}: signature {signature}, target {target_class:?}, {} registers, {} FIFOs",
            registers.len(),
            fifos.len()
        );
        Ok(Bitfile {
            path: path.into(),
            signature,
            target_class,
            base_address_on_device,
            signature_register,
            control_register,
            reset_register,
            irq_registers: internal.irq,
            bitstream_version,
            auto_run_when_downloaded,
            registers,
            fifos,
            device_tree_overlay,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The personality's signature, as 32 hexadecimal characters.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The hardware class the personality was compiled for, e.g. `PXIe-7971R`.
    pub fn target_class(&self) -> &str {
        &self.target_class
    }

    pub fn base_address_on_device(&self) -> u32 {
        self.base_address_on_device
    }

    pub fn signature_register(&self) -> u32 {
        self.signature_register
    }

    pub fn control_register(&self) -> u32 {
        self.control_register
    }

    pub fn reset_register(&self) -> u32 {
        self.reset_register
    }

    pub fn irq_registers(&self) -> IrqRegisters {
        self.irq_registers
    }

    pub fn bitstream_version(&self) -> u32 {
        self.bitstream_version
    }

    pub fn fifos_support_clear(&self) -> bool {
        self.bitstream_version >= 1
    }

    pub fn fifos_support_bridge_flush(&self) -> bool {
        self.bitstream_version >= 2
    }

    pub fn reset_auto_clears(&self) -> bool {
        self.bitstream_version >= 2
    }

    pub fn auto_run_when_downloaded(&self) -> bool {
        self.auto_run_when_downloaded
    }

    pub fn registers(&self) -> &[RegisterInfo] {
        &self.registers
    }

    /// FIFOs in channel order: `fifos()[n].number() == n`.
    pub fn fifos(&self) -> &[FifoInfo] {
        &self.fifos
    }

    /// Every catalogue entry, registers first.
    pub fn resources(&self) -> impl Iterator<Item = ResourceInfo<'_>> {
        self.registers
            .iter()
            .map(ResourceInfo::Register)
            .chain(self.fifos.iter().map(ResourceInfo::Fifo))
    }

    /// The decoded device tree overlay fragment, if the bitfile carries one.
    pub fn device_tree_overlay(&self) -> Option<&[u8]> {
        self.device_tree_overlay.as_deref()
    }

    /// Read the bitfile again and decode its configuration bitstream.
    ///
    /// # Returns: `Result<Vec<u8>, RioError>`
    /// * `Ok(Vec<u8>)` - The raw bitstream bytes
    /// * `Err(RioError::BitfileReadError)` - The file could not be read or parsed
    /// * `Err(RioError::CorruptBitfile)` - The bitstream is missing, uses an unknown encoding or
    ///   is not valid base64
    pub fn bitstream(&self) -> Result<Vec<u8>, RioError> {
        let text = read_document(&self.path)?;
        let document = Document::parse(&text).map_err(|e| RioError::BitfileReadError {
            file: self.path.clone(),
            reason: e.to_string(),
        })?;
        let root = document.root_element();
        if let Some(encoding) = find_child(root, "BitstreamEncoding") {
            let encoding = value(encoding).trim();
            if !encoding.eq_ignore_ascii_case("base64") {
                return Err(corrupt(format!("unknown bitstream encoding {encoding:?}")));
            }
        }
        let encoded: String = value(child(root, "Bitstream")?)
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bitstream = STANDARD
            .decode(encoded)
            .map_err(|e| corrupt(format!("bitstream is not valid base64: {e}")))?;
        trace!("Decoded {} bitstream bytes from {:?}", bitstream.len(), self.path);
        Ok(bitstream)
    }
}

#[derive(Default)]
struct InternalRegisters {
    signature: Option<u32>,
    control: Option<u32>,
    reset: Option<u32>,
    irq: IrqRegisters,
}

fn read_document(path: &Path) -> Result<String, RioError> {
    std::fs::read_to_string(path).map_err(|e| RioError::BitfileReadError {
        file: path.into(),
        reason: e.to_string(),
    })
}

fn corrupt(reason: impl Into<String>) -> RioError {
    RioError::CorruptBitfile(reason.into())
}

fn find_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, RioError> {
    find_child(node, name).ok_or_else(|| {
        corrupt(format!(
            "<{}> has no <{name}> element",
            node.tag_name().name()
        ))
    })
}

fn descend<'a, 'input>(
    node: Node<'a, 'input>,
    path: &[&str],
) -> Result<Node<'a, 'input>, RioError> {
    path.iter().try_fold(node, |n, name| child(n, name))
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn first_element<'a, 'input>(node: Node<'a, 'input>) -> Result<Node<'a, 'input>, RioError> {
    node.children().find(Node::is_element).ok_or_else(|| {
        corrupt(format!(
            "<{}> has no child element",
            node.tag_name().name()
        ))
    })
}

fn attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, RioError> {
    node.attribute(name).ok_or_else(|| {
        corrupt(format!(
            "<{}> has no {name:?} attribute",
            node.tag_name().name()
        ))
    })
}

/// The text of an element; an empty element has an empty value.
fn value<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("")
}

fn parse_uint(text: &str) -> Result<u32, RioError> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|_| corrupt(format!("{text:?} is not an unsigned integer")))
}

fn parse_bool(text: &str) -> Result<bool, RioError> {
    match text.trim() {
        t if t.eq_ignore_ascii_case("true") => Ok(true),
        t if t.eq_ignore_ascii_case("false") => Ok(false),
        t => Err(corrupt(format!("{t:?} is not a boolean"))),
    }
}

fn parse_version(text: &str) -> Result<(u32, u32), RioError> {
    let invalid = || corrupt(format!("{text:?} is not a major.minor version"));
    let (major, minor) = text.trim().split_once('.').ok_or_else(invalid)?;
    let major = major.parse::<u32>().map_err(|_| invalid())?;
    let minor = minor.parse::<u32>().map_err(|_| invalid())?;
    Ok((major, minor))
}

/// Map a datatype element name to its [`Type`].
///
/// Fixed-point values and clusters are catalogued as [`Type::UNSUPPORTED`]; any other unknown
/// name is corrupt.
pub fn parse_type(name: &str) -> Result<Type, RioError> {
    let ty = match name {
        "Boolean" => Type::BOOL,
        "I8" => Type::I8,
        "U8" | "EnumU8" => Type::U8,
        "I16" => Type::I16,
        "U16" | "EnumU16" => Type::U16,
        "I32" => Type::I32,
        "U32" | "EnumU32" => Type::U32,
        "I64" => Type::I64,
        "U64" | "EnumU64" => Type::U64,
        "FXP" | "Cluster" => Type::UNSUPPORTED,
        n if n.eq_ignore_ascii_case("Sgl") => Type::SGL,
        n if n.eq_ignore_ascii_case("Dbl") => Type::DBL,
        n => return Err(corrupt(format!("unknown datatype {n:?}"))),
    };
    Ok(ty)
}

fn decode_hex(text: &str) -> Result<Vec<u8>, RioError> {
    let digits = text.trim().as_bytes();
    if digits.len() % 2 != 0 {
        return Err(corrupt("device tree overlay has an odd number of hex digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| corrupt("device tree overlay is not hexadecimal"))
        })
        .collect()
}

/// Parse one `Register` entry. Internal registers fill `internal` and produce no catalogue entry,
/// as do clusters and strings.
fn parse_register(
    register: Node,
    internal: &mut InternalRegisters,
) -> Result<Option<RegisterInfo>, RioError> {
    let name = value(child(register, "Name")?);
    let offset = parse_uint(value(child(register, "Offset")?))?;
    if parse_bool(value(child(register, "Internal")?))? {
        match name {
            "ViSignature" => internal.signature = Some(offset),
            "ViControl" => internal.control = Some(offset),
            "DiagramReset" => internal.reset = Some(offset),
            "InterruptEnable" => internal.irq.enable = Some(offset),
            "InterruptMask" => internal.irq.mask = Some(offset),
            "InterruptStatus" => internal.irq.status = Some(offset),
            other => trace!("Ignoring internal register {other:?}"),
        }
        return Ok(None);
    }

    let indicator = parse_bool(value(child(register, "Indicator")?))?;
    let access_may_timeout = parse_bool(value(child(register, "AccessMayTimeout")?))?;
    let datatype = first_element(child(register, "Datatype")?)?;
    let (type_name, array) = match datatype.tag_name().name() {
        "Cluster" | "String" => {
            trace!("Skipping register {name:?} of unsupported datatype");
            return Ok(None);
        }
        "Array" => (first_element(child(datatype, "Type")?)?.tag_name().name(), true),
        scalar => (scalar, false),
    };
    Ok(Some(RegisterInfo::new(
        name,
        parse_type(type_name)?,
        offset,
        indicator,
        array,
        access_may_timeout,
    )))
}

/// Parse one `Channel` entry, skipping channels that are not DMA FIFOs. `expected_number` is the
/// count of FIFOs accepted so far.
fn parse_channel(channel: Node, expected_number: usize) -> Result<Option<FifoInfo>, RioError> {
    let name = attribute(channel, "name")?;
    let number = parse_uint(value(child(channel, "Number")?))?;
    let control_set = parse_uint(value(child(channel, "ControlSet")?))?;
    let direction = match value(child(channel, "Direction")?) {
        "TargetToHost" => Direction::TargetToHost,
        "HostToTarget" => Direction::HostToTarget,
        other => {
            trace!("Skipping non-DMA channel {name:?} ({other})");
            return Ok(None);
        }
    };
    let ty = parse_type(value(descend(channel, &["DataType", "SubType"])?))?;
    if usize::try_from(number).ok() != Some(expected_number) {
        return Err(corrupt(format!(
            "FIFO {name:?} is numbered {number} but is channel {expected_number}"
        )));
    }
    let tag = value(child(channel, "BaseAddressTag")?);
    Ok(Some(FifoInfo::new(
        name,
        ty,
        number,
        control_set,
        direction,
        tag,
    )))
}

fn assign_block_offset(block: Node, fifos: &mut [FifoInfo]) -> Result<(), RioError> {
    let offset = parse_uint(value(child(block, "Offset")?))?;
    let tag = attribute(block, "name")?;
    let fifo = fifos
        .iter_mut()
        .find(|f| f.base_address_tag() == tag)
        .ok_or_else(|| corrupt(format!("register block {tag:?} belongs to no FIFO")))?;
    fifo.set_offset(offset);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::rstest;

    const REGISTERS: &str = r#"
        <Register><Name>ViSignature</Name><Offset>0x1FFF4</Offset><Internal>true</Internal></Register>
        <Register><Name>ViControl</Name><Offset>0x1FFF8</Offset><Internal>true</Internal></Register>
        <Register><Name>DiagramReset</Name><Offset>0x1FFFC</Offset><Internal>true</Internal></Register>
        <Register><Name>InterruptMask</Name><Offset>0x1FFE8</Offset><Internal>true</Internal></Register>
        <Register><Name>Unused</Name><Offset>0x1FF00</Offset><Internal>true</Internal></Register>
        <Register>
            <Name>Gain</Name><Offset>0x8112</Offset><Internal>false</Internal>
            <Indicator>false</Indicator><AccessMayTimeout>false</AccessMayTimeout>
            <Datatype><U16/></Datatype>
        </Register>
        <Register>
            <Name>Samples</Name><Offset>33024</Offset><Internal>false</Internal>
            <Indicator>true</Indicator><AccessMayTimeout>TRUE</AccessMayTimeout>
            <Datatype><Array><Size>4</Size><Type><I32/></Type></Array></Datatype>
        </Register>
        <Register>
            <Name>Config</Name><Offset>0x8200</Offset><Internal>false</Internal>
            <Indicator>false</Indicator><AccessMayTimeout>false</AccessMayTimeout>
            <Datatype><Cluster/></Datatype>
        </Register>"#;

    const CHANNELS: &str = r#"
        <Channel name="In">
            <Number>0</Number><ControlSet>0</ControlSet><Direction>TargetToHost</Direction>
            <DataType><SubType>U32</SubType></DataType><BaseAddressTag>DmaIn</BaseAddressTag>
        </Channel>
        <Channel name="Out">
            <Number>1</Number><ControlSet>0</ControlSet><Direction>HostToTarget</Direction>
            <DataType><SubType>Dbl</SubType></DataType><BaseAddressTag>DmaOut</BaseAddressTag>
        </Channel>"#;

    const BLOCKS: &str = r#"
        <RegisterBlockList>
            <RegisterBlock name="DmaIn"><Offset>0x18000</Offset></RegisterBlock>
            <RegisterBlock name="DmaOut"><Offset>0x18040</Offset></RegisterBlock>
        </RegisterBlockList>"#;

    fn document(version: &str, registers: &str, channels: &str, blocks: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Bitfile>
  <BitfileVersion>{version}</BitfileVersion>
  <SignatureRegister>0123456789ABCDEF0123456789ABCDEF</SignatureRegister>
  <VI><RegisterList>{registers}</RegisterList></VI>
  <Project>
    <TargetClass>PXIe-7971R</TargetClass>
    <AutoRunWhenDownloaded>false</AutoRunWhenDownloaded>
    <CompilationResultsTree><CompilationResults>
      <deviceTreeOverlay>d00dfeed</deviceTreeOverlay>
      <NiFpga>
        <BaseAddressOnDevice>0x10000</BaseAddressOnDevice>
        <DmaChannelAllocationList>{channels}</DmaChannelAllocationList>
        {blocks}
      </NiFpga>
    </CompilationResults></CompilationResultsTree>
  </Project>
  <BitstreamVersion>2</BitstreamVersion>
  <Bitstream>aGVs
bG8=</Bitstream>
</Bitfile>"#
        )
    }

    fn parse(text: &str) -> std::result::Result<Bitfile, RioError> {
        Bitfile::parse(Path::new("test.lvbitx"), text)
    }

    #[gtest]
    fn parses_a_complete_document() -> Result<()> {
        let bitfile = parse(&document("4.0", REGISTERS, CHANNELS, BLOCKS))?;
        expect_that!(bitfile.signature(), eq("0123456789ABCDEF0123456789ABCDEF"));
        expect_that!(bitfile.target_class(), eq("PXIe-7971R"));
        expect_that!(bitfile.base_address_on_device(), eq(0x10000));
        expect_that!(bitfile.control_register(), eq(0x1FFF8));
        expect_that!(bitfile.irq_registers().mask, some(eq(0x1FFE8)));
        expect_that!(bitfile.irq_registers().status, none());
        expect_that!(bitfile.fifos_support_bridge_flush(), eq(true));
        expect_that!(bitfile.auto_run_when_downloaded(), eq(false));
        expect_that!(
            bitfile.device_tree_overlay(),
            eq(Some(&[0xd0u8, 0x0d, 0xfe, 0xed][..]))
        );
        expect_that!(bitfile.registers().len(), eq(2));
        let samples = &bitfile.registers()[1];
        expect_that!(samples.offset(), eq(33024));
        expect_that!(samples.is_array(), eq(true));
        expect_that!(samples.access_may_timeout(), eq(true));
        expect_that!(samples.ty(), eq(Type::I32));
        expect_that!(bitfile.fifos()[1].ty(), eq(Type::DBL));
        expect_that!(bitfile.fifos()[1].offset(), eq(0x18040));
        expect_that!(bitfile.resources().count(), eq(4));
        Ok(())
    }

    #[gtest]
    #[rstest]
    #[case::boolean("Boolean", Type::BOOL)]
    #[case::enum_u8("EnumU8", Type::U8)]
    #[case::enum_u64("EnumU64", Type::U64)]
    #[case::lowercase_sgl("sgl", Type::SGL)]
    #[case::fixed_point("FXP", Type::UNSUPPORTED)]
    fn datatype_names(#[case] name: &str, #[case] expected: Type) {
        expect_that!(parse_type(name), ok(eq(&expected)));
    }

    #[gtest]
    fn unknown_datatype_is_corrupt() {
        expect_that!(
            parse_type("Complex"),
            err(displays_as(contains_substring("RioError::CorruptBitfile")))
        );
    }

    #[gtest]
    #[rstest]
    #[case::hex("0x20", Some(32))]
    #[case::decimal("32", Some(32))]
    #[case::negative("-1", None)]
    #[case::garbage("0xZZ", None)]
    fn unsigned_values(#[case] text: &str, #[case] expected: Option<u32>) {
        expect_that!(parse_uint(text).ok(), eq(expected));
    }

    #[gtest]
    fn newer_major_version_is_incompatible() {
        expect_that!(
            parse(&document("5.0", "", "", "")),
            err(displays_as(contains_substring("RioError::IncompatibleBitfile")))
        );
    }

    #[gtest]
    fn missing_internal_register_is_corrupt() {
        let registers = REGISTERS.replace("DiagramReset", "SomethingElse");
        expect_that!(
            parse(&document("4.0", &registers, CHANNELS, BLOCKS)),
            err(displays_as(contains_substring("DiagramReset")))
        );
    }

    #[gtest]
    fn malformed_xml_is_a_read_error() {
        expect_that!(
            parse("<Bitfile><BitfileVersion>"),
            err(displays_as(contains_substring("RioError::BitfileReadError")))
        );
    }

    #[gtest]
    fn unmatched_register_block_is_corrupt() {
        let blocks = BLOCKS.replace("DmaOut", "DmaElsewhere");
        expect_that!(
            parse(&document("4.0", REGISTERS, CHANNELS, &blocks)),
            err(displays_as(contains_substring("DmaElsewhere")))
        );
    }

    #[gtest]
    fn fifo_without_offset_is_corrupt() {
        expect_that!(
            parse(&document("4.0", REGISTERS, CHANNELS, "")),
            err(displays_as(contains_substring("no register block offset")))
        );
    }

    #[gtest]
    fn non_dma_channels_are_skipped() -> Result<()> {
        let channels = format!(
            r#"<Channel name="Peer">
                <Number>7</Number><ControlSet>0</ControlSet><Direction>PeerToPeer</Direction>
            </Channel>{CHANNELS}"#
        );
        let bitfile = parse(&document("4.0", REGISTERS, &channels, BLOCKS))?;
        expect_that!(bitfile.fifos().len(), eq(2));
        Ok(())
    }

    #[gtest]
    fn bitstream_is_decoded_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("personality.lvbitx");
        std::fs::write(&path, document("4.0", REGISTERS, CHANNELS, BLOCKS))?;
        let bitfile = Bitfile::open(&path)?;
        expect_that!(bitfile.bitstream(), ok(eq(&b"hello".to_vec())));
        Ok(())
    }
}
