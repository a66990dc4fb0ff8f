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

//! The resource catalogue: named, typed registers and DMA FIFOs described by a bitfile.
//!
//! Entries are immutable once parsing finishes. A [`ResourceQuery`] describes what a caller is
//! looking for: a name plus either "anything", a register capability (indicator or control,
//! scalar or array, element type) or a FIFO capability (direction, element type).

use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TargetToHost,
    HostToTarget,
}

impl Direction {
    pub fn is_host_to_target(self) -> bool {
        self == Direction::HostToTarget
    }
}

/// The capability half of a resource lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceQuery {
    /// Match on name alone, registers first, then FIFOs.
    Any,
    Register {
        indicator: bool,
        array: bool,
        ty: Type,
    },
    Fifo {
        direction: Direction,
        ty: Type,
    },
}

impl ResourceQuery {
    pub fn indicator(ty: Type) -> Self {
        ResourceQuery::Register {
            indicator: true,
            array: false,
            ty,
        }
    }

    pub fn control(ty: Type) -> Self {
        ResourceQuery::Register {
            indicator: false,
            array: false,
            ty,
        }
    }

    pub fn indicator_array(ty: Type) -> Self {
        ResourceQuery::Register {
            indicator: true,
            array: true,
            ty,
        }
    }

    pub fn control_array(ty: Type) -> Self {
        ResourceQuery::Register {
            indicator: false,
            array: true,
            ty,
        }
    }

    pub fn target_to_host_fifo(ty: Type) -> Self {
        ResourceQuery::Fifo {
            direction: Direction::TargetToHost,
            ty,
        }
    }

    pub fn host_to_target_fifo(ty: Type) -> Self {
        ResourceQuery::Fifo {
            direction: Direction::HostToTarget,
            ty,
        }
    }

    pub fn searches_registers(&self) -> bool {
        matches!(self, ResourceQuery::Any | ResourceQuery::Register { .. })
    }

    pub fn searches_fifos(&self) -> bool {
        matches!(self, ResourceQuery::Any | ResourceQuery::Fifo { .. })
    }
}

/// A control or indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    name: String,
    ty: Type,
    offset: u32,
    indicator: bool,
    array: bool,
    access_may_timeout: bool,
}

impl RegisterInfo {
    pub fn new(
        name: impl Into<String>,
        ty: Type,
        offset: u32,
        indicator: bool,
        array: bool,
        access_may_timeout: bool,
    ) -> Self {
        RegisterInfo {
            name: name.into(),
            ty,
            offset,
            indicator,
            array,
            access_may_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Offset into the device's FPGA address space, as written in the bitfile.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn is_indicator(&self) -> bool {
        self.indicator
    }

    pub fn is_control(&self) -> bool {
        !self.indicator
    }

    pub fn is_array(&self) -> bool {
        self.array
    }

    /// The register lives in an external clock domain and an access may time out.
    pub fn access_may_timeout(&self) -> bool {
        self.access_may_timeout
    }

    pub fn matches(&self, name: &str, query: &ResourceQuery) -> bool {
        if self.name != name {
            return false;
        }
        match query {
            ResourceQuery::Any => true,
            ResourceQuery::Register {
                indicator,
                array,
                ty,
            } => self.ty == *ty && self.indicator == *indicator && self.array == *array,
            ResourceQuery::Fifo { .. } => false,
        }
    }
}

/// A DMA FIFO as described by the bitfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoInfo {
    name: String,
    ty: Type,
    number: u32,
    control_set: u32,
    direction: Direction,
    base_address_tag: String,
    offset: Option<u32>,
}

impl FifoInfo {
    pub fn new(
        name: impl Into<String>,
        ty: Type,
        number: u32,
        control_set: u32,
        direction: Direction,
        base_address_tag: impl Into<String>,
    ) -> Self {
        FifoInfo {
            name: name.into(),
            ty,
            number,
            control_set,
            direction,
            base_address_tag: base_address_tag.into(),
            offset: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Channel number, equal to this FIFO's index in the bitfile's FIFO list.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn control_set(&self) -> u32 {
        self.control_set
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_host_to_target(&self) -> bool {
        self.direction.is_host_to_target()
    }

    pub fn base_address_tag(&self) -> &str {
        &self.base_address_tag
    }

    /// Register block offset. Always set once parsing has succeeded.
    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    pub fn is_offset_set(&self) -> bool {
        self.offset.is_some()
    }

    pub(crate) fn set_offset(&mut self, offset: u32) {
        self.offset = Some(offset);
    }

    pub fn matches(&self, name: &str, query: &ResourceQuery) -> bool {
        if self.name != name {
            return false;
        }
        match query {
            ResourceQuery::Any => true,
            ResourceQuery::Fifo { direction, ty } => {
                self.ty == *ty && self.direction == *direction
            }
            ResourceQuery::Register { .. } => false,
        }
    }
}

/// Any catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceInfo<'a> {
    Register(&'a RegisterInfo),
    Fifo(&'a FifoInfo),
}

impl<'a> ResourceInfo<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            ResourceInfo::Register(r) => r.name(),
            ResourceInfo::Fifo(f) => f.name(),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            ResourceInfo::Register(r) => r.ty(),
            ResourceInfo::Fifo(f) => f.ty(),
        }
    }

    pub fn matches(&self, name: &str, query: &ResourceQuery) -> bool {
        match self {
            ResourceInfo::Register(r) => r.matches(name, query),
            ResourceInfo::Fifo(f) => f.matches(name, query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::rstest;

    fn gain() -> RegisterInfo {
        RegisterInfo::new("Gain", Type::U16, 0x8112, false, false, false)
    }

    #[gtest]
    #[rstest]
    #[case::any("Gain", ResourceQuery::Any, true)]
    #[case::exact("Gain", ResourceQuery::control(Type::U16), true)]
    #[case::wrong_name("gain", ResourceQuery::control(Type::U16), false)]
    #[case::wrong_type("Gain", ResourceQuery::control(Type::I16), false)]
    #[case::indicator("Gain", ResourceQuery::indicator(Type::U16), false)]
    #[case::array("Gain", ResourceQuery::control_array(Type::U16), false)]
    #[case::fifo("Gain", ResourceQuery::host_to_target_fifo(Type::U16), false)]
    fn register_matching(#[case] name: &str, #[case] query: ResourceQuery, #[case] expected: bool) {
        expect_that!(gain().matches(name, &query), eq(expected));
    }

    #[gtest]
    #[rstest]
    #[case::any(ResourceQuery::Any, true)]
    #[case::direction(ResourceQuery::target_to_host_fifo(Type::I32), true)]
    #[case::float_shape(ResourceQuery::target_to_host_fifo(Type::SGL), true)]
    #[case::wrong_direction(ResourceQuery::host_to_target_fifo(Type::I32), false)]
    #[case::register(ResourceQuery::indicator(Type::I32), false)]
    fn fifo_matching(#[case] query: ResourceQuery, #[case] expected: bool) {
        let fifo = FifoInfo::new("Samples", Type::I32, 0, 1, Direction::TargetToHost, "DmaBase0");
        expect_that!(fifo.matches("Samples", &query), eq(expected));
    }

    #[gtest]
    fn fifo_offset_starts_unset() {
        let mut fifo = FifoInfo::new("Out", Type::U64, 2, 0, Direction::HostToTarget, "tag");
        expect_that!(fifo.is_offset_set(), eq(false));
        fifo.set_offset(0x4000);
        expect_that!(fifo.is_offset_set(), eq(true));
        expect_that!(fifo.offset(), eq(0x4000));
    }

    #[gtest]
    fn tagged_union_dispatches() {
        let reg = gain();
        let info = ResourceInfo::Register(&reg);
        expect_that!(info.name(), eq("Gain"));
        expect_that!(info.ty(), eq(Type::U16));
        expect_that!(info.matches("Gain", &ResourceQuery::Any), eq(true));
    }
}
