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


mod common;

use common::{COUNTER_SIGNATURE, MODEL, device, open_counter, open_with, test_data};
use googletest::prelude::*;
use riohal::bitfile::Bitfile;
use riohal::devices::mock::MockDevice;
use riohal::resource::{Direction, ResourceQuery};
use riohal::session::OpenOptions;
use riohal::types::Type;
use rstest::rstest;

#[gtest]
fn counter_catalogue() -> Result<()> {
    let bitfile = Bitfile::open(&test_data("counter.lvbitx"))?;
    expect_that!(bitfile.signature(), eq(COUNTER_SIGNATURE));
    expect_that!(bitfile.target_class(), eq(MODEL));
    expect_that!(bitfile.base_address_on_device(), eq(0x40000));
    expect_that!(bitfile.auto_run_when_downloaded(), eq(false));
    expect_that!(bitfile.irq_registers().status, some(eq(0xFFE8)));
    expect_that!(bitfile.registers().len(), eq(7));
    expect_that!(bitfile.fifos()[1].direction(), eq(Direction::HostToTarget));
    expect_that!(bitfile.fifos()[1].offset(), eq(0xF040));
    expect_that!(bitfile.bitstream(), ok(eq(&b"riohal test bitstream".to_vec())));
    Ok(())
}

#[gtest]
fn fifo_numbers_follow_catalogue_order() -> Result<()> {
    let bitfile = Bitfile::open(&test_data("counter.lvbitx"))?;
    for (index, fifo) in bitfile.fifos().iter().enumerate() {
        expect_that!(fifo.number() as usize, eq(index));
    }
    Ok(())
}

#[gtest]
#[rstest]
#[case::newer_major_version("version5.lvbitx", "RioError::IncompatibleBitfile")]
#[case::numbering_gap("fifo_gap.lvbitx", "RioError::CorruptBitfile")]
#[case::missing_file("absent.lvbitx", "RioError::BitfileReadError")]
fn unusable_bitfiles_are_rejected(#[case] name: &str, #[case] kind: &str) {
    expect_that!(
        Bitfile::open(&test_data(name)),
        err(displays_as(contains_substring(kind)))
    );
}

#[gtest]
#[rstest]
fn duplicate_register_names_are_ambiguous(device: MockDevice) -> Result<()> {
    let session = open_with(&device, "duplicate_register.lvbitx", &OpenOptions::default())?;
    expect_that!(
        session.find_resource("Count", &ResourceQuery::indicator(Type::U32)),
        err(displays_as(contains_substring("RioError::InvalidResourceName")))
    );
    expect_that!(
        session.find_resource("Count", &ResourceQuery::Any),
        err(displays_as(contains_substring("RioError::InvalidResourceName")))
    );
    Ok(())
}

#[gtest]
#[rstest]
#[case::indicator("Count", ResourceQuery::indicator(Type::U32), 0x48000)]
#[case::sub_word_control("Threshold", ResourceQuery::control(Type::I16), 0x48006)]
#[case::sgl_control("Gain", ResourceQuery::control(Type::SGL), 0x4800C)]
#[case::array("Taps", ResourceQuery::control_array(Type::I16), 0x48020)]
#[case::may_timeout("Remote", ResourceQuery::indicator(Type::U32), 0x8004_8018)]
#[case::any_register("Total", ResourceQuery::Any, 0x48010)]
#[case::target_to_host_fifo("Samples", ResourceQuery::target_to_host_fifo(Type::U32), 0)]
#[case::host_to_target_fifo("Commands", ResourceQuery::host_to_target_fifo(Type::I16), 1)]
#[case::any_fifo("Commands", ResourceQuery::Any, 1)]
fn resources_resolve_to_handles(
    device: MockDevice,
    #[case] name: &str,
    #[case] query: ResourceQuery,
    #[case] handle: u32,
) {
    let session = open_counter(&device);
    expect_that!(session.find_resource(name, &query), ok(eq(&handle)));
}

#[gtest]
#[rstest]
#[case::wrong_kind("Count", ResourceQuery::control(Type::U32))]
#[case::wrong_type("Count", ResourceQuery::indicator(Type::I64))]
#[case::scalar_is_not_array("Count", ResourceQuery::indicator_array(Type::U32))]
#[case::fifo_direction("Samples", ResourceQuery::host_to_target_fifo(Type::U32))]
#[case::register_is_not_fifo("Count", ResourceQuery::target_to_host_fifo(Type::U32))]
#[case::cluster_is_not_catalogued("Limits", ResourceQuery::Any)]
#[case::internal_is_not_catalogued("ViControl", ResourceQuery::Any)]
fn unmatched_resources_are_not_found(
    device: MockDevice,
    #[case] name: &str,
    #[case] query: ResourceQuery,
) {
    let session = open_counter(&device);
    expect_that!(
        session.find_resource(name, &query),
        err(displays_as(contains_substring("RioError::ResourceNotFound")))
    );
}

#[gtest]
fn sgl_and_i32_share_a_query_shape() -> Result<()> {
    let session = open_counter(&MockDevice::new("RIO0", MODEL));
    expect_that!(
        session.find_resource("Gain", &ResourceQuery::control(Type::I32)),
        ok(eq(&0x4800C))
    );
    Ok(())
}
