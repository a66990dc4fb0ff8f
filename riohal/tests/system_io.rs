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


use googletest::prelude::*;
use riohal::error::RioError;
use riohal::system_io::{fs_read, fs_read_dir, read_attribute_bool, read_attribute_u32};
use rstest::*;
use std::path::Path;

#[gtest]
#[rstest]
#[case::not_found(
    "bad_input",
    err(displays_as(contains_substring("No such file or directory")))
)]
#[case::is_dir("/etc/", err(displays_as(contains_substring("Is a directory"))))]
#[case::ok(
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/test_data/counter.lvbitx"),
    ok(contains_substring("<Bitfile>"))
)]
fn test_fs_read<M: for<'a> Matcher<&'a std::result::Result<String, RioError>>>(
    #[case] path_str: &str,
    #[case] condition: M,
) {
    let r = fs_read(Path::new(path_str));
    expect_that!(r, condition);
}

#[gtest]
fn test_fs_read_dir_lists_fixtures() -> Result<()> {
    let entries = fs_read_dir(Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/test_data"
    )))?;
    expect_that!(entries, contains(eq("counter.lvbitx")));
    expect_that!(entries, contains(eq("fifo_gap.lvbitx")));
    Ok(())
}

#[gtest]
#[rstest]
#[case::hex("0x40000\n", Some(0x40000))]
#[case::decimal("262144\n", Some(0x40000))]
#[case::garbage("forty\n", None)]
fn test_read_attribute_u32(#[case] contents: &str, #[case] expected: Option<u32>) -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nirio_fpga_address_space_size");
    std::fs::write(&path, contents)?;
    expect_that!(read_attribute_u32(&path).ok(), eq(expected));
    Ok(())
}

#[gtest]
#[rstest]
#[case::set("1\n", ok(eq(&true)))]
#[case::clear("0", ok(eq(&false)))]
#[case::anything_else("yes", ok(eq(&false)))]
fn test_read_attribute_bool<M: for<'a> Matcher<&'a std::result::Result<bool, RioError>>>(
    #[case] contents: &str,
    #[case] condition: M,
) -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nirio_vi_started");
    std::fs::write(&path, contents)?;
    expect_that!(read_attribute_bool(&path), condition);
    Ok(())
}
