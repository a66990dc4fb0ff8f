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


use crate::load::open_session;
use riohal::error::RioError;
use riohal::resource::{RegisterInfo, ResourceQuery};
use riohal::session::{OpenOptions, Session};
use riohal::types::{Element, FpgaBool};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

/// Open a session that leaves the personality as it found it
fn open(device: &str, bitfile: &Path) -> Result<Session, RioError> {
    let options = OpenOptions {
        no_run: true,
        ..OpenOptions::default()
    };
    open_session(device, bitfile, &options)
}

/// Look up a scalar register and resolve its handle
fn scalar_register(session: &Session, name: &str) -> Result<(RegisterInfo, u32), RioError> {
    let register = session
        .bitfile()
        .registers()
        .iter()
        .find(|r| r.name() == name)
        .cloned()
        .ok_or_else(|| RioError::ResourceNotFound(name.to_owned()))?;
    if register.is_array() {
        return Err(RioError::FeatureNotSupported(format!(
            "'{name}' is an array; only scalar registers can be read or written here"
        )));
    }
    let query = ResourceQuery::Register {
        indicator: register.is_indicator(),
        array: false,
        ty: register.ty(),
    };
    let handle = session.find_resource(name, &query)?;
    Ok((register, handle))
}

fn parse<T: FromStr>(value: &str) -> Result<T, RioError>
where
    T::Err: Display,
{
    value
        .parse::<T>()
        .map_err(|e| RioError::InvalidParameter(format!("cannot parse '{value}': {e}")))
}

fn read_value<T: Element + Display>(session: &Session, handle: u32) -> Result<String, RioError> {
    Ok(session.read::<T>(handle)?.to_string())
}

fn write_value<T: Element + FromStr>(
    session: &Session,
    handle: u32,
    value: &str,
) -> Result<(), RioError>
where
    T::Err: Display,
{
    session.write(handle, parse::<T>(value)?)
}

fn read_register(
    session: &Session,
    register: &RegisterInfo,
    handle: u32,
) -> Result<String, RioError> {
    let ty = register.ty();
    match (ty.logical_bits(), ty.is_signed()) {
        (1, _) => Ok(bool::from(session.read::<FpgaBool>(handle)?).to_string()),
        (8, true) => read_value::<i8>(session, handle),
        (8, false) => read_value::<u8>(session, handle),
        (16, true) => read_value::<i16>(session, handle),
        (16, false) => read_value::<u16>(session, handle),
        (32, false) => read_value::<u32>(session, handle),
        (64, false) => read_value::<u64>(session, handle),
        // I32 and Sgl share a shape, so both readings are shown
        (32, true) => {
            let raw = session.read::<i32>(handle)?;
            Ok(format!("{raw} (as Sgl: {})", f32::from_bits(raw as u32)))
        }
        (64, true) => {
            let raw = session.read::<i64>(handle)?;
            Ok(format!("{raw} (as Dbl: {})", f64::from_bits(raw as u64)))
        }
        _ => Err(RioError::FeatureNotSupported(format!(
            "'{}' has unsupported type {}",
            register.name(),
            ty.describe()
        ))),
    }
}

fn write_register(
    session: &Session,
    register: &RegisterInfo,
    handle: u32,
    value: &str,
) -> Result<(), RioError> {
    let ty = register.ty();
    match (ty.logical_bits(), ty.is_signed()) {
        (1, _) => session.write(handle, FpgaBool::from(parse::<bool>(value)?)),
        (8, true) => write_value::<i8>(session, handle, value),
        (8, false) => write_value::<u8>(session, handle, value),
        (16, true) => write_value::<i16>(session, handle, value),
        (16, false) => write_value::<u16>(session, handle, value),
        (32, false) => write_value::<u32>(session, handle, value),
        (64, false) => write_value::<u64>(session, handle, value),
        // integers first, anything else that parses as a float goes in as Sgl/Dbl
        (32, true) => match value.parse::<i32>() {
            Ok(v) => session.write(handle, v),
            Err(_) => write_value::<f32>(session, handle, value),
        },
        (64, true) => match value.parse::<i64>() {
            Ok(v) => session.write(handle, v),
            Err(_) => write_value::<f64>(session, handle, value),
        },
        _ => Err(RioError::FeatureNotSupported(format!(
            "'{}' has unsupported type {}",
            register.name(),
            ty.describe()
        ))),
    }
}

/// Argument parser for the read command
pub fn read_handler(device: &str, bitfile: &Path, name: &str) -> Result<String, RioError> {
    let session = open(device, bitfile)?;
    let (register, handle) = scalar_register(&session, name)?;
    let value = read_register(&session, &register, handle)?;
    session.close(false)?;
    Ok(format!("{name} = {value}"))
}

/// Argument parser for the write command
pub fn write_handler(
    device: &str,
    bitfile: &Path,
    name: &str,
    value: &str,
) -> Result<String, RioError> {
    let session = open(device, bitfile)?;
    let (register, handle) = scalar_register(&session, name)?;
    write_register(&session, &register, handle, value)?;
    session.close(false)?;
    Ok(format!("{name} <- {value}"))
}
