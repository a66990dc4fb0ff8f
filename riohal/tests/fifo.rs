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

use common::{COMMANDS, SAMPLES, device, open_counter};
use googletest::prelude::*;
use riohal::devices::device::{Device, ViControl};
use riohal::devices::mock::MockDevice;
use riohal::timer::Timeout;
use rstest::rstest;

const WAIT: Timeout = Timeout::Millis(200);

#[gtest]
#[rstest]
fn configured_depth_is_a_whole_number_of_pages(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    expect_that!(session.configure_fifo(SAMPLES, 1000), ok(eq(&1024)));
    for requested in [1, 3, 1023, 1025, 4096, 10_000] {
        let depth = session.configure_fifo(SAMPLES, requested)?;
        expect_that!(depth, ge(requested));
        expect_that!((depth * 4) % 4096, eq(0));
    }
    Ok(())
}

#[gtest]
#[rstest]
fn second_start_changes_nothing(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    session.start_fifo(SAMPLES)?;
    let fifo = session.fifo(SAMPLES)?;
    let (depth, next) = (fifo.depth(), fifo.next());
    expect_that!(session.start_fifo(SAMPLES), ok(eq(&())));
    expect_that!(fifo.is_started(), eq(true));
    expect_that!(fifo.depth(), eq(depth));
    expect_that!(fifo.next(), eq(next));
    expect_that!(fifo.acquired(), eq(0));
    Ok(())
}

#[gtest]
#[rstest]
fn releasing_more_than_acquired_fails(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    device.push_fifo_data(SAMPLES, &[0u32; 8]);
    let mut nothing = session.acquire_fifo_read::<u32>(SAMPLES, 0, WAIT)?;
    expect_that!(
        session.release_fifo(SAMPLES, &mut nothing, 1),
        err(displays_as(contains_substring("RioError::BadReadWriteCount")))
    );
    let mut elements = session.acquire_fifo_read::<u32>(SAMPLES, 5, WAIT)?;
    session.release_fifo(SAMPLES, &mut elements, 2)?;
    expect_that!(elements.len(), eq(3));
    expect_that!(
        session.release_fifo(SAMPLES, &mut elements, 4),
        err(displays_as(contains_substring("RioError::BadReadWriteCount")))
    );
    session.release_fifo(SAMPLES, &mut elements, 3)?;
    expect_that!(
        session.release_fifo(SAMPLES, &mut elements, 1),
        err(displays_as(contains_substring("RioError::BadReadWriteCount")))
    );
    expect_that!(session.release_fifo(SAMPLES, &mut elements, 0), ok(eq(&())));
    expect_that!(session.fifo(SAMPLES)?.acquired(), eq(0));
    Ok(())
}

#[gtest]
#[rstest]
fn acquire_then_release_restores_the_count(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    let fifo = session.fifo(SAMPLES)?;
    device.push_fifo_data(SAMPLES, &[10u32, 11, 12, 13, 14, 15]);

    let mut elements = session.acquire_fifo_read::<u32>(SAMPLES, 4, WAIT)?;
    expect_that!(elements.elements(), eq(&[10u32, 11, 12, 13][..]));
    expect_that!(elements.remaining(), eq(2));
    expect_that!(fifo.acquired(), eq(4));
    expect_that!(fifo.next(), eq(4));

    session.release_fifo(SAMPLES, &mut elements, 4)?;
    expect_that!(elements.is_empty(), eq(true));
    expect_that!(fifo.acquired(), eq(0));
    expect_that!(fifo.next(), eq(4));
    Ok(())
}

#[gtest]
#[rstest]
fn acquire_stops_at_the_end_of_the_ring(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    let depth = session.configure_fifo(SAMPLES, 1024)?;
    let values: Vec<u32> = (0..depth as u32 + 2).collect();
    device.push_fifo_data(SAMPLES, &values);

    let mut first = session.acquire_fifo_read::<u32>(SAMPLES, depth - 1, WAIT)?;
    expect_that!(first.len(), eq(depth - 1));
    let mut second = session.acquire_fifo_read::<u32>(SAMPLES, 2, WAIT)?;
    expect_that!(second.len(), eq(1));
    expect_that!(second.elements(), eq(&[depth as u32 - 1][..]));
    expect_that!(session.fifo(SAMPLES)?.next(), eq(0));

    session.release_fifo(SAMPLES, &mut first, depth - 1)?;
    session.release_fifo(SAMPLES, &mut second, 1)?;
    let third = session.acquire_fifo_read::<u32>(SAMPLES, 2, WAIT)?;
    expect_that!(third.elements(), eq(&[depth as u32, depth as u32 + 1][..]));
    Ok(())
}

#[gtest]
#[rstest]
fn acquiring_past_the_depth_is_refused(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    let depth = session.configure_fifo(SAMPLES, 1024)?;
    expect_that!(
        session.acquire_fifo_read::<u32>(SAMPLES, depth + 1, WAIT).err(),
        some(displays_as(contains_substring("RioError::BadReadWriteCount")))
    );

    device.push_fifo_data(SAMPLES, &vec![0u32; depth + 1]);
    session.acquire_fifo_read::<u32>(SAMPLES, depth - 24, WAIT)?;
    session.acquire_fifo_read::<u32>(SAMPLES, 24, WAIT)?;
    expect_that!(
        session.acquire_fifo_read::<u32>(SAMPLES, 1, WAIT).err(),
        some(displays_as(contains_substring(
            "RioError::ElementsNotPermissibleToBeAcquired"
        )))
    );
    Ok(())
}

#[gtest]
#[rstest]
fn stop_refuses_while_elements_are_held(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    let fifo = session.fifo(SAMPLES)?;
    let depth = fifo.configure(1024)?;
    device.push_fifo_data(SAMPLES, &[1u32, 2, 3]);
    session.acquire_fifo_read::<u32>(SAMPLES, 3, WAIT)?;

    expect_that!(
        session.stop_fifo(SAMPLES),
        err(displays_as(contains_substring(
            "RioError::FifoElementsCurrentlyAcquired"
        )))
    );
    expect_that!(fifo.acquired(), eq(3));

    fifo.set_stopped();
    expect_that!(fifo.acquired(), eq(0));
    expect_that!(fifo.is_configured(), eq(false));
    expect_that!(fifo.depth(), eq(depth));
    expect_that!(device.is_fifo_reserved(SAMPLES), eq(false));
    expect_that!(session.stop_fifo(SAMPLES), ok(eq(&())));
    Ok(())
}

#[gtest]
#[rstest]
fn reset_behind_the_engine_is_retried_once(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    session.start_fifo(SAMPLES)?;
    device.control(ViControl::Reset)?;
    device.push_fifo_data(SAMPLES, &[7u32, 8]);

    let elements = session.acquire_fifo_read::<u32>(SAMPLES, 2, WAIT)?;
    expect_that!(elements.elements(), eq(&[7u32, 8][..]));
    expect_that!(session.fifo(SAMPLES)?.is_started(), eq(true));
    Ok(())
}

#[gtest]
#[rstest]
fn aborted_poll_is_retried_once(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    session.start_fifo(SAMPLES)?;
    device.inject_fifo_abort(SAMPLES);
    device.push_fifo_data(SAMPLES, &[5u32, 6, 7]);

    let mut data = [0u32; 2];
    expect_that!(session.read_fifo(SAMPLES, &mut data, 2, WAIT), ok(eq(&1)));
    expect_that!(data, eq([5, 6]));
    Ok(())
}

#[gtest]
#[rstest]
fn reset_before_the_lazy_start_is_recovered(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    session.configure_fifo(SAMPLES, 1024)?;
    device.control(ViControl::Reset)?;
    device.push_fifo_data(SAMPLES, &[1u32, 2, 3]);

    let mut data = [0u32; 2];
    expect_that!(session.read_fifo(SAMPLES, &mut data, 2, WAIT), ok(eq(&1)));
    expect_that!(data, eq([1, 2]));
    expect_that!(session.fifo(SAMPLES)?.is_started(), eq(true));

    session.stop_fifo(SAMPLES)?;
    session.configure_fifo(SAMPLES, 1024)?;
    device.control(ViControl::Reset)?;
    let elements = session.acquire_fifo_read::<u32>(SAMPLES, 1, WAIT)?;
    expect_that!(elements.elements(), eq(&[3u32][..]));
    Ok(())
}

#[gtest]
#[rstest]
fn reconfiguring_after_a_reset_binds_a_new_ring(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    session.configure_fifo(SAMPLES, 1024)?;
    device.control(ViControl::Reset)?;

    expect_that!(session.configure_fifo(SAMPLES, 2048), ok(eq(&2048)));
    let fifo = session.fifo(SAMPLES)?;
    expect_that!(fifo.depth(), eq(2048));
    expect_that!(fifo.is_configured(), eq(true));
    device.push_fifo_data(SAMPLES, &[9u32]);
    let elements = session.acquire_fifo_read::<u32>(SAMPLES, 1, WAIT)?;
    expect_that!(elements.elements(), eq(&[9u32][..]));
    Ok(())
}

#[gtest]
#[rstest]
fn failed_configure_leaves_the_fifo_unconfigured(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    session.configure_fifo(SAMPLES, 1024)?;
    // far beyond any address space
    expect_that!(
        session.configure_fifo(SAMPLES, 1 << 56),
        err(displays_as(contains_substring("RioError::MemoryFull")))
    );
    let fifo = session.fifo(SAMPLES)?;
    expect_that!(fifo.is_configured(), eq(false));
    expect_that!(fifo.depth(), eq(1024));
    expect_that!(device.is_fifo_reserved(SAMPLES), eq(false));

    device.push_fifo_data(SAMPLES, &[4u32]);
    let elements = session.acquire_fifo_read::<u32>(SAMPLES, 1, WAIT)?;
    expect_that!(elements.elements(), eq(&[4u32][..]));
    Ok(())
}

#[gtest]
#[rstest]
fn aborted_copy_is_retried_once(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    session.start_fifo(SAMPLES)?;
    device.push_fifo_data(SAMPLES, &[5u32, 6, 7]);
    device.inject_fifo_copy_abort(SAMPLES);
    let mut data = [0u32; 2];
    expect_that!(session.read_fifo(SAMPLES, &mut data, 2, WAIT), ok(eq(&1)));
    expect_that!(data, eq([5, 6]));

    let depth = session.fifo(COMMANDS)?.depth();
    session.start_fifo(COMMANDS)?;
    device.inject_fifo_copy_abort(COMMANDS);
    expect_that!(
        session.write_fifo(COMMANDS, &[1i16, -2], 2, WAIT),
        ok(eq(&(depth - 2)))
    );
    expect_that!(device.received_fifo_data::<i16>(COMMANDS), eq(&vec![1, -2]));
    Ok(())
}

#[gtest]
#[rstest]
fn released_elements_are_cut_off_the_window(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    let depth = session.configure_fifo(COMMANDS, 1024)?;
    let mut first = session.acquire_fifo_write::<i16>(COMMANDS, depth, WAIT)?;
    first.elements_mut()[0] = 42;
    session.release_fifo(COMMANDS, &mut first, depth)?;
    expect_that!(first.is_empty(), eq(true));
    expect_that!(first.elements_mut().len(), eq(0));

    let mut second = session.acquire_fifo_write::<i16>(COMMANDS, depth, WAIT)?;
    expect_that!(second.len(), eq(depth));
    second.elements_mut()[0] = 7;
    expect_that!(first.elements(), is_empty());
    expect_that!(
        session.release_fifo(COMMANDS, &mut first, 1),
        err(displays_as(contains_substring("RioError::BadReadWriteCount")))
    );
    Ok(())
}

#[gtest]
#[rstest]
fn windows_are_released_in_acquisition_order(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    device.push_fifo_data(SAMPLES, &[1u32, 2, 3, 4]);
    let mut older = session.acquire_fifo_read::<u32>(SAMPLES, 2, WAIT)?;
    let mut newer = session.acquire_fifo_read::<u32>(SAMPLES, 2, WAIT)?;

    expect_that!(
        session.release_fifo(SAMPLES, &mut newer, 2),
        err(displays_as(contains_substring("RioError::InvalidParameter")))
    );
    expect_that!(newer.elements(), eq(&[3u32, 4][..]));
    expect_that!(
        session.release_fifo(COMMANDS, &mut older, 2),
        err(displays_as(contains_substring("RioError::InvalidParameter")))
    );
    session.release_fifo(SAMPLES, &mut older, 2)?;
    session.release_fifo(SAMPLES, &mut newer, 2)?;
    expect_that!(session.fifo(SAMPLES)?.acquired(), eq(0));
    Ok(())
}

#[gtest]
#[rstest]
fn windows_from_before_a_stop_release_nothing(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    device.push_fifo_data(SAMPLES, &[1u32, 2, 3]);
    let mut stale = session.acquire_fifo_read::<u32>(SAMPLES, 2, WAIT)?;
    session.abort()?;

    let mut fresh = session.acquire_fifo_read::<u32>(SAMPLES, 1, WAIT)?;
    expect_that!(session.release_fifo(SAMPLES, &mut stale, 2), ok(eq(&())));
    expect_that!(stale.is_empty(), eq(true));
    expect_that!(session.fifo(SAMPLES)?.acquired(), eq(1));
    session.release_fifo(SAMPLES, &mut fresh, 1)?;
    expect_that!(session.fifo(SAMPLES)?.acquired(), eq(0));
    Ok(())
}

#[gtest]
#[rstest]
fn abort_seen_on_release_is_reported_once(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    device.push_fifo_data(SAMPLES, &[1u32, 2]);
    let mut held = session.acquire_fifo_read::<u32>(SAMPLES, 2, WAIT)?;
    device.inject_fifo_abort(SAMPLES);

    expect_that!(session.release_fifo(SAMPLES, &mut held, 2), ok(eq(&())));
    expect_that!(held.is_empty(), eq(true));
    expect_that!(session.fifo(SAMPLES)?.acquired(), eq(0));
    expect_that!(
        session.acquire_fifo_read::<u32>(SAMPLES, 1, WAIT).err(),
        some(displays_as(contains_substring("RioError::TransferAborted")))
    );

    device.push_fifo_data(SAMPLES, &[3u32]);
    let elements = session.acquire_fifo_read::<u32>(SAMPLES, 1, WAIT)?;
    expect_that!(elements.elements(), eq(&[3u32][..]));
    Ok(())
}

#[gtest]
#[rstest]
fn waits_are_bounded(device: MockDevice) {
    let session = open_counter(&device);
    expect_that!(
        session.acquire_fifo_read::<u32>(SAMPLES, 1, Timeout::Millis(20)).err(),
        some(displays_as(contains_substring("RioError::FifoTimeout")))
    );
    let mut data = [0u32; 1];
    expect_that!(
        session.read_fifo(SAMPLES, &mut data, 1, Timeout::Millis(20)),
        err(displays_as(contains_substring("RioError::FifoTimeout")))
    );
    expect_that!(
        session.read_fifo(SAMPLES, &mut data, 1, Timeout::Millis(0)),
        err(displays_as(contains_substring("RioError::FifoTimeout")))
    );
}

#[gtest]
#[rstest]
fn data_arriving_during_an_acquire_wakes_it(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    session.start_fifo(SAMPLES)?;
    let producer = device.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        producer.push_fifo_data(SAMPLES, &[42u32]);
    });
    let elements = session.acquire_fifo_read::<u32>(SAMPLES, 1, Timeout::Infinite)?;
    expect_that!(elements.elements(), eq(&[42u32][..]));
    expect_that!(handle.join().is_ok(), eq(true));
    Ok(())
}

#[gtest]
#[rstest]
fn read_copies_and_reports_the_rest(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    device.push_fifo_data(SAMPLES, &[1u32, 2, 3, 4, 5]);
    let mut data = [0u32; 4];
    expect_that!(session.read_fifo(SAMPLES, &mut data, 3, WAIT), ok(eq(&2)));
    expect_that!(data, eq([1, 2, 3, 0]));
    expect_that!(session.read_fifo(SAMPLES, &mut data, 0, WAIT), ok(eq(&2)));
    Ok(())
}

#[gtest]
#[rstest]
fn write_reaches_the_target(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    let depth = session.fifo(COMMANDS)?.depth();
    expect_that!(
        session.write_fifo(COMMANDS, &[1i16, -2, 3], 3, WAIT),
        ok(eq(&(depth - 3)))
    );
    expect_that!(device.received_fifo_data::<i16>(COMMANDS), eq(&vec![1, -2, 3]));
    Ok(())
}

#[gtest]
#[rstest]
fn acquired_write_elements_reach_the_target_on_release(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    let mut elements = session.acquire_fifo_write::<i16>(COMMANDS, 4, WAIT)?;
    elements.elements_mut().copy_from_slice(&[4, 3, 2, 1]);
    expect_that!(device.received_fifo_data::<i16>(COMMANDS), is_empty());
    session.release_fifo(COMMANDS, &mut elements, 4)?;
    expect_that!(device.received_fifo_data::<i16>(COMMANDS), eq(&vec![4, 3, 2, 1]));
    Ok(())
}

#[gtest]
#[rstest]
fn copying_while_elements_are_acquired_is_refused(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    device.push_fifo_data(SAMPLES, &[1u32, 2]);
    session.acquire_fifo_read::<u32>(SAMPLES, 1, WAIT)?;
    let mut data = [0u32; 1];
    expect_that!(
        session.read_fifo(SAMPLES, &mut data, 1, WAIT),
        err(displays_as(contains_substring(
            "RioError::FifoElementsCurrentlyAcquired"
        )))
    );
    Ok(())
}

#[gtest]
#[rstest]
fn copying_more_than_the_depth_is_refused(device: MockDevice) -> Result<()> {
    let session = open_counter(&device);
    let depth = session.configure_fifo(SAMPLES, 1024)?;
    let mut data = vec![0u32; depth + 1];
    expect_that!(
        session.read_fifo(SAMPLES, &mut data, depth + 1, WAIT),
        err(displays_as(contains_substring("RioError::BadReadWriteCount")))
    );
    Ok(())
}

#[gtest]
#[rstest]
fn second_session_cannot_take_a_reserved_fifo(device: MockDevice) -> Result<()> {
    let first = open_counter(&device);
    let second = open_counter(&device);
    first.start_fifo(SAMPLES)?;
    expect_that!(
        second.start_fifo(SAMPLES),
        err(displays_as(contains_substring("RioError::FifoReserved")))
    );
    first.stop_fifo(SAMPLES)?;
    expect_that!(second.start_fifo(SAMPLES), ok(eq(&())));
    Ok(())
}

#[gtest]
#[rstest]
#[case::just_past_the_end(2)]
#[case::far_past_the_end(9)]
fn unknown_fifo_numbers_are_invalid(device: MockDevice, #[case] fifo: u32) {
    let session = open_counter(&device);
    expect_that!(
        session.start_fifo(fifo),
        err(displays_as(contains_substring("RioError::InvalidParameter")))
    );
    expect_that!(
        session.configure_fifo(fifo, 16),
        err(displays_as(contains_substring("RioError::InvalidParameter")))
    );
}
