// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::float_cmp)] // Exact values are sent and received
#![allow(clippy::cast_precision_loss)] // Test data conversions
#![allow(clippy::cast_possible_wrap)] // Test indices

//! Layout transfer integration tests.
//!
//! Data leaves the sender through one layout and lands through another;
//! only the type signatures have to agree.

use meshpass::{
    Datatype, Error, Layout, LocalFabric, Order, RecordBuilder, Result, Source, Status, Tag,
    TypeDescriptor,
};

const TAG: Tag = Tag::new(3);

/// Run a two-rank exchange: rank 0 runs `send`, rank 1 runs `recv` and its
/// result is returned.
fn exchange<R, S, V>(send: S, recv: V) -> Result<R>
where
    R: Send,
    S: Fn(&meshpass::Communicator) -> Result<()> + Sync,
    V: Fn(&meshpass::Communicator) -> Result<R> + Sync,
{
    let mut results = LocalFabric::run(2, |comm| -> Result<Option<R>> {
        if comm.rank() == 0 {
            send(&comm)?;
            Ok(None)
        } else {
            recv(&comm).map(Some)
        }
    })?;
    let received = results.pop().ok_or(Error::InvalidState("no rank 1".into()))??;
    results
        .pop()
        .ok_or(Error::InvalidState("no rank 0".into()))??;
    received.ok_or(Error::InvalidState("rank 1 returned nothing".into()))
}

#[test]
fn test_indexed_gather_into_contiguous() {
    let got = exchange(
        |comm| {
            let data: Vec<i32> = (0..10).collect();
            let picks = Layout::<i32>::indexed(&[(1, 0), (2, 2), (3, 6)])?;
            comm.send_with(&data, &picks, 1, TAG)
        },
        |comm| {
            let mut out = [0i32; 6];
            let st = comm.recv_with(&mut out, &Layout::contiguous(6)?, Source::Rank(0), TAG)?;
            assert_eq!(st.count::<i32>(), Some(6));
            Ok(out)
        },
    )
    .unwrap();
    assert_eq!(got, [0, 2, 3, 6, 7, 8]);
}

#[test]
fn test_contiguous_scatter_into_indexed() {
    let got = exchange(
        |comm| comm.send_with(&[10i32, 20, 30, 40, 50, 60], &Layout::contiguous(6)?, 1, TAG),
        |comm| {
            let mut out = [0i32; 6];
            let blocks = Layout::<i32>::indexed(&[(1, 0), (2, 1), (3, 3)])?;
            comm.recv_with(&mut out, &blocks, Source::Rank(0), TAG)?;
            Ok(out)
        },
    )
    .unwrap();
    assert_eq!(got[0], 10);
    assert_eq!(got[1..3], [20, 30]);
    assert_eq!(got[3..6], [40, 50, 60]);
}

#[test]
fn test_contiguous_scatter_into_indexed_block() {
    let got = exchange(
        |comm| comm.send_with(&[1u8, 2, 3, 4], &Layout::contiguous(4)?, 1, TAG),
        |comm| {
            let mut out = [0u8; 8];
            let spread = Layout::<u8>::indexed_block(2, &[6, 1])?;
            comm.recv_with(&mut out, &spread, Source::Any, Tag::any())?;
            Ok(out)
        },
    )
    .unwrap();
    assert_eq!(got, [0, 3, 4, 0, 0, 0, 1, 2]);
}

#[test]
fn test_row_major_subarray_round_trip() {
    let (rows, cols) = (20usize, 8usize);
    let block = || Layout::<f64>::subarray(&[rows, cols], &[11, 3], &[4, 2], Order::RowMajor);

    let got = exchange(
        |comm| {
            let grid: Vec<f64> = (0..rows * cols).map(|i| i as f64).collect();
            comm.send_with(&grid, &block()?, 1, TAG)
        },
        |comm| {
            let mut grid = vec![-1.0f64; rows * cols];
            let st = comm.recv_with(&mut grid, &block()?, Source::Rank(0), TAG)?;
            assert_eq!(st.count::<f64>(), Some(33));
            Ok(grid)
        },
    )
    .unwrap();

    for r in 0..rows {
        for c in 0..cols {
            let i = r * cols + c;
            let inside = (4..15).contains(&r) && (2..5).contains(&c);
            let expected = if inside { i as f64 } else { -1.0 };
            assert_eq!(got[i], expected, "row {} col {}", r, c);
        }
    }
}

#[test]
fn test_column_major_subarray_packs_fastest_dimension_first() {
    let got = exchange(
        |comm| {
            // 4 x 3 column-major: element (i, j) lives at i + 4 * j.
            let grid: Vec<i64> = (0..12).collect();
            let block = Layout::<i64>::subarray(&[4, 3], &[2, 2], &[1, 1], Order::ColumnMajor)?;
            comm.send_with(&grid, &block, 1, TAG)
        },
        |comm| {
            let mut packed = [0i64; 4];
            comm.recv_with(&mut packed, &Layout::contiguous(4)?, Source::Rank(0), TAG)?;
            Ok(packed)
        },
    )
    .unwrap();
    assert_eq!(got, [5, 6, 9, 10]);
}

#[test]
fn test_strided_columns_of_nested_layout() {
    // Two columns of a 3 x 4 row-major matrix, sent as one message.
    let got = exchange(
        |comm| {
            let m: Vec<u16> = (0..12).collect();
            let column = Layout::<u16>::strided(3, 1, 4)?.resize(0, 1)?;
            let two = Layout::contiguous_of(2, &column)?;
            comm.send_with(&m, &two, 1, TAG)
        },
        |comm| {
            let mut out = [0u16; 6];
            comm.recv_with(&mut out, &Layout::contiguous(6)?, Source::Rank(0), TAG)?;
            Ok(out)
        },
    )
    .unwrap();
    assert_eq!(got, [0, 4, 8, 1, 5, 9]);
}

#[test]
fn test_signature_mismatch_fails_both_sides() {
    let results = LocalFabric::run(2, |comm| -> Result<()> {
        if comm.rank() == 0 {
            comm.send(&1.5f64, 1, TAG)
        } else {
            let mut x = 0i64;
            comm.recv(&mut x, Source::Rank(0), TAG).map(|_| ())
        }
    })
    .unwrap();
    assert!(results.iter().all(|r| matches!(r, Err(Error::TypeMismatch))));
}

#[test]
fn test_short_receive_truncates_without_writing() {
    let results = LocalFabric::run(2, |comm| -> Result<[u32; 2]> {
        let mut out = [9u32; 2];
        if comm.rank() == 0 {
            comm.send_with(&[1u32, 2, 3], &Layout::contiguous(3)?, 1, TAG)?;
        } else {
            let err = comm
                .recv_with(&mut out, &Layout::contiguous(2)?, Source::Rank(0), TAG)
                .unwrap_err();
            assert!(matches!(err, Error::Truncated { sent: 3, capacity: 2 }));
        }
        Ok(out)
    })
    .unwrap();
    assert!(matches!(results[0], Err(Error::Truncated { .. })));
    assert_eq!(*results[1].as_ref().unwrap(), [9, 9]);
}

#[test]
fn test_longer_receive_reports_actual_count() {
    let got: Status = exchange(
        |comm| comm.send_with(&[1i16, 2], &Layout::contiguous(2)?, 1, TAG),
        |comm| {
            let mut out = [0i16; 5];
            let st = comm.recv_with(&mut out, &Layout::contiguous(5)?, Source::Rank(0), TAG)?;
            assert_eq!(out, [1, 2, 0, 0, 0]);
            Ok(st)
        },
    )
    .unwrap();
    assert_eq!(got.count::<i16>(), Some(2));
    assert_eq!(got.byte_count(), 4);
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Reading {
    sensor: u16,
    value: f64,
    flags: [u8; 3],
}

unsafe impl Datatype for Reading {
    fn build_descriptor() -> Result<TypeDescriptor> {
        RecordBuilder::new::<Reading>("Reading")
            .field::<u16>("sensor", core::mem::offset_of!(Reading, sensor))
            .field::<f64>("value", core::mem::offset_of!(Reading, value))
            .field::<[u8; 3]>("flags", core::mem::offset_of!(Reading, flags))
            .build()
    }
}

#[test]
fn test_records_through_strided_layout() {
    let got = exchange(
        |comm| {
            let readings: Vec<Reading> = (0..6)
                .map(|i| Reading {
                    sensor: i,
                    value: f64::from(i) * 0.5,
                    flags: [i as u8; 3],
                })
                .collect();
            // Every other reading.
            comm.send_with(&readings, &Layout::strided(3, 1, 2)?, 1, TAG)
        },
        |comm| {
            let mut out = [Reading::default(); 3];
            let st = comm.recv_with(&mut out, &Layout::contiguous(3)?, Source::Rank(0), TAG)?;
            assert_eq!(st.count::<Reading>(), Some(3));
            Ok(out)
        },
    )
    .unwrap();
    assert_eq!(got.iter().map(|r| r.sensor).collect::<Vec<_>>(), vec![0, 2, 4]);
    assert_eq!(got[2].value, 2.0);
    assert_eq!(got[1].flags, [2, 2, 2]);
}

#[test]
fn test_layout_out_of_buffer_is_rejected_before_posting() {
    let fabric = LocalFabric::new(2).unwrap();
    let comm = fabric.communicator(0).unwrap();
    let data = [0.0f32; 10];
    let too_far = Layout::<f32>::indexed(&[(2, 9)]).unwrap();
    assert!(matches!(
        comm.send_with(&data, &too_far, 1, TAG),
        Err(Error::InvalidLayout(_))
    ));
    let negative = Layout::<f32>::indexed(&[(1, -1)]).unwrap();
    assert!(!negative.fits(data.len()));
    assert_eq!(fabric.queue_depth(1), Some((0, 0)));
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Sample {
    id: u32,
    level: f32,
}

unsafe impl Datatype for Sample {
    fn build_descriptor() -> Result<TypeDescriptor> {
        RecordBuilder::new::<Sample>("Sample")
            .field::<u32>("id", core::mem::offset_of!(Sample, id))
            .field::<f32>("level", core::mem::offset_of!(Sample, level))
            .build()
    }
}

/// Send `value` from rank 0 and receive it into a default `T` on rank 1.
fn round_trip<T>(value: T) -> T
where
    T: Datatype + Copy + Default,
{
    exchange(
        move |comm| comm.send(&value, 1, TAG),
        |comm| {
            let mut got = T::default();
            let st = comm.recv(&mut got, Source::Rank(0), TAG)?;
            assert_eq!(st.count::<T>(), Some(1));
            Ok(got)
        },
    )
    .unwrap()
}

#[test]
fn test_single_values_of_every_kind_round_trip() {
    assert_eq!(round_trip(-42i32), -42);
    assert_eq!(round_trip(u64::MAX - 7), u64::MAX - 7);
    assert_eq!(round_trip(1.25f32), 1.25);
    assert_eq!(round_trip(-6.5e23f64), -6.5e23);
    assert_eq!(round_trip('\u{10FFFF}'), '\u{10FFFF}');
    assert_eq!(round_trip('ß'), 'ß');
    assert!(round_trip(true));

    let sample = Sample { id: 7, level: 0.5 };
    assert_eq!(round_trip(sample), sample);
}

#[test]
fn test_chars_land_on_whole_slots() {
    assert!(matches!(
        Layout::<char>::hindexed(&[(1, 1)]),
        Err(Error::InvalidLayout(_))
    ));
    let got = exchange(
        |comm| comm.send(&'\u{10FFFF}', 1, TAG),
        |comm| {
            let mut out = ['\0'; 2];
            let second = Layout::<char>::hindexed(&[(1, 4)])?;
            comm.recv_with(&mut out, &second, Source::Rank(0), TAG)?;
            Ok(out)
        },
    )
    .unwrap();
    assert_eq!(got, ['\0', '\u{10FFFF}']);
}
