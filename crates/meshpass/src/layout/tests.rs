// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//! Tests for Layout.

use super::*;
use crate::datatype::PrimitiveKind;

/// Copy `src` through `layout` into a packed vector.
fn gather<T: Datatype + Copy + Default>(src: &[T], layout: &Layout<T>) -> Vec<T> {
    assert!(layout.fits(src.len()));
    let mut out = vec![T::default(); layout.element_count()];
    let packed = Layout::<T>::contiguous(out.len()).unwrap();
    unsafe {
        TypeMap::transfer(
            src.as_ptr().cast(),
            layout.type_map(),
            out.as_mut_ptr().cast(),
            packed.type_map(),
        )
    }
    .unwrap();
    out
}

#[test]
fn contiguous_bounds() {
    let l = Layout::<f64>::contiguous(5).unwrap();
    assert_eq!(l.element_count(), 5);
    assert_eq!(l.byte_extent(), 40);
    assert_eq!(l.extent().unwrap(), 5);
    assert_eq!(l.true_byte_extent(), 40);
    assert_eq!(l.type_map().blocks().len(), 1);
}

#[test]
fn empty_layout() {
    let l = Layout::<i32>::empty();
    assert!(l.is_empty());
    assert_eq!(l.byte_extent(), 0);
    assert!(l.fits(0));
    assert_eq!(l.primitive_count(), 0);

    let zero = Layout::<i32>::contiguous(0).unwrap();
    assert!(zero.is_empty());
    assert_eq!(zero.byte_extent(), 0);
}

#[test]
fn strided_normalizes_to_contiguous() {
    let l = Layout::<u16>::strided(4, 3, 3).unwrap();
    assert_eq!(l.shape(), &Shape::Contiguous { count: 12 });
    let single = Layout::<u16>::strided(1, 5, 100).unwrap();
    assert_eq!(single.shape(), &Shape::Contiguous { count: 5 });
}

#[test]
fn strided_selects_columns() {
    // Column 1 of a 4x3 row-major matrix.
    let matrix: Vec<i32> = (0..12).collect();
    let column = Layout::<i32>::strided(4, 1, 3).unwrap();
    assert_eq!(column.element_count(), 4);
    assert_eq!(column.byte_extent(), 10 * 4);
    let shifted = Layout::<i32>::hindexed_of(&[(1, 4)], &column).unwrap();
    assert_eq!(gather(&matrix, &shifted), vec![1, 4, 7, 10]);
}

#[test]
fn strided_negative_stride_bounds() {
    let l = Layout::<f32>::strided(3, 1, -2).unwrap();
    assert_eq!(l.byte_lower_bound(), -16);
    assert_eq!(l.byte_upper_bound(), 4);
    assert_eq!(l.true_byte_lower_bound(), -16);
    assert!(!l.fits(100));
}

#[test]
fn indexed_scatter_pattern() {
    let l = Layout::<i32>::indexed(&[(1, 0), (2, 1), (3, 3)]).unwrap();
    assert_eq!(l.element_count(), 6);
    assert_eq!(l.byte_extent(), 24);
    assert!(l.fits(6));
    assert!(!l.fits(5));

    let src = [10, 11, 12, 13, 14, 15];
    assert_eq!(gather(&src, &l), vec![10, 11, 12, 13, 14, 15]);
}

#[test]
fn indexed_block_and_hindexed_block_agree() {
    let a = Layout::<u64>::indexed_block(2, &[0, 5, 9]).unwrap();
    let b = Layout::<u64>::hindexed_block(2, &[0, 40, 72]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.element_count(), 6);
    assert_eq!(a.upper_bound().unwrap(), 11);
}

#[test]
fn zero_length_blocks_do_not_move_bounds() {
    let l = Layout::<u8>::indexed(&[(0, 50), (2, 1)]).unwrap();
    assert_eq!(l.byte_lower_bound(), 1);
    assert_eq!(l.byte_upper_bound(), 3);
}

#[test]
fn subarray_row_major_block() {
    let l = Layout::<f64>::subarray(&[20, 8], &[11, 3], &[4, 2], Order::RowMajor).unwrap();
    assert_eq!(l.element_count(), 33);
    assert_eq!(l.byte_lower_bound(), 0);
    assert_eq!(l.byte_extent(), 160 * 8);
    assert_eq!(l.true_byte_lower_bound(), (4 * 8 + 2) * 8);
    assert_eq!(l.true_byte_upper_bound(), (14 * 8 + 5) * 8);
    assert_eq!(l.type_map().blocks().len(), 11);

    let src: Vec<f64> = (0..160).map(f64::from).collect();
    let picked = gather(&src, &l);
    assert_eq!(&picked[..3], &[34.0, 35.0, 36.0]);
    assert_eq!(&picked[30..], &[114.0, 115.0, 116.0]);
}

#[test]
fn subarray_column_major_block() {
    // 4x3 Fortran array: element (i, j) at i + 4 * j.
    let l = Layout::<i32>::subarray(&[4, 3], &[2, 2], &[1, 1], Order::ColumnMajor).unwrap();
    let src: Vec<i32> = (0..12).collect();
    assert_eq!(gather(&src, &l), vec![5, 6, 9, 10]);
    assert_eq!(l.extent().unwrap(), 12);
}

#[test]
fn subarray_validation() {
    let cases: [(&[usize], &[usize], &[usize]); 4] = [
        (&[], &[], &[]),
        (&[4, 4], &[5, 1], &[0, 0]),
        (&[4, 4], &[2, 2], &[3, 0]),
        (&[4, 4], &[2], &[0, 0]),
    ];
    for (sizes, subsizes, starts) in cases {
        let err = Layout::<u8>::subarray(sizes, subsizes, starts, Order::RowMajor).unwrap_err();
        assert!(matches!(err, Error::InvalidLayout(_)), "{:?}", err);
    }

    let dims = vec![SubarrayDim::new(2, 1, 0); crate::config::MAX_SUBARRAY_DIMS + 1];
    assert!(Layout::<u8>::subarray_dims(&dims, Order::RowMajor).is_err());
}

#[test]
fn start_overflow_is_rejected() {
    let err = Layout::<u8>::subarray(&[4], &[1], &[usize::MAX], Order::RowMajor).unwrap_err();
    assert!(matches!(err, Error::InvalidLayout(_)));
}

#[test]
fn resize_is_idempotent() {
    let base = Layout::<f64>::strided(2, 1, 4).unwrap();
    let once = base.resize(0, 2).unwrap();
    let twice = once.resize(0, 2).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.element_count(), base.element_count());
    assert_eq!(twice.byte_extent(), 16);
    assert_eq!(twice.true_byte_extent(), base.true_byte_extent());

    let moved = once.byte_resize(-8, 40).unwrap();
    assert_eq!(moved.byte_lower_bound(), -8);
    assert_eq!(moved.lower_bound().unwrap(), -1);
}

#[test]
fn extent_must_be_whole_elements() {
    let l = Layout::<f64>::contiguous(1).unwrap().byte_resize(0, 12).unwrap();
    let err = l.extent().unwrap_err();
    assert!(matches!(err, Error::InvalidDatatypeBound(_)));
    assert_eq!(l.byte_extent(), 12);
}

#[test]
fn nested_layouts_compose() {
    // Every other pair out of a row of 8, repeated over 3 rows.
    let pairs = Layout::<u32>::strided(2, 2, 4).unwrap().resize(0, 8).unwrap();
    let rows = Layout::contiguous_of(3, &pairs).unwrap();
    assert!(rows.is_nested());
    assert_eq!(rows.element_count(), 12);
    assert_eq!(rows.byte_extent(), 3 * 8 * 4);

    let src: Vec<u32> = (0..24).collect();
    let picked = gather(&src, &rows);
    assert_eq!(&picked[..4], &[0, 1, 4, 5]);
    assert_eq!(&picked[8..], &[16, 17, 20, 21]);
}

#[test]
fn layout_over_records() {
    let l = Layout::<(u8, f64)>::strided(3, 1, 2).unwrap();
    assert_eq!(l.element_count(), 3);
    assert_eq!(l.primitive_count(), 6);
    let kinds: Vec<_> = l.type_map().blocks().iter().map(|b| b.kind).collect();
    assert_eq!(kinds[0], PrimitiveKind::U8);
    assert_eq!(kinds[1], PrimitiveKind::F64);
}

#[test]
fn randomized_indexed_matches_manual_gather() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..200 {
        let nblocks = rng.usize(1..6);
        let blocks: Vec<(usize, isize)> = (0..nblocks)
            .map(|_| (rng.usize(0..4), rng.isize(0..32)))
            .collect();
        let layout = Layout::<i64>::indexed(&blocks).unwrap();

        let src: Vec<i64> = (0..40).collect();
        let expected: Vec<i64> = blocks
            .iter()
            .flat_map(|&(len, disp)| (0..len).map(move |k| disp as i64 + k as i64))
            .collect();
        assert_eq!(layout.element_count(), expected.len());
        assert_eq!(gather(&src, &layout), expected);
    }
}

#[test]
fn layouts_container() {
    let mut ls = Layouts::<f32>::with_len(2);
    assert_eq!(ls.len(), 2);
    assert!(ls[0].is_empty());
    ls[1] = Layout::contiguous(4).unwrap();
    ls.push_back(Layout::contiguous(1).unwrap());
    assert_eq!(ls.iter().map(Layout::element_count).sum::<usize>(), 5);

    let mut d = Displacements::zeros(2);
    d.push(64);
    d[0] = 8;
    assert_eq!(d.as_slice(), &[8, 0, 64]);
}

#[test]
fn oversized_layouts_are_rejected() {
    let err = Layout::<f64>::contiguous(usize::MAX / 4).unwrap_err();
    assert!(matches!(err, Error::InvalidLayout(_)));
    let err = Layout::<u8>::hindexed(&[(1, isize::MAX)]).unwrap_err();
    assert!(matches!(err, Error::InvalidLayout(_)));

    assert!(matches!(
        Layout::<u32>::strided(2, 1, isize::MAX),
        Err(Error::InvalidLayout(_))
    ));
    assert!(matches!(
        Layout::<u16>::strided(usize::MAX / 2, 1, 3),
        Err(Error::InvalidLayout(_))
    ));
    assert!(matches!(
        Layout::<u8>::hindexed_block(4, &[0, isize::MAX - 2]),
        Err(Error::InvalidLayout(_))
    ));

    let wide = Layout::<u8>::hindexed(&[(1, isize::MAX - 1)]).unwrap();
    assert_eq!(wide.true_byte_upper_bound(), isize::MAX);
    assert!(matches!(
        Layout::contiguous_of(2, &wide),
        Err(Error::InvalidLayout(_))
    ));
    assert!(matches!(
        Layout::<u64>::contiguous(1).unwrap().byte_resize(isize::MAX, 8),
        Err(Error::InvalidLayout(_))
    ));
}

#[test]
fn byte_offsets_cannot_split_char_or_bool() {
    let err = Layout::<char>::hindexed(&[(1, 1)]).unwrap_err();
    assert!(matches!(err, Error::InvalidLayout(_)));
    assert!(Layout::<char>::hindexed(&[(1, 4), (2, 12)]).is_ok());
    assert!(Layout::<char>::hindexed_block(1, &[0, 6]).is_err());
    assert!(Layout::<bool>::hindexed_block(1, &[0, 3]).is_ok());

    // Types whose every bit pattern is valid take any byte offset.
    assert!(Layout::<u32>::hindexed(&[(1, 1)]).is_ok());
    assert!(Layout::<f64>::hindexed_block(1, &[3]).is_ok());

    let pair = Layout::<(u32, char)>::contiguous(1).unwrap();
    assert!(Layout::<(u32, char)>::hindexed(&[(1, 4)]).is_err());
    assert!(Layout::hindexed_of(&[(1, 4)], &pair).is_err());
    assert!(Layout::hindexed_of(&[(1, 16)], &pair).is_ok());

    let chars = Layout::<char>::contiguous(2).unwrap();
    assert!(matches!(chars.byte_resize(0, 6), Err(Error::InvalidLayout(_))));
    assert!(matches!(chars.byte_resize(2, 8), Err(Error::InvalidLayout(_))));
    assert_eq!(chars.byte_resize(-4, 12).unwrap().lower_bound().unwrap(), -1);
    assert!(Layout::<u32>::contiguous(2).unwrap().byte_resize(0, 6).is_ok());
}
