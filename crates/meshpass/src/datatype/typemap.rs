// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flattened type maps and the copy engine that moves data between them.
//!
//! A [`TypeMap`] is the ordered sequence of `(byte offset, primitive)` pairs a
//! descriptor or layout touches, stored as run-length coalesced [`Block`]s.
//! The order of the sequence is the *type signature*: two maps are
//! compatible when their primitive kinds agree position by position,
//! whatever the offsets.
//!
//! Alongside the data it tracks:
//! - `lb`/`ub`: the bounds used to stride repeated copies (`extent = ub - lb`),
//!   which a resize can move freely
//! - `true_lb`/`true_ub`: the span actually touched by data

use super::descriptor::PrimitiveKind;
use crate::error::{Error, Result};

/// A run of `count` consecutive primitives of one kind starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub offset: isize,
    pub kind: PrimitiveKind,
    pub count: usize,
}

impl Block {
    #[inline]
    fn byte_len(&self) -> usize {
        self.count * self.kind.size()
    }

    #[inline]
    fn end(&self) -> isize {
        self.offset + self.byte_len() as isize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMap {
    blocks: Vec<Block>,
    lb: isize,
    ub: isize,
    true_lb: isize,
    true_ub: isize,
    primitives: usize,
    bounded: bool,
}

/// Amount of data moved by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transferred {
    pub primitives: usize,
    pub bytes: usize,
}

impl TypeMap {
    /// Map with no data and zero extent.
    pub fn empty() -> Self {
        Self {
            blocks: Vec::new(),
            lb: 0,
            ub: 0,
            true_lb: 0,
            true_ub: 0,
            primitives: 0,
            bounded: false,
        }
    }

    /// A single primitive at offset zero.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        let size = kind.size() as isize;
        Self {
            blocks: vec![Block {
                offset: 0,
                kind,
                count: 1,
            }],
            lb: 0,
            ub: size,
            true_lb: 0,
            true_ub: size,
            primitives: 1,
            bounded: true,
        }
    }

    /// `count` copies of `inner`, the i-th shifted by `i * stride` bytes.
    pub fn repeat(inner: &TypeMap, count: usize, stride: isize) -> Result<Self> {
        if count > 0 && inner.is_dense_run() && stride == inner.extent() {
            let block = inner.blocks[0];
            let total = block
                .count
                .checked_mul(count)
                .ok_or_else(|| overflow("element count"))?;
            let span = total
                .checked_mul(block.kind.size())
                .and_then(|bytes| isize::try_from(bytes).ok())
                .ok_or_else(|| overflow("extent"))?;
            let mut out = Self::empty();
            out.push_block(block.offset, block.kind, total)?;
            out.lb = inner.lb;
            out.ub = inner.lb.checked_add(span).ok_or_else(|| overflow("extent"))?;
            out.bounded = true;
            return Ok(out);
        }

        if count > 0 {
            // Reject before copying anything if the last copy cannot be placed.
            let last = isize::try_from(count - 1)
                .ok()
                .and_then(|i| i.checked_mul(stride))
                .ok_or_else(|| overflow("displacement"))?;
            for bound in [inner.lb, inner.ub, inner.true_lb, inner.true_ub] {
                bound.checked_add(last).ok_or_else(|| overflow("displacement"))?;
            }
            inner
                .primitives
                .checked_mul(count)
                .ok_or_else(|| overflow("element count"))?;
        }

        let mut out = Self::empty();
        out.blocks.reserve(inner.blocks.len().min(64));
        let mut shift = 0isize;
        for i in 0..count {
            if i > 0 {
                shift = shift.checked_add(stride).ok_or_else(|| overflow("displacement"))?;
            }
            out.append_shifted(inner, shift)?;
        }
        Ok(out)
    }

    /// Append a copy of `other` displaced by `shift` bytes, merging bounds.
    ///
    /// Fails with [`Error::InvalidLayout`] if a displaced offset or bound
    /// does not fit in `isize`; `self` may then hold part of `other`.
    pub fn append_shifted(&mut self, other: &TypeMap, shift: isize) -> Result<()> {
        for block in &other.blocks {
            let offset = block
                .offset
                .checked_add(shift)
                .ok_or_else(|| overflow("displacement"))?;
            self.push_block(offset, block.kind, block.count)?;
        }
        if !other.bounded {
            return Ok(());
        }
        let lb = other.lb.checked_add(shift).ok_or_else(|| overflow("lower bound"))?;
        let ub = other.ub.checked_add(shift).ok_or_else(|| overflow("upper bound"))?;
        if self.bounded {
            self.lb = self.lb.min(lb);
            self.ub = self.ub.max(ub);
        } else {
            self.lb = lb;
            self.ub = ub;
            self.bounded = true;
        }
        Ok(())
    }

    fn push_block(&mut self, offset: isize, kind: PrimitiveKind, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let end = count
            .checked_mul(kind.size())
            .and_then(|bytes| isize::try_from(bytes).ok())
            .and_then(|bytes| offset.checked_add(bytes))
            .ok_or_else(|| overflow("block end"))?;
        let primitives = self
            .primitives
            .checked_add(count)
            .ok_or_else(|| overflow("element count"))?;
        if self.primitives == 0 {
            self.true_lb = offset;
            self.true_ub = end;
        } else {
            self.true_lb = self.true_lb.min(offset);
            self.true_ub = self.true_ub.max(end);
        }
        self.primitives = primitives;

        if let Some(last) = self.blocks.last_mut() {
            if last.kind == kind && last.end() == offset {
                last.count += count;
                return Ok(());
            }
        }
        self.blocks.push(Block {
            offset,
            kind,
            count,
        });
        Ok(())
    }

    /// One block whose bounds are exactly its data.
    fn is_dense_run(&self) -> bool {
        self.blocks.len() == 1
            && self.bounded
            && self.lb == self.true_lb
            && self.ub == self.true_ub
    }

    /// Same data with bounds `[lb, lb + extent)`.
    pub fn resized(&self, lb: isize, extent: isize) -> Result<Self> {
        let ub = lb.checked_add(extent).ok_or_else(|| overflow("upper bound"))?;
        let mut out = self.clone();
        out.lb = lb;
        out.ub = ub;
        out.bounded = true;
        Ok(out)
    }

    /// Contiguous map with the same signature, starting at offset zero.
    #[must_use]
    pub fn packed(&self) -> Self {
        let mut out = Self::empty();
        let mut cursor = 0isize;
        // Offsets stay below `data_bytes`, which a valid map keeps in range.
        for block in &self.blocks {
            match out.blocks.last_mut() {
                Some(last) if last.kind == block.kind => last.count += block.count,
                _ => out.blocks.push(Block {
                    offset: cursor,
                    ..*block
                }),
            }
            cursor += block.byte_len() as isize;
        }
        out.true_ub = cursor;
        out.primitives = self.primitives;
        out.lb = 0;
        out.ub = cursor;
        out.bounded = true;
        out
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[inline]
    pub fn lb(&self) -> isize {
        self.lb
    }

    #[inline]
    pub fn ub(&self) -> isize {
        self.ub
    }

    #[inline]
    pub fn extent(&self) -> isize {
        self.ub - self.lb
    }

    #[inline]
    pub fn true_lb(&self) -> isize {
        self.true_lb
    }

    #[inline]
    pub fn true_ub(&self) -> isize {
        self.true_ub
    }

    #[inline]
    pub fn true_extent(&self) -> isize {
        self.true_ub - self.true_lb
    }

    /// Whether the map holds a primitive with invalid bit patterns
    /// (`bool` or `char`).
    pub fn has_restricted_kinds(&self) -> bool {
        self.blocks.iter().any(|b| b.kind.is_restricted())
    }

    /// Number of primitives in signature order.
    #[inline]
    pub fn primitive_count(&self) -> usize {
        self.primitives
    }

    /// Bytes of actual data (packed size).
    pub fn data_bytes(&self) -> usize {
        self.blocks.iter().map(Block::byte_len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primitives == 0
    }

    /// Whether every byte the map touches lies within `[0, len)`.
    pub fn fits_within(&self, len: usize) -> bool {
        self.primitives == 0
            || (self.true_lb >= 0 && usize::try_from(self.true_ub).map_or(false, |ub| ub <= len))
    }

    /// Whether `self` is a prefix-compatible signature of `other`.
    pub fn signature_prefix_of(&self, other: &TypeMap) -> bool {
        if self.primitives > other.primitives {
            return false;
        }
        let mut ok = true;
        zip_runs(&self.blocks, &other.blocks, |a, b, _| {
            if a.kind != b.kind {
                ok = false;
            }
            ok
        });
        ok
    }

    /// Copy the bytes this map describes, in signature order, into `out`.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads over `[base + true_lb, base + true_ub)`.
    pub unsafe fn gather(&self, base: *const u8, out: &mut Vec<u8>) {
        out.reserve(self.data_bytes());
        for block in &self.blocks {
            let src = base.offset(block.offset);
            out.extend_from_slice(std::slice::from_raw_parts(src, block.byte_len()));
        }
    }

    /// Copy data described by `src_map` at `src` into `dst_map` at `dst`.
    ///
    /// Fails without writing anything if the sender carries more primitives
    /// than the receiver can hold or the signatures disagree.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads over its map's true span and `dst` valid
    /// for writes over its map's true span; the two regions must not overlap.
    pub unsafe fn transfer(
        src: *const u8,
        src_map: &TypeMap,
        dst: *mut u8,
        dst_map: &TypeMap,
    ) -> Result<Transferred> {
        if src_map.primitives > dst_map.primitives {
            return Err(Error::Truncated {
                sent: src_map.primitives,
                capacity: dst_map.primitives,
            });
        }
        if !src_map.signature_prefix_of(dst_map) {
            return Err(Error::TypeMismatch);
        }

        let mut moved = Transferred::default();
        zip_runs(&src_map.blocks, &dst_map.blocks, |a, b, n| {
            let len = n * a.kind.size();
            std::ptr::copy_nonoverlapping(src.offset(a.offset), dst.offset(b.offset), len);
            moved.primitives += n;
            moved.bytes += len;
            true
        });
        Ok(moved)
    }
}

impl Default for TypeMap {
    fn default() -> Self {
        Self::empty()
    }
}

fn overflow(what: &str) -> Error {
    Error::InvalidLayout(format!("{} overflows", what))
}

/// Walk two block lists in lockstep, yielding aligned sub-runs of equal
/// primitive count until the shorter list is exhausted or `f` returns false.
fn zip_runs<F>(a: &[Block], b: &[Block], mut f: F)
where
    F: FnMut(Block, Block, usize) -> bool,
{
    let (mut ia, mut ib) = (0usize, 0usize);
    let (mut used_a, mut used_b) = (0usize, 0usize);

    while ia < a.len() && ib < b.len() {
        let (ba, bb) = (a[ia], b[ib]);
        let n = (ba.count - used_a).min(bb.count - used_b);
        let sub_a = Block {
            offset: ba.offset + (used_a * ba.kind.size()) as isize,
            kind: ba.kind,
            count: n,
        };
        let sub_b = Block {
            offset: bb.offset + (used_b * bb.kind.size()) as isize,
            kind: bb.kind,
            count: n,
        };
        if !f(sub_a, sub_b, n) {
            return;
        }
        used_a += n;
        used_b += n;
        if used_a == ba.count {
            ia += 1;
            used_a = 0;
        }
        if used_b == bb.count {
            ib += 1;
            used_b = 0;
        }
    }
}
