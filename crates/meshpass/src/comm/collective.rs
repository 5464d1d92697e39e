// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collective operations.
//!
//! Linear algorithms over point-to-point messages in the collective context,
//! so they never match user receives. Every rank posts all its receives
//! first, then all its sends, and the operation is one [`Request`] over
//! every part. Blocking forms wait on that request.
//!
//! Every rank must call the same collectives in the same order; the
//! transport's per-pair FIFO matching keeps consecutive collectives apart.

use super::{displaced_map, slice_map, value_map, Communicator, Source, Tag};
use crate::datatype::{Datatype, TypeMap};
use crate::error::{Error, Result};
use crate::layout::{Displacements, Layout, Layouts};
use crate::request::{Completion, Request};
use crate::transport::{Context, SendMode};
use std::ptr::NonNull;
use std::sync::Arc;

const BARRIER: Tag = Tag::new(1);
const BCAST: Tag = Tag::new(2);
const GATHER: Tag = Tag::new(3);
const SCATTER: Tag = Tag::new(4);
const ALLGATHER: Tag = Tag::new(5);
const ALLTOALL: Tag = Tag::new(6);

/// Typed address of one peer's share of a collective buffer. Receive shares
/// are built from mutable pointers.
#[derive(Clone)]
struct Share {
    base: *const u8,
    map: TypeMap,
}

impl Communicator {
    fn coll_send(
        &self,
        parts: &mut Vec<Arc<Completion>>,
        share: &Share,
        dest: usize,
        tag: Tag,
    ) -> Result<()> {
        let c = self.post_send(
            share.base,
            share.map.clone(),
            dest,
            tag,
            SendMode::Standard,
            Context::Collective,
        )?;
        parts.push(c);
        Ok(())
    }

    fn coll_recv(
        &self,
        parts: &mut Vec<Arc<Completion>>,
        share: &Share,
        source: usize,
        tag: Tag,
    ) -> Result<()> {
        let c = self.post_recv(
            share.base as *mut u8,
            share.map.clone(),
            Source::Rank(source),
            tag,
            Context::Collective,
        )?;
        parts.push(c);
        Ok(())
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        let expected = self.size();
        if actual != expected {
            return Err(Error::InvalidSize { expected, actual });
        }
        Ok(())
    }

    /// Per-rank shares of a buffer of `len` values, one `T` each.
    fn value_shares<T: Datatype>(&self, base: *const T, len: usize) -> Result<Vec<Share>> {
        self.check_len(len)?;
        let map = value_map::<T>()?;
        Ok((0..len)
            .map(|r| Share {
                // The buffer holds `len` values, so every offset is in bounds.
                base: base.wrapping_add(r) as *const u8,
                map: map.clone(),
            })
            .collect())
    }

    /// Per-rank shares of a buffer of `len` values described by `layouts`,
    /// each displaced by the matching byte displacement (zero if absent).
    fn layout_shares<T>(
        &self,
        base: *const T,
        len: usize,
        layouts: &Layouts<T>,
        displacements: Option<&Displacements>,
    ) -> Result<Vec<Share>> {
        self.check_len(layouts.len())?;
        if let Some(d) = displacements {
            self.check_len(d.len())?;
        }
        layouts
            .iter()
            .enumerate()
            .map(|(r, layout)| {
                let shift = displacements.map_or(0, |d| d[r]);
                Ok(Share {
                    base: base as *const u8,
                    map: displaced_map(layout, shift, len)?,
                })
            })
            .collect()
    }

    fn one_share<T>(&self, base: *const T, len: usize, layout: &Layout<T>) -> Result<Share> {
        Ok(Share {
            base: base as *const u8,
            map: slice_map(layout, len)?,
        })
    }

    fn value_share<T: Datatype>(&self, value: *const T) -> Result<Share> {
        Ok(Share {
            base: value as *const u8,
            map: value_map::<T>()?,
        })
    }

    // =======================================================================
    // Barrier and broadcast
    // =======================================================================

    /// Block until every rank has entered the barrier.
    pub fn barrier(&self) -> Result<()> {
        self.ibarrier()?.wait()?;
        Ok(())
    }

    /// Every rank exchanges an empty message with every other rank; the
    /// request completes once all of them arrived.
    pub fn ibarrier(&self) -> Result<Request<'static>> {
        let token = Share {
            base: NonNull::<u8>::dangling().as_ptr(),
            map: TypeMap::empty(),
        };
        let me = self.rank();
        self.batch(|parts| {
            for peer in (0..self.size()).filter(|&p| p != me) {
                self.coll_recv(parts, &token, peer, BARRIER)?;
            }
            for peer in (0..self.size()).filter(|&p| p != me) {
                self.coll_send(parts, &token, peer, BARRIER)?;
            }
            Ok(())
        })
    }

    /// Broadcast `value` from `root` to every rank.
    pub fn bcast<T: Datatype>(&self, root: usize, value: &mut T) -> Result<()> {
        self.ibcast(root, value)?.wait()?;
        Ok(())
    }

    pub fn ibcast<'a, T: Datatype>(&self, root: usize, value: &'a mut T) -> Result<Request<'a>> {
        let share = self.value_share(value as *mut T)?;
        self.bcast_share(root, share)
    }

    /// Broadcast the part of `buf` described by `layout`.
    pub fn bcast_with<T: Datatype>(
        &self,
        root: usize,
        buf: &mut [T],
        layout: &Layout<T>,
    ) -> Result<()> {
        self.ibcast_with(root, buf, layout)?.wait()?;
        Ok(())
    }

    pub fn ibcast_with<'a, T: Datatype>(
        &self,
        root: usize,
        buf: &'a mut [T],
        layout: &Layout<T>,
    ) -> Result<Request<'a>> {
        let share = self.one_share(buf.as_mut_ptr(), buf.len(), layout)?;
        self.bcast_share(root, share)
    }

    fn bcast_share<'a>(&self, root: usize, share: Share) -> Result<Request<'a>> {
        let root = self.check_rank(root)?;
        let me = self.rank();
        self.batch(|parts| {
            if me == root {
                for peer in (0..self.size()).filter(|&p| p != root) {
                    self.coll_send(parts, &share, peer, BCAST)?;
                }
            } else {
                self.coll_recv(parts, &share, root, BCAST)?;
            }
            Ok(())
        })
    }

    // =======================================================================
    // One value per rank
    // =======================================================================

    /// Collect one value from every rank into `out` at `root`, in rank
    /// order. `out` must hold `size()` values at the root and is ignored
    /// elsewhere.
    pub fn gather<T: Datatype>(&self, root: usize, value: &T, out: &mut [T]) -> Result<()> {
        let root = self.check_rank(root)?;
        let send = self.value_share(value as *const T)?;
        let recv = if self.rank() == root {
            self.value_shares(out.as_mut_ptr(), out.len())?
        } else {
            Vec::new()
        };
        self.gather_shares(root, send, recv)?.wait()?;
        Ok(())
    }

    /// Distribute `values[r]` from `root` to rank `r`. `values` must hold
    /// `size()` values at the root and is ignored elsewhere.
    pub fn scatter<T: Datatype>(&self, root: usize, values: &[T], out: &mut T) -> Result<()> {
        let root = self.check_rank(root)?;
        let send = if self.rank() == root {
            self.value_shares(values.as_ptr(), values.len())?
        } else {
            Vec::new()
        };
        let recv = self.value_share(out as *mut T)?;
        self.scatter_shares(root, send, recv)?.wait()?;
        Ok(())
    }

    /// Every rank receives every rank's `value`, in rank order.
    pub fn allgather<T: Datatype>(&self, value: &T, out: &mut [T]) -> Result<()> {
        let send = self.value_share(value as *const T)?;
        let recv = self.value_shares(out.as_mut_ptr(), out.len())?;
        self.allgather_shares(send, recv)?.wait()?;
        Ok(())
    }

    /// Rank `r` receives `send[r]` from every rank into `recv`, in rank
    /// order.
    pub fn alltoall<T: Datatype>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        let sends = self.value_shares(send.as_ptr(), send.len())?;
        let recvs = self.value_shares(recv.as_mut_ptr(), recv.len())?;
        self.alltoall_shares(sends, recvs)?.wait()?;
        Ok(())
    }

    // =======================================================================
    // Per-rank layouts
    // =======================================================================

    /// Gather with one receive layout (and optional byte displacement) per
    /// rank. `recv_layouts` must have `size()` entries at the root.
    #[allow(clippy::too_many_arguments)]
    pub fn gatherv<T: Datatype>(
        &self,
        root: usize,
        send: &[T],
        send_layout: &Layout<T>,
        recv: &mut [T],
        recv_layouts: &Layouts<T>,
        displacements: Option<&Displacements>,
    ) -> Result<()> {
        self.igatherv(root, send, send_layout, recv, recv_layouts, displacements)?
            .wait()?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn igatherv<'a, T: Datatype>(
        &self,
        root: usize,
        send: &'a [T],
        send_layout: &Layout<T>,
        recv: &'a mut [T],
        recv_layouts: &Layouts<T>,
        displacements: Option<&Displacements>,
    ) -> Result<Request<'a>> {
        let root = self.check_rank(root)?;
        let sends = self.one_share(send.as_ptr(), send.len(), send_layout)?;
        let recvs = if self.rank() == root {
            self.layout_shares(recv.as_mut_ptr(), recv.len(), recv_layouts, displacements)?
        } else {
            Vec::new()
        };
        self.gather_shares(root, sends, recvs)
    }

    /// Scatter with one send layout (and optional byte displacement) per
    /// rank. `send_layouts` must have `size()` entries at the root.
    #[allow(clippy::too_many_arguments)]
    pub fn scatterv<T: Datatype>(
        &self,
        root: usize,
        send: &[T],
        send_layouts: &Layouts<T>,
        displacements: Option<&Displacements>,
        recv: &mut [T],
        recv_layout: &Layout<T>,
    ) -> Result<()> {
        self.iscatterv(root, send, send_layouts, displacements, recv, recv_layout)?
            .wait()?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn iscatterv<'a, T: Datatype>(
        &self,
        root: usize,
        send: &'a [T],
        send_layouts: &Layouts<T>,
        displacements: Option<&Displacements>,
        recv: &'a mut [T],
        recv_layout: &Layout<T>,
    ) -> Result<Request<'a>> {
        let root = self.check_rank(root)?;
        let sends = if self.rank() == root {
            self.layout_shares(send.as_ptr(), send.len(), send_layouts, displacements)?
        } else {
            Vec::new()
        };
        let recvs = self.one_share(recv.as_mut_ptr(), recv.len(), recv_layout)?;
        self.scatter_shares(root, sends, recvs)
    }

    /// Allgather with one receive layout (and optional byte displacement)
    /// per rank.
    pub fn allgatherv<T: Datatype>(
        &self,
        send: &[T],
        send_layout: &Layout<T>,
        recv: &mut [T],
        recv_layouts: &Layouts<T>,
        displacements: Option<&Displacements>,
    ) -> Result<()> {
        self.iallgatherv(send, send_layout, recv, recv_layouts, displacements)?
            .wait()?;
        Ok(())
    }

    pub fn iallgatherv<'a, T: Datatype>(
        &self,
        send: &'a [T],
        send_layout: &Layout<T>,
        recv: &'a mut [T],
        recv_layouts: &Layouts<T>,
        displacements: Option<&Displacements>,
    ) -> Result<Request<'a>> {
        let sends = self.one_share(send.as_ptr(), send.len(), send_layout)?;
        let recvs =
            self.layout_shares(recv.as_mut_ptr(), recv.len(), recv_layouts, displacements)?;
        self.allgather_shares(sends, recvs)
    }

    /// All-to-all with one layout (and optional byte displacement) per peer
    /// on each side.
    #[allow(clippy::too_many_arguments)]
    pub fn alltoallv<T: Datatype>(
        &self,
        send: &[T],
        send_layouts: &Layouts<T>,
        send_displacements: Option<&Displacements>,
        recv: &mut [T],
        recv_layouts: &Layouts<T>,
        recv_displacements: Option<&Displacements>,
    ) -> Result<()> {
        self.ialltoallv(
            send,
            send_layouts,
            send_displacements,
            recv,
            recv_layouts,
            recv_displacements,
        )?
        .wait()?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ialltoallv<'a, T: Datatype>(
        &self,
        send: &'a [T],
        send_layouts: &Layouts<T>,
        send_displacements: Option<&Displacements>,
        recv: &'a mut [T],
        recv_layouts: &Layouts<T>,
        recv_displacements: Option<&Displacements>,
    ) -> Result<Request<'a>> {
        let sends =
            self.layout_shares(send.as_ptr(), send.len(), send_layouts, send_displacements)?;
        let recvs =
            self.layout_shares(recv.as_mut_ptr(), recv.len(), recv_layouts, recv_displacements)?;
        self.alltoall_shares(sends, recvs)
    }

    // =======================================================================
    // Share plumbing
    // =======================================================================

    fn gather_shares<'a>(
        &self,
        root: usize,
        send: Share,
        recvs: Vec<Share>,
    ) -> Result<Request<'a>> {
        self.batch(|parts| {
            for (peer, share) in recvs.iter().enumerate() {
                self.coll_recv(parts, share, peer, GATHER)?;
            }
            self.coll_send(parts, &send, root, GATHER)
        })
    }

    fn scatter_shares<'a>(
        &self,
        root: usize,
        sends: Vec<Share>,
        recv: Share,
    ) -> Result<Request<'a>> {
        self.batch(|parts| {
            self.coll_recv(parts, &recv, root, SCATTER)?;
            for (peer, share) in sends.iter().enumerate() {
                self.coll_send(parts, share, peer, SCATTER)?;
            }
            Ok(())
        })
    }

    fn allgather_shares<'a>(&self, send: Share, recvs: Vec<Share>) -> Result<Request<'a>> {
        self.batch(|parts| {
            for (peer, share) in recvs.iter().enumerate() {
                self.coll_recv(parts, share, peer, ALLGATHER)?;
            }
            for peer in 0..self.size() {
                self.coll_send(parts, &send, peer, ALLGATHER)?;
            }
            Ok(())
        })
    }

    fn alltoall_shares<'a>(&self, sends: Vec<Share>, recvs: Vec<Share>) -> Result<Request<'a>> {
        self.batch(|parts| {
            for (peer, share) in recvs.iter().enumerate() {
                self.coll_recv(parts, share, peer, ALLTOALL)?;
            }
            for (peer, share) in sends.iter().enumerate() {
                self.coll_send(parts, share, peer, ALLTOALL)?;
            }
            Ok(())
        })
    }
}
