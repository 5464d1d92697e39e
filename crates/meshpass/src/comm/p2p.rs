// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Point-to-point transfers.
//!
//! Each send mode comes in a blocking form, a non-blocking `i` form returning
//! a [`Request`] that borrows the buffer, and a `_with` form taking a slice
//! plus a [`Layout`] instead of a single value.

use super::{slice_map, value_map, Communicator, Source, Tag};
use crate::datatype::{Datatype, TypeMap};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::request::{PersistentRequest, Request, Status};
use crate::transport::{Context, RecvFilter, SendMode};
use std::sync::Arc;

impl Communicator {
    fn isend_map<'a>(
        &self,
        base: *const u8,
        map: TypeMap,
        dest: usize,
        tag: Tag,
        mode: SendMode,
    ) -> Result<Request<'a>> {
        let tag = tag.check_send()?;
        self.check_rank(dest)?;
        let completion = self.post_send(base, map, dest, tag, mode, Context::PointToPoint)?;
        Ok(Request::new(vec![completion], Arc::clone(&self.transport)))
    }

    fn irecv_map<'a>(
        &self,
        base: *mut u8,
        map: TypeMap,
        source: Source,
        tag: Tag,
    ) -> Result<Request<'a>> {
        let tag = tag.check_recv()?;
        let source = self.check_source(source)?;
        let completion = self.post_recv(base, map, source, tag, Context::PointToPoint)?;
        Ok(Request::new(vec![completion], Arc::clone(&self.transport)))
    }

    fn isend_value<'a, T: Datatype>(
        &self,
        value: &'a T,
        dest: usize,
        tag: Tag,
        mode: SendMode,
    ) -> Result<Request<'a>> {
        let map = value_map::<T>()?;
        self.isend_map(value as *const T as *const u8, map, dest, tag, mode)
    }

    fn isend_slice<'a, T: Datatype>(
        &self,
        buf: &'a [T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
        mode: SendMode,
    ) -> Result<Request<'a>> {
        let map = slice_map(layout, buf.len())?;
        self.isend_map(buf.as_ptr() as *const u8, map, dest, tag, mode)
    }

    // =======================================================================
    // Blocking sends
    // =======================================================================

    /// Standard-mode send of one value.
    pub fn send<T: Datatype>(&self, value: &T, dest: usize, tag: Tag) -> Result<()> {
        self.isend_value(value, dest, tag, SendMode::Standard)?.wait()?;
        Ok(())
    }

    /// Buffered-mode send of one value. Needs an attached bsend buffer.
    pub fn bsend<T: Datatype>(&self, value: &T, dest: usize, tag: Tag) -> Result<()> {
        self.isend_value(value, dest, tag, SendMode::Buffered)?.wait()?;
        Ok(())
    }

    /// Synchronous-mode send of one value. Returns once the receive matched.
    pub fn ssend<T: Datatype>(&self, value: &T, dest: usize, tag: Tag) -> Result<()> {
        self.isend_value(value, dest, tag, SendMode::Synchronous)?.wait()?;
        Ok(())
    }

    /// Ready-mode send of one value. The matching receive must be posted.
    pub fn rsend<T: Datatype>(&self, value: &T, dest: usize, tag: Tag) -> Result<()> {
        self.isend_value(value, dest, tag, SendMode::Ready)?.wait()?;
        Ok(())
    }

    pub fn send_with<T: Datatype>(
        &self,
        buf: &[T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<()> {
        self.isend_slice(buf, layout, dest, tag, SendMode::Standard)?
            .wait()?;
        Ok(())
    }

    pub fn bsend_with<T: Datatype>(
        &self,
        buf: &[T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<()> {
        self.isend_slice(buf, layout, dest, tag, SendMode::Buffered)?
            .wait()?;
        Ok(())
    }

    pub fn ssend_with<T: Datatype>(
        &self,
        buf: &[T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<()> {
        self.isend_slice(buf, layout, dest, tag, SendMode::Synchronous)?
            .wait()?;
        Ok(())
    }

    pub fn rsend_with<T: Datatype>(
        &self,
        buf: &[T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<()> {
        self.isend_slice(buf, layout, dest, tag, SendMode::Ready)?
            .wait()?;
        Ok(())
    }

    // =======================================================================
    // Non-blocking sends
    // =======================================================================

    /// Start a standard send of one value.
    ///
    /// The request must be waited, tested to completion or dropped; never
    /// `mem::forget` it while pending. [`Communicator::scope`] lifts that
    /// rule.
    pub fn isend<'a, T: Datatype>(
        &self,
        value: &'a T,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'a>> {
        self.isend_value(value, dest, tag, SendMode::Standard)
    }

    pub fn ibsend<'a, T: Datatype>(
        &self,
        value: &'a T,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'a>> {
        self.isend_value(value, dest, tag, SendMode::Buffered)
    }

    pub fn issend<'a, T: Datatype>(
        &self,
        value: &'a T,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'a>> {
        self.isend_value(value, dest, tag, SendMode::Synchronous)
    }

    pub fn irsend<'a, T: Datatype>(
        &self,
        value: &'a T,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'a>> {
        self.isend_value(value, dest, tag, SendMode::Ready)
    }

    pub fn isend_with<'a, T: Datatype>(
        &self,
        buf: &'a [T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'a>> {
        self.isend_slice(buf, layout, dest, tag, SendMode::Standard)
    }

    pub fn ibsend_with<'a, T: Datatype>(
        &self,
        buf: &'a [T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'a>> {
        self.isend_slice(buf, layout, dest, tag, SendMode::Buffered)
    }

    pub fn issend_with<'a, T: Datatype>(
        &self,
        buf: &'a [T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'a>> {
        self.isend_slice(buf, layout, dest, tag, SendMode::Synchronous)
    }

    pub fn irsend_with<'a, T: Datatype>(
        &self,
        buf: &'a [T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'a>> {
        self.isend_slice(buf, layout, dest, tag, SendMode::Ready)
    }

    // =======================================================================
    // Receives
    // =======================================================================

    /// Receive one value. The status carries the matched source and tag.
    pub fn recv<T: Datatype>(&self, value: &mut T, source: Source, tag: Tag) -> Result<Status> {
        self.irecv(value, source, tag)?.wait()
    }

    pub fn recv_with<T: Datatype>(
        &self,
        buf: &mut [T],
        layout: &Layout<T>,
        source: Source,
        tag: Tag,
    ) -> Result<Status> {
        self.irecv_with(buf, layout, source, tag)?.wait()
    }

    /// Start a receive of one value.
    ///
    /// Leaking the request with `mem::forget` while pending lets the buffer
    /// be reused under the transport; use [`Communicator::scope`] where that
    /// cannot be ruled out.
    pub fn irecv<'a, T: Datatype>(
        &self,
        value: &'a mut T,
        source: Source,
        tag: Tag,
    ) -> Result<Request<'a>> {
        let map = value_map::<T>()?;
        self.irecv_map(value as *mut T as *mut u8, map, source, tag)
    }

    /// Start a receive through `layout`. Same leak rule as
    /// [`irecv`](Self::irecv).
    pub fn irecv_with<'a, T: Datatype>(
        &self,
        buf: &'a mut [T],
        layout: &Layout<T>,
        source: Source,
        tag: Tag,
    ) -> Result<Request<'a>> {
        let map = slice_map(layout, buf.len())?;
        self.irecv_map(buf.as_mut_ptr() as *mut u8, map, source, tag)
    }

    // =======================================================================
    // Persistent operations
    // =======================================================================

    /// Set up a send of one value in `mode`, posted on every
    /// [`PersistentRequest::start`].
    pub fn send_init<'a, T: Datatype>(
        &self,
        mode: SendMode,
        value: &'a T,
        dest: usize,
        tag: Tag,
    ) -> Result<PersistentRequest<'a>> {
        let map = value_map::<T>()?;
        self.send_init_map(mode, value as *const T as *const u8, map, dest, tag)
    }

    pub fn send_init_with<'a, T: Datatype>(
        &self,
        mode: SendMode,
        buf: &'a [T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<PersistentRequest<'a>> {
        let map = slice_map(layout, buf.len())?;
        self.send_init_map(mode, buf.as_ptr() as *const u8, map, dest, tag)
    }

    /// Set up a receive of one value, posted on every
    /// [`PersistentRequest::start`]. An active persistent request must not
    /// be leaked either.
    pub fn recv_init<'a, T: Datatype>(
        &self,
        value: &'a mut T,
        source: Source,
        tag: Tag,
    ) -> Result<PersistentRequest<'a>> {
        let map = value_map::<T>()?;
        self.recv_init_map(value as *mut T as *mut u8, map, source, tag)
    }

    pub fn recv_init_with<'a, T: Datatype>(
        &self,
        buf: &'a mut [T],
        layout: &Layout<T>,
        source: Source,
        tag: Tag,
    ) -> Result<PersistentRequest<'a>> {
        let map = slice_map(layout, buf.len())?;
        self.recv_init_map(buf.as_mut_ptr() as *mut u8, map, source, tag)
    }

    fn send_init_map<'a>(
        &self,
        mode: SendMode,
        base: *const u8,
        map: TypeMap,
        dest: usize,
        tag: Tag,
    ) -> Result<PersistentRequest<'a>> {
        let tag = tag.check_send()?;
        self.check_rank(dest)?;
        let comm = self.clone();
        let starter = move || {
            comm.post_send(base, map.clone(), dest, tag, mode, Context::PointToPoint)
                .map(|c| vec![c])
        };
        Ok(PersistentRequest::new(
            Box::new(starter),
            Arc::clone(&self.transport),
        ))
    }

    fn recv_init_map<'a>(
        &self,
        base: *mut u8,
        map: TypeMap,
        source: Source,
        tag: Tag,
    ) -> Result<PersistentRequest<'a>> {
        let tag = tag.check_recv()?;
        let source = self.check_source(source)?;
        let comm = self.clone();
        let starter = move || {
            comm.post_recv(base, map.clone(), source, tag, Context::PointToPoint)
                .map(|c| vec![c])
        };
        Ok(PersistentRequest::new(
            Box::new(starter),
            Arc::clone(&self.transport),
        ))
    }

    // =======================================================================
    // Probing and combined exchange
    // =======================================================================

    /// Block until a message matching `source` and `tag` is queued, and
    /// return its status without receiving it.
    pub fn probe(&self, source: Source, tag: Tag) -> Result<Status> {
        self.transport
            .probe(self.probe_filter(source, tag)?, true)?
            .ok_or_else(|| Error::InvalidState("blocking probe returned no message".into()))
    }

    /// Non-blocking [`probe`](Self::probe).
    pub fn iprobe(&self, source: Source, tag: Tag) -> Result<Option<Status>> {
        self.transport.probe(self.probe_filter(source, tag)?, false)
    }

    fn probe_filter(&self, source: Source, tag: Tag) -> Result<RecvFilter> {
        Ok(RecvFilter {
            at: self.group.endpoint(self.rank())?,
            source: self.check_source(source)?,
            tag: tag.check_recv()?,
            context: Context::PointToPoint,
        })
    }

    /// Send `send` to `dest` and receive into `recv` from `source`,
    /// concurrently. Returns the receive status.
    #[allow(clippy::too_many_arguments)]
    pub fn sendrecv<S: Datatype, R: Datatype>(
        &self,
        send: &S,
        dest: usize,
        send_tag: Tag,
        recv: &mut R,
        source: Source,
        recv_tag: Tag,
    ) -> Result<Status> {
        let mut incoming = self.irecv(recv, source, recv_tag)?;
        let mut outgoing = self.isend(send, dest, send_tag)?;
        let status = incoming.wait();
        outgoing.wait()?;
        status
    }

    /// [`sendrecv`](Self::sendrecv) over slices and layouts.
    #[allow(clippy::too_many_arguments)]
    pub fn sendrecv_with<S: Datatype, R: Datatype>(
        &self,
        send: &[S],
        send_layout: &Layout<S>,
        dest: usize,
        send_tag: Tag,
        recv: &mut [R],
        recv_layout: &Layout<R>,
        source: Source,
        recv_tag: Tag,
    ) -> Result<Status> {
        let mut incoming = self.irecv_with(recv, recv_layout, source, recv_tag)?;
        let mut outgoing = self.isend_with(send, send_layout, dest, send_tag)?;
        let status = incoming.wait();
        outgoing.wait()?;
        status
    }

    /// Exchange `value` in place: send it to `dest`, then overwrite it with
    /// the value received from `source`.
    pub fn sendrecv_replace<T: Datatype + Clone>(
        &self,
        value: &mut T,
        dest: usize,
        send_tag: Tag,
        source: Source,
        recv_tag: Tag,
    ) -> Result<Status> {
        let outgoing = value.clone();
        self.sendrecv(&outgoing, dest, send_tag, value, source, recv_tag)
    }
}
