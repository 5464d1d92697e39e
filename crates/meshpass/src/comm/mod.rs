// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transfer façade.
//!
//! A [`Communicator`] resolves descriptors and layouts into type maps, checks
//! ranks, tags and buffer bounds, and hands raw views to its [`Transport`].
//! Every check happens before anything is posted, so a failed call leaves no
//! operation behind.

pub mod bsend;
mod collective;
mod p2p;
pub mod scope;
pub mod tag;

pub use bsend::{bsend_size, bsend_size_with, BsendBuffer, BsendLease};
pub use scope::RequestScope;
pub use tag::{Source, Tag};

use crate::datatype::{Datatype, TypeMap};
use crate::error::{Error, Result};
use crate::layout::{check_whole_elements, Layout};
use crate::request::{Completion, Request};
use crate::transport::{
    BufferView, Context, Envelope, Group, Payload, RecvFilter, RecvSink, SendMode, StagedMessage,
    Transport,
};
use bsend::BsendArena;
use std::sync::Arc;

/// Handle on a group of processes and the transport connecting them.
///
/// Cloning is cheap and clones share the attached bsend buffer.
#[derive(Clone)]
pub struct Communicator {
    group: Arc<dyn Group>,
    transport: Arc<dyn Transport>,
    bsend: Arc<BsendArena>,
}

impl Communicator {
    pub fn new(group: Arc<dyn Group>, transport: Arc<dyn Transport>) -> Self {
        Self {
            group,
            transport,
            bsend: Arc::new(BsendArena::default()),
        }
    }

    /// Rank of the calling process.
    pub fn rank(&self) -> usize {
        self.group.rank()
    }

    pub fn size(&self) -> usize {
        self.group.size()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn check_rank(&self, rank: usize) -> Result<usize> {
        let size = self.size();
        if rank >= size {
            return Err(Error::InvalidRank { rank, size });
        }
        Ok(rank)
    }

    fn check_source(&self, source: Source) -> Result<Source> {
        if let Source::Rank(rank) = source {
            self.check_rank(rank)?;
        }
        Ok(source)
    }

    /// Post a send of the data `map` describes at `base`.
    ///
    /// The caller keeps `base` alive and unmodified until the returned
    /// completion is terminal.
    fn post_send(
        &self,
        base: *const u8,
        map: TypeMap,
        dest: usize,
        tag: Tag,
        mode: SendMode,
        context: Context,
    ) -> Result<Arc<Completion>> {
        let envelope = Envelope {
            source_rank: self.rank(),
            dest: self.group.endpoint(dest)?,
            tag,
            context,
        };
        // SAFETY: forwarded from the caller contract above.
        let view = unsafe { BufferView::new(base, map) };
        let payload = if mode == SendMode::Buffered {
            let needed = view.type_map().data_bytes() + crate::config::runtime().bsend_overhead();
            let lease = self.bsend.reserve(needed)?;
            Payload::Staged(StagedMessage::pack(&view, Some(lease)))
        } else {
            Payload::Borrowed(view)
        };
        self.transport.post_send(envelope, payload, mode)
    }

    /// Post a receive into the memory `map` describes at `base`.
    ///
    /// The caller keeps `base` exclusively borrowed until the returned
    /// completion is terminal.
    fn post_recv(
        &self,
        base: *mut u8,
        map: TypeMap,
        source: Source,
        tag: Tag,
        context: Context,
    ) -> Result<Arc<Completion>> {
        let filter = RecvFilter {
            at: self.group.endpoint(self.rank())?,
            source,
            tag,
            context,
        };
        // SAFETY: forwarded from the caller contract above.
        let sink = unsafe { RecvSink::new(base, map) };
        self.transport.post_recv(filter, sink)
    }

    /// Run `post`, wrapping everything it posted into one request. If it
    /// fails partway, the operations already posted are withdrawn and waited
    /// out before the error is returned.
    fn batch<'a, F>(&self, post: F) -> Result<Request<'a>>
    where
        F: FnOnce(&mut Vec<Arc<Completion>>) -> Result<()>,
    {
        let mut parts = Vec::new();
        let outcome = post(&mut parts);
        let request = Request::new(parts, Arc::clone(&self.transport));
        match outcome {
            Ok(()) => Ok(request),
            Err(e) => {
                log::debug!("[comm] posting failed, withdrawing partial operation: {}", e);
                request.cancel();
                drop(request);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .finish()
    }
}

/// Type map of one value of `T`.
fn value_map<T: Datatype>() -> Result<TypeMap> {
    Ok(T::descriptor()?.type_map().clone())
}

/// Type map of `layout` over a buffer of `len` values, bounds-checked.
fn slice_map<T>(layout: &Layout<T>, len: usize) -> Result<TypeMap> {
    layout.check_fits(len)?;
    Ok(layout.type_map().clone())
}

/// `layout` displaced by `shift` bytes and bounds-checked against a buffer of
/// `len` values.
fn displaced_map<T>(layout: &Layout<T>, shift: isize, len: usize) -> Result<TypeMap> {
    check_whole_elements::<T>(layout.type_map(), std::iter::once(shift))?;
    let mut map = TypeMap::empty();
    map.append_shifted(layout.type_map(), shift)?;
    let bytes = len.saturating_mul(std::mem::size_of::<T>());
    if !map.fits_within(bytes) {
        return Err(Error::InvalidLayout(format!(
            "layout displaced by {} bytes spans [{}, {}) but the buffer holds {} bytes",
            shift,
            map.true_lb(),
            map.true_ub(),
            bytes
        )));
    }
    Ok(map)
}
