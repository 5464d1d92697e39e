// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport and group abstractions.
//!
//! The core never touches a wire. It hands a [`Transport`] raw views of
//! caller memory described by a [`TypeMap`], and the transport moves data
//! between a send view and a matching receive sink, completing the
//! [`Completion`] of each side exactly once.
//!
//! [`LocalFabric`] is the in-process reference transport.

mod local;
mod mailbox;

pub use local::{LocalFabric, LocalGroup};

use crate::comm::bsend::BsendLease;
use crate::comm::{Source, Tag};
use crate::datatype::{Transferred, TypeMap};
use crate::error::Result;
use crate::request::{Completion, Status};
use std::fmt;
use std::sync::Arc;

/// Transport-level identity of a group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(pub u64);

/// Ordered set of processes taking part in communication.
pub trait Group: Send + Sync {
    /// Rank of the calling process.
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Endpoint of `rank`.
    fn endpoint(&self, rank: usize) -> Result<Endpoint>;
}

/// Matching context. Collective traffic never matches point-to-point
/// receives and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    PointToPoint,
    Collective,
}

/// Completion semantics requested by a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SendMode {
    /// Complete once the buffer may be reused.
    #[default]
    Standard,
    /// Copy into attached scratch space and complete immediately.
    Buffered,
    /// Complete only after the matching receive has started.
    Synchronous,
    /// Caller guarantees the matching receive is already posted.
    Ready,
}

/// Addressing of an outgoing message.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    pub source_rank: usize,
    pub dest: Endpoint,
    pub tag: Tag,
    pub context: Context,
}

/// Selection of an incoming message.
#[derive(Debug, Clone, Copy)]
pub struct RecvFilter {
    /// Endpoint receiving.
    pub at: Endpoint,
    pub source: Source,
    pub tag: Tag,
    pub context: Context,
}

impl RecvFilter {
    pub(crate) fn accepts(&self, envelope: &Envelope) -> bool {
        self.context == envelope.context
            && self.source.matches(envelope.source_rank)
            && self.tag.matches(envelope.tag)
    }
}

/// Read-only view of caller memory.
pub struct BufferView {
    ptr: *const u8,
    map: TypeMap,
}

// SAFETY: a view is only created from a shared borrow held by the request
// for as long as the transport may read through it.
unsafe impl Send for BufferView {}
unsafe impl Sync for BufferView {}

impl BufferView {
    /// # Safety
    ///
    /// `ptr` must stay valid for reads over `map`'s true span until the
    /// operation using the view is terminal.
    pub unsafe fn new(ptr: *const u8, map: TypeMap) -> Self {
        Self { ptr, map }
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.map
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr
    }
}

/// Writable view of caller memory.
pub struct RecvSink {
    ptr: *mut u8,
    map: TypeMap,
}

// SAFETY: a sink is only created from an exclusive borrow held by the request
// for as long as the transport may write through it.
unsafe impl Send for RecvSink {}
unsafe impl Sync for RecvSink {}

impl RecvSink {
    /// # Safety
    ///
    /// `ptr` must stay valid and exclusively reserved for writes over `map`'s
    /// true span until the operation using the sink is terminal.
    pub unsafe fn new(ptr: *mut u8, map: TypeMap) -> Self {
        Self { ptr, map }
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.map
    }
}

/// Packed copy of a message owned by the transport.
pub struct StagedMessage {
    bytes: Vec<u8>,
    map: TypeMap,
    _lease: Option<BsendLease>,
}

impl StagedMessage {
    /// Pack `view` into an owned message.
    pub fn pack(view: &BufferView, lease: Option<BsendLease>) -> Self {
        let mut bytes = Vec::new();
        // SAFETY: the view guarantees readability over its map.
        unsafe { view.map.gather(view.ptr, &mut bytes) };
        Self {
            bytes,
            map: view.map.packed(),
            _lease: lease,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Data carried by a send.
pub enum Payload {
    /// Read straight from caller memory at match time.
    Borrowed(BufferView),
    /// Read from an owned packed copy.
    Staged(StagedMessage),
}

impl Payload {
    pub fn type_map(&self) -> &TypeMap {
        match self {
            Payload::Borrowed(view) => &view.map,
            Payload::Staged(staged) => &staged.map,
        }
    }

    /// Copy the payload into `sink`.
    ///
    /// # Safety
    ///
    /// The payload source and the sink must both be live, and must not
    /// overlap.
    pub(crate) unsafe fn deliver(&self, sink: &RecvSink) -> Result<Transferred> {
        let src = match self {
            Payload::Borrowed(view) => view.ptr,
            Payload::Staged(staged) => staged.bytes.as_ptr(),
        };
        TypeMap::transfer(src, self.type_map(), sink.ptr, &sink.map)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Borrowed(view) => f
                .debug_struct("Borrowed")
                .field("primitives", &view.map.primitive_count())
                .finish(),
            Payload::Staged(staged) => f
                .debug_struct("Staged")
                .field("bytes", &staged.bytes.len())
                .finish(),
        }
    }
}

/// Moves data between endpoints.
///
/// Every posted operation returns a [`Completion`] the transport completes
/// exactly once: with the transfer status, a failed status, or a cancelled
/// status. Matching must be non-overtaking: two messages from one sender
/// that both match a receive are matched in the order they were posted.
pub trait Transport: Send + Sync {
    fn post_send(
        &self,
        envelope: Envelope,
        payload: Payload,
        mode: SendMode,
    ) -> Result<Arc<Completion>>;

    fn post_recv(&self, filter: RecvFilter, sink: RecvSink) -> Result<Arc<Completion>>;

    /// Status of the first message matching `filter`, without receiving it.
    /// With `blocking`, waits until one arrives.
    fn probe(&self, filter: RecvFilter, blocking: bool) -> Result<Option<Status>>;

    /// Withdraw an operation that has not matched yet. Returns `true` if the
    /// operation was withdrawn and its completion now reports cancelled.
    fn cancel(&self, completion: &Arc<Completion>) -> bool;
}
