// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scratch space for buffered sends.
//!
//! A buffered send packs its data into a staged copy and completes at once.
//! The staged bytes, plus a fixed per-message overhead, are charged against
//! the space attached with [`Communicator::attach_buffer`] until the message
//! is delivered.

use super::Communicator;
use crate::config;
use crate::datatype::Datatype;
use crate::error::{Error, Result};
use crate::layout::Layout;
use parking_lot::{Condvar, Mutex};
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Default)]
struct ArenaState {
    capacity: Option<usize>,
    in_use: usize,
}

/// Accounting of the attached buffer, shared by a communicator and its
/// in-flight leases.
#[derive(Debug, Default)]
pub(crate) struct BsendArena {
    state: Mutex<ArenaState>,
    released: Condvar,
}

impl BsendArena {
    fn attach(&self, bytes: usize) -> Result<()> {
        let mut state = self.state.lock();
        if state.capacity.is_some() {
            return Err(Error::InvalidState("a bsend buffer is already attached".into()));
        }
        state.capacity = Some(bytes);
        log::debug!("[bsend] attached {} bytes", bytes);
        Ok(())
    }

    /// Block until nothing is in flight, then detach. Returns the capacity.
    fn detach(&self) -> usize {
        let mut state = self.state.lock();
        if state.in_use > 0 {
            log::warn!(
                "[bsend] detaching buffer with {} bytes in flight, waiting for delivery",
                state.in_use
            );
        }
        while state.in_use > 0 {
            self.released.wait(&mut state);
        }
        state.capacity.take().unwrap_or(0)
    }

    /// Charge `bytes` against the attached buffer.
    pub(crate) fn reserve(self: &Arc<Self>, bytes: usize) -> Result<BsendLease> {
        let mut state = self.state.lock();
        let Some(capacity) = state.capacity else {
            return Err(Error::InvalidState("buffered send without an attached buffer".into()));
        };
        let available = capacity - state.in_use;
        if bytes > available {
            return Err(Error::BufferExhausted {
                needed: bytes,
                available,
            });
        }
        state.in_use += bytes;
        Ok(BsendLease {
            arena: Arc::clone(self),
            bytes,
        })
    }

    fn release(&self, bytes: usize) {
        let mut state = self.state.lock();
        state.in_use -= bytes;
        if state.in_use == 0 {
            self.released.notify_all();
        }
    }

    fn usage(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.capacity.unwrap_or(0), state.in_use)
    }
}

/// Space held by one staged message. Released when dropped.
#[derive(Debug)]
pub struct BsendLease {
    arena: Arc<BsendArena>,
    bytes: usize,
}

impl BsendLease {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for BsendLease {
    fn drop(&mut self) {
        self.arena.release(self.bytes);
    }
}

/// Guard of an attached bsend buffer.
///
/// Dropping it detaches the buffer, blocking until every staged message has
/// been delivered.
#[must_use = "the buffer is detached as soon as the guard is dropped"]
#[derive(Debug)]
pub struct BsendBuffer<'c> {
    arena: Option<Arc<BsendArena>>,
    _comm: PhantomData<&'c Communicator>,
}

impl BsendBuffer<'_> {
    fn usage(&self) -> (usize, usize) {
        self.arena.as_ref().map_or((0, 0), |arena| arena.usage())
    }

    pub fn capacity(&self) -> usize {
        self.usage().0
    }

    /// Bytes charged by messages not yet delivered.
    pub fn in_use(&self) -> usize {
        self.usage().1
    }

    pub fn available(&self) -> usize {
        let (capacity, in_use) = self.usage();
        capacity - in_use
    }

    /// Detach now, returning the capacity.
    pub fn detach(mut self) -> usize {
        self.arena.take().map_or(0, |arena| arena.detach())
    }
}

impl Drop for BsendBuffer<'_> {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.take() {
            arena.detach();
        }
    }
}

impl Communicator {
    /// Attach `bytes` of scratch space for buffered sends. Only one buffer
    /// may be attached at a time.
    pub fn attach_buffer(&self, bytes: usize) -> Result<BsendBuffer<'_>> {
        self.bsend.attach(bytes)?;
        Ok(BsendBuffer {
            arena: Some(Arc::clone(&self.bsend)),
            _comm: PhantomData,
        })
    }
}

/// Buffer space one buffered send of `count` values of `T` needs.
pub fn bsend_size<T: Datatype>(count: usize) -> Result<usize> {
    let per = T::descriptor()?.type_map().data_bytes();
    per.checked_mul(count)
        .and_then(|bytes| bytes.checked_add(config::runtime().bsend_overhead()))
        .ok_or(Error::InvalidCount(count))
}

/// Buffer space one buffered send through `layout` needs.
pub fn bsend_size_with<T>(layout: &Layout<T>) -> usize {
    layout.type_map().data_bytes() + config::runtime().bsend_overhead()
}
