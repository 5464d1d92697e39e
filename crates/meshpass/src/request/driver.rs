// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Completion driver for multi-slot waits.
//!
//! Each pool owns one driver. Completions attached to pool slots carry a
//! [`SlotSignal`] that records the slot in a ready bitset and bumps an epoch
//! counter. A waiter reads the epoch, scans, and sleeps only while the epoch
//! is unchanged, so a completion racing with the scan is never missed.
//!
//! The bitset is a hint: slots beyond its capacity still bump the epoch, and
//! an empty hint set means "rescan everything".

use super::bitmap::AtomicBitset;
use super::completion::CompletionSignal;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub(crate) struct CompletionDriver {
    ready: AtomicBitset,
    epoch: Mutex<u64>,
    cond: Condvar,
    next_id: AtomicU64,
}

impl CompletionDriver {
    pub(crate) fn new(max_slots: usize) -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBitset::new(max_slots),
            epoch: Mutex::new(0),
            cond: Condvar::new(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Create the signal a completion uses to wake slot `slot_index`.
    pub(crate) fn register_slot(self: &Arc<Self>, slot_index: usize) -> Arc<SlotSignal> {
        let slot_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(SlotSignal {
            inner: Arc::downgrade(self),
            slot_index,
            slot_id,
        })
    }

    /// Current notification epoch. Read it before scanning.
    pub(crate) fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    /// Block until a notification newer than `seen` arrives.
    pub(crate) fn wait_past(&self, seen: u64) {
        let mut epoch = self.epoch.lock();
        while *epoch == seen {
            self.cond.wait(&mut epoch);
        }
    }

    /// Slots signalled since the last call, ascending.
    pub(crate) fn take_ready(&self) -> Vec<usize> {
        self.ready.take_all()
    }

    fn signal_slot(&self, slot_index: usize) {
        if slot_index < self.ready.capacity() {
            self.ready.test_and_set(slot_index);
        }
        self.manual_notify();
    }

    /// Wake waiters without flagging any slot.
    pub(crate) fn manual_notify(&self) {
        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.cond.notify_all();
    }
}

/// Signal handed to completions on behalf of one pool slot.
pub(crate) struct SlotSignal {
    inner: Weak<CompletionDriver>,
    slot_index: usize,
    slot_id: u64,
}

impl CompletionSignal for SlotSignal {
    fn signal(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.signal_slot(self.slot_index);
        }
    }

    fn id(&self) -> u64 {
        self.slot_id
    }
}
