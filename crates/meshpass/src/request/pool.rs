// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pools of in-flight handles with bulk waits.
//!
//! A pool owns its handles until they are waited out or taken back. Indices
//! are assigned at push time and stay stable. A retired entry keeps the last
//! status it produced.
//!
//! Blocking waits run the usual epoch loop: read the driver epoch, consume
//! the ready hints, scan, and sleep only if nothing new arrived since the
//! epoch was read.

use super::completion::{Completion, CompletionSignal};
use super::driver::CompletionDriver;
use super::{PersistentRequest, Request, Status};
use crate::config::POOL_READY_SLOTS;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Outcome of a non-blocking multi-entry test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    /// At least one entry completed.
    Completed,
    /// Active entries exist but none completed.
    NoCompleted,
    /// Nothing is active.
    NoActiveRequests,
}

/// Outcome of [`Pool::test_any`].
#[derive(Debug, Clone)]
pub enum TestAny {
    Completed(usize, Status),
    Pending,
    NoActiveRequests,
}

/// Operations a pool needs from the handles it holds.
pub trait PoolHandle {
    /// Transport completions currently tracked by the handle.
    fn completions(&self) -> &[Arc<Completion>];

    /// Whether the handle has an operation outstanding.
    fn is_active(&self) -> bool;

    /// Status if terminal, without blocking.
    fn poll(&mut self) -> Option<Status>;

    fn block(&mut self) -> Status;

    fn withdraw(&self) -> bool;

    fn is_complete(&self) -> bool {
        self.completions().iter().all(|c| c.is_complete())
    }
}

impl PoolHandle for Request<'_> {
    fn completions(&self) -> &[Arc<Completion>] {
        self.parts()
    }

    fn is_active(&self) -> bool {
        true
    }

    fn poll(&mut self) -> Option<Status> {
        self.test_status()
    }

    fn block(&mut self) -> Status {
        self.wait_status()
    }

    fn withdraw(&self) -> bool {
        self.cancel()
    }
}

impl PoolHandle for PersistentRequest<'_> {
    fn completions(&self) -> &[Arc<Completion>] {
        self.parts()
    }

    fn is_active(&self) -> bool {
        PersistentRequest::is_active(self)
    }

    fn poll(&mut self) -> Option<Status> {
        self.test_status()
    }

    fn block(&mut self) -> Status {
        self.wait_status()
    }

    fn withdraw(&self) -> bool {
        self.cancel()
    }
}

struct Slot<H> {
    handle: Option<H>,
    active: bool,
    signal_id: Option<u64>,
    last: Option<Status>,
}

/// Ordered collection of handles.
pub struct Pool<H: PoolHandle> {
    slots: Vec<Slot<H>>,
    driver: Arc<CompletionDriver>,
}

/// Pool of one-shot requests.
pub type RequestPool<'a> = Pool<Request<'a>>;

/// Pool of persistent requests.
pub type PersistentRequestPool<'a> = Pool<PersistentRequest<'a>>;

impl<H: PoolHandle> Default for Pool<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: PoolHandle> Pool<H> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            driver: CompletionDriver::new(POOL_READY_SLOTS),
        }
    }

    /// Take ownership of `handle`. Returns its index.
    pub fn push(&mut self, handle: H) -> usize {
        let index = self.slots.len();
        let active = handle.is_active();
        self.slots.push(Slot {
            handle: Some(handle),
            active: false,
            signal_id: None,
            last: None,
        });
        if active {
            self.activate(index);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries not yet waited out.
    pub fn active_len(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    /// Wait for every active entry. Results in index order; entries already
    /// retired are not reported again.
    pub fn wait_all(&mut self) -> Vec<(usize, Status)> {
        let mut done = Vec::new();
        for index in 0..self.slots.len() {
            if !self.slots[index].active {
                continue;
            }
            if let Some(status) = self.slots[index].handle.as_mut().map(H::block) {
                self.retire(index, status.clone());
                done.push((index, status));
            }
        }
        if !done.is_empty() {
            log::debug!("[pool] wait_all retired {} entries", done.len());
        }
        done
    }

    /// All active entries if every one of them is terminal, `None` otherwise.
    /// Nothing is retired unless everything is.
    pub fn test_all(&mut self) -> Option<Vec<(usize, Status)>> {
        let ready = self
            .slots
            .iter()
            .filter(|s| s.active)
            .all(|s| s.handle.as_ref().map_or(true, H::is_complete));
        if !ready {
            return None;
        }
        Some(self.wait_all())
    }

    /// Block until one active entry is terminal and retire it. `None` when
    /// nothing is active.
    pub fn wait_any(&mut self) -> Option<(usize, Status)> {
        loop {
            if self.active_len() == 0 {
                return None;
            }
            let seen = self.driver.epoch();
            let hints = self.driver.take_ready();
            let found = self
                .poll_indices(hints)
                .or_else(|| self.poll_indices(0..self.slots.len()));
            if found.is_some() {
                return found;
            }
            self.driver.wait_past(seen);
        }
    }

    pub fn test_any(&mut self) -> TestAny {
        if self.active_len() == 0 {
            return TestAny::NoActiveRequests;
        }
        match self.poll_indices(0..self.slots.len()) {
            Some((index, status)) => TestAny::Completed(index, status),
            None => TestAny::Pending,
        }
    }

    /// Block until at least one active entry is terminal, then retire every
    /// entry that is. Empty when nothing is active.
    pub fn wait_some(&mut self) -> Vec<(usize, Status)> {
        loop {
            if self.active_len() == 0 {
                return Vec::new();
            }
            let seen = self.driver.epoch();
            // Hints only order the scan; every active slot is polled anyway.
            let _ = self.driver.take_ready();
            let done = self.poll_all();
            if !done.is_empty() {
                return done;
            }
            self.driver.wait_past(seen);
        }
    }

    pub fn test_some(&mut self) -> (TestResult, Vec<(usize, Status)>) {
        if self.active_len() == 0 {
            return (TestResult::NoActiveRequests, Vec::new());
        }
        let done = self.poll_all();
        let result = if done.is_empty() {
            TestResult::NoCompleted
        } else {
            TestResult::Completed
        };
        (result, done)
    }

    /// Wait out entry `index`. A retired entry returns its last status.
    pub fn wait(&mut self, index: usize) -> Result<Status> {
        let slot = self.slot_mut(index)?;
        if !slot.active {
            return Ok(slot.last.clone().unwrap_or_else(Status::empty));
        }
        let status = slot
            .handle
            .as_mut()
            .map(H::block)
            .unwrap_or_else(Status::empty);
        self.retire(index, status.clone());
        Ok(status)
    }

    /// Test entry `index`, retiring it when terminal.
    pub fn test(&mut self, index: usize) -> Result<Option<Status>> {
        let slot = self.slot_mut(index)?;
        if !slot.active {
            return Ok(Some(slot.last.clone().unwrap_or_else(Status::empty)));
        }
        Ok(self.poll_slot(index))
    }

    /// Peek at entry `index` without retiring it.
    pub fn status(&self, index: usize) -> Result<Option<Status>> {
        let slot = self.slot(index)?;
        if !slot.active {
            return Ok(slot.last.clone());
        }
        let Some(handle) = slot.handle.as_ref() else {
            return Ok(None);
        };
        let mut statuses = Vec::with_capacity(handle.completions().len());
        for completion in handle.completions() {
            match completion.peek() {
                Some(status) => statuses.push(status),
                None => return Ok(None),
            }
        }
        Ok(Some(Status::merge(statuses)))
    }

    /// Request cancellation of entry `index`. The entry stays active until
    /// waited out.
    pub fn cancel(&self, index: usize) -> Result<bool> {
        let slot = self.slot(index)?;
        Ok(slot.active && slot.handle.as_ref().map_or(false, H::withdraw))
    }

    /// Request cancellation of every active entry. Returns how many were
    /// withdrawn.
    pub fn cancel_all(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.active)
            .filter(|s| s.handle.as_ref().map_or(false, H::withdraw))
            .count()
    }

    /// Remove the handle at `index` from the pool. The index stays reserved.
    pub fn take(&mut self, index: usize) -> Option<H> {
        let slot = self.slots.get_mut(index)?;
        let handle = slot.handle.take()?;
        if let Some(id) = slot.signal_id.take() {
            for completion in handle.completions() {
                completion.remove_signal(id);
            }
        }
        slot.active = false;
        Some(handle)
    }

    pub fn get(&self, index: usize) -> Option<&H> {
        self.slots.get(index)?.handle.as_ref()
    }

    fn slot(&self, index: usize) -> Result<&Slot<H>> {
        let len = self.slots.len();
        self.slots
            .get(index)
            .ok_or_else(|| Error::InvalidArgument(format!("pool index {} out of {}", index, len)))
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot<H>> {
        let len = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or_else(|| Error::InvalidArgument(format!("pool index {} out of {}", index, len)))
    }

    /// Attach a ready signal for `index` to every completion of its handle.
    fn activate(&mut self, index: usize) {
        let signal = self.driver.register_slot(index);
        let slot = &mut self.slots[index];
        if let Some(handle) = slot.handle.as_ref() {
            for completion in handle.completions() {
                completion.add_signal(signal.clone());
            }
        }
        slot.signal_id = Some(signal.id());
        slot.active = true;
    }

    fn retire(&mut self, index: usize, status: Status) {
        let slot = &mut self.slots[index];
        slot.active = false;
        slot.last = Some(status);
        // Signals of terminal completions are already detached.
        slot.signal_id = None;
    }

    fn poll_slot(&mut self, index: usize) -> Option<Status> {
        let slot = self.slots.get_mut(index)?;
        if !slot.active {
            return None;
        }
        let status = slot.handle.as_mut()?.poll()?;
        self.retire(index, status.clone());
        Some(status)
    }

    fn poll_indices<I>(&mut self, indices: I) -> Option<(usize, Status)>
    where
        I: IntoIterator<Item = usize>,
    {
        indices
            .into_iter()
            .find_map(|index| self.poll_slot(index).map(|status| (index, status)))
    }

    fn poll_all(&mut self) -> Vec<(usize, Status)> {
        (0..self.slots.len())
            .filter_map(|index| self.poll_slot(index).map(|status| (index, status)))
            .collect()
    }
}

impl<'a> Pool<PersistentRequest<'a>> {
    /// Start entry `index`.
    pub fn start(&mut self, index: usize) -> Result<()> {
        let slot = self.slot_mut(index)?;
        let handle = slot
            .handle
            .as_mut()
            .ok_or_else(|| Error::InvalidState(format!("pool entry {} was taken", index)))?;
        handle.start()?;
        self.activate(index);
        Ok(())
    }

    /// Start every entry still held by the pool. Stops at the first failure.
    pub fn start_all(&mut self) -> Result<()> {
        for index in 0..self.slots.len() {
            if self.slots[index].handle.is_some() {
                self.start(index)?;
            }
        }
        Ok(())
    }
}

impl<H: PoolHandle> Drop for Pool<H> {
    fn drop(&mut self) {
        let pending = self.active_len();
        if pending > 0 {
            log::debug!("[pool] dropping pool with {} pending entries", pending);
        }
        // Handles wait out their own operations when dropped.
        self.slots.clear();
    }
}

impl<H: PoolHandle> std::fmt::Debug for Pool<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("len", &self.slots.len())
            .field("active", &self.active_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::Tag;
    use crate::datatype::Transferred;
    use crate::transport::LocalFabric;
    use crate::transport::Transport;
    use std::thread;
    use std::time::Duration;

    fn transport() -> Arc<dyn Transport> {
        LocalFabric::new(1).expect("fabric")
    }

    fn done(bytes: usize) -> Status {
        Status::new(
            Some(0),
            Tag::new(3),
            Transferred {
                primitives: bytes / 4,
                bytes,
            },
        )
    }

    fn pending(t: &Arc<dyn Transport>) -> (Request<'static>, Arc<Completion>) {
        let c = Completion::new();
        (Request::new(vec![Arc::clone(&c)], Arc::clone(t)), c)
    }

    #[test]
    fn test_empty_pool() {
        let mut pool = RequestPool::new();
        assert!(pool.wait_all().is_empty());
        assert!(pool.wait_any().is_none());
        assert!(pool.wait_some().is_empty());
        assert!(matches!(pool.test_any(), TestAny::NoActiveRequests));
        assert_eq!(pool.test_some().0, TestResult::NoActiveRequests);
        assert_eq!(pool.test_all().map(|v| v.len()), Some(0));
    }

    #[test]
    fn test_wait_all_idempotent() {
        let t = transport();
        let mut pool = RequestPool::new();
        for bytes in [4, 8, 12] {
            let (req, c) = pending(&t);
            c.complete(done(bytes));
            pool.push(req);
        }
        let first = pool.wait_all();
        assert_eq!(
            first.iter().map(|(i, s)| (*i, s.byte_count())).collect::<Vec<_>>(),
            vec![(0, 4), (1, 8), (2, 12)]
        );
        assert!(pool.wait_all().is_empty());
        assert_eq!(pool.active_len(), 0);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.wait(1).expect("index").byte_count(), 8);
    }

    #[test]
    fn test_wait_any_retires_one() {
        let t = transport();
        let mut pool = RequestPool::new();
        let (a, ca) = pending(&t);
        let (b, cb) = pending(&t);
        pool.push(a);
        pool.push(b);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cb.complete(done(4));
        });
        let (index, status) = pool.wait_any().expect("one completes");
        handle.join().expect("completer");
        assert_eq!(index, 1);
        assert_eq!(status.byte_count(), 4);
        assert_eq!(pool.active_len(), 1);
        assert!(matches!(pool.test_any(), TestAny::Pending));

        // Not queued at the transport, so nothing to withdraw.
        assert!(!pool.cancel(0).expect("index"));
        ca.complete(Status::cancelled());
        assert!(pool.wait(0).expect("index").is_cancelled());
    }

    #[test]
    fn test_some_and_status() {
        let t = transport();
        let mut pool = RequestPool::new();
        let (a, ca) = pending(&t);
        let (b, cb) = pending(&t);
        let (c, cc) = pending(&t);
        pool.push(a);
        pool.push(b);
        pool.push(c);

        assert_eq!(pool.test_some().0, TestResult::NoCompleted);
        assert!(pool.test_all().is_none());
        ca.complete(done(4));
        cb.complete(Status::failed(Error::TypeMismatch));
        assert!(pool.status(0).expect("index").is_some());
        assert_eq!(pool.active_len(), 3);

        let some = pool.wait_some();
        assert_eq!(some.len(), 2);
        assert!(some[1].1.error().is_some());
        assert_eq!(pool.active_len(), 1);
        assert!(pool.test(5).is_err());

        cc.complete(done(8));
        assert_eq!(pool.test(2).expect("index").map(|s| s.byte_count()), Some(8));
    }

    #[test]
    fn test_take_detaches() {
        let t = transport();
        let mut pool = RequestPool::new();
        let (a, ca) = pending(&t);
        pool.push(a);
        let mut req = pool.take(0).expect("held");
        assert!(pool.take(0).is_none());
        assert_eq!(pool.active_len(), 0);
        ca.complete(done(4));
        assert_eq!(req.wait().expect("ok").byte_count(), 4);
    }
}
