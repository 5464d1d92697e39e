// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Operation handles.
//!
//! A [`Request`] tracks one non-blocking operation (or several, for
//! non-blocking collectives) and borrows the caller buffer for its whole
//! life. Dropping a pending request blocks until the operation is terminal,
//! so the buffer is never released while the transport may still use it.
//! Leaking a pending request with `mem::forget` skips that wait and leaves
//! the transport holding a released buffer. Code that cannot rule this out
//! should issue through [`Communicator::scope`](crate::Communicator::scope),
//! which waits for its operations whatever happens to the handles.

mod bitmap;
pub mod completion;
pub(crate) mod driver;
pub mod pool;
pub mod status;

pub use completion::{Completion, CompletionSignal};
pub use pool::{PersistentRequestPool, Pool, PoolHandle, RequestPool, TestAny, TestResult};
pub use status::Status;

use crate::error::{Error, Result};
use crate::transport::Transport;
use std::marker::PhantomData;
use std::sync::Arc;

/// Handle to a pending non-blocking operation.
#[must_use = "dropping a pending request blocks until it completes"]
pub struct Request<'a> {
    parts: Vec<Arc<Completion>>,
    transport: Arc<dyn Transport>,
    result: Option<Status>,
    _buffer: PhantomData<&'a mut ()>,
}

impl<'a> Request<'a> {
    pub(crate) fn new(parts: Vec<Arc<Completion>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            parts,
            transport,
            result: None,
            _buffer: PhantomData,
        }
    }

    /// Block until terminal. Repeated calls return the same result.
    pub fn wait(&mut self) -> Result<Status> {
        self.wait_status().into_result()
    }

    /// Non-blocking check. `Ok(None)` while pending.
    pub fn test(&mut self) -> Result<Option<Status>> {
        self.test_status().map(Status::into_result).transpose()
    }

    /// Ask the transport to withdraw the operation. Advisory: returns `true`
    /// only if some part was withdrawn. The request must still be waited on.
    pub fn cancel(&self) -> bool {
        if self.result.is_some() {
            return false;
        }
        let mut withdrawn = false;
        for part in &self.parts {
            withdrawn |= self.transport.cancel(part);
        }
        withdrawn
    }

    /// Peek at the terminal status without waiting.
    pub fn status(&self) -> Option<Status> {
        if let Some(status) = &self.result {
            return Some(status.clone());
        }
        self.peek_parts()
    }

    pub fn is_complete(&self) -> bool {
        self.result.is_some() || self.parts.iter().all(|p| p.is_complete())
    }

    /// Block until terminal and return the raw status, failures included.
    pub fn wait_status(&mut self) -> Status {
        if let Some(status) = &self.result {
            return status.clone();
        }
        let status = Status::merge(self.parts.iter().map(|p| p.wait()));
        self.result = Some(status.clone());
        status
    }

    /// Non-blocking variant of [`wait_status`](Self::wait_status).
    pub fn test_status(&mut self) -> Option<Status> {
        if self.result.is_none() {
            self.result = self.peek_parts();
        }
        self.result.clone()
    }

    pub(crate) fn parts(&self) -> &[Arc<Completion>] {
        &self.parts
    }

    fn peek_parts(&self) -> Option<Status> {
        let mut statuses = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            statuses.push(part.peek()?);
        }
        Some(Status::merge(statuses))
    }
}

impl Drop for Request<'_> {
    fn drop(&mut self) {
        if self.result.is_none() && !self.is_complete() {
            log::debug!(
                "[request] dropping pending request ({} parts), waiting for completion",
                self.parts.len()
            );
            for part in &self.parts {
                part.wait();
            }
        }
    }
}

impl std::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("parts", &self.parts.len())
            .field("result", &self.result)
            .finish()
    }
}

/// Re-posts the operation of a persistent request.
type Starter<'a> = Box<dyn FnMut() -> Result<Vec<Arc<Completion>>> + 'a>;

/// Operation set up once and started many times.
///
/// Inactive until [`start`](Self::start); active until a wait or a
/// successful test retires it. Waiting on an inactive request returns an
/// empty status immediately.
pub struct PersistentRequest<'a> {
    starter: Starter<'a>,
    transport: Arc<dyn Transport>,
    parts: Vec<Arc<Completion>>,
    active: bool,
    last: Option<Status>,
}

impl<'a> PersistentRequest<'a> {
    pub(crate) fn new(starter: Starter<'a>, transport: Arc<dyn Transport>) -> Self {
        Self {
            starter,
            transport,
            parts: Vec::new(),
            active: false,
            last: None,
        }
    }

    /// Post the operation. Fails with `InvalidState` while active.
    pub fn start(&mut self) -> Result<()> {
        if self.active {
            return Err(Error::InvalidState(
                "persistent request started while active".into(),
            ));
        }
        self.parts = (self.starter)()?;
        self.active = true;
        self.last = None;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn wait(&mut self) -> Result<Status> {
        self.wait_status().into_result()
    }

    pub fn test(&mut self) -> Result<Option<Status>> {
        self.test_status().map(Status::into_result).transpose()
    }

    pub fn cancel(&self) -> bool {
        if !self.active {
            return false;
        }
        let mut withdrawn = false;
        for part in &self.parts {
            withdrawn |= self.transport.cancel(part);
        }
        withdrawn
    }

    /// Status of the last completed activation.
    pub fn status(&self) -> Option<Status> {
        if self.active {
            let mut statuses = Vec::with_capacity(self.parts.len());
            for part in &self.parts {
                statuses.push(part.peek()?);
            }
            return Some(Status::merge(statuses));
        }
        self.last.clone()
    }

    pub fn wait_status(&mut self) -> Status {
        if !self.active {
            return self.last.clone().unwrap_or_else(Status::empty);
        }
        let status = Status::merge(self.parts.iter().map(|p| p.wait()));
        self.retire(status.clone());
        status
    }

    pub fn test_status(&mut self) -> Option<Status> {
        if !self.active {
            return Some(self.last.clone().unwrap_or_else(Status::empty));
        }
        let status = self.status()?;
        self.retire(status.clone());
        Some(status)
    }

    pub(crate) fn parts(&self) -> &[Arc<Completion>] {
        if self.active {
            &self.parts
        } else {
            &[]
        }
    }

    fn retire(&mut self, status: Status) {
        self.active = false;
        self.parts.clear();
        self.last = Some(status);
    }
}

impl Drop for PersistentRequest<'_> {
    fn drop(&mut self) {
        if self.active {
            log::debug!("[request] dropping active persistent request, waiting for completion");
            for part in &self.parts {
                part.wait();
            }
        }
    }
}

impl std::fmt::Debug for PersistentRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentRequest")
            .field("active", &self.active)
            .field("parts", &self.parts.len())
            .field("last", &self.last)
            .finish()
    }
}

#[cfg(test)]
mod tests;
