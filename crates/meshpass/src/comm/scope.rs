// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scoped non-blocking operations.
//!
//! A plain [`Request`] keeps its buffer safe by blocking in `Drop`, which a
//! `mem::forget` skips. Operations issued through a [`RequestScope`] are
//! also recorded by the scope, and [`Communicator::scope`] waits for every
//! one of them before it returns, leaked requests included. Buffers handed
//! to the scope stay borrowed until then.
//!
//! ```
//! use meshpass::{LocalFabric, Source, Tag};
//!
//! let fabric = LocalFabric::new(1).unwrap();
//! let comm = fabric.communicator(0).unwrap();
//! let (sent, mut got) = (7u32, 0u32);
//! comm.scope(|s| {
//!     let recv = s.irecv(&mut got, Source::Rank(0), Tag::new(1)).unwrap();
//!     std::mem::forget(recv);
//!     s.isend(&sent, 0, Tag::new(1)).unwrap().wait().unwrap();
//! });
//! assert_eq!(got, 7);
//! ```

use super::{Communicator, Source, Tag};
use crate::datatype::Datatype;
use crate::error::Result;
use crate::layout::Layout;
use crate::request::{Completion, Request};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Issues non-blocking operations that [`Communicator::scope`] waits out.
pub struct RequestScope<'scope, 'env: 'scope> {
    comm: Communicator,
    issued: Mutex<Vec<Arc<Completion>>>,
    _scope: PhantomData<&'scope mut &'scope ()>,
    _env: PhantomData<&'env mut &'env ()>,
}

impl Communicator {
    /// Run `f` with a [`RequestScope`], then wait for every operation it
    /// issued. A panic in `f` is resumed after the wait.
    pub fn scope<'env, F, R>(&self, f: F) -> R
    where
        F: for<'scope> FnOnce(&'scope RequestScope<'scope, 'env>) -> R,
    {
        let scope = RequestScope {
            comm: self.clone(),
            issued: Mutex::new(Vec::new()),
            _scope: PhantomData,
            _env: PhantomData,
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| f(&scope)));
        scope.wait_issued();
        match outcome {
            Ok(value) => value,
            Err(payload) => resume_unwind(payload),
        }
    }
}

impl<'scope, 'env> RequestScope<'scope, 'env> {
    pub fn communicator(&self) -> &Communicator {
        &self.comm
    }

    /// Operations issued so far that are not yet terminal.
    pub fn pending(&self) -> usize {
        self.issued.lock().iter().filter(|c| !c.is_complete()).count()
    }

    pub fn isend<T: Datatype>(
        &'scope self,
        value: &'scope T,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'scope>> {
        self.track(self.comm.isend(value, dest, tag))
    }

    pub fn isend_with<T: Datatype>(
        &'scope self,
        buf: &'scope [T],
        layout: &Layout<T>,
        dest: usize,
        tag: Tag,
    ) -> Result<Request<'scope>> {
        self.track(self.comm.isend_with(buf, layout, dest, tag))
    }

    pub fn irecv<T: Datatype>(
        &'scope self,
        value: &'scope mut T,
        source: Source,
        tag: Tag,
    ) -> Result<Request<'scope>> {
        self.track(self.comm.irecv(value, source, tag))
    }

    pub fn irecv_with<T: Datatype>(
        &'scope self,
        buf: &'scope mut [T],
        layout: &Layout<T>,
        source: Source,
        tag: Tag,
    ) -> Result<Request<'scope>> {
        self.track(self.comm.irecv_with(buf, layout, source, tag))
    }

    fn track(&self, request: Result<Request<'scope>>) -> Result<Request<'scope>> {
        let request = request?;
        self.issued.lock().extend(request.parts().iter().cloned());
        Ok(request)
    }

    fn wait_issued(&self) {
        let issued = std::mem::take(&mut *self.issued.lock());
        let pending = issued.iter().filter(|c| !c.is_complete()).count();
        if pending > 0 {
            log::debug!("[scope] waiting for {} pending operations", pending);
        }
        for part in &issued {
            part.wait();
        }
    }
}

impl std::fmt::Debug for RequestScope<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("rank", &self.comm.rank())
            .field("issued", &self.issued.lock().len())
            .finish()
    }
}
