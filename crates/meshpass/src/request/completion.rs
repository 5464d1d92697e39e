// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared completion cell between a transport and the requests tracking it.
//!
//! A transport hands out one [`Completion`] per posted operation and
//! completes it exactly once. Requests block on it directly; pools attach a
//! [`CompletionSignal`] so one wait can cover many operations. A signal
//! attached after completion fires immediately, so no wake-up is lost.

use super::status::Status;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Notified when a completion becomes terminal.
pub trait CompletionSignal: Send + Sync {
    /// Called once, outside the completion lock.
    fn signal(&self);

    /// Stable identifier for this signal (per registration).
    fn id(&self) -> u64;
}

struct Inner {
    status: Option<Status>,
    signals: Vec<Arc<dyn CompletionSignal>>,
}

pub struct Completion {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl Completion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                status: None,
                signals: Vec::new(),
            }),
            cond: Condvar::new(),
        })
    }

    /// A completion that is already terminal.
    pub fn finished(status: Status) -> Arc<Self> {
        let completion = Self::new();
        completion.complete(status);
        completion
    }

    /// Make the completion terminal. The first call wins; later calls return
    /// `false` and are ignored.
    pub fn complete(&self, status: Status) -> bool {
        let signals = {
            let mut inner = self.inner.lock();
            if inner.status.is_some() {
                return false;
            }
            inner.status = Some(status);
            std::mem::take(&mut inner.signals)
        };
        self.cond.notify_all();
        for signal in signals {
            signal.signal();
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        self.inner.lock().status.is_some()
    }

    /// Terminal status, if any, without blocking.
    pub fn peek(&self) -> Option<Status> {
        self.inner.lock().status.clone()
    }

    /// Block until terminal.
    pub fn wait(&self) -> Status {
        let mut inner = self.inner.lock();
        loop {
            if let Some(status) = &inner.status {
                return status.clone();
            }
            self.cond.wait(&mut inner);
        }
    }

    /// Attach a signal, firing it right away if already terminal.
    pub fn add_signal(&self, signal: Arc<dyn CompletionSignal>) {
        {
            let mut inner = self.inner.lock();
            if inner.status.is_none() {
                inner.signals.push(signal);
                return;
            }
        }
        signal.signal();
    }

    /// Detach a signal by id. Returns `true` if it was still attached.
    pub fn remove_signal(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.signals.len();
        inner.signals.retain(|s| s.id() != id);
        inner.signals.len() != before
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Completion")
            .field("status", &inner.status)
            .field("signals", &inner.signals.len())
            .finish()
    }
}
