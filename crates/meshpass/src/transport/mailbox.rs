// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-rank matching queues of the local fabric.
//!
//! Each rank owns one mailbox holding, in arrival order, the receives it has
//! posted that found no message yet and the messages sent to it that found no
//! receive yet. At most one of the two queues holds an entry that could match
//! a newcomer, so searching the other queue front to back is non-overtaking.
//! Data is copied under the mailbox lock; completions fire after it is
//! released.

use super::{Envelope, Payload, RecvFilter, RecvSink};
use crate::datatype::Transferred;
use crate::error::Error;
use crate::request::{Completion, Status};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// A message waiting for its receive.
pub(super) struct Incoming {
    pub(super) envelope: Envelope,
    pub(super) payload: Payload,
    /// Completed on match. `None` when the send completed at post time.
    pub(super) completion: Option<Arc<Completion>>,
}

struct PostedRecv {
    filter: RecvFilter,
    sink: RecvSink,
    completion: Arc<Completion>,
}

#[derive(Default)]
struct Queues {
    posted: VecDeque<PostedRecv>,
    unexpected: VecDeque<Incoming>,
}

/// Outcome of offering a message to a mailbox.
pub(super) enum Offer {
    Matched,
    Queued,
    /// No receive was posted and the sender required one.
    Refused(Incoming),
}

#[derive(Default)]
pub(super) struct Mailbox {
    queues: Mutex<Queues>,
    arrived: Condvar,
}

impl Mailbox {
    /// Match `incoming` against posted receives, or queue it.
    ///
    /// With `require_posted`, an unmatched message is handed back instead of
    /// queued.
    pub(super) fn offer(&self, incoming: Incoming, require_posted: bool) -> Offer {
        let mut queues = self.queues.lock();
        let position = queues
            .posted
            .iter()
            .position(|r| r.filter.accepts(&incoming.envelope));

        match position.and_then(|pos| queues.posted.remove(pos)) {
            Some(recv) => {
                let done = deliver(&incoming, recv.sink, recv.completion);
                drop(queues);
                done.fire(incoming.completion);
                Offer::Matched
            }
            None if require_posted => Offer::Refused(incoming),
            None => {
                log::debug!(
                    "[transport] queued unexpected message from rank {} tag {}",
                    incoming.envelope.source_rank,
                    incoming.envelope.tag
                );
                queues.unexpected.push_back(incoming);
                self.arrived.notify_all();
                Offer::Queued
            }
        }
    }

    /// Match a receive against queued messages, or post it.
    pub(super) fn accept(&self, filter: RecvFilter, sink: RecvSink, completion: Arc<Completion>) {
        let mut queues = self.queues.lock();
        let position = queues
            .unexpected
            .iter()
            .position(|m| filter.accepts(&m.envelope));

        match position.and_then(|pos| queues.unexpected.remove(pos)) {
            Some(incoming) => {
                let done = deliver(&incoming, sink, completion);
                drop(queues);
                // Dropping `incoming` here releases any staged copy.
                done.fire(incoming.completion);
            }
            None => queues.posted.push_back(PostedRecv {
                filter,
                sink,
                completion,
            }),
        }
    }

    /// Status of the first queued message matching `filter`.
    pub(super) fn probe(&self, filter: &RecvFilter, blocking: bool) -> Option<Status> {
        let mut queues = self.queues.lock();
        loop {
            if let Some(m) = queues.unexpected.iter().find(|m| filter.accepts(&m.envelope)) {
                let map = m.payload.type_map();
                return Some(Status::new(
                    Some(m.envelope.source_rank),
                    m.envelope.tag,
                    Transferred {
                        primitives: map.primitive_count(),
                        bytes: map.data_bytes(),
                    },
                ));
            }
            if !blocking {
                return None;
            }
            self.arrived.wait(&mut queues);
        }
    }

    /// Remove the queued operation tracked by `completion`.
    pub(super) fn withdraw(&self, completion: &Arc<Completion>) -> bool {
        let mut queues = self.queues.lock();
        if let Some(pos) = queues
            .posted
            .iter()
            .position(|r| Arc::ptr_eq(&r.completion, completion))
        {
            queues.posted.remove(pos);
            return true;
        }
        if let Some(pos) = queues.unexpected.iter().position(|m| {
            m.completion
                .as_ref()
                .map_or(false, |c| Arc::ptr_eq(c, completion))
        }) {
            queues.unexpected.remove(pos);
            return true;
        }
        false
    }

    /// Number of queued (posted, unexpected) entries.
    pub(super) fn depth(&self) -> (usize, usize) {
        let queues = self.queues.lock();
        (queues.posted.len(), queues.unexpected.len())
    }
}

/// Completions to fire once the mailbox lock is released.
struct Delivered {
    recv: Arc<Completion>,
    recv_status: Status,
    send_status: Status,
}

impl Delivered {
    fn fire(self, send: Option<Arc<Completion>>) {
        self.recv.complete(self.recv_status);
        if let Some(send) = send {
            send.complete(self.send_status);
        }
    }
}

fn deliver(incoming: &Incoming, sink: RecvSink, recv: Arc<Completion>) -> Delivered {
    let envelope = &incoming.envelope;
    // SAFETY: the sender's request keeps the payload source alive and the
    // receiver's request keeps the sink alive until their completions fire,
    // which happens only after this copy.
    match unsafe { incoming.payload.deliver(&sink) } {
        Ok(moved) => Delivered {
            recv,
            recv_status: Status::new(Some(envelope.source_rank), envelope.tag, moved),
            send_status: Status::new(None, envelope.tag, moved),
        },
        Err(e) => {
            log::debug!(
                "[transport] delivery from rank {} tag {} failed: {}",
                envelope.source_rank,
                envelope.tag,
                e
            );
            Delivered {
                recv,
                recv_status: Status::failed(e.clone()),
                send_status: Status::failed(e),
            }
        }
    }
}

impl Incoming {
    /// Fail the send side of a refused message.
    pub(super) fn refuse(self, error: Error) {
        if let Some(completion) = self.completion {
            completion.complete(Status::failed(error));
        }
    }
}
