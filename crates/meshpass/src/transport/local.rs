// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport running every rank as a thread of one process.
//!
//! Send-mode behaviour:
//! - standard and synchronous sends complete when matched (no eager copy)
//! - buffered sends complete at post time, delivering from the staged copy
//! - ready sends fail with [`Error::NotReady`] when no receive is posted

use super::mailbox::{Incoming, Mailbox, Offer};
use super::{Endpoint, Envelope, Group, Payload, RecvFilter, RecvSink, SendMode, Transport};
use crate::comm::Communicator;
use crate::datatype::Transferred;
use crate::error::{Error, Result};
use crate::request::{Completion, Status};
use std::sync::Arc;
use std::thread;

/// Shared mailboxes of an in-process group.
pub struct LocalFabric {
    mailboxes: Vec<Mailbox>,
}

impl LocalFabric {
    /// Fabric for `size` ranks.
    pub fn new(size: usize) -> Result<Arc<Self>> {
        if size == 0 {
            return Err(Error::InvalidArgument("fabric needs at least one rank".into()));
        }
        let mailboxes = (0..size).map(|_| Mailbox::default()).collect();
        log::debug!("[transport] local fabric with {} ranks", size);
        Ok(Arc::new(Self { mailboxes }))
    }

    pub fn size(&self) -> usize {
        self.mailboxes.len()
    }

    /// Communicator for `rank`.
    pub fn communicator(self: &Arc<Self>, rank: usize) -> Result<Communicator> {
        let group = LocalGroup::new(rank, self.size())?;
        Ok(Communicator::new(
            Arc::new(group),
            Arc::clone(self) as Arc<dyn Transport>,
        ))
    }

    /// Communicators for every rank, in rank order.
    pub fn communicators(self: &Arc<Self>) -> Result<Vec<Communicator>> {
        (0..self.size()).map(|rank| self.communicator(rank)).collect()
    }

    /// Run `f` on `size` ranks, one thread each, and collect the results in
    /// rank order. A panic on any rank is propagated.
    pub fn run<F, R>(size: usize, f: F) -> Result<Vec<R>>
    where
        F: Fn(Communicator) -> R + Sync,
        R: Send,
    {
        let comms = Self::new(size)?.communicators()?;
        let f = &f;
        thread::scope(|scope| {
            let handles = comms
                .into_iter()
                .enumerate()
                .map(|(rank, comm)| {
                    thread::Builder::new()
                        .name(format!("meshpass-rank-{}", rank))
                        .spawn_scoped(scope, move || f(comm))
                })
                .collect::<std::io::Result<Vec<_>>>()?;

            Ok(handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect())
        })
    }

    fn mailbox(&self, endpoint: Endpoint) -> Result<&Mailbox> {
        usize::try_from(endpoint.0)
            .ok()
            .and_then(|i| self.mailboxes.get(i))
            .ok_or(Error::InvalidRank {
                rank: endpoint.0 as usize,
                size: self.mailboxes.len(),
            })
    }

    /// Queued (posted receives, unexpected messages) at `rank`.
    pub fn queue_depth(&self, rank: usize) -> Option<(usize, usize)> {
        self.mailboxes.get(rank).map(Mailbox::depth)
    }
}

impl Transport for LocalFabric {
    fn post_send(
        &self,
        envelope: Envelope,
        payload: Payload,
        mode: SendMode,
    ) -> Result<Arc<Completion>> {
        let mailbox = self.mailbox(envelope.dest)?;
        let completion = Completion::new();

        let track = if mode == SendMode::Buffered {
            let map = payload.type_map();
            completion.complete(Status::new(
                None,
                envelope.tag,
                Transferred {
                    primitives: map.primitive_count(),
                    bytes: map.data_bytes(),
                },
            ));
            None
        } else {
            Some(Arc::clone(&completion))
        };

        let incoming = Incoming {
            envelope,
            payload,
            completion: track,
        };
        if let Offer::Refused(incoming) = mailbox.offer(incoming, mode == SendMode::Ready) {
            log::warn!(
                "[transport] ready send from rank {} tag {} found no posted receive",
                envelope.source_rank,
                envelope.tag
            );
            incoming.refuse(Error::NotReady);
        }
        Ok(completion)
    }

    fn post_recv(&self, filter: RecvFilter, sink: RecvSink) -> Result<Arc<Completion>> {
        let mailbox = self.mailbox(filter.at)?;
        let completion = Completion::new();
        mailbox.accept(filter, sink, Arc::clone(&completion));
        Ok(completion)
    }

    fn probe(&self, filter: RecvFilter, blocking: bool) -> Result<Option<Status>> {
        Ok(self.mailbox(filter.at)?.probe(&filter, blocking))
    }

    fn cancel(&self, completion: &Arc<Completion>) -> bool {
        if completion.is_complete() {
            return false;
        }
        let withdrawn = self.mailboxes.iter().any(|m| m.withdraw(completion));
        if withdrawn {
            log::debug!("[transport] operation cancelled");
            completion.complete(Status::cancelled());
        }
        withdrawn
    }
}

/// Group view of one rank of a [`LocalFabric`].
#[derive(Debug, Clone, Copy)]
pub struct LocalGroup {
    rank: usize,
    size: usize,
}

impl LocalGroup {
    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if rank >= size {
            return Err(Error::InvalidRank { rank, size });
        }
        Ok(Self { rank, size })
    }
}

impl Group for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn endpoint(&self, rank: usize) -> Result<Endpoint> {
        if rank >= self.size {
            return Err(Error::InvalidRank {
                rank,
                size: self.size,
            });
        }
        Ok(Endpoint(rank as u64))
    }
}
