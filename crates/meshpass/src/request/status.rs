// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Completion status of a transfer.

use crate::comm::Tag;
use crate::datatype::{Datatype, Transferred};
use crate::error::{Error, Result};
use crate::layout::Layout;

/// Status of a completed (or cancelled, or failed) operation.
///
/// For receives, `source` and `tag` are the values resolved by matching, so
/// wildcard receives can learn who sent what.
#[derive(Debug, Clone, Default)]
pub struct Status {
    source: Option<usize>,
    tag: Tag,
    primitives: usize,
    bytes: usize,
    cancelled: bool,
    error: Option<Error>,
}

impl Status {
    pub fn new(source: Option<usize>, tag: Tag, moved: Transferred) -> Self {
        Self {
            source,
            tag,
            primitives: moved.primitives,
            bytes: moved.bytes,
            cancelled: false,
            error: None,
        }
    }

    /// Status of an operation withdrawn before it matched.
    pub fn cancelled() -> Self {
        Self {
            tag: Tag::any(),
            cancelled: true,
            ..Self::default()
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            tag: Tag::any(),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Status of an inactive persistent request or an empty operation.
    pub fn empty() -> Self {
        Self {
            tag: Tag::any(),
            ..Self::default()
        }
    }

    /// Fold the statuses of the parts of a compound operation.
    ///
    /// Counts add up; the first error wins; the result is cancelled if any
    /// part was. A single part is returned unchanged.
    pub(crate) fn merge<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Status>,
    {
        let mut iter = parts.into_iter();
        let Some(first) = iter.next() else {
            return Self::empty();
        };
        let mut merged = first;
        let mut compound = false;
        for part in iter {
            compound = true;
            merged.primitives += part.primitives;
            merged.bytes += part.bytes;
            merged.cancelled |= part.cancelled;
            if merged.error.is_none() {
                merged.error = part.error;
            }
        }
        if compound {
            merged.source = None;
            merged.tag = Tag::any();
        }
        merged
    }

    /// Rank of the sender, for receives.
    pub fn source(&self) -> Option<usize> {
        self.source
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Transfer-time failure, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Primitives moved.
    pub fn primitive_count(&self) -> usize {
        self.primitives
    }

    /// Bytes of data moved.
    pub fn byte_count(&self) -> usize {
        self.bytes
    }

    /// Number of whole `T` values moved, `None` if the data does not divide
    /// into `T`s.
    pub fn count<T: Datatype>(&self) -> Option<usize> {
        let per = T::descriptor().ok()?.primitive_count();
        whole_units(self.primitives, per)
    }

    /// Number of whole instances of `layout` moved.
    pub fn count_with<T>(&self, layout: &Layout<T>) -> Option<usize> {
        whole_units(self.primitives, layout.primitive_count())
    }

    /// `Err` if the operation failed, the status otherwise.
    pub fn into_result(self) -> Result<Status> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

fn whole_units(total: usize, per: usize) -> Option<usize> {
    if per == 0 {
        return if total == 0 { Some(0) } else { None };
    }
    (total % per == 0).then_some(total / per)
}
