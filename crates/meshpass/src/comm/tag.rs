// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message tags and source selectors.

use crate::config;
use crate::error::{Error, Result};
use std::fmt;

/// Message tag.
///
/// Valid send tags are `0..=Tag::up()`. [`Tag::any()`] is a receive-side
/// wildcard and is rejected by sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tag(i32);

impl Tag {
    const ANY: i32 = -1;

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Receive wildcard matching every tag.
    pub const fn any() -> Self {
        Self(Self::ANY)
    }

    /// Largest valid tag, from the runtime configuration.
    pub fn up() -> Self {
        Self(config::runtime().tag_upper_bound())
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    pub const fn is_any(self) -> bool {
        self.0 == Self::ANY
    }

    /// Whether an incoming message tagged `actual` satisfies this selector.
    pub(crate) fn matches(self, actual: Tag) -> bool {
        self.is_any() || self == actual
    }

    pub(crate) fn check_send(self) -> Result<Self> {
        if self.0 < 0 || self.0 > config::runtime().tag_upper_bound() {
            return Err(Error::InvalidTag(self.0));
        }
        Ok(self)
    }

    pub(crate) fn check_recv(self) -> Result<Self> {
        if self.is_any() {
            return Ok(self);
        }
        self.check_send()
    }
}

impl From<i32> for Tag {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            write!(f, "any")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Receive-side source selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Any,
    Rank(usize),
}

impl Source {
    pub(crate) fn matches(self, rank: usize) -> bool {
        match self {
            Source::Any => true,
            Source::Rank(r) => r == rank,
        }
    }
}

impl From<usize> for Source {
    fn from(rank: usize) -> Self {
        Source::Rank(rank)
    }
}
