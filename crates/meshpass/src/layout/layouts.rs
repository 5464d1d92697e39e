// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-endpoint argument lists for variable-count collectives.
//!
//! Neither container validates its length; the collective that consumes it
//! checks it against the group size.

use super::Layout;
use std::ops::{Index, IndexMut};

/// Ordered list of layouts, one per endpoint.
pub struct Layouts<T> {
    items: Vec<Layout<T>>,
}

impl<T> Clone for Layouts<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Layouts<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T> Layouts<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// `n` copies of `layout`.
    pub fn filled(n: usize, layout: &Layout<T>) -> Self {
        Self {
            items: vec![layout.clone(); n],
        }
    }

    pub fn push(&mut self, layout: Layout<T>) {
        self.items.push(layout);
    }

    /// Alias of [`push`](Self::push).
    pub fn push_back(&mut self, layout: Layout<T>) {
        self.push(layout);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Layout<T>> {
        self.items.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layout<T>> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Layout<T>] {
        &self.items
    }
}

impl<T: crate::Datatype> Layouts<T> {
    /// `n` empty layouts.
    pub fn with_len(n: usize) -> Self {
        Self::filled(n, &Layout::empty())
    }
}

impl<T> Default for Layouts<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for Layouts<T> {
    type Output = Layout<T>;

    fn index(&self, i: usize) -> &Layout<T> {
        &self.items[i]
    }
}

impl<T> IndexMut<usize> for Layouts<T> {
    fn index_mut(&mut self, i: usize) -> &mut Layout<T> {
        &mut self.items[i]
    }
}

impl<T> From<Vec<Layout<T>>> for Layouts<T> {
    fn from(items: Vec<Layout<T>>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<Layout<T>> for Layouts<T> {
    fn from_iter<I: IntoIterator<Item = Layout<T>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a Layouts<T> {
    type Item = &'a Layout<T>;
    type IntoIter = std::slice::Iter<'a, Layout<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Ordered byte displacements, one per endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Displacements {
    items: Vec<isize>,
}

impl Displacements {
    pub fn new() -> Self {
        Self::default()
    }

    /// `n` zero displacements.
    pub fn zeros(n: usize) -> Self {
        Self { items: vec![0; n] }
    }

    pub fn push(&mut self, displacement: isize) {
        self.items.push(displacement);
    }

    pub fn push_back(&mut self, displacement: isize) {
        self.push(displacement);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, isize> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[isize] {
        &self.items
    }
}

impl Index<usize> for Displacements {
    type Output = isize;

    fn index(&self, i: usize) -> &isize {
        &self.items[i]
    }
}

impl IndexMut<usize> for Displacements {
    fn index_mut(&mut self, i: usize) -> &mut isize {
        &mut self.items[i]
    }
}

impl From<Vec<isize>> for Displacements {
    fn from(items: Vec<isize>) -> Self {
        Self { items }
    }
}

impl FromIterator<isize> for Displacements {
    fn from_iter<I: IntoIterator<Item = isize>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
