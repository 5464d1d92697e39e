// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Memory layouts.
//!
//! A [`Layout<T>`] selects which `T` elements of a buffer take part in a
//! transfer and in what order. Layouts are immutable value objects: every
//! constructor compiles the shape into a flattened [`TypeMap`] once, and
//! clones share it.
//!
//! Layouts compose: each `*_of` constructor repeats another layout instead
//! of a single `T`, using the inner layout's extent as its unit.
//!
//! ```
//! use meshpass::Layout;
//!
//! // Every other f64 out of 8.
//! let even = Layout::<f64>::strided(4, 1, 2).unwrap();
//! assert_eq!(even.element_count(), 4);
//! assert_eq!(even.byte_extent(), 7 * 8);
//!
//! // Two copies of that pattern, back to back.
//! let twice = Layout::contiguous_of(2, &even.resize(0, 8).unwrap()).unwrap();
//! assert_eq!(twice.element_count(), 8);
//! ```

pub mod layouts;
mod shape;

pub use layouts::{Displacements, Layouts};
pub use shape::{Order, Shape, SubarrayDim};

use crate::datatype::{Datatype, TypeMap};
use crate::error::{Error, Result};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug)]
struct LayoutNode {
    shape: Shape,
    element: Option<Arc<LayoutNode>>,
    element_count: usize,
    map: TypeMap,
}

/// Typed memory layout over elements of `T`.
pub struct Layout<T> {
    node: Arc<LayoutNode>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Layout<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Layout<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("element", &std::any::type_name::<T>())
            .field("shape", &self.node.shape)
            .field("nested", &self.node.element.is_some())
            .field("element_count", &self.node.element_count)
            .field("byte_extent", &self.byte_extent())
            .finish()
    }
}

impl<T> PartialEq for Layout<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
            || (self.node.element_count == other.node.element_count
                && self.node.map == other.node.map)
    }
}

impl<T: Datatype> Layout<T> {
    fn build(shape: Shape, element: Option<&Layout<T>>) -> Result<Self> {
        let shape = shape.normalized()?;
        shape.validate()?;

        let (element_map, unit_count) = match element {
            Some(inner) => (inner.node.map.clone(), inner.node.element_count),
            None => (T::descriptor()?.type_map().clone(), 1),
        };
        match &shape {
            Shape::HIndexed { blocks } => {
                check_whole_elements::<T>(&element_map, blocks.iter().map(|&(_, d)| d))?
            }
            Shape::HIndexedBlock { displacements, .. } => {
                check_whole_elements::<T>(&element_map, displacements.iter().copied())?
            }
            _ => {}
        }
        let element_count = shape
            .count()?
            .checked_mul(unit_count)
            .ok_or_else(|| Error::InvalidLayout("element count overflows".into()))?;
        let map = shape.compile(&element_map)?;

        log::trace!(
            "[layout] {:?} over {} -> {} elements, {} blocks",
            shape,
            if element.is_some() { "layout" } else { std::any::type_name::<T>() },
            element_count,
            map.blocks().len()
        );

        Ok(Self {
            node: Arc::new(LayoutNode {
                shape,
                element: element.map(|l| Arc::clone(&l.node)),
                element_count,
                map,
            }),
            _marker: PhantomData,
        })
    }

    // ===================================================================
    // Constructors over single elements
    // ===================================================================

    /// Layout selecting nothing.
    pub fn empty() -> Self {
        Self {
            node: Arc::new(LayoutNode {
                shape: Shape::Empty,
                element: None,
                element_count: 0,
                map: TypeMap::empty(),
            }),
            _marker: PhantomData,
        }
    }

    /// `count` consecutive elements.
    pub fn contiguous(count: usize) -> Result<Self> {
        Self::build(Shape::Contiguous { count }, None)
    }

    /// `count` blocks of `block_length` elements, block starts `stride`
    /// elements apart.
    pub fn strided(count: usize, block_length: usize, stride: isize) -> Result<Self> {
        Self::build(
            Shape::Strided {
                count,
                block_length,
                stride,
            },
            None,
        )
    }

    /// Blocks of `(length, displacement)` in element units.
    pub fn indexed(blocks: &[(usize, isize)]) -> Result<Self> {
        Self::build(
            Shape::Indexed {
                blocks: blocks.to_vec(),
            },
            None,
        )
    }

    /// Blocks of `(length, displacement)` with byte displacements.
    ///
    /// If `T` holds `bool` or `char`, every displacement must be a multiple
    /// of `size_of::<T>()`.
    pub fn hindexed(blocks: &[(usize, isize)]) -> Result<Self> {
        Self::build(
            Shape::HIndexed {
                blocks: blocks.to_vec(),
            },
            None,
        )
    }

    /// Equal-length blocks at element displacements.
    pub fn indexed_block(block_length: usize, displacements: &[isize]) -> Result<Self> {
        Self::build(
            Shape::IndexedBlock {
                block_length,
                displacements: displacements.to_vec(),
            },
            None,
        )
    }

    /// Equal-length blocks at byte displacements, under the same rule as
    /// [`hindexed`](Self::hindexed).
    pub fn hindexed_block(block_length: usize, displacements: &[isize]) -> Result<Self> {
        Self::build(
            Shape::HIndexedBlock {
                block_length,
                displacements: displacements.to_vec(),
            },
            None,
        )
    }

    /// Rectangular block of a multidimensional array.
    ///
    /// `sizes`, `subsizes` and `starts` list one entry per dimension in
    /// declaration order; `order` says how the array is laid out in memory.
    /// The layout's extent is the whole array.
    pub fn subarray(
        sizes: &[usize],
        subsizes: &[usize],
        starts: &[usize],
        order: Order,
    ) -> Result<Self> {
        Self::build(subarray_shape(sizes, subsizes, starts, order)?, None)
    }

    /// Sub-array from per-dimension parameters.
    pub fn subarray_dims(dims: &[SubarrayDim], order: Order) -> Result<Self> {
        Self::build(
            Shape::Subarray {
                dims: dims.to_vec(),
                order,
            },
            None,
        )
    }

    // ===================================================================
    // Constructors over another layout
    // ===================================================================

    pub fn contiguous_of(count: usize, element: &Layout<T>) -> Result<Self> {
        Self::build(Shape::Contiguous { count }, Some(element))
    }

    pub fn strided_of(
        count: usize,
        block_length: usize,
        stride: isize,
        element: &Layout<T>,
    ) -> Result<Self> {
        Self::build(
            Shape::Strided {
                count,
                block_length,
                stride,
            },
            Some(element),
        )
    }

    pub fn indexed_of(blocks: &[(usize, isize)], element: &Layout<T>) -> Result<Self> {
        Self::build(
            Shape::Indexed {
                blocks: blocks.to_vec(),
            },
            Some(element),
        )
    }

    pub fn hindexed_of(blocks: &[(usize, isize)], element: &Layout<T>) -> Result<Self> {
        Self::build(
            Shape::HIndexed {
                blocks: blocks.to_vec(),
            },
            Some(element),
        )
    }

    pub fn indexed_block_of(
        block_length: usize,
        displacements: &[isize],
        element: &Layout<T>,
    ) -> Result<Self> {
        Self::build(
            Shape::IndexedBlock {
                block_length,
                displacements: displacements.to_vec(),
            },
            Some(element),
        )
    }

    pub fn hindexed_block_of(
        block_length: usize,
        displacements: &[isize],
        element: &Layout<T>,
    ) -> Result<Self> {
        Self::build(
            Shape::HIndexedBlock {
                block_length,
                displacements: displacements.to_vec(),
            },
            Some(element),
        )
    }

    pub fn subarray_of(
        sizes: &[usize],
        subsizes: &[usize],
        starts: &[usize],
        order: Order,
        element: &Layout<T>,
    ) -> Result<Self> {
        Self::build(subarray_shape(sizes, subsizes, starts, order)?, Some(element))
    }

    // ===================================================================
    // Resizing
    // ===================================================================

    /// Same elements with bounds `[lb, lb + extent)` in bytes.
    ///
    /// Resizing a resized layout replaces its bounds. For `bool`/`char`
    /// data both values must be whole multiples of `size_of::<T>()`.
    pub fn byte_resize(&self, lb: isize, extent: isize) -> Result<Self> {
        check_whole_elements::<T>(&self.node.map, [lb, extent].into_iter())?;
        let base = match (&self.node.shape, &self.node.element) {
            (Shape::Resized { .. }, Some(inner)) => Arc::clone(inner),
            _ => Arc::clone(&self.node),
        };
        let map = base.map.resized(lb, extent)?;
        Ok(Self {
            node: Arc::new(LayoutNode {
                shape: Shape::Resized { lb, extent },
                element_count: base.element_count,
                element: Some(base),
                map,
            }),
            _marker: PhantomData,
        })
    }

    /// Same elements with bounds `[lb, lb + extent)` in units of `T`.
    pub fn resize(&self, lb: isize, extent: isize) -> Result<Self> {
        let unit = element_size::<T>()?;
        let lb = lb
            .checked_mul(unit)
            .ok_or_else(|| Error::InvalidLayout("lower bound overflows".into()))?;
        let extent = extent
            .checked_mul(unit)
            .ok_or_else(|| Error::InvalidLayout("extent overflows".into()))?;
        self.byte_resize(lb, extent)
    }
}

impl<T> Layout<T> {
    /// Number of `T` elements selected.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.node.element_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node.element_count == 0
    }

    pub fn shape(&self) -> &Shape {
        &self.node.shape
    }

    /// Whether this layout repeats another layout rather than single elements.
    pub fn is_nested(&self) -> bool {
        self.node.element.is_some()
    }

    /// Flattened map of the layout.
    #[inline]
    pub fn type_map(&self) -> &TypeMap {
        &self.node.map
    }

    /// Primitives moved per transfer.
    pub fn primitive_count(&self) -> usize {
        self.node.map.primitive_count()
    }

    pub fn byte_extent(&self) -> isize {
        self.node.map.extent()
    }

    pub fn byte_lower_bound(&self) -> isize {
        self.node.map.lb()
    }

    pub fn byte_upper_bound(&self) -> isize {
        self.node.map.ub()
    }

    pub fn true_byte_extent(&self) -> isize {
        self.node.map.true_extent()
    }

    pub fn true_byte_lower_bound(&self) -> isize {
        self.node.map.true_lb()
    }

    pub fn true_byte_upper_bound(&self) -> isize {
        self.node.map.true_ub()
    }

    /// Extent in units of `T`.
    pub fn extent(&self) -> Result<isize> {
        to_elements::<T>(self.byte_extent(), "extent")
    }

    /// Lower bound in units of `T`.
    pub fn lower_bound(&self) -> Result<isize> {
        to_elements::<T>(self.byte_lower_bound(), "lower bound")
    }

    /// Upper bound in units of `T`.
    pub fn upper_bound(&self) -> Result<isize> {
        to_elements::<T>(self.byte_upper_bound(), "upper bound")
    }

    /// Whether every element the layout touches lies inside a buffer of
    /// `len` elements of `T`.
    pub fn fits(&self, len: usize) -> bool {
        len.checked_mul(std::mem::size_of::<T>())
            .map_or(false, |bytes| self.node.map.fits_within(bytes))
    }

    /// Check the layout against a buffer of `len` elements.
    pub(crate) fn check_fits(&self, len: usize) -> Result<()> {
        if self.fits(len) {
            Ok(())
        } else {
            Err(Error::InvalidLayout(format!(
                "layout spans bytes [{}, {}) but the buffer holds {} bytes",
                self.true_byte_lower_bound(),
                self.true_byte_upper_bound(),
                len.saturating_mul(std::mem::size_of::<T>())
            )))
        }
    }
}

fn subarray_shape(
    sizes: &[usize],
    subsizes: &[usize],
    starts: &[usize],
    order: Order,
) -> Result<Shape> {
    if sizes.len() != subsizes.len() || sizes.len() != starts.len() {
        return Err(Error::InvalidLayout(format!(
            "sub-array parameter lengths differ: {} sizes, {} subsizes, {} starts",
            sizes.len(),
            subsizes.len(),
            starts.len()
        )));
    }
    let dims = sizes
        .iter()
        .zip(subsizes)
        .zip(starts)
        .map(|((&size, &subsize), &start)| SubarrayDim::new(size, subsize, start))
        .collect();
    Ok(Shape::Subarray { dims, order })
}

/// Byte offsets applied to a map holding `bool` or `char` must keep every
/// such value on a whole-element boundary, or a receive could assemble an
/// invalid value out of two neighbours.
pub(crate) fn check_whole_elements<T>(
    map: &TypeMap,
    offsets: impl Iterator<Item = isize>,
) -> Result<()> {
    if !map.has_restricted_kinds() {
        return Ok(());
    }
    let unit = element_size::<T>()?;
    for offset in offsets {
        if offset % unit != 0 {
            return Err(Error::InvalidLayout(format!(
                "byte offset {} splits {} ({} bytes), which holds bool/char data",
                offset,
                std::any::type_name::<T>(),
                unit
            )));
        }
    }
    Ok(())
}

fn element_size<T>() -> Result<isize> {
    match isize::try_from(std::mem::size_of::<T>()) {
        Ok(0) | Err(_) => Err(Error::InvalidDatatypeBound(format!(
            "{} has no usable element size",
            std::any::type_name::<T>()
        ))),
        Ok(size) => Ok(size),
    }
}

fn to_elements<T>(bytes: isize, what: &str) -> Result<isize> {
    let unit = element_size::<T>()?;
    if bytes % unit != 0 {
        return Err(Error::InvalidDatatypeBound(format!(
            "{} of {} bytes is not a multiple of {} ({} bytes)",
            what,
            bytes,
            std::any::type_name::<T>(),
            unit
        )));
    }
    Ok(bytes / unit)
}

#[cfg(test)]
mod tests;
