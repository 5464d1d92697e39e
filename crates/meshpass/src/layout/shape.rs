// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Untyped layout shapes and their compilation into type maps.

use crate::config::MAX_SUBARRAY_DIMS;
use crate::datatype::TypeMap;
use crate::error::{Error, Result};

/// Storage order of a multidimensional array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// First dimension varies slowest (C order).
    #[default]
    RowMajor,
    /// First dimension varies fastest (Fortran order).
    ColumnMajor,
}

/// One dimension of a sub-array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubarrayDim {
    /// Extent of the full array along this dimension.
    pub size: usize,
    /// Extent of the selected block.
    pub subsize: usize,
    /// First selected index.
    pub start: usize,
}

impl SubarrayDim {
    pub const fn new(size: usize, subsize: usize, start: usize) -> Self {
        Self {
            size,
            subsize,
            start,
        }
    }
}

/// Closed set of layout shapes.
///
/// Displacements of `Indexed`/`IndexedBlock` and the stride of `Strided` are
/// in units of the element extent; `HIndexed`/`HIndexedBlock` displacements
/// are in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Empty,
    Contiguous {
        count: usize,
    },
    Strided {
        count: usize,
        block_length: usize,
        stride: isize,
    },
    /// `(block_length, displacement)` pairs.
    Indexed {
        blocks: Vec<(usize, isize)>,
    },
    /// `(block_length, byte displacement)` pairs.
    HIndexed {
        blocks: Vec<(usize, isize)>,
    },
    IndexedBlock {
        block_length: usize,
        displacements: Vec<isize>,
    },
    HIndexedBlock {
        block_length: usize,
        displacements: Vec<isize>,
    },
    Subarray {
        dims: Vec<SubarrayDim>,
        order: Order,
    },
    /// Same data as the element, bounds moved to `[lb, lb + extent)` bytes.
    Resized {
        lb: isize,
        extent: isize,
    },
}

impl Shape {
    /// Strided shapes that are really contiguous collapse to `Contiguous`.
    pub(crate) fn normalized(self) -> Result<Self> {
        match self {
            Shape::Strided {
                count,
                block_length,
                stride,
            } if count <= 1 || isize::try_from(block_length).map_or(false, |b| b == stride) => {
                let count = count
                    .checked_mul(block_length)
                    .ok_or_else(|| overflow("element count"))?;
                Ok(Shape::Contiguous { count })
            }
            other => Ok(other),
        }
    }

    /// Validate parameters that can be checked without the element.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Shape::Subarray { dims, .. } = self {
            if dims.is_empty() {
                return Err(Error::InvalidLayout("sub-array needs at least one dimension".into()));
            }
            if dims.len() > MAX_SUBARRAY_DIMS {
                return Err(Error::InvalidLayout(format!(
                    "sub-array has {} dimensions (max {})",
                    dims.len(),
                    MAX_SUBARRAY_DIMS
                )));
            }
            for (d, dim) in dims.iter().enumerate() {
                if dim.subsize > dim.size {
                    return Err(Error::InvalidLayout(format!(
                        "dimension {}: subsize {} exceeds size {}",
                        d, dim.subsize, dim.size
                    )));
                }
                let end = dim
                    .start
                    .checked_add(dim.subsize)
                    .ok_or_else(|| overflow("sub-array start"))?;
                if end > dim.size {
                    return Err(Error::InvalidLayout(format!(
                        "dimension {}: start {} + subsize {} exceeds size {}",
                        d, dim.start, dim.subsize, dim.size
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of elements selected by this shape.
    pub(crate) fn count(&self) -> Result<usize> {
        let count = match self {
            Shape::Empty => 0,
            Shape::Contiguous { count } => *count,
            Shape::Strided {
                count,
                block_length,
                ..
            } => count
                .checked_mul(*block_length)
                .ok_or_else(|| overflow("element count"))?,
            Shape::Indexed { blocks } | Shape::HIndexed { blocks } => blocks
                .iter()
                .try_fold(0usize, |acc, (len, _)| acc.checked_add(*len))
                .ok_or_else(|| overflow("element count"))?,
            Shape::IndexedBlock {
                block_length,
                displacements,
            }
            | Shape::HIndexedBlock {
                block_length,
                displacements,
            } => block_length
                .checked_mul(displacements.len())
                .ok_or_else(|| overflow("element count"))?,
            Shape::Subarray { dims, .. } => dims
                .iter()
                .try_fold(1usize, |acc, d| acc.checked_mul(d.subsize))
                .ok_or_else(|| overflow("element count"))?,
            Shape::Resized { .. } => 1,
        };
        Ok(count)
    }

    /// Compile the shape applied to an element map.
    pub(crate) fn compile(&self, element: &TypeMap) -> Result<TypeMap> {
        let ext = element.extent();
        match self {
            Shape::Empty => Ok(TypeMap::empty()),
            Shape::Contiguous { count } => TypeMap::repeat(element, *count, ext),
            Shape::Strided {
                count,
                block_length,
                stride,
            } => {
                let block = TypeMap::repeat(element, *block_length, ext)?;
                let step = stride.checked_mul(ext).ok_or_else(|| overflow("stride"))?;
                TypeMap::repeat(&block, *count, step)
            }
            Shape::Indexed { blocks } => {
                let mut map = TypeMap::empty();
                for &(len, disp) in blocks {
                    let block = TypeMap::repeat(element, len, ext)?;
                    let shift = disp.checked_mul(ext).ok_or_else(|| overflow("displacement"))?;
                    map.append_shifted(&block, shift)?;
                }
                Ok(map)
            }
            Shape::HIndexed { blocks } => {
                let mut map = TypeMap::empty();
                for &(len, disp) in blocks {
                    let block = TypeMap::repeat(element, len, ext)?;
                    map.append_shifted(&block, disp)?;
                }
                Ok(map)
            }
            Shape::IndexedBlock {
                block_length,
                displacements,
            } => {
                let block = TypeMap::repeat(element, *block_length, ext)?;
                let mut map = TypeMap::empty();
                for &disp in displacements {
                    let shift = disp.checked_mul(ext).ok_or_else(|| overflow("displacement"))?;
                    map.append_shifted(&block, shift)?;
                }
                Ok(map)
            }
            Shape::HIndexedBlock {
                block_length,
                displacements,
            } => {
                let block = TypeMap::repeat(element, *block_length, ext)?;
                let mut map = TypeMap::empty();
                for &disp in displacements {
                    map.append_shifted(&block, disp)?;
                }
                Ok(map)
            }
            Shape::Subarray { dims, order } => compile_subarray(element, dims, *order),
            Shape::Resized { lb, extent } => element.resized(*lb, *extent),
        }
    }
}

/// Build the sub-array map from the fastest-varying dimension outwards,
/// then give it the extent of the full array.
fn compile_subarray(element: &TypeMap, dims: &[SubarrayDim], order: Order) -> Result<TypeMap> {
    let ext = element.extent();
    let ordered: Vec<SubarrayDim> = match order {
        Order::RowMajor => dims.iter().rev().copied().collect(),
        Order::ColumnMajor => dims.to_vec(),
    };

    let mut map = element.clone();
    // Bytes between consecutive indices of the current dimension.
    let mut step = ext;
    let mut origin = 0isize;
    for dim in &ordered {
        map = TypeMap::repeat(&map, dim.subsize, step)?;
        let start = isize::try_from(dim.start).map_err(|_| overflow("start"))?;
        origin = start
            .checked_mul(step)
            .and_then(|s| s.checked_add(origin))
            .ok_or_else(|| overflow("start"))?;
        let size = isize::try_from(dim.size).map_err(|_| overflow("size"))?;
        step = step.checked_mul(size).ok_or_else(|| overflow("array extent"))?;
    }

    let mut shifted = TypeMap::empty();
    shifted.append_shifted(&map, origin)?;
    shifted.resized(element.lb(), step)
}

fn overflow(what: &str) -> Error {
    Error::InvalidLayout(format!("{} overflows", what))
}
