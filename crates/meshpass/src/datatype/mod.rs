// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datatype descriptors.
//!
//! Every Rust type that can be moved by meshpass implements [`Datatype`],
//! which yields an immutable [`TypeDescriptor`] resolved once per process
//! through the global [`TypeCache`].
//!
//! - Primitives, `isize`/`usize` (mapped by pointer width), fixed arrays and
//!   small tuples are covered here.
//! - Records are registered with [`RecordBuilder`] or `#[derive(Record)]`.
//!
//! A type with neither mapping nor registration simply does not implement
//! the trait, so misuse is rejected at compile time.

pub mod builder;
pub mod cache;
pub mod descriptor;
pub mod typemap;

pub use builder::RecordBuilder;
pub use cache::{LookupStats, TypeCache};
pub use descriptor::{FieldLayout, PrimitiveKind, TypeDescriptor, TypeKind};
pub use typemap::{Block, Transferred, TypeMap};

use crate::error::Result;
use std::sync::Arc;

/// A Rust type with a registered in-memory description.
///
/// # Safety
///
/// `build_descriptor` must describe the real memory of `Self`: every field
/// offset and primitive kind must match, and the record size must equal
/// `size_of::<Self>()`. Incoming data is written straight into `Self`'s
/// memory according to the descriptor, so any byte pattern that can arrive
/// for the listed primitives must be a valid `Self`.
pub unsafe trait Datatype: Sized + Send + Sync + 'static {
    /// Build the descriptor. Called at most once per process.
    fn build_descriptor() -> Result<TypeDescriptor>;

    /// Cached descriptor for `Self`.
    fn descriptor() -> Result<Arc<TypeDescriptor>> {
        cache::global().get_or_try_build::<Self, _>(Self::build_descriptor)
    }
}

/// Resolve the descriptor of `T` through the global cache.
pub fn descriptor_of<T: Datatype>() -> Result<Arc<TypeDescriptor>> {
    T::descriptor()
}

macro_rules! equivalent_primitive {
    ($rstype:ty, $kind:expr) => {
        unsafe impl Datatype for $rstype {
            fn build_descriptor() -> Result<TypeDescriptor> {
                Ok(TypeDescriptor::primitive($kind))
            }
        }
    };
}

equivalent_primitive!(bool, PrimitiveKind::Bool);
equivalent_primitive!(char, PrimitiveKind::Char);

equivalent_primitive!(f32, PrimitiveKind::F32);
equivalent_primitive!(f64, PrimitiveKind::F64);

equivalent_primitive!(i8, PrimitiveKind::I8);
equivalent_primitive!(i16, PrimitiveKind::I16);
equivalent_primitive!(i32, PrimitiveKind::I32);
equivalent_primitive!(i64, PrimitiveKind::I64);

equivalent_primitive!(u8, PrimitiveKind::U8);
equivalent_primitive!(u16, PrimitiveKind::U16);
equivalent_primitive!(u32, PrimitiveKind::U32);
equivalent_primitive!(u64, PrimitiveKind::U64);

#[cfg(target_pointer_width = "32")]
equivalent_primitive!(usize, PrimitiveKind::U32);
#[cfg(target_pointer_width = "32")]
equivalent_primitive!(isize, PrimitiveKind::I32);

#[cfg(target_pointer_width = "64")]
equivalent_primitive!(usize, PrimitiveKind::U64);
#[cfg(target_pointer_width = "64")]
equivalent_primitive!(isize, PrimitiveKind::I64);

unsafe impl<T: Datatype, const N: usize> Datatype for [T; N] {
    fn build_descriptor() -> Result<TypeDescriptor> {
        TypeDescriptor::array(T::descriptor()?, N)
    }
}

macro_rules! equivalent_tuple {
    ($tuple:ty; $($name:ident : $idx:tt),+) => {
        unsafe impl<$($name: Datatype),+> Datatype for $tuple {
            fn build_descriptor() -> Result<TypeDescriptor> {
                RecordBuilder::new::<Self>(std::any::type_name::<Self>())
                    $(.field::<$name>(stringify!($idx), core::mem::offset_of!($tuple, $idx)))+
                    .build()
            }
        }
    };
}

equivalent_tuple!((A, B); A: 0, B: 1);
equivalent_tuple!((A, B, C); A: 0, B: 1, C: 2);
equivalent_tuple!((A, B, C, D); A: 0, B: 1, C: 2, D: 3);
