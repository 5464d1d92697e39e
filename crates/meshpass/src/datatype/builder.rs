// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder for record descriptors.

use super::descriptor::{FieldLayout, TypeDescriptor};
use super::Datatype;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Builder for record [`TypeDescriptor`]s.
///
/// Fields are registered with their byte offset inside the record, usually
/// obtained with `core::mem::offset_of!`. Registration order is the order
/// of the type signature.
///
/// ```
/// use meshpass::{Datatype, RecordBuilder, TypeDescriptor, Result};
///
/// struct Sample {
///     id: u32,
///     value: f64,
/// }
///
/// unsafe impl Datatype for Sample {
///     fn build_descriptor() -> Result<TypeDescriptor> {
///         RecordBuilder::new::<Sample>("Sample")
///             .field::<u32>("id", core::mem::offset_of!(Sample, id))
///             .field::<f64>("value", core::mem::offset_of!(Sample, value))
///             .build()
///     }
/// }
///
/// let desc = Sample::descriptor().unwrap();
/// assert_eq!(desc.size(), std::mem::size_of::<Sample>());
/// ```
#[derive(Debug)]
pub struct RecordBuilder {
    name: String,
    size: usize,
    alignment: usize,
    fields: Vec<FieldLayout>,
    error: Option<Error>,
}

impl RecordBuilder {
    /// Start a record the size and alignment of `S`.
    pub fn new<S: 'static>(name: impl Into<String>) -> Self {
        Self::with_size(name, std::mem::size_of::<S>(), std::mem::align_of::<S>())
    }

    /// Start a record with an explicit size and alignment.
    pub fn with_size(name: impl Into<String>, size: usize, alignment: usize) -> Self {
        Self {
            name: name.into(),
            size,
            alignment,
            fields: Vec::new(),
            error: None,
        }
    }

    /// Register a field of type `F` at `offset`.
    pub fn field<F: Datatype>(self, name: impl Into<String>, offset: usize) -> Self {
        match F::descriptor() {
            Ok(descriptor) => self.field_with_descriptor(name, offset, descriptor),
            Err(e) => self.fail(e),
        }
    }

    /// Register a field with an explicit descriptor.
    pub fn field_with_descriptor(
        mut self,
        name: impl Into<String>,
        offset: usize,
        descriptor: Arc<TypeDescriptor>,
    ) -> Self {
        self.fields.push(FieldLayout {
            name: name.into(),
            offset,
            descriptor,
        });
        self
    }

    /// Number of fields registered so far.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build the descriptor. The first field error, if any, wins.
    pub fn build(self) -> Result<TypeDescriptor> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.fields.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "record '{}' has no fields",
                self.name
            )));
        }
        TypeDescriptor::record(self.name, self.size, self.alignment, self.fields)
    }

    fn fail(mut self, e: Error) -> Self {
        if self.error.is_none() {
            self.error = Some(e);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::descriptor::PrimitiveKind;
    use crate::datatype::typemap::Block;

    #[repr(C)]
    struct Particle {
        pos: [f32; 3],
        charge: i8,
        id: u64,
    }

    #[test]
    fn test_builder_nested_array_field() {
        let desc = RecordBuilder::new::<Particle>("Particle")
            .field::<[f32; 3]>("pos", core::mem::offset_of!(Particle, pos))
            .field::<i8>("charge", core::mem::offset_of!(Particle, charge))
            .field::<u64>("id", core::mem::offset_of!(Particle, id))
            .build()
            .unwrap();

        assert_eq!(desc.size(), std::mem::size_of::<Particle>());
        assert_eq!(desc.primitive_count(), 5);
        assert_eq!(
            desc.type_map().blocks()[0],
            Block {
                offset: 0,
                kind: PrimitiveKind::F32,
                count: 3
            }
        );
        assert_eq!(desc.type_map().extent(), std::mem::size_of::<Particle>() as isize);
    }

    #[test]
    fn test_builder_registration_order_is_signature_order() {
        let desc = RecordBuilder::with_size("Swapped", 16, 8)
            .field::<f64>("b", 8)
            .field::<i32>("a", 0)
            .build()
            .unwrap();
        let kinds: Vec<_> = desc.type_map().blocks().iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![PrimitiveKind::F64, PrimitiveKind::I32]);
        assert_eq!(desc.type_map().true_lb(), 0);
    }

    #[test]
    fn test_builder_empty_record_rejected() {
        let err = RecordBuilder::with_size("Nothing", 0, 1).build().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
