// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptors for in-memory data shapes.

use super::typemap::TypeMap;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Primitive type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Size in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::Char | Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Natural alignment on the host.
    #[inline]
    pub const fn alignment(self) -> usize {
        match self {
            Self::Bool => std::mem::align_of::<bool>(),
            Self::Char => std::mem::align_of::<char>(),
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => std::mem::align_of::<u16>(),
            Self::I32 | Self::U32 => std::mem::align_of::<u32>(),
            Self::F32 => std::mem::align_of::<f32>(),
            Self::I64 | Self::U64 => std::mem::align_of::<u64>(),
            Self::F64 => std::mem::align_of::<f64>(),
        }
    }

    /// Whether some bit patterns of this size are not valid values.
    #[inline]
    pub const fn is_restricted(self) -> bool {
        matches!(self, Self::Bool | Self::Char)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

/// One registered field of a record.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    /// Byte offset of the field from the start of the record.
    pub offset: usize,
    pub descriptor: Arc<TypeDescriptor>,
}

/// Type kind enumeration.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    /// Fixed-length array of one element type.
    Array {
        element: Arc<TypeDescriptor>,
        length: usize,
    },
    /// Fields in registration order.
    Record(Vec<FieldLayout>),
}

/// A complete, immutable type descriptor.
///
/// The flattened [`TypeMap`] is computed once at construction; layouts and
/// the transfer engine only ever consult the map.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    size: usize,
    alignment: usize,
    type_map: TypeMap,
}

impl TypeDescriptor {
    /// Descriptor for a primitive.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            name: kind.name().to_string(),
            kind: TypeKind::Primitive(kind),
            size: kind.size(),
            alignment: kind.alignment(),
            type_map: TypeMap::primitive(kind),
        }
    }

    /// Descriptor for `[element; length]`.
    pub fn array(element: Arc<TypeDescriptor>, length: usize) -> Result<Self> {
        let size = element
            .size
            .checked_mul(length)
            .ok_or_else(|| Error::InvalidDatatypeBound(format!("array of {} overflows", length)))?;
        let extent = element.type_map.extent();
        let type_map = TypeMap::repeat(&element.type_map, length, extent)?;
        Ok(Self {
            name: format!("[{}; {}]", element.name, length),
            alignment: element.alignment,
            kind: TypeKind::Array { element, length },
            size,
            type_map,
        })
    }

    /// Descriptor for a record of `size` bytes.
    ///
    /// Every field must end within the record. Field overlap is not checked.
    pub fn record(
        name: impl Into<String>,
        size: usize,
        alignment: usize,
        fields: Vec<FieldLayout>,
    ) -> Result<Self> {
        let name = name.into();
        let mut type_map = TypeMap::empty();
        let mut max_align = alignment.max(1);

        for field in &fields {
            let end = field.offset.checked_add(field.descriptor.size);
            if end.map_or(true, |end| end > size) {
                return Err(Error::InvalidDatatypeBound(format!(
                    "field '{}' of '{}' ends past the record size {}",
                    field.name, name, size
                )));
            }
            max_align = max_align.max(field.descriptor.alignment);
            let shift = isize::try_from(field.offset).map_err(|_| {
                Error::InvalidDatatypeBound(format!("field '{}' offset overflows", field.name))
            })?;
            type_map
                .append_shifted(&field.descriptor.type_map, shift)
                .map_err(|e| Error::InvalidDatatypeBound(format!("field '{}': {}", field.name, e)))?;
        }

        let extent = isize::try_from(size)
            .map_err(|_| Error::InvalidDatatypeBound(format!("record '{}' too large", name)))?;
        log::trace!(
            "[datatype] record '{}' size={} fields={} blocks={}",
            name,
            size,
            fields.len(),
            type_map.blocks().len()
        );

        Ok(Self {
            name,
            kind: TypeKind::Record(fields),
            size,
            alignment: max_align,
            type_map: type_map.resized(0, extent)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// `size_of` the described Rust type.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Flattened `(offset, primitive)` map.
    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record(_))
    }

    /// Get fields if this is a record.
    pub fn fields(&self) -> Option<&[FieldLayout]> {
        match &self.kind {
            TypeKind::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Get field by name.
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields()?.iter().find(|f| f.name == name)
    }

    /// Number of primitives in one instance.
    pub fn primitive_count(&self) -> usize {
        self.type_map.primitive_count()
    }
}
