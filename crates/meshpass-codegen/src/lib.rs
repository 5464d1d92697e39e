// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, Fields, Index, LitStr, Member};

/// Per-field options from `#[record(...)]`.
#[derive(Default)]
struct FieldOptions {
    /// Leave the field out of the type signature.
    skip: bool,
    rename: Option<String>,
}

/// `#[derive(Record)]`: registers a struct as a meshpass record.
///
/// Generates an `unsafe impl meshpass::Datatype` that lists every field at
/// its compiler-computed offset, in declaration order. Every field type must
/// itself implement `Datatype`; generic parameters get that bound added.
///
/// Attributes:
/// - `#[record(name = "...")]` on the struct overrides the record name
/// - `#[record(skip)]` on a field leaves it out of transfers
/// - `#[record(rename = "...")]` on a field overrides its name
///
/// Example:
/// ```ignore
/// use meshpass::Record;
///
/// #[derive(Record)]
/// #[repr(C)]
/// struct Particle {
///     pos: [f64; 3],
///     charge: i32,
///     #[record(skip)]
///     scratch: u64,
/// }
/// ```
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let mut record_name = name.to_string();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("record")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                record_name = lit.value();
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        });
        if let Err(e) = parsed {
            return e.to_compile_error().into();
        }
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(f) => f.named.iter().collect::<Vec<_>>(),
            Fields::Unnamed(f) => f.unnamed.iter().collect::<Vec<_>>(),
            Fields::Unit => {
                return syn::Error::new_spanned(&input, "Unit structs carry no data")
                    .to_compile_error()
                    .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Only structs are supported")
                .to_compile_error()
                .into()
        }
    };

    let mut registrations = Vec::new();
    let mut field_types = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let options = match field_options(field) {
            Ok(o) => o,
            Err(e) => return e.to_compile_error().into(),
        };
        if options.skip {
            continue;
        }

        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        };
        let field_name = options.rename.unwrap_or_else(|| match &member {
            Member::Named(ident) => ident.to_string(),
            Member::Unnamed(i) => i.index.to_string(),
        });
        let ty = &field.ty;
        registrations.push(quote! {
            .field::<#ty>(#field_name, ::core::mem::offset_of!(Self, #member))
        });
        field_types.push(ty.clone());
    }

    if registrations.is_empty() {
        return syn::Error::new_spanned(&input, "Record needs at least one transferred field")
            .to_compile_error()
            .into();
    }

    let mut generics = input.generics.clone();
    if !generics.params.is_empty() {
        let where_clause = generics.make_where_clause();
        for ty in &field_types {
            where_clause
                .predicates
                .push(parse_quote!(#ty: ::meshpass::Datatype));
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let expanded = quote! {
        // SAFETY: every field is registered at its compiler-computed offset
        // with its own `Datatype` descriptor, and the record takes the size
        // and alignment of `Self`.
        unsafe impl #impl_generics ::meshpass::Datatype for #name #ty_generics #where_clause {
            fn build_descriptor() -> ::meshpass::Result<::meshpass::TypeDescriptor> {
                ::meshpass::RecordBuilder::new::<Self>(#record_name)
                    #(#registrations)*
                    .build()
            }
        }
    };

    TokenStream::from(expanded)
}

fn field_options(field: &syn::Field) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("record")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                options.rename = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `rename = \"...\"`"))
            }
        })?;
    }
    Ok(options)
}
