// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # meshpass - typed message passing between processes
//!
//! Describes in-memory data shapes (scalars, arrays, strided blocks, indexed
//! scatter/gather patterns, nested records, sub-blocks of multidimensional
//! arrays), compiles them into reusable layouts, and moves data between
//! processes through them without packing by hand. Non-blocking transfers
//! return handles that borrow their buffers until waited out.
//!
//! ## Quick Start
//!
//! ```rust
//! use meshpass::{Layout, LocalFabric, Result, Source, Tag};
//!
//! fn main() -> Result<()> {
//!     let sums = LocalFabric::run(2, |comm| -> Result<f64> {
//!         let column = Layout::<f64>::strided(4, 1, 3)?;
//!         let mut grid = [0.0f64; 12];
//!         if comm.rank() == 0 {
//!             grid.iter_mut().enumerate().for_each(|(i, x)| *x = i as f64);
//!             comm.send_with(&grid, &column, 1, Tag::new(0))?;
//!         } else {
//!             comm.recv_with(&mut grid, &column, Source::Rank(0), Tag::new(0))?;
//!         }
//!         Ok(grid.iter().sum())
//!     })?
//!     .into_iter()
//!     .collect::<Result<Vec<_>>>()?;
//!     assert_eq!(sums[1], 0.0 + 3.0 + 6.0 + 9.0);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                          Transfer facade                            |
//! |   Communicator: p2p (4 send modes) | collectives | bsend buffer     |
//! +---------------------------------------------------------------------+
//! |      Layouts and descriptors       |       Requests and pools       |
//! |   Datatype -> TypeDescriptor       |   Request | PersistentRequest  |
//! |   Layout<T> -> TypeMap             |   RequestPool (wait any/some)  |
//! +---------------------------------------------------------------------+
//! |                             Transport                               |
//! |   Group + Transport traits | LocalFabric (in-process reference)     |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Datatype`] | Rust types with a registered memory description |
//! | [`Layout`] | Placement of elements of `T` inside a buffer |
//! | [`Communicator`] | Point-to-point and collective transfers |
//! | [`Request`] | Handle of a non-blocking operation |
//! | [`RequestPool`] | Bulk waits over many requests |
//!
//! ## Modules Overview
//!
//! - [`datatype`] - descriptors, type maps, the descriptor cache
//! - [`layout`] - layout constructors and collections
//! - [`request`] - handles, statuses, pools
//! - [`comm`] - the transfer facade
//! - [`transport`] - transport seam and the local fabric
//! - [`config`] - limits and runtime configuration

// Allow the derive macro to work inside this crate's tests
extern crate self as meshpass;

/// Transfer facade (point-to-point, collectives, buffered sends).
pub mod comm;
/// Limits and runtime configuration.
pub mod config;
/// Datatype descriptors, type maps and the descriptor cache.
pub mod datatype;
/// Error type shared by every module.
pub mod error;
/// Layout descriptions and layout collections.
pub mod layout;
/// Non-blocking operation handles and pools.
pub mod request;
/// Transport and group seam, plus the in-process reference transport.
pub mod transport;

pub use comm::{
    bsend_size, bsend_size_with, BsendBuffer, Communicator, RequestScope, Source, Tag,
};
pub use datatype::{descriptor_of, Datatype, PrimitiveKind, RecordBuilder, TypeDescriptor};
pub use error::{Error, Result};
pub use layout::{Displacements, Layout, Layouts, Order, SubarrayDim};
pub use request::{
    PersistentRequest, PersistentRequestPool, Request, RequestPool, Status, TestAny, TestResult,
};
pub use transport::{LocalFabric, SendMode};

#[cfg(feature = "derive")]
pub use meshpass_codegen::Record;
