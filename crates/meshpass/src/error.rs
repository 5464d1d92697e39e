// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.

use std::sync::Arc;

/// Errors returned by meshpass operations.
///
/// Construction-time violations (bad layout parameters, out-of-range ranks or
/// tags) are reported synchronously by the call that detected them.
/// Failures that happen while data is moving are reported through the
/// request that tracks the transfer.
///
/// The type is `Clone` so that a terminal request result can be cached and
/// returned again on every subsequent `wait()`.
#[derive(Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Rank outside `0..size` of the group.
    InvalidRank { rank: usize, size: usize },
    /// Tag negative or above the configured upper bound.
    InvalidTag(i32),
    /// Per-endpoint argument list does not match the group size.
    InvalidSize { expected: usize, actual: usize },
    /// Element count does not fit the buffer it describes.
    InvalidCount(usize),
    /// Layout parameters are inconsistent or overflow.
    InvalidLayout(String),
    /// A byte bound is not a whole number of elements, or a field
    /// ends past its record.
    InvalidDatatypeBound(String),
    /// Generic invalid argument.
    InvalidArgument(String),
    /// Operation not valid in the current state (e.g. starting an active
    /// persistent request).
    InvalidState(String),

    // ========================================================================
    // Transfer Errors
    // ========================================================================
    /// Sender and receiver type signatures disagree.
    TypeMismatch,
    /// Incoming message larger than the posted receive.
    Truncated { sent: usize, capacity: usize },
    /// Attached buffered-send space is exhausted.
    BufferExhausted { needed: usize, available: usize },
    /// Ready-mode send issued before the matching receive was posted.
    NotReady,
    /// Transport failure, propagated unmodified.
    Io(Arc<std::io::Error>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidRank { rank, size } => {
                write!(f, "Invalid rank: {} (group size {})", rank, size)
            }
            Error::InvalidTag(tag) => write!(f, "Invalid tag: {}", tag),
            Error::InvalidSize { expected, actual } => write!(
                f,
                "Invalid size: expected {} per-endpoint entries, got {}",
                expected, actual
            ),
            Error::InvalidCount(count) => write!(f, "Invalid count: {}", count),
            Error::InvalidLayout(msg) => write!(f, "Invalid layout: {}", msg),
            Error::InvalidDatatypeBound(msg) => write!(f, "Invalid datatype bound: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::TypeMismatch => write!(f, "Type signature mismatch"),
            Error::Truncated { sent, capacity } => write!(
                f,
                "Message truncated: {} primitives sent, receive posted for {}",
                sent, capacity
            ),
            Error::BufferExhausted { needed, available } => write!(
                f,
                "Buffered send space exhausted: need {} bytes, {} available",
                needed, available
            ),
            Error::NotReady => write!(f, "Ready send without a matching posted receive"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

/// Convenient alias for API results using the crate `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_messages() {
        let err = Error::InvalidRank { rank: 7, size: 4 };
        assert_eq!(err.to_string(), "Invalid rank: 7 (group size 4)");

        let err = Error::Truncated {
            sent: 10,
            capacity: 4,
        };
        assert!(err.to_string().contains("10 primitives"));
    }

    #[test]
    fn test_io_source_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        let source = err.source().expect("io error must expose a source");
        assert_eq!(source.to_string(), "peer gone");

        let cloned = err.clone();
        assert_eq!(cloned.to_string(), err.to_string());
    }
}
