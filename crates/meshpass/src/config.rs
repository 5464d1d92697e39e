// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! meshpass configuration.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (default tag bound,
//!   buffered-send bookkeeping overhead, dimension limits)
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`], read lock-free on every
//!   send and replaced atomically
//!
//! The process-wide instance is reached through [`runtime()`]. It starts
//! from the defaults below, overridden by `MESHPASS_TAG_UB` and
//! `MESHPASS_BSEND_OVERHEAD` when set. With the `config-loaders` feature the
//! limits can also be loaded from a YAML document.

use crate::error::{Error, Result};
use arc_swap::ArcSwap;
use std::sync::{Arc, OnceLock};

// =======================================================================
// Static limits
// =======================================================================

/// Default largest valid message tag (the MPI minimum guarantee).
pub const DEFAULT_TAG_UPPER_BOUND: i32 = 32_767;

/// Bytes of bookkeeping charged against the attached buffer for every
/// buffered send, on top of the packed payload.
pub const BSEND_OVERHEAD: usize = 64;

/// Maximum number of dimensions accepted by a sub-array layout.
pub const MAX_SUBARRAY_DIMS: usize = 32;

/// Slots tracked by a pool's ready bitset before it falls back to
/// rescanning every entry on wake-up.
pub const POOL_READY_SLOTS: usize = 1024;

/// Environment variable overriding the tag upper bound.
pub const ENV_TAG_UB: &str = "MESHPASS_TAG_UB";

/// Environment variable overriding the buffered-send overhead.
pub const ENV_BSEND_OVERHEAD: &str = "MESHPASS_BSEND_OVERHEAD";

// =======================================================================
// Runtime Configuration (Dynamic, Lock-Free)
// =======================================================================

/// Limits consulted on the transfer path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct Limits {
    /// Largest tag accepted by sends (`Tag::up()`).
    pub tag_upper_bound: i32,
    /// Per-message overhead charged by buffered sends.
    pub bsend_overhead: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            tag_upper_bound: DEFAULT_TAG_UPPER_BOUND,
            bsend_overhead: BSEND_OVERHEAD,
        }
    }
}

impl Limits {
    fn validate(self) -> Result<Self> {
        if self.tag_upper_bound < DEFAULT_TAG_UPPER_BOUND {
            return Err(Error::InvalidArgument(format!(
                "tag upper bound {} below the guaranteed minimum {}",
                self.tag_upper_bound, DEFAULT_TAG_UPPER_BOUND
            )));
        }
        Ok(self)
    }
}

/// Shared runtime configuration (thread-safe, lock-free reads).
///
/// Clones share the same [`Limits`], swapped atomically through `ArcSwap`.
#[derive(Clone)]
pub struct RuntimeConfig {
    limits: Arc<ArcSwap<Limits>>,
}

impl RuntimeConfig {
    /// Create a config holding the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            limits: Arc::new(ArcSwap::from_pointee(Limits::default())),
        }
    }

    /// Defaults overridden by the `MESHPASS_*` environment variables.
    ///
    /// Unparsable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self::new();
        let mut limits = Limits::default();

        if let Ok(raw) = std::env::var(ENV_TAG_UB) {
            match raw.trim().parse::<i32>() {
                Ok(v) => limits.tag_upper_bound = v,
                Err(e) => log::warn!("[config] ignoring {}='{}': {}", ENV_TAG_UB, raw, e),
            }
        }
        if let Ok(raw) = std::env::var(ENV_BSEND_OVERHEAD) {
            match raw.trim().parse::<usize>() {
                Ok(v) => limits.bsend_overhead = v,
                Err(e) => log::warn!("[config] ignoring {}='{}': {}", ENV_BSEND_OVERHEAD, raw, e),
            }
        }

        if let Err(e) = config.set_limits(limits) {
            log::warn!("[config] environment overrides rejected: {}", e);
        }
        config
    }

    /// Current limits (atomic load).
    #[inline]
    #[must_use]
    pub fn limits(&self) -> Limits {
        **self.limits.load()
    }

    /// Replace the limits atomically.
    pub fn set_limits(&self, limits: Limits) -> Result<()> {
        let limits = limits.validate()?;
        log::debug!(
            "[config] limits: tag_ub={} bsend_overhead={}",
            limits.tag_upper_bound,
            limits.bsend_overhead
        );
        self.limits.store(Arc::new(limits));
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn tag_upper_bound(&self) -> i32 {
        self.limits.load().tag_upper_bound
    }

    #[inline]
    #[must_use]
    pub fn bsend_overhead(&self) -> usize {
        self.limits.load().bsend_overhead
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide configuration, initialised from the environment on first use.
pub fn runtime() -> &'static RuntimeConfig {
    static RUNTIME: OnceLock<RuntimeConfig> = OnceLock::new();
    RUNTIME.get_or_init(RuntimeConfig::from_env)
}

// =======================================================================
// YAML loading
// =======================================================================

#[cfg(feature = "config-loaders")]
#[derive(serde::Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    limits: Limits,
}

#[cfg(feature = "config-loaders")]
impl RuntimeConfig {
    /// Apply a YAML document of the form:
    ///
    /// ```yaml
    /// limits:
    ///   tag_upper_bound: 65535
    ///   bsend_overhead: 96
    /// ```
    ///
    /// Other top-level sections are ignored, so the limits can live in a
    /// larger application file.
    pub fn load_yaml_str(&self, yaml_content: &str) -> Result<()> {
        let doc: ConfigDocument = serde_yaml::from_str(yaml_content)
            .map_err(|e| Error::InvalidArgument(format!("Failed to parse YAML: {}", e)))?;
        self.set_limits(doc.limits)
    }

    /// Read and apply a YAML file.
    pub fn load_yaml_file(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.load_yaml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::new();
        assert_eq!(config.tag_upper_bound(), DEFAULT_TAG_UPPER_BOUND);
        assert_eq!(config.bsend_overhead(), BSEND_OVERHEAD);
        assert_eq!(config.limits(), Limits::default());
    }

    #[test]
    fn test_set_limits_rejects_small_tag_bound() {
        let config = RuntimeConfig::new();
        let err = config
            .set_limits(Limits {
                tag_upper_bound: 100,
                bsend_overhead: 0,
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(config.tag_upper_bound(), DEFAULT_TAG_UPPER_BOUND);
    }

    #[test]
    fn test_clone_shares_limits() {
        let config = RuntimeConfig::new();
        let shared = config.clone();
        config
            .set_limits(Limits {
                tag_upper_bound: 1 << 20,
                bsend_overhead: 16,
            })
            .unwrap();
        assert_eq!(shared.tag_upper_bound(), 1 << 20);
        assert_eq!(shared.bsend_overhead(), 16);
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_load_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "solver:\n  name: stencil\nlimits:\n  tag_upper_bound: 65535\n  bsend_overhead: 96"
        )
        .unwrap();

        let config = RuntimeConfig::new();
        config.load_yaml_file(file.path()).unwrap();
        assert_eq!(config.tag_upper_bound(), 65535);
        assert_eq!(config.bsend_overhead(), 96);
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_load_yaml_partial_keeps_defaults() {
        let config = RuntimeConfig::new();
        config.load_yaml_str("limits:\n  bsend_overhead: 8\n").unwrap();
        assert_eq!(config.tag_upper_bound(), DEFAULT_TAG_UPPER_BOUND);
        assert_eq!(config.bsend_overhead(), 8);
        assert!(config.load_yaml_str("limits: [").is_err());
    }
}
