//! # Allocator Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! min_page_size = 33554432
//! layout = "embedded"
//! track_sources = true
//! verify_before_free = false
//! break_on_alloc = -1
//! stats_rate = false
//! strict = true
//! copy_on_realloc = false
//! ```
//!
//! Missing keys take their default. `verify_before_free`, `break_on_alloc` and
//! `stats_rate` only seed [`DebugVars`]; the console may change them afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::debug::DebugVars;
use crate::error::{AllocError, AllocResult};
use crate::memory::{LayoutKind, DEFAULT_PAGE_SIZE};

/// Configuration for the debug allocator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorConfig {
    /// Smallest page the chain grows by, in bytes.
    pub min_page_size: usize,
    /// Where record metadata lives.
    pub layout: LayoutKind,
    /// Keep the requesting source line of every allocation.
    pub track_sources: bool,
    /// Initial value of the verify-before-free console toggle.
    pub verify_before_free: bool,
    /// Initial break-on-allocation id; negative disables.
    pub break_on_alloc: i64,
    /// Initial value of the rate-statistics console toggle.
    pub stats_rate: bool,
    /// Escalate usage errors and corruption to a panic.
    pub strict: bool,
    /// Copy the old payload into the new placement on reallocate.
    pub copy_on_realloc: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            min_page_size: DEFAULT_PAGE_SIZE,
            layout: LayoutKind::Embedded,
            track_sources: true,
            verify_before_free: false,
            break_on_alloc: -1,
            stats_rate: false,
            strict: cfg!(debug_assertions),
            copy_on_realloc: false,
        }
    }
}

impl AllocatorConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] on syntax errors, unknown keys or
    /// invalid values.
    pub fn from_toml_str(source: &str) -> AllocResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| AllocError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> AllocResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            AllocError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> AllocResult<String> {
        toml::to_string(self).map_err(|e| AllocError::InvalidConfig(e.to_string()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] if `min_page_size` is zero.
    pub fn validate(&self) -> AllocResult<()> {
        if self.min_page_size == 0 {
            return Err(AllocError::InvalidConfig(
                "min_page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Config with a given minimum page size and everything else default.
    #[must_use]
    pub fn with_page_size(min_page_size: usize) -> Self {
        Self {
            min_page_size,
            ..Self::default()
        }
    }

    /// Console variables seeded from this configuration.
    #[must_use]
    pub fn debug_vars(&self) -> DebugVars {
        let vars = DebugVars::default();
        vars.set_break_on_alloc_raw(self.break_on_alloc);
        vars.set_verify_before_free(self.verify_before_free);
        vars.set_stats_rate(self.stats_rate);
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AllocatorConfig::default();
        assert_eq!(config.min_page_size, 32 * 1024 * 1024);
        assert_eq!(config.layout, LayoutKind::Embedded);
        assert!(!config.copy_on_realloc);
        assert_eq!(config.break_on_alloc, -1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AllocatorConfig::from_toml_str(
            r#"
            min_page_size = 4096
            layout = "external"
            break_on_alloc = 5
            stats_rate = true
            "#,
        )
        .unwrap();

        assert_eq!(config.min_page_size, 4096);
        assert_eq!(config.layout, LayoutKind::External);
        assert!(config.track_sources);
        assert_eq!(config.debug_vars().break_on_alloc(), Some(5));
        assert!(config.debug_vars().stats_rate());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AllocatorConfig::from_toml_str("min_page_size = 0").unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig(_)));

        let err = AllocatorConfig::from_toml_str("layot = \"external\"").unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig(_)));

        let err = AllocatorConfig::from_toml_str("layout = \"sideways\"").unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = AllocatorConfig::with_page_size(8192);
        config.copy_on_realloc = true;
        let text = config.to_toml_string().unwrap();
        assert_eq!(AllocatorConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = AllocatorConfig::from_toml_file("/nonexistent/ppmem.toml").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
