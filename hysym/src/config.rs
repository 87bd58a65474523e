//! Context configuration.
//!
//! A [`ContextConfig`] is fixed when a [`Context`](crate::engine::Context) is created. It can be
//! built programmatically or loaded from a TOML document:
//!
//! ```
//! use hysym::config::ContextConfig;
//!
//! let config = ContextConfig::from_toml_str(r#"
//!     indirection_symbol = "mem"
//!     text_width = 120
//! "#).unwrap();
//! assert_eq!(config.indirection_symbol, "mem");
//! assert_eq!(config.text_width, 120);
//! assert_eq!(config.reduce_depth, ContextConfig::default().reduce_depth);
//! ```
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, validate_symbol};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Name of the reserved one-argument function modelling a byte of symbolic memory.
    pub indirection_symbol: String,

    /// Target line width of the pretty-printer backing `text()` and `Display`.
    pub text_width: usize,

    /// Maximum nesting depth explored by the contextual simplifier. Deeper sub-terms are
    /// left as produced by the routine simplifier.
    pub reduce_depth: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            indirection_symbol: "deref".to_string(),
            text_width: 80,
            reduce_depth: 64,
        }
    }
}

impl ContextConfig {
    /// Parse and validate a configuration from a TOML document. Missing keys keep their
    /// default value.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: ContextConfig = toml::from_str(source).map_err(|e| Error::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the consistency of the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_symbol(&self.indirection_symbol).map_err(|_| Error::InvalidConfig {
            reason: format!(
                "`{}` cannot be used as the indirection symbol",
                self.indirection_symbol
            ),
        })?;
        if self.text_width == 0 {
            return Err(Error::InvalidConfig {
                reason: "text_width must be strictly positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ContextConfig::from_toml_str("").unwrap();
        assert_eq!(config, ContextConfig::default());
    }

    #[test]
    fn invalid_documents_are_rejected() {
        let err = ContextConfig::from_toml_str("indirection_symbol = \"0mem\"").unwrap_err();
        assert!(err.is_invalid_config());

        let err = ContextConfig::from_toml_str("text_width = 0").unwrap_err();
        assert!(err.is_invalid_config());

        let err = ContextConfig::from_toml_str("unknown_key = 1").unwrap_err();
        assert!(err.is_invalid_config());
    }
}
