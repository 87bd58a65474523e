use strum::EnumIs;
use thiserror::Error;

use crate::engine::Sort;

#[derive(Debug, Clone, PartialEq, Eq, EnumIs, Error)]
pub enum Error {
    /// A proposed free-variable name cannot be used as a symbol.
    #[error(
        "Invalid symbol `{symbol}`. Symbols must be non-empty, must not start with a digit and may only contain printable characters other than space."
    )]
    InvalidSymbol { symbol: String },

    /// A typed view or an evaluation was requested for an expression of another sort.
    #[error("Invalid width: expected an expression of sort `{expected}`, found `{found}`.")]
    InvalidWidth { expected: Sort, found: Sort },

    /// The expression is not a literal, its value cannot be determined.
    #[error("Inconclusive evaluation of `{expression}`: the expression is not concrete.")]
    InconclusiveEvaluation { expression: String },

    /// Text ingestion failed.
    #[error("Parsing error: {reason}")]
    Parsing { reason: String },

    /// A configuration could not be loaded or is inconsistent.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parsing(reason: impl Into<String>) -> Self {
        Error::Parsing {
            reason: reason.into(),
        }
    }
}

/// Checks that `symbol` is usable as the name of a free variable.
///
/// A valid symbol is non-empty, does not start with an ASCII digit and only contains
/// printable ASCII characters other than space.
pub fn validate_symbol(symbol: &str) -> Result<()> {
    let starts_with_digit = symbol.chars().next().is_some_and(|c| c.is_ascii_digit());
    let printable = symbol.chars().all(|c| c.is_ascii_graphic());

    if symbol.is_empty() || starts_with_digit || !printable {
        return Err(Error::InvalidSymbol {
            symbol: symbol.to_string(),
        });
    }
    Ok(())
}
