//! Hysym: typed symbolic values over a hash-consed term engine.
//!
//! Programs under analysis manipulate values that are only partially known. This crate
//! models such values as terms of a bit-vector and boolean logic, built with the same
//! operators as native integers and kept in a canonical simplified form.
//!
//! Layers
//!  - [`engine`]: the term store owned by a [`Context`], reference-counted handles, the
//!    simplifier, goals and tactics, an SMT-LIB reader and a pretty-printer.
//!  - [`expr`]: [`Expression`] (sort-erased), [`Boolean`] and [`Integral<T>`] for every
//!    native integer type `T`.
//!
//! Example
//! ```
//! use hysym::prelude::*;
//!
//! let ctx = Context::new();
//! let x = Integral::<u32>::symbol(&ctx, "x")?;
//! let y = &x + &Integral::new(&ctx, 1);
//! let mut z = &y - &Integral::new(&ctx, 1);
//! assert_eq!(z, x);
//!
//! z.substitute("x", &Integral::new(&ctx, 41u32));
//! assert_eq!(z.evaluate()?, 41);
//!
//! let p = Boolean::symbol(&ctx, "p")?;
//! let mut f = &p & &x.less_than(&Integral::new(&ctx, 10));
//! f.substitute("p", &Boolean::new(&ctx, false));
//! assert!(!f.evaluate()?);
//! # Ok::<(), hysym::Error>(())
//! ```

/// Context configuration and its TOML ingestion.
pub mod config;
/// Term store, handles, simplification, tactics, parsing and printing.
pub mod engine;
/// Error type shared by the whole crate.
pub mod error;
/// Sort-erased and typed symbolic expressions.
pub mod expr;

pub use config::ContextConfig;
pub use engine::{Context, Sort};
pub use error::{Error, Result};
pub use expr::{Boolean, Expression, Integral, IntegralType};

pub mod prelude {
    //! Convenient re-exports for end users.
    pub use crate::config::ContextConfig;
    pub use crate::engine::{Context, Sort};
    pub use crate::error::{Error, Result};
    pub use crate::expr::{Boolean, Expression, Integral, IntegralType};
}
