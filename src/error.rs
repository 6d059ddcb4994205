//! Error - Failures of the table registry
//!
//! Map and table operations can't fail, so only [Cache](crate::cache::Cache)
//! calls that name a table return a [Result].

use thiserror::Error;

/// Errors raised by the [Cache](crate::cache::Cache) when resolving tables.
///
/// Operations on a table itself never fail. An absent key is reported as
/// `None`, not as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The named table does not exist and auto-create is disabled.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A table with this name already exists.
    #[error("table already exists: {0}")]
    TableExists(String),

    /// Creating the table would exceed the configured maximum.
    #[error("table limit of {0} reached")]
    TableLimit(usize),

    /// Table names must not be empty.
    #[error("table name must not be empty")]
    InvalidTableName,
}

/// Shorthand for results of cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
