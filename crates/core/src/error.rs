//! Error taxonomy shared by the fetch, parse, store and scan layers.

use thiserror::Error;

/// Failures raised while resolving or persisting catalog entries.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The vendor reported no patch metadata for the identifier.
    #[error("identifier {0} not found")]
    NotFound(String),
    /// The vendor answered successfully but with an empty body.
    #[error("no update content available for {0}")]
    EmptyContent(String),
    /// The vendor answered with a status other than success or 404.
    #[error("unexpected status {status} for {code}")]
    UnexpectedStatus {
        /// Identifier that was requested.
        code: String,
        /// HTTP status code returned by the vendor.
        status: u16,
    },
    /// DNS, connection, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The patch document did not have the expected structure.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// The catalog database rejected or failed an operation.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// Input that cannot form a vendor identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    /// Serial beyond the five digits an identifier can carry.
    #[error("serial {0} does not fit in five digits")]
    SerialOutOfRange(u32),
}

impl CatalogError {
    /// Whether this failure is expected while probing unassigned identifiers.
    pub fn is_routine(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::EmptyContent(_))
    }
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
