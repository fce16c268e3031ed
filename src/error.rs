//! Error types for ipqs-db.

use thiserror::Error;

use crate::binary::AddressFamily;

/// Error type for database open and lookup operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Header, column table or tree header is malformed
    #[error("invalid database format: {0}")]
    InvalidFormat(String),

    /// Header carries a format version this reader does not understand
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// Address family does not match the family of the opened file
    #[error("cannot look up an {address} address in an {database} database")]
    FamilyMismatch {
        database: AddressFamily,
        address: AddressFamily,
    },

    /// The address literal ran out of bits before a record was reached
    #[error("address exhausted before a record was found")]
    AddressExhausted,

    /// No record covers the address
    #[error("address not found")]
    NotFound,

    /// Trie walk exceeded the hop limit
    #[error("too many hops while walking the index tree")]
    TooManyHops,

    /// A string column points at a zero-length string
    #[error("invalid string reference at offset {0}")]
    InvalidStringRef(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Global database not initialized
    #[error("database not initialized")]
    NotInitialized,
}

/// Result type alias for ipqs-db operations.
pub type Result<T> = std::result::Result<T, Error>;
