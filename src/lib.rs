//! ipqs-db - A read-only lookup engine for IPQS IP reputation databases.
//!
//! An IPQS database is a single flat file: a column schema, a binary trie
//! keyed by address bits, and a region of fixed-length records whose text
//! fields live in a shared string pool. Looking up an address walks the
//! trie bit by bit to the most specific network and decodes its record.
//!
//! # Features
//!
//! - **IPv4 and IPv6 files**: the family is fixed per file
//! - **Reputation and blacklist files**: unassigned branches fall back to the
//!   covering network or miss, respectively
//! - **Memory-mapped access**: lookups are positional reads, no seeking
//! - **Thread-safe**: one opened database serves concurrent lookups
//! - **Cached handle**: record cache and atomic hot reload
//!
//! # Quick Start
//!
//! ```ignore
//! use ipqs_db::Database;
//!
//! let db = Database::open("IPQualityScore-IP-Reputation-Database-IPv4.ipqs")?;
//! let record = db.fetch("8.8.0.0")?;
//!
//! assert!(record.is_proxy);
//! assert_eq!(record.country.as_deref(), Some("US"));
//! println!("{} via {}", record.connection_type, record.isp.unwrap_or_default());
//! ```
//!
//! # Global Database
//!
//! Applications that use a single database everywhere can install it once:
//!
//! ```ignore
//! ipqs_db::init_database("IPQualityScore-IP-Reputation-Database-IPv4.ipqs")?;
//! let record = ipqs_db::lookup("8.8.0.0")?;
//! ```

mod error;
mod global;

pub mod binary;

// Re-export core types
pub use error::{Error, Result};

pub use binary::{
    AbuseVelocity, AddressFamily, CachedDatabase, CachedDatabaseConfig, ConnectionType, Database,
    FileSchema, FraudScore, Record,
};

// Re-export global API functions
pub use global::{init_database, init_database_from_bytes, is_initialized, lookup};
