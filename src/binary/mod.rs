//! Reader for the IPQS flat-file reputation format.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |     HEADER       |  11 bytes: flags, version, tree start, record length, total bytes
//! +------------------+
//! |   COLUMN TABLE   |  24-byte entries: NUL padded name + type byte
//! +------------------+
//! |   TREE HEADER    |  5 bytes: type byte + tree size
//! +------------------+
//! |   TRIE NODES     |  8-byte (left, right) absolute pointers
//! +------------------+
//! |     RECORDS      |  fixed-length records, reached only through the trie
//! +------------------+
//! |   STRING POOL    |  length-prefixed text referenced by absolute offset
//! +------------------+
//! ```
//!
//! All integers are little-endian.

mod cached_reader;
mod format;
mod literal;
mod reader;
mod record;
mod schema;
mod source;
mod trie;

pub use cached_reader::{CacheStats, CachedDatabase, CachedDatabaseConfig};
pub use format::*;
pub use literal::{expand_ipv6, AddressFamily, Literal};
pub use reader::Database;
pub use record::{
    decode_record, read_record, read_string, AbuseVelocity, ColumnValue, ConnectionType,
    FraudScore, Record,
};
pub use schema::{Column, ColumnRole, FileSchema};
pub use source::ReadAt;
pub use trie::{locate, Step, TrieNode, TrieWalk};
