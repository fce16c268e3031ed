//! Database handle with memory-mapping support.

use memmap2::Mmap;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

use super::literal::{AddressFamily, Literal};
use super::record::{read_record, Record};
use super::schema::FileSchema;
use super::source::ReadAt;
use super::trie;
use crate::{Error, Result};

/// An opened reputation database.
///
/// The schema is parsed once on open and never changes afterwards. Lookups
/// take `&self` and only issue positional reads, so a handle can be shared
/// across threads (e.g. behind an `Arc`) without locking.
pub struct Database<S = Mmap> {
    source: S,
    schema: FileSchema,
}

impl Database<Mmap> {
    /// Open a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_source(mmap)
    }
}

impl Database<Vec<u8>> {
    /// Open a database held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_source(data)
    }
}

impl<S: ReadAt> Database<S> {
    /// Open a database over any positional byte source.
    pub fn from_source(source: S) -> Result<Self> {
        let schema = FileSchema::parse(&source)?;
        Ok(Self { source, schema })
    }

    /// The parsed file schema.
    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }

    /// The underlying byte source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Look up the record for an address string.
    ///
    /// The address must belong to the family of the file; a mismatch is
    /// reported before anything is read.
    pub fn fetch(&self, ip: &str) -> Result<Record> {
        let result = self.locate(ip).and_then(|offset| self.record_at(offset));
        if let Err(ref e) = result {
            log::debug!("Lookup of {} failed: {}", ip, e);
        }
        result
    }

    /// Look up the record for a parsed address.
    ///
    /// The family comes from the address type, so an IPv4-mapped IPv6
    /// address is looked up as IPv6.
    pub fn fetch_ip(&self, ip: IpAddr) -> Result<Record> {
        let result = self.locate_ip(ip).and_then(|offset| self.record_at(offset));
        if let Err(ref e) = result {
            log::debug!("Lookup of {} failed: {}", ip, e);
        }
        result
    }

    fn record_at(&self, offset: u64) -> Result<Record> {
        read_record(&self.source, &self.schema, offset)
    }

    /// Offset of the record covering `ip`, without decoding it.
    pub fn locate(&self, ip: &str) -> Result<u64> {
        let family = self.schema.family;
        if family.rejects(ip) {
            return Err(Error::FamilyMismatch {
                database: family,
                address: family.other(),
            });
        }
        trie::locate(&self.source, &self.schema, Literal::encode(family, ip))
    }

    /// Offset of the record covering a parsed address.
    pub fn locate_ip(&self, ip: IpAddr) -> Result<u64> {
        let family = self.schema.family;
        let address = AddressFamily::of_ip(ip);
        if address != family {
            return Err(Error::FamilyMismatch {
                database: family,
                address,
            });
        }
        trie::locate(&self.source, &self.schema, Literal::from_ip(ip))
    }
}
