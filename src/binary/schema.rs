//! File header, column table and tree header parsing.

use super::format::*;
use super::literal::AddressFamily;
use super::source::{read_u32_le, ReadAt};
use crate::{Error, Result};

/// How a column is decoded, resolved once from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Asn,
    Latitude,
    Longitude,
    /// Fraud score for the given strictness slot.
    FraudScore(u8),
    Country,
    City,
    Region,
    Isp,
    Organization,
    Timezone,
    /// Any other column; decoded only if it carries string data.
    Other,
}

impl ColumnRole {
    pub fn from_name(name: &str) -> Self {
        match name {
            "ASN" => ColumnRole::Asn,
            "Latitude" => ColumnRole::Latitude,
            "Longitude" => ColumnRole::Longitude,
            "ZeroFraudScore" => ColumnRole::FraudScore(0),
            "OneFraudScore" => ColumnRole::FraudScore(1),
            "Country" => ColumnRole::Country,
            "City" => ColumnRole::City,
            "Region" => ColumnRole::Region,
            "ISP" => ColumnRole::Isp,
            "Organization" => ColumnRole::Organization,
            "Timezone" => ColumnRole::Timezone,
            _ => ColumnRole::Other,
        }
    }

    /// Whether the column occupies a fixed slot regardless of its type byte.
    pub fn is_fixed(self) -> bool {
        matches!(
            self,
            ColumnRole::Asn
                | ColumnRole::Latitude
                | ColumnRole::Longitude
                | ColumnRole::FraudScore(_)
        )
    }
}

/// One entry of the column table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub flags: ColumnFlags,
    pub role: ColumnRole,
}

impl Column {
    pub fn new(name: &str, flags: ColumnFlags) -> Self {
        Self {
            name: name.to_string(),
            flags,
            role: ColumnRole::from_name(name),
        }
    }

    /// Parse a 24-byte column table entry.
    fn parse(entry: &[u8]) -> Self {
        let raw_name = &entry[..COLUMN_NAME_SIZE];
        let end = raw_name.iter().position(|&b| b == 0).unwrap_or(raw_name.len());
        let name: String = raw_name[..end].iter().map(|&b| (b & 0x7f) as char).collect();
        Self::new(&name, ColumnFlags::from_bits_truncate(entry[COLUMN_NAME_SIZE]))
    }

    /// Bytes this column consumes inside a record.
    pub fn width(&self) -> usize {
        match self.role {
            ColumnRole::Asn | ColumnRole::Latitude | ColumnRole::Longitude => 4,
            ColumnRole::FraudScore(_) => 1,
            _ if self.flags.contains(ColumnFlags::STRING_DATA) => 4,
            _ => 0,
        }
    }
}

/// Immutable per-file metadata parsed when a database is opened.
#[derive(Debug, Clone)]
pub struct FileSchema {
    pub flags: HeaderFlags,
    pub family: AddressFamily,
    pub blacklist: bool,
    pub extended_flags: bool,
    pub version: u8,
    pub tree_start: u64,
    pub tree_end: u64,
    pub record_length: usize,
    pub total_bytes: i32,
    pub columns: Vec<Column>,
}

impl FileSchema {
    /// Parse the header, column table and tree header from `source`.
    pub fn parse<R: ReadAt + ?Sized>(source: &R) -> Result<Self> {
        let mut header = [0u8; HEADER_SIZE];
        source.read_at(0, &mut header)?;

        let flags = HeaderFlags::from_bits_truncate(header[0]);
        // IPv6 is checked last so it wins when both bits are set.
        let mut family = None;
        if flags.contains(HeaderFlags::IPV4_MAP) {
            family = Some(AddressFamily::V4);
        }
        if flags.contains(HeaderFlags::IPV6_MAP) {
            family = Some(AddressFamily::V6);
        }
        let family = family.ok_or_else(|| {
            Error::InvalidFormat(format!("no address family in flag byte {:#04x}", header[0]))
        })?;

        let version = header[1];
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let tree_start = uvarint(&header[2..5]);
        if tree_start == 0 {
            return Err(Error::InvalidFormat("tree start is zero".to_string()));
        }
        if tree_start <= HEADER_SIZE as u64 {
            return Err(Error::InvalidFormat(format!(
                "tree start {} overlaps the header",
                tree_start
            )));
        }

        let record_length = uvarint(&header[5..7]) as usize;
        if record_length == 0 {
            return Err(Error::InvalidFormat("record length is zero".to_string()));
        }

        let total_bytes = i32::from_le_bytes([header[7], header[8], header[9], header[10]]);
        if total_bytes == 0 {
            return Err(Error::InvalidFormat("total bytes is zero".to_string()));
        }

        let columns = Self::parse_columns(source, tree_start)?;

        let mut tree_header = [0u8; TREE_HEADER_SIZE];
        source.read_at(tree_start, &mut tree_header)?;
        if !ColumnFlags::from_bits_truncate(tree_header[0]).contains(ColumnFlags::TREE_DATA) {
            return Err(Error::InvalidFormat(format!(
                "missing tree data flag at offset {}",
                tree_start
            )));
        }
        let tree_size = read_u32_le(&tree_header[..], 1)?;
        if tree_size == 0 {
            return Err(Error::InvalidFormat("tree size is zero".to_string()));
        }
        let tree_end = tree_start + tree_size as u64;
        if tree_end > source.len() {
            return Err(Error::InvalidFormat(format!(
                "tree ends at {} past the {}-byte file",
                tree_end,
                source.len()
            )));
        }

        let schema = Self {
            flags,
            family,
            blacklist: flags.contains(HeaderFlags::BLACKLIST_FILE),
            extended_flags: flags.contains(HeaderFlags::BINARY_DATA),
            version,
            tree_start,
            // The stored size already spans the tree header.
            tree_end,
            record_length,
            total_bytes,
            columns,
        };

        log::debug!(
            "Parsed {} database: {} columns, tree {}..{}, {}-byte records{}",
            schema.family,
            schema.columns.len(),
            schema.tree_start,
            schema.tree_end,
            schema.record_length,
            if schema.blacklist { ", blacklist" } else { "" }
        );

        Ok(schema)
    }

    fn parse_columns<R: ReadAt + ?Sized>(source: &R, tree_start: u64) -> Result<Vec<Column>> {
        let column_bytes = (tree_start - HEADER_SIZE as u64) as usize;
        let mut table = vec![0u8; column_bytes];
        source.read_at(HEADER_SIZE as u64, &mut table)?;

        let columns: Vec<Column> = table
            .chunks_exact(COLUMN_ENTRY_SIZE)
            .map(Column::parse)
            .collect();

        if columns.is_empty() {
            return Err(Error::InvalidFormat("no column data found".to_string()));
        }
        Ok(columns)
    }

    /// Offset of the root trie node.
    pub fn root_offset(&self) -> u64 {
        self.tree_start + TREE_HEADER_SIZE as u64
    }

    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns that are neither fixed-width nor string typed.
    ///
    /// These consume no record bytes, so any column after one of them is
    /// read at the same cursor position.
    pub fn zero_width_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.width() == 0)
    }

    /// Number of record bytes the flag prefix and all columns consume.
    pub fn decoded_width(&self) -> usize {
        let prefix = if self.extended_flags { 3 } else { 1 };
        prefix + self.columns.iter().map(Column::width).sum::<usize>()
    }
}
