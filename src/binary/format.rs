//! Binary format constants, flag bytes and the header varint decoder.

use bitflags::bitflags;

/// The only format version this reader understands.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the fixed file header in bytes.
pub const HEADER_SIZE: usize = 11;

/// Size of one column table entry: 23-byte NUL padded name + 1 type byte.
pub const COLUMN_ENTRY_SIZE: usize = 24;

/// Maximum length of a column name.
pub const COLUMN_NAME_SIZE: usize = COLUMN_ENTRY_SIZE - 1;

/// Size of the tree header: type byte + u32 tree size.
pub const TREE_HEADER_SIZE: usize = 5;

/// Size of a trie node: left and right u32 pointers.
pub const TREE_NODE_SIZE: usize = 8;

/// Hop limit for a single trie walk.
pub const MAX_HOPS: usize = 256;

bitflags! {
    /// Flags stored in header byte 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u8 {
        /// File indexes IPv4 addresses.
        const IPV4_MAP = 1;
        /// File indexes IPv6 addresses.
        const IPV6_MAP = 2;
        /// Unassigned branches are hard misses.
        const BLACKLIST_FILE = 4;
        /// Records carry the 3-byte extended flag prefix.
        const BINARY_DATA = 128;
    }
}

bitflags! {
    /// Type byte of a column entry and of the tree header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnFlags: u8 {
        const TREE_DATA = 4;
        const STRING_DATA = 8;
        const SMALL_INT_DATA = 16;
        const INT_DATA = 32;
        const FLOAT_DATA = 64;
    }
}

bitflags! {
    /// First byte of an extended record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PrimaryFlags: u8 {
        const IS_PROXY = 1;
        const IS_VPN = 2;
        const IS_TOR = 4;
        const IS_CRAWLER = 8;
        const IS_BOT = 16;
        const RECENT_ABUSE = 32;
        const IS_BLACKLISTED = 64;
        const IS_PRIVATE = 128;
    }
}

bitflags! {
    /// Second byte of an extended record. Bits 64 and 128 are reserved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecondaryFlags: u8 {
        const IS_MOBILE = 1;
        const HAS_OPEN_PORTS = 2;
        const IS_HOSTING_PROVIDER = 4;
        const ACTIVE_VPN = 8;
        const ACTIVE_TOR = 16;
        const PUBLIC_ACCESS_POINT = 32;
    }
}

bitflags! {
    /// Connection type / abuse velocity byte. Bits 1, 2 and 4 are reserved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFlags: u8 {
        const CONNECTION_TYPE_ONE = 8;
        const CONNECTION_TYPE_TWO = 16;
        const CONNECTION_TYPE_THREE = 32;
        const ABUSE_VELOCITY_ONE = 64;
        const ABUSE_VELOCITY_TWO = 128;
    }
}

/// Decode an unsigned varint from header bytes.
///
/// Continuation bytes are merged as `b & (0x7f << shift)`, i.e. the payload
/// mask is shifted rather than the payload. This matches the files shipped
/// by the vendor, whose header varints never use more than two bytes; see
/// DESIGN.md for the three-byte consequences. Returns 0 when no byte with
/// the high bit clear terminates the sequence.
pub fn uvarint(bytes: &[u8]) -> u64 {
    let mut x: u64 = 0;
    let mut shift: u32 = 0;
    for &b in bytes {
        let b = b as u64;
        if b < 0x80 {
            return x | (b << shift);
        }
        x |= b & (0x7f << shift);
        shift += 7;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uvarint_single_byte() {
        assert_eq!(uvarint(&[41, 0]), 41);
        assert_eq!(uvarint(&[0x7f]), 127);
        assert_eq!(uvarint(&[0, 5, 5]), 0);
    }

    #[test]
    fn test_uvarint_two_bytes() {
        // 275 = 0x113
        assert_eq!(uvarint(&[0x93, 0x02, 0x00]), 275);
        assert_eq!(uvarint(&[0x80, 0x01]), 128);
    }

    #[test]
    fn test_uvarint_unterminated() {
        assert_eq!(uvarint(&[0x80, 0x80, 0x80]), 0);
        assert_eq!(uvarint(&[]), 0);
    }

    #[test]
    fn test_uvarint_shifted_mask() {
        // A standard decoder yields 0x7fff here; the second byte only
        // contributes the bits that survive the shifted mask.
        assert_eq!(uvarint(&[0xff, 0xff, 0x01]), 0x40ff);
    }

    #[test]
    fn test_header_flag_values() {
        let flags = HeaderFlags::from_bits_truncate(0b1000_0101);
        assert!(flags.contains(HeaderFlags::IPV4_MAP));
        assert!(flags.contains(HeaderFlags::BLACKLIST_FILE));
        assert!(flags.contains(HeaderFlags::BINARY_DATA));
        assert!(!flags.contains(HeaderFlags::IPV6_MAP));
    }

    #[test]
    fn test_reserved_bits_are_dropped() {
        assert!(ColumnFlags::from_bits_truncate(0x83).is_empty());
        assert!(ClassFlags::from_bits_truncate(0x07).is_empty());
    }
}
