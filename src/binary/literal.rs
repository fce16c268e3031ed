//! IP address to bit-literal encoding.
//!
//! The trie is keyed by the address bits, most significant first. A literal
//! is the ASCII `'0'`/`'1'` rendering of those bits; the walk may rewrite it
//! while backtracking.

use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// Address family indexed by a database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Number of bits in a well-formed literal of this family.
    pub fn bit_len(self) -> usize {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// The other family.
    pub fn other(self) -> Self {
        match self {
            AddressFamily::V4 => AddressFamily::V6,
            AddressFamily::V6 => AddressFamily::V4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::V4 => "IPv4",
            AddressFamily::V6 => "IPv6",
        }
    }

    /// Family an address string belongs to, judged by its separators.
    ///
    /// Returns `None` when the text carries neither `.` nor `:`.
    pub fn of_address(ip: &str) -> Option<Self> {
        if ip.contains(':') {
            Some(AddressFamily::V6)
        } else if ip.contains('.') {
            Some(AddressFamily::V4)
        } else {
            None
        }
    }

    /// Family of a parsed address. IPv4-mapped IPv6 addresses stay IPv6.
    pub fn of_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Whether `ip` must be rejected against a file of this family.
    ///
    /// Dotted text is foreign to an IPv6 file even when it also contains
    /// colons (e.g. an IPv4-mapped address).
    pub fn rejects(self, ip: &str) -> bool {
        match self {
            AddressFamily::V4 => ip.contains(':'),
            AddressFamily::V6 => ip.contains('.'),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Binary-digit rendering of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    bits: Vec<u8>,
}

impl Literal {
    /// Encode `ip` as a literal for a file of the given family.
    ///
    /// No validation happens here: a group that does not parse contributes
    /// no bits and an oversized one contributes all of its bits, so malformed
    /// input surfaces later as a walk failure.
    pub fn encode(family: AddressFamily, ip: &str) -> Self {
        let mut bits = Vec::with_capacity(family.bit_len());
        match family {
            AddressFamily::V4 => {
                for octet in ip.split('.') {
                    if let Some(value) = parse_leading(octet, 10) {
                        push_bits(&mut bits, value, 8);
                    }
                }
            }
            AddressFamily::V6 => {
                for group in expand_ipv6(ip).split(':') {
                    if let Some(value) = parse_leading(group, 16) {
                        push_bits(&mut bits, value, 16);
                    }
                }
            }
        }
        Self { bits }
    }

    /// Encode a parsed address. Always 32 or 128 bits.
    pub fn from_ip(ip: IpAddr) -> Self {
        let rendered = match ip {
            IpAddr::V4(v4) => format!("{:032b}", u32::from(v4)),
            IpAddr::V6(v6) => format!("{:0128b}", u128::from(v6)),
        };
        Self {
            bits: rendered.into_bytes(),
        }
    }

    /// Build a literal from an existing `'0'`/`'1'` string.
    pub fn from_bits(bits: &str) -> Self {
        Self {
            bits: bits.bytes().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Whether the bit at `position` is a `'1'`.
    pub fn is_set(&self, position: usize) -> bool {
        self.bits.get(position) == Some(&b'1')
    }

    /// Clear the bit at `position` and set every later bit.
    pub(crate) fn borrow_at(&mut self, position: usize) {
        self.bits[position] = b'0';
        for bit in &mut self.bits[position + 1..] {
            *bit = b'1';
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bits).unwrap_or_default()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expand a `::` compressed IPv6 address to eight zero-padded groups.
///
/// Addresses without `::` are returned unchanged.
pub fn expand_ipv6(ip: &str) -> String {
    const GROUPS: usize = 8;

    let Some((left, right)) = ip.split_once("::") else {
        return ip.to_string();
    };

    let present = left.split(':').count() + right.split(':').count();
    let mut full = String::with_capacity(39);
    full.push_str(left);
    full.push(':');
    for _ in 0..GROUPS.saturating_sub(present) {
        full.push_str("0000:");
    }
    full.push_str(right);

    full.split(':')
        .take(GROUPS)
        .map(|group| format!("{:0>4}", group))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse the leading digits of `text` in the given radix.
fn parse_leading(text: &str, radix: u32) -> Option<u64> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    u64::from_str_radix(&text[..end], radix).ok()
}

/// Append `value` in binary, left padded with zeros to `width` digits.
fn push_bits(bits: &mut Vec<u8>, value: u64, width: usize) {
    let rendered = format!("{:0>width$b}", value, width = width);
    bits.extend_from_slice(rendered.as_bytes());
}
