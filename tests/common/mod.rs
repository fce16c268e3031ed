//! Synthetic database files for integration tests.

#![allow(dead_code)]

use ipqs_db::binary::{ColumnFlags, HeaderFlags, ReadAt};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The column layout of the vendor's reputation files.
pub const REPUTATION_COLUMNS: [(&str, ColumnFlags); 11] = [
    ("ASN", ColumnFlags::INT_DATA),
    ("Latitude", ColumnFlags::FLOAT_DATA),
    ("Longitude", ColumnFlags::FLOAT_DATA),
    ("ZeroFraudScore", ColumnFlags::SMALL_INT_DATA),
    ("OneFraudScore", ColumnFlags::SMALL_INT_DATA),
    ("Country", ColumnFlags::STRING_DATA),
    ("City", ColumnFlags::STRING_DATA),
    ("Region", ColumnFlags::STRING_DATA),
    ("ISP", ColumnFlags::STRING_DATA),
    ("Organization", ColumnFlags::STRING_DATA),
    ("Timezone", ColumnFlags::STRING_DATA),
];

/// A column value as stored in a record.
#[derive(Debug, Clone)]
pub enum Value {
    U32(u32),
    F32(f32),
    U8(u8),
    Str(String),
    /// Raw pointer into the file, for corrupt string references.
    Ptr(u32),
}

/// One record: flag prefix plus column values in column order.
#[derive(Debug, Clone, Default)]
pub struct RecordFixture {
    pub primary: u8,
    pub secondary: u8,
    pub class: u8,
    pub values: Vec<Value>,
}

impl RecordFixture {
    /// A record in the vendor layout.
    pub fn reputation(primary: u8, country: &str, isp: &str, asn: u32) -> Self {
        Self {
            primary,
            secondary: 0,
            class: 0,
            values: vec![
                Value::U32(asn),
                Value::F32(37.751),
                Value::F32(-97.822),
                Value::U8(75),
                Value::U8(90),
                Value::Str(country.to_string()),
                Value::Str("Unknown".to_string()),
                Value::Str("Unknown".to_string()),
                Value::Str(isp.to_string()),
                Value::Str(isp.to_string()),
                Value::Str("America/Chicago".to_string()),
            ],
        }
    }
}

/// Trie pointer before layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ptr {
    Zero,
    Node(usize),
    Record(usize),
}

pub struct DbBuilder {
    flags: HeaderFlags,
    columns: Vec<(String, ColumnFlags)>,
    record_length: Option<usize>,
    nodes: Vec<[Ptr; 2]>,
    records: Vec<RecordFixture>,
}

impl DbBuilder {
    pub fn new(flags: HeaderFlags) -> Self {
        Self {
            flags,
            columns: Vec::new(),
            record_length: None,
            nodes: vec![[Ptr::Zero, Ptr::Zero]],
            records: Vec::new(),
        }
    }

    /// Extended-flag reputation file with the vendor column layout.
    pub fn reputation(flags: HeaderFlags) -> Self {
        let mut builder = Self::new(flags | HeaderFlags::BINARY_DATA);
        for (name, kind) in REPUTATION_COLUMNS {
            builder = builder.column(name, kind);
        }
        builder
    }

    pub fn column(mut self, name: &str, flags: ColumnFlags) -> Self {
        self.columns.push((name.to_string(), flags));
        self
    }

    pub fn record_length(mut self, len: usize) -> Self {
        self.record_length = Some(len);
        self
    }

    /// Add a record and return its index.
    pub fn record(&mut self, fixture: RecordFixture) -> usize {
        self.records.push(fixture);
        self.records.len() - 1
    }

    /// Route the network given by a `'0'`/`'1'` prefix to `record`.
    pub fn network(&mut self, prefix: &str, record: usize) -> &mut Self {
        assert!(!prefix.is_empty());
        let bits: Vec<usize> = prefix.bytes().map(|b| (b == b'1') as usize).collect();
        let mut node = 0;
        for &bit in &bits[..bits.len() - 1] {
            let ptr = self.nodes[node][bit];
            node = match ptr {
                Ptr::Node(next) => next,
                Ptr::Zero => {
                    self.nodes.push([Ptr::Zero, Ptr::Zero]);
                    let next = self.nodes.len() - 1;
                    self.nodes[node][bit] = Ptr::Node(next);
                    next
                }
                Ptr::Record(_) => panic!("prefix {} is covered by a shorter network", prefix),
            };
        }
        let last = bits[bits.len() - 1];
        assert_eq!(self.nodes[node][last], Ptr::Zero, "prefix {} already assigned", prefix);
        self.nodes[node][last] = Ptr::Record(record);
        self
    }

    /// Replace the trie with explicit nodes; node 0 is the root.
    pub fn raw_nodes(&mut self, nodes: Vec<[Ptr; 2]>) -> &mut Self {
        self.nodes = nodes;
        self
    }

    pub fn tree_start(&self) -> usize {
        11 + 24 * self.columns.len()
    }

    pub fn tree_end(&self) -> usize {
        self.tree_start() + 5 + 8 * self.nodes.len()
    }

    fn prefix_len(&self) -> usize {
        if self.flags.contains(HeaderFlags::BINARY_DATA) {
            3
        } else {
            1
        }
    }

    fn value_len(value: &Value) -> usize {
        match value {
            Value::U8(_) => 1,
            _ => 4,
        }
    }

    pub fn computed_record_length(&self) -> usize {
        self.record_length.unwrap_or_else(|| {
            let widest = self
                .records
                .iter()
                .map(|r| r.values.iter().map(Self::value_len).sum::<usize>())
                .max()
                .unwrap_or(0);
            (self.prefix_len() + widest).max(1)
        })
    }

    /// Absolute offset of record `index`.
    pub fn record_offset(&self, index: usize) -> usize {
        self.tree_end() + index * self.computed_record_length()
    }

    /// Absolute offset of node `index`.
    pub fn node_offset(&self, index: usize) -> usize {
        self.tree_start() + 5 + 8 * index
    }

    pub fn build(&self) -> Vec<u8> {
        let tree_start = self.tree_start();
        let record_length = self.computed_record_length();
        let pool_start = self.tree_end() + self.records.len() * record_length;

        let mut data = Vec::new();
        data.push(self.flags.bits());
        data.push(1);
        data.extend_from_slice(&varint3(tree_start));
        data.extend_from_slice(&varint3(record_length)[..2]);
        data.extend_from_slice(&[0u8; 4]); // total bytes, patched below

        for (name, flags) in &self.columns {
            let mut entry = [0u8; 24];
            entry[..name.len()].copy_from_slice(name.as_bytes());
            entry[23] = flags.bits();
            data.extend_from_slice(&entry);
        }

        data.push(ColumnFlags::TREE_DATA.bits());
        data.extend_from_slice(&((5 + 8 * self.nodes.len()) as u32).to_le_bytes());

        let pointer = |ptr: Ptr| -> u32 {
            match ptr {
                Ptr::Zero => 0,
                Ptr::Node(i) => self.node_offset(i) as u32,
                Ptr::Record(i) => self.record_offset(i) as u32,
            }
        };
        for [left, right] in &self.nodes {
            data.extend_from_slice(&pointer(*left).to_le_bytes());
            data.extend_from_slice(&pointer(*right).to_le_bytes());
        }

        let mut pool = Vec::new();
        for fixture in &self.records {
            let mut raw = Vec::with_capacity(record_length);
            if self.flags.contains(HeaderFlags::BINARY_DATA) {
                raw.extend_from_slice(&[fixture.primary, fixture.secondary, fixture.class]);
            } else {
                raw.push(fixture.class);
            }
            for value in &fixture.values {
                match value {
                    Value::U32(v) => raw.extend_from_slice(&v.to_le_bytes()),
                    Value::F32(v) => raw.extend_from_slice(&v.to_le_bytes()),
                    Value::U8(v) => raw.push(*v),
                    Value::Ptr(v) => raw.extend_from_slice(&v.to_le_bytes()),
                    Value::Str(text) => {
                        let offset = (pool_start + pool.len()) as u32;
                        pool.push(text.len() as u8);
                        pool.extend_from_slice(text.as_bytes());
                        raw.extend_from_slice(&offset.to_le_bytes());
                    }
                }
            }
            raw.resize(record_length, 0);
            data.extend_from_slice(&raw);
        }
        data.extend_from_slice(&pool);

        let total = data.len() as i32;
        data[7..11].copy_from_slice(&total.to_le_bytes());
        data
    }
}

/// Standard base-128 varint in three bytes.
fn varint3(value: usize) -> [u8; 3] {
    assert!(value < 1 << 14, "header varints use at most two bytes");
    if value < 0x80 {
        [value as u8, 0, 0]
    } else {
        [(value as u8 & 0x7f) | 0x80, (value >> 7) as u8, 0]
    }
}

/// Bits of an IPv4 address, truncated to `len`.
pub fn v4_prefix(ip: &str, len: usize) -> String {
    let addr: std::net::Ipv4Addr = ip.parse().unwrap();
    format!("{:032b}", u32::from(addr))[..len].to_string()
}

/// Bits of an IPv6 address, truncated to `len`.
pub fn v6_prefix(ip: &str, len: usize) -> String {
    let addr: std::net::Ipv6Addr = ip.parse().unwrap();
    format!("{:0128b}", u128::from(addr))[..len].to_string()
}

/// A byte source that counts the reads issued against it.
pub struct CountingSource {
    data: Vec<u8>,
    reads: AtomicUsize,
}

impl CountingSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
    }
}

impl ReadAt for CountingSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.data.read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}
