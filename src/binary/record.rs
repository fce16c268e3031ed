//! Record decoding.
//!
//! A record starts with a flag prefix (3 bytes when the file carries
//! extended flags, 1 byte otherwise) followed by one slot per column in
//! column table order. String columns hold an absolute offset into the
//! string pool, where each string is stored as a length byte plus text.

use serde::Serialize;
use std::fmt;

use super::format::*;
use super::schema::{Column, ColumnRole, FileSchema};
use super::source::ReadAt;
use crate::{Error, Result};

/// Connection type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[repr(u8)]
pub enum ConnectionType {
    #[default]
    Unknown = 0,
    Residential = 1,
    Mobile = 2,
    Corporate = 3,
    DataCenter = 4,
    Education = 5,
}

impl ConnectionType {
    /// Decode from the connection type bits of a class byte.
    pub fn from_flags(flags: ClassFlags) -> Self {
        let one = flags.contains(ClassFlags::CONNECTION_TYPE_ONE);
        let two = flags.contains(ClassFlags::CONNECTION_TYPE_TWO);
        let three = flags.contains(ClassFlags::CONNECTION_TYPE_THREE);
        match (three, two, one) {
            (true, true, _) => ConnectionType::Corporate,
            (true, false, true) => ConnectionType::Education,
            (true, false, false) => ConnectionType::Residential,
            (false, true, _) => ConnectionType::Mobile,
            (false, false, true) => ConnectionType::DataCenter,
            (false, false, false) => ConnectionType::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Unknown => "Unknown",
            ConnectionType::Residential => "Residential",
            ConnectionType::Mobile => "Mobile",
            ConnectionType::Corporate => "Corporate",
            ConnectionType::DataCenter => "Data Center",
            ConnectionType::Education => "Education",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recent abuse velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[repr(u8)]
pub enum AbuseVelocity {
    #[default]
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl AbuseVelocity {
    /// Decode from the abuse velocity bits of a class byte.
    ///
    /// The second bit alone means low and the first bit alone medium.
    pub fn from_flags(flags: ClassFlags) -> Self {
        let one = flags.contains(ClassFlags::ABUSE_VELOCITY_ONE);
        let two = flags.contains(ClassFlags::ABUSE_VELOCITY_TWO);
        match (two, one) {
            (true, true) => AbuseVelocity::High,
            (true, false) => AbuseVelocity::Low,
            (false, true) => AbuseVelocity::Medium,
            (false, false) => AbuseVelocity::None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AbuseVelocity::None => "none",
            AbuseVelocity::Low => "low",
            AbuseVelocity::Medium => "medium",
            AbuseVelocity::High => "high",
        }
    }
}

impl fmt::Display for AbuseVelocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fraud scores by strictness level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FraudScore {
    scores: [Option<u8>; 2],
}

impl FraudScore {
    /// Score at `strictness`, if the record carries one.
    pub fn get(&self, strictness: u8) -> Option<u8> {
        self.scores.get(strictness as usize).copied().flatten()
    }

    fn set(&mut self, strictness: u8, score: u8) {
        if let Some(slot) = self.scores.get_mut(strictness as usize) {
            *slot = Some(score);
        }
    }
}

/// A decoded column value in text form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnValue {
    pub name: String,
    #[serde(skip)]
    pub flags: ColumnFlags,
    pub value: String,
}

/// The reputation record for one network.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub is_proxy: bool,
    pub is_vpn: bool,
    pub is_tor: bool,
    pub is_crawler: bool,
    pub is_bot: bool,
    pub recent_abuse: bool,
    pub is_blacklisted: bool,
    pub is_private: bool,
    pub is_mobile: bool,
    pub has_open_ports: bool,
    pub is_hosting_provider: bool,
    pub active_vpn: bool,
    pub active_tor: bool,
    pub public_access_point: bool,

    pub connection_type: ConnectionType,
    pub abuse_velocity: AbuseVelocity,
    pub fraud_score: FraudScore,

    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub isp: Option<String>,
    pub organization: Option<String>,
    pub timezone: Option<String>,
    pub asn: Option<u32>,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,

    columns: Vec<ColumnValue>,
}

impl Record {
    /// Every decoded column in column table order.
    ///
    /// Coordinates are rendered from their value widened to `f64`, so a
    /// stored `37.751` reads back as `37.750999450683594`.
    pub fn columns(&self) -> &[ColumnValue] {
        &self.columns
    }

    /// Value of the last column named `name`.
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    fn apply_primary(&mut self, flags: PrimaryFlags) {
        self.is_proxy = flags.contains(PrimaryFlags::IS_PROXY);
        self.is_vpn = flags.contains(PrimaryFlags::IS_VPN);
        self.is_tor = flags.contains(PrimaryFlags::IS_TOR);
        self.is_crawler = flags.contains(PrimaryFlags::IS_CRAWLER);
        self.is_bot = flags.contains(PrimaryFlags::IS_BOT);
        self.recent_abuse = flags.contains(PrimaryFlags::RECENT_ABUSE);
        self.is_blacklisted = flags.contains(PrimaryFlags::IS_BLACKLISTED);
        self.is_private = flags.contains(PrimaryFlags::IS_PRIVATE);
    }

    fn apply_secondary(&mut self, flags: SecondaryFlags) {
        self.is_mobile = flags.contains(SecondaryFlags::IS_MOBILE);
        self.has_open_ports = flags.contains(SecondaryFlags::HAS_OPEN_PORTS);
        self.is_hosting_provider = flags.contains(SecondaryFlags::IS_HOSTING_PROVIDER);
        self.active_vpn = flags.contains(SecondaryFlags::ACTIVE_VPN);
        self.active_tor = flags.contains(SecondaryFlags::ACTIVE_TOR);
        self.public_access_point = flags.contains(SecondaryFlags::PUBLIC_ACCESS_POINT);
    }

    fn apply_class(&mut self, byte: u8) {
        let flags = ClassFlags::from_bits_truncate(byte);
        self.connection_type = ConnectionType::from_flags(flags);
        self.abuse_velocity = AbuseVelocity::from_flags(flags);
    }
}

/// Bounds-checked cursor over the raw record bytes.
struct Cursor<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self, column: &Column) -> Result<[u8; N]> {
        let bytes = self
            .raw
            .get(self.pos..self.pos + N)
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "column {} at byte {} runs past the {}-byte record",
                    column.name,
                    self.pos,
                    self.raw.len()
                ))
            })?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

/// Read and decode the record at `offset`.
pub fn read_record<R: ReadAt + ?Sized>(
    source: &R,
    schema: &FileSchema,
    offset: u64,
) -> Result<Record> {
    let mut raw = vec![0u8; schema.record_length];
    source.read_at(offset, &mut raw)?;
    decode_record(source, schema, &raw)
}

/// Decode raw record bytes, resolving string columns through `source`.
pub fn decode_record<R: ReadAt + ?Sized>(
    source: &R,
    schema: &FileSchema,
    raw: &[u8],
) -> Result<Record> {
    let prefix = if schema.extended_flags { 3 } else { 1 };
    if raw.len() < prefix {
        return Err(Error::InvalidFormat(format!(
            "record of {} bytes is shorter than its flag prefix",
            raw.len()
        )));
    }

    let mut record = Record::default();
    if schema.extended_flags {
        record.apply_primary(PrimaryFlags::from_bits_truncate(raw[0]));
        record.apply_secondary(SecondaryFlags::from_bits_truncate(raw[1]));
        record.apply_class(raw[2]);
    } else {
        record.apply_class(raw[0]);
    }

    let mut cursor = Cursor { raw, pos: prefix };
    record.columns.reserve(schema.columns.len());

    for column in &schema.columns {
        let value = match column.role {
            ColumnRole::Asn => {
                let asn = u32::from_le_bytes(cursor.take(column)?);
                record.asn = Some(asn);
                asn.to_string()
            }
            ColumnRole::Latitude => {
                let latitude = f32::from_le_bytes(cursor.take(column)?);
                record.latitude = Some(latitude);
                f64::from(latitude).to_string()
            }
            ColumnRole::Longitude => {
                let longitude = f32::from_le_bytes(cursor.take(column)?);
                record.longitude = Some(longitude);
                f64::from(longitude).to_string()
            }
            ColumnRole::FraudScore(strictness) => {
                let [score] = cursor.take::<1>(column)?;
                record.fraud_score.set(strictness, score);
                score.to_string()
            }
            _ if column.flags.contains(ColumnFlags::STRING_DATA) => {
                let pointer = u32::from_le_bytes(cursor.take(column)?);
                read_string(source, pointer as u64)?
            }
            _ => String::new(),
        };

        match column.role {
            ColumnRole::Country => record.country = Some(value.clone()),
            ColumnRole::City => record.city = Some(value.clone()),
            ColumnRole::Region => record.region = Some(value.clone()),
            ColumnRole::Isp => record.isp = Some(value.clone()),
            ColumnRole::Organization => record.organization = Some(value.clone()),
            ColumnRole::Timezone => record.timezone = Some(value.clone()),
            _ => {}
        }

        record.columns.push(ColumnValue {
            name: column.name.clone(),
            flags: column.flags,
            value,
        });
    }

    Ok(record)
}

/// Read a length-prefixed string from the string pool.
pub fn read_string<R: ReadAt + ?Sized>(source: &R, offset: u64) -> Result<String> {
    let mut len = [0u8; 1];
    source.read_at(offset, &mut len)?;
    if len[0] == 0 {
        return Err(Error::InvalidStringRef(offset));
    }

    let mut text = vec![0u8; len[0] as usize];
    source.read_at(offset + 1, &mut text)?;
    Ok(String::from_utf8_lossy(&text).into_owned())
}
