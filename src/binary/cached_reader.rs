//! Cached database handle with hot reload support.
//!
//! This module provides a lookup handle with:
//! - A concurrent cache of decoded records
//! - Atomic hot reload for replacing the database without downtime
//! - Thread-safe concurrent access

use arc_swap::ArcSwap;
use memmap2::Mmap;
use quick_cache::sync::Cache;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use super::reader::Database;
use super::record::Record;
use super::source::ReadAt;
use crate::Result;

/// Default cache capacity (number of records).
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Cache key: the database generation plus a hash of the address.
///
/// Records decoded from a replaced database keep their old generation and
/// can never be served once the new one is installed.
type CacheKey = (u64, u64);

fn address_hash(ip: impl Hash) -> u64 {
    let mut hasher = ahash::AHasher::default();
    ip.hash(&mut hasher);
    hasher.finish()
}

/// A database together with the generation it was installed as.
struct Loaded<S> {
    generation: u64,
    database: Arc<Database<S>>,
}

/// Configuration for the cached database.
#[derive(Debug, Clone)]
pub struct CachedDatabaseConfig {
    /// Maximum number of records in the cache.
    pub cache_capacity: usize,
    /// Whether to enable caching.
    pub cache_enabled: bool,
}

impl Default for CachedDatabaseConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
        }
    }
}

impl CachedDatabaseConfig {
    /// Create a new configuration with the specified cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache_capacity: capacity,
            cache_enabled: true,
        }
    }

    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            cache_capacity: 0,
            cache_enabled: false,
        }
    }
}

/// Database handle that memoises lookups and supports hot reload.
///
/// Only successful lookups are cached; errors are recomputed every time.
///
/// # Example
///
/// ```ignore
/// use ipqs_db::CachedDatabase;
///
/// let db = CachedDatabase::open("IPQualityScore-IP-Reputation-Database-IPv4.ipqs")?;
/// let record = db.fetch("8.8.0.0")?;
///
/// // Swap in a newer release of the file
/// db.reload("IPQualityScore-IP-Reputation-Database-IPv4.new.ipqs")?;
/// ```
pub struct CachedDatabase<S = Mmap> {
    /// The underlying database, wrapped in ArcSwap for atomic replacement.
    inner: ArcSwap<Loaded<S>>,
    /// Cache of decoded records keyed by generation and address hash.
    cache: Option<Cache<CacheKey, Record>>,
    config: CachedDatabaseConfig,
}

impl CachedDatabase<Mmap> {
    /// Open a database file with default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, CachedDatabaseConfig::default())
    }

    /// Open a database file with custom configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: CachedDatabaseConfig) -> Result<Self> {
        Ok(Self::new(Database::open(path)?, config))
    }

    /// Hot reload the database from a new file.
    ///
    /// In-flight lookups complete against the old database, new lookups use
    /// the new one.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.swap(Database::open(path)?);
        log::info!("Hot reloaded database from {:?}", path);
        Ok(())
    }
}

impl CachedDatabase<Vec<u8>> {
    /// Create from bytes with default configuration.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_config(data, CachedDatabaseConfig::default())
    }

    /// Create from bytes with custom configuration.
    pub fn from_bytes_with_config(data: Vec<u8>, config: CachedDatabaseConfig) -> Result<Self> {
        Ok(Self::new(Database::from_bytes(data)?, config))
    }

    /// Hot reload the database from bytes.
    pub fn reload_from_bytes(&self, data: Vec<u8>) -> Result<()> {
        self.swap(Database::from_bytes(data)?);
        log::info!("Hot reloaded database from bytes");
        Ok(())
    }
}

impl<S: ReadAt> CachedDatabase<S> {
    /// Wrap an opened database.
    pub fn new(database: Database<S>, config: CachedDatabaseConfig) -> Self {
        let cache = if config.cache_enabled && config.cache_capacity > 0 {
            Some(Cache::new(config.cache_capacity))
        } else {
            None
        };

        Self {
            inner: ArcSwap::from_pointee(Loaded {
                generation: 0,
                database: Arc::new(database),
            }),
            cache,
            config,
        }
    }

    fn swap(&self, database: Database<S>) {
        let database = Arc::new(database);
        self.inner.rcu(|current| Loaded {
            generation: current.generation + 1,
            database: Arc::clone(&database),
        });
        self.clear_cache();
    }

    /// Look up the record for an address string, consulting the cache first.
    pub fn fetch(&self, ip: &str) -> Result<Record> {
        self.cached(address_hash(ip.to_lowercase()), |database| database.fetch(ip))
    }

    /// Look up the record for a parsed address, consulting the cache first.
    pub fn fetch_ip(&self, ip: IpAddr) -> Result<Record> {
        self.cached(address_hash(ip), |database| database.fetch_ip(ip))
    }

    fn cached(
        &self,
        hash: u64,
        lookup: impl FnOnce(&Database<S>) -> Result<Record>,
    ) -> Result<Record> {
        // One load pins the database and its generation together.
        let loaded = self.inner.load();
        let key = (loaded.generation, hash);

        if let Some(ref cache) = self.cache {
            if let Some(record) = cache.get(&key) {
                return Ok(record);
            }
        }

        let record = lookup(&*loaded.database)?;

        if let Some(ref cache) = self.cache {
            cache.insert(key, record.clone());
        }

        Ok(record)
    }

    /// Clear the cache.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        match self.cache {
            Some(ref cache) => CacheStats {
                capacity: self.config.cache_capacity,
                len: cache.len(),
                enabled: true,
            },
            None => CacheStats {
                capacity: 0,
                len: 0,
                enabled: false,
            },
        }
    }

    /// Generation of the installed database (incremented on each reload).
    pub fn generation(&self) -> u64 {
        self.inner.load().generation
    }

    /// Get the current database.
    ///
    /// The returned handle may become stale after a hot reload.
    pub fn inner(&self) -> Arc<Database<S>> {
        Arc::clone(&self.inner.load().database)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of entries in the cache.
    pub len: usize,
    /// Whether caching is enabled.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// IPv4 file whose root sends every address to one record carrying `asn`.
    fn single_record(asn: u32) -> Vec<u8> {
        let mut data = vec![0x01, 1, 35, 0, 0, 5, 0];
        data.extend_from_slice(&53i32.to_le_bytes());
        let mut column = [0u8; 24];
        column[..3].copy_from_slice(b"ASN");
        column[23] = 32;
        data.extend_from_slice(&column);
        data.push(4);
        data.extend_from_slice(&13u32.to_le_bytes());
        data.extend_from_slice(&48u32.to_le_bytes());
        data.extend_from_slice(&48u32.to_le_bytes());
        data.push(0);
        data.extend_from_slice(&asn.to_le_bytes());
        data
    }

    #[test]
    fn test_cached_database_basic() {
        let db = CachedDatabase::from_bytes(single_record(15169)).unwrap();
        assert_eq!(db.fetch("1.1.1.1").unwrap().asn, Some(15169));
        assert_eq!(db.fetch_ip("200.0.0.1".parse().unwrap()).unwrap().asn, Some(15169));
        assert_eq!(db.cache_stats().len, 2);
    }

    #[test]
    fn test_late_insert_from_replaced_database() {
        let db = CachedDatabase::from_bytes(single_record(1)).unwrap();
        let stale = db.inner.load_full();
        db.reload_from_bytes(single_record(2)).unwrap();
        assert_eq!(db.generation(), 1);

        // A lookup that loaded the old database before the swap and caches
        // its record after the cache was cleared.
        let record = stale.database.fetch("1.1.1.1").unwrap();
        let key = (stale.generation, address_hash("1.1.1.1".to_lowercase()));
        db.cache.as_ref().unwrap().insert(key, record);

        assert_eq!(db.fetch("1.1.1.1").unwrap().asn, Some(2));
    }

    #[test]
    fn test_generation_counts_reloads() {
        let db = CachedDatabase::from_bytes(single_record(1)).unwrap();
        for expected in 1..=3 {
            db.reload_from_bytes(single_record(expected as u32)).unwrap();
            assert_eq!(db.generation(), expected);
        }
        assert_eq!(db.fetch("9.9.9.9").unwrap().asn, Some(3));
    }
}
