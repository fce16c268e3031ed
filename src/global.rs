//! Process-wide default database.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

use crate::binary::{Database, ReadAt, Record};
use crate::error::{Error, Result};

type SharedDatabase = Arc<dyn Lookup + Send + Sync>;

/// Object-safe view of a database, independent of its byte source.
trait Lookup {
    fn fetch(&self, ip: &str) -> Result<Record>;
}

impl<S: ReadAt> Lookup for Database<S> {
    fn fetch(&self, ip: &str) -> Result<Record> {
        Database::fetch(self, ip)
    }
}

/// Global database
static GLOBAL_DATABASE: Lazy<RwLock<Option<SharedDatabase>>> = Lazy::new(|| RwLock::new(None));

/// Open `path` and install it as the global database.
///
/// Replaces any previously installed database; lookups already running keep
/// using the old one.
pub fn init_database(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let database = Database::open(path)?;
    install(Arc::new(database));
    log::debug!("Installed global database from {:?}", path);
    Ok(())
}

/// Install an in-memory database as the global database.
pub fn init_database_from_bytes(data: Vec<u8>) -> Result<()> {
    let database = Database::from_bytes(data)?;
    install(Arc::new(database));
    log::debug!("Installed global database from bytes");
    Ok(())
}

fn install(database: SharedDatabase) {
    let mut guard = GLOBAL_DATABASE.write();
    *guard = Some(database);
}

/// Check if a global database is installed.
pub fn is_initialized() -> bool {
    GLOBAL_DATABASE.read().is_some()
}

/// Look up an address in the global database.
pub fn lookup(ip: &str) -> Result<Record> {
    let database = GLOBAL_DATABASE
        .read()
        .as_ref()
        .cloned()
        .ok_or(Error::NotInitialized)?;
    database.fetch(ip)
}
