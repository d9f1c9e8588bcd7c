//! Keyed persistent store for replay sessions.
//!
//! The recorder only needs get/set/remove over string values, so the
//! store is a trait with two backends:
//!
//! - [`MemoryStore`] — `RwLock<HashMap>`; default and tests.
//! - [`RocksStore`] — RocksDB with LZ4-compressed values for durable
//!   history across restarts.
//!
//! Store failures are typed; the recorder decides to swallow them
//! (best-effort history), callers elsewhere propagate.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use rocksdb::{BlockBasedOptions, Cache, DBCompressionType, Options, WriteOptions, DB};

/// Storage errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Backend unavailable or rejected the operation.
    Backend(String),
    /// Stored bytes could not be decompressed or decoded.
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "store backend error: {e}"),
            Self::Corrupt(e) => write!(f, "corrupt store value: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Minimal keyed store contract consumed by the operation recorder.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Backend("poisoned lock".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Backend("poisoned lock".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Backend("poisoned lock".into()))?;
        entries.remove(key);
        Ok(())
    }
}

/// RocksDB store configuration.
#[derive(Debug, Clone)]
pub struct RocksConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 32MB)
    pub block_cache_size: usize,
    /// Enable fsync on every write (default: false)
    pub sync_writes: bool,
}

impl Default for RocksConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("scribe_data"),
            block_cache_size: 32 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

impl RocksConfig {
    /// Config for testing (small cache, temp directory).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed session store.
///
/// Values are LZ4 frame-compressed before they hit the database;
/// RocksDB's own compression is disabled so we control the format.
pub struct RocksStore {
    db: DB,
    sync_writes: bool,
}

impl RocksStore {
    /// Open (or create) the store at the configured path.
    pub fn open(config: RocksConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(DBCompressionType::None);

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut wo = WriteOptions::default();
        wo.set_sync(self.sync_writes);
        wo
    }
}

impl SessionStore for RocksStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let compressed = self
            .db
            .get(key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match compressed {
            None => Ok(None),
            Some(bytes) => {
                let raw = lz4_flex::decompress_size_prepended(&bytes)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                let text = String::from_utf8(raw)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                Ok(Some(text))
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let compressed = lz4_flex::compress_prepend_size(value.as_bytes());
        self.db
            .put_opt(key.as_bytes(), compressed, &self.write_options())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.db
            .delete_opt(key.as_bytes(), &self.write_options())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
