//! Journal storage using RocksDB
//!
//! # Column Families
//!
//! - `journal` - Append-only event log (key: big-endian sequence number)
//! - `meta` - Bookkeeping (`journal_len`)
//!
//! Each append writes the event and the new journal length in one
//! `WriteBatch`, so the two never disagree.

use crate::{
    error::{Error, Result},
    types::LedgerEvent,
    Config,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use std::sync::Arc;

/// Column family names
const CF_JOURNAL: &str = "journal";
const CF_META: &str = "meta";

/// Meta keys
const KEY_JOURNAL_LEN: &[u8] = b"journal_len";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.storage.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.storage.max_write_buffer_number);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_JOURNAL, Self::cf_options_journal()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened journal storage");

        Ok(Self {
            db,
            sync_writes: config.storage.sync_writes,
        })
    }

    fn cf_options_journal() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    // Journal operations

    /// Append the next event. Its sequence must equal the current journal length.
    pub fn append(&self, event: &LedgerEvent) -> Result<()> {
        let expected = self.journal_len()?;
        if event.sequence != expected {
            return Err(Error::Journal(format!(
                "cannot append event {} to journal of length {}",
                event.sequence, expected
            )));
        }

        let cf_journal = self.cf_handle(CF_JOURNAL)?;
        let cf_meta = self.cf_handle(CF_META)?;
        let value = bincode::serialize(event)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_journal, event.sequence.to_be_bytes(), &value);
        batch.put_cf(&cf_meta, KEY_JOURNAL_LEN, (expected + 1).to_be_bytes());
        self.db.write_opt(batch, &self.write_options())?;

        tracing::debug!(
            sequence = event.sequence,
            event_id = %event.event_id,
            event = event.kind.name(),
            "Event journaled"
        );

        Ok(())
    }

    /// Number of journaled events
    pub fn journal_len(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(&cf, KEY_JOURNAL_LEN)? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(0),
        }
    }

    /// Get event by sequence number
    pub fn get_event(&self, sequence: u64) -> Result<LedgerEvent> {
        let cf = self.cf_handle(CF_JOURNAL)?;
        let value = self
            .db
            .get_cf(&cf, sequence.to_be_bytes())?
            .ok_or(Error::EventNotFound(sequence))?;

        let event: LedgerEvent = bincode::deserialize(&value)?;
        Ok(event)
    }

    /// All journaled events in sequence order
    pub fn load_journal(&self) -> Result<Vec<LedgerEvent>> {
        let cf = self.cf_handle(CF_JOURNAL)?;
        let mut events = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let sequence = decode_u64(&key)?;
            let event: LedgerEvent = bincode::deserialize(&value)?;
            if event.sequence != sequence {
                return Err(Error::Journal(format!(
                    "event stored under {} claims sequence {}",
                    sequence, event.sequence
                )));
            }
            events.push(event);
        }

        let recorded = self.journal_len()?;
        if events.len() as u64 != recorded {
            return Err(Error::Journal(format!(
                "journal holds {} events, meta records {}",
                events.len(),
                recorded
            )));
        }

        Ok(events)
    }

    // Statistics

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        let cf = self.cf_handle(CF_JOURNAL)?;
        let live_data_bytes = self
            .db
            .property_int_value_cf(&cf, "rocksdb.estimate-live-data-size")?
            .unwrap_or(0);

        Ok(StorageStats {
            journal_len: self.journal_len()?,
            live_data_bytes,
        })
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("Journal storage closed");
        Ok(())
    }
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Storage(format!("expected 8-byte integer, found {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Number of journaled events
    pub journal_len: u64,
    /// Estimated on-disk size of live journal data
    pub live_data_bytes: u64,
}
