//! Pool file store.
//!
//! Owns one pool file and all knowledge of its slot layout. No advisory lock
//! is taken: the host reads the file concurrently and tolerates a torn final
//! record, and writes are single bounded slot writes. One writer per process
//! is assumed.

use crate::codec::{self, KvpRecord, Slot};
use crate::error::{PoolError, Result};
use crate::SLOT_SIZE;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

const SLOT_BYTES: u64 = SLOT_SIZE as u64;

/// Where a write landed, as a slot index from the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteLocation {
    /// A new slot at the end of the file.
    Appended(u64),
    /// An existing slot rewritten in place.
    Overwrote(u64),
}

impl WriteLocation {
    pub fn slot_index(&self) -> u64 {
        match self {
            WriteLocation::Appended(index) | WriteLocation::Overwrote(index) => *index,
        }
    }
}

/// Read/write handle on one pool file.
#[derive(Debug)]
pub struct PoolStore {
    path: PathBuf,
    file: File,
}

impl PoolStore {
    /// Open (creating if absent) a pool file for read/write.
    ///
    /// Existing content is never truncated here.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| PoolError::StoreUnavailable {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "Opened KVP pool file");
        Ok(Self { path, file })
    }

    /// Path of the pool file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of complete slots currently in the file.
    pub fn slot_count(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len() / SLOT_BYTES)
    }

    /// Last modification time of the pool file.
    pub fn modified(&self) -> Result<SystemTime> {
        Ok(self.file.metadata()?.modified()?)
    }

    /// Append a record in a new slot at the end of the file.
    ///
    /// A torn partial slot left at the tail by an interrupted write is
    /// overwritten, keeping slots aligned.
    pub fn append(&mut self, key: &str, value: &str) -> Result<WriteLocation> {
        let slot = codec::encode(key, value)?;

        let len = self.file.metadata()?.len();
        if len % SLOT_BYTES != 0 {
            warn!(
                path = %self.path.display(),
                torn_bytes = len % SLOT_BYTES,
                "Discarding torn trailing slot"
            );
        }
        let index = len / SLOT_BYTES;

        self.write_slot(index, &slot)?;
        debug!(key, slot = index, "Appended KVP record");
        Ok(WriteLocation::Appended(index))
    }

    /// Rewrite the first slot whose key matches, or append if none does.
    pub fn overwrite(&mut self, key: &str, value: &str) -> Result<WriteLocation> {
        let slot = codec::encode(key, value)?;

        match self.find_slot(key)? {
            Some(index) => {
                self.write_slot(index, &slot)?;
                debug!(key, slot = index, "Overwrote KVP record");
                Ok(WriteLocation::Overwrote(index))
            }
            None => self.append(key, value),
        }
    }

    /// Iterate records starting after `generation` already-consumed slots.
    ///
    /// The iterator stops at the end of file as observed now; call again to
    /// see later appends. Empty slots are skipped.
    pub fn iterate(&self, generation: u64) -> Result<PoolIter> {
        let end = self.slot_count()?;
        let mut reader = BufReader::new(File::open(&self.path)?);
        if generation < end {
            reader.seek(SeekFrom::Start(generation * SLOT_BYTES))?;
        }
        Ok(PoolIter {
            reader,
            next: generation,
            end,
        })
    }

    /// Collect all records from `generation` onwards.
    ///
    /// Slots that do not decode (another writer's non-ASCII values, garbage)
    /// are skipped with a warning. I/O errors still fail the listing.
    pub fn records(&self, generation: u64) -> Result<Vec<KvpRecord>> {
        let mut iter = self.iterate(generation)?;
        let mut records = Vec::new();
        while let Some(item) = iter.next() {
            match item {
                Ok(record) => records.push(record),
                Err(PoolError::Encoding(err)) => {
                    warn!(
                        path = %self.path.display(),
                        slot = iter.generation() - 1,
                        error = %err,
                        "Skipping undecodable slot"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }

    /// Remove every slot.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        debug!(path = %self.path.display(), "Truncated KVP pool file");
        Ok(())
    }

    fn write_slot(&mut self, index: u64, slot: &[u8; SLOT_SIZE]) -> Result<()> {
        self.file.seek(SeekFrom::Start(index * SLOT_BYTES))?;
        self.file.write_all(slot)?;
        self.file.flush()?;
        Ok(())
    }

    fn find_slot(&mut self, key: &str) -> Result<Option<u64>> {
        let end = self.slot_count()?;
        self.file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&self.file);
        let mut buf = [0u8; SLOT_SIZE];

        for index in 0..end {
            reader.read_exact(&mut buf)?;
            // Garbled slots cannot match any valid key.
            if let Ok(Slot::Record(record)) = codec::decode(&buf) {
                if record.key == key {
                    return Ok(Some(index));
                }
            }
        }
        Ok(None)
    }
}

/// Lazy iterator over the records of a pool file.
///
/// Undecodable slots yield an error and iteration continues with the next
/// slot; an I/O error ends iteration.
#[derive(Debug)]
pub struct PoolIter {
    reader: BufReader<File>,
    next: u64,
    end: u64,
}

impl PoolIter {
    /// Generation cursor: the number of slots consumed so far, counted from
    /// the start of the file. Pass it to [`PoolStore::iterate`] to resume.
    pub fn generation(&self) -> u64 {
        self.next
    }
}

impl Iterator for PoolIter {
    type Item = Result<KvpRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = [0u8; SLOT_SIZE];
        while self.next < self.end {
            if let Err(err) = self.reader.read_exact(&mut buf) {
                self.next = self.end;
                return Some(Err(err.into()));
            }
            self.next += 1;

            match codec::decode(&buf) {
                Ok(Slot::Empty) => continue,
                Ok(Slot::Record(record)) => return Some(Ok(record)),
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, PoolStore) {
        let dir = TempDir::new().unwrap();
        let store = PoolStore::open(dir.path().join("kvp_pool_file")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pool");
        assert!(!path.exists());
        let store = PoolStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.slot_count().unwrap(), 0);
    }

    #[test]
    fn test_open_does_not_truncate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pool");
        {
            let mut store = PoolStore::open(&path).unwrap();
            store.append("a", "1").unwrap();
        }
        let store = PoolStore::open(&path).unwrap();
        assert_eq!(store.records(0).unwrap(), vec![KvpRecord::new("a", "1")]);
    }

    #[test]
    fn test_open_missing_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = PoolStore::open(dir.path().join("missing").join("pool")).unwrap_err();
        assert!(matches!(err, PoolError::StoreUnavailable { .. }));
    }

    #[test]
    fn test_append_grows_by_one_slot() {
        let (_dir, mut store) = temp_store();
        assert_eq!(store.append("a", "1").unwrap(), WriteLocation::Appended(0));
        assert_eq!(store.append("a", "2").unwrap(), WriteLocation::Appended(1));
        let len = std::fs::metadata(store.path()).unwrap().len();
        assert_eq!(len, 2 * SLOT_BYTES);
    }

    #[test]
    fn test_overwrite_rewrites_first_match() {
        let (_dir, mut store) = temp_store();
        store.append("a", "1").unwrap();
        store.append("b", "2").unwrap();
        store.append("a", "3").unwrap();

        let location = store.overwrite("a", "updated").unwrap();
        assert_eq!(location, WriteLocation::Overwrote(0));
        assert_eq!(
            store.records(0).unwrap(),
            vec![
                KvpRecord::new("a", "updated"),
                KvpRecord::new("b", "2"),
                KvpRecord::new("a", "3"),
            ]
        );
    }

    #[test]
    fn test_overwrite_appends_when_missing() {
        let (_dir, mut store) = temp_store();
        store.append("a", "1").unwrap();
        assert_eq!(store.overwrite("b", "2").unwrap(), WriteLocation::Appended(1));
    }

    #[test]
    fn test_truncate_empties_pool() {
        let (_dir, mut store) = temp_store();
        store.append("a", "1").unwrap();
        store.truncate().unwrap();
        assert_eq!(store.slot_count().unwrap(), 0);
        assert_eq!(store.append("b", "2").unwrap(), WriteLocation::Appended(0));
    }

    #[test]
    fn test_iterator_tracks_generation() {
        let (_dir, mut store) = temp_store();
        store.append("a", "1").unwrap();
        store.append("b", "2").unwrap();

        let mut iter = store.iterate(0).unwrap();
        assert_eq!(iter.generation(), 0);
        iter.next().unwrap().unwrap();
        assert_eq!(iter.generation(), 1);
        iter.next().unwrap().unwrap();
        assert!(iter.next().is_none());
        assert_eq!(iter.generation(), 2);
    }

    #[test]
    fn test_iterate_past_end_is_empty() {
        let (_dir, mut store) = temp_store();
        store.append("a", "1").unwrap();
        assert_eq!(store.iterate(5).unwrap().count(), 0);
    }
}
