//! Persistent quad store using RocksDB
//!
//! Column families:
//! - `quads`:    compound key -> bincode `Quad`
//! - `nodes`:    node hash -> bincode `NodeRecord`
//! - `index`:    direction tag ‖ node hash ‖ compound key -> empty
//! - `metadata`: store-wide settings, currently the hash algorithm
//!
//! Scans are paged: a cursor remembers the last key it returned and re-seeks
//! past it when its buffer runs dry, so it never pins a RocksDB iterator
//! between calls.

use crate::backend::{
    check_constraint, validate_quads, Collection, Constraint, Cursor, NodeRecord, QuadBackend,
    QuadStore, NODES, QUADS,
};
use crate::config::{CostModel, StoreOptions};
use crate::error::{QuadStoreError, Result};
use crate::hash::{HashAlgorithm, KeyCodec};
use crate::iterator::{IteratorType, TypeRegistry};
use crate::types::{Direction, Quad, Value};
use parking_lot::Mutex;
use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const TYPE_NAME: &str = "rocksdb";

const CF_QUADS: &str = QUADS;
const CF_NODES: &str = NODES;
const CF_INDEX: &str = "index";
const CF_METADATA: &str = "metadata";

const META_HASH: &[u8] = b"hash_algorithm";

/// Quad store backed by RocksDB
pub struct RocksStore {
    db: Arc<DB>,
    path: PathBuf,
    codec: KeyCodec,
    costs: CostModel,
    scan_batch: usize,
    iterator_type: IteratorType,
    // Serialises read-modify-write of node reference counts
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a store at the given path.
    ///
    /// The hash algorithm is recorded on creation; reopening with a
    /// different one is a configuration error.
    pub fn open<P: AsRef<Path>>(
        path: P,
        registry: &mut TypeRegistry,
        options: &StoreOptions,
    ) -> Result<Self> {
        options.validate()?;
        let codec = options.codec()?;
        let path = path.as_ref().to_path_buf();

        let mut opts = Options::default();
        opts.create_if_missing(options.create_if_missing);
        opts.create_missing_column_families(true);

        // Performance tuning
        opts.set_max_background_jobs(4);
        opts.set_bytes_per_sync(1024 * 1024); // 1MB
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cfs = vec![CF_QUADS, CF_NODES, CF_INDEX, CF_METADATA];
        let db = DB::open_cf(&opts, &path, cfs).map_err(|e| {
            QuadStoreError::Config(format!("failed to open database at {}: {}", path.display(), e))
        })?;

        let store = RocksStore {
            db: Arc::new(db),
            path,
            codec,
            costs: options.costs(),
            scan_batch: options.scan_batch,
            iterator_type: registry.register(TYPE_NAME),
            write_lock: Mutex::new(()),
        };
        store.pin_hash_algorithm()?;
        info!(path = %store.path.display(), hash = %codec.algorithm(), "opened rocksdb quad store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush all writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn pin_hash_algorithm(&self) -> Result<()> {
        let cf = cf(&self.db, CF_METADATA)?;
        match self.db.get_cf(cf, META_HASH)? {
            Some(raw) => {
                let stored = String::from_utf8_lossy(&raw);
                let stored: HashAlgorithm = stored.parse()?;
                if stored != self.codec.algorithm() {
                    return Err(QuadStoreError::Config(format!(
                        "store at {} was created with {}, refusing to open with {}",
                        self.path.display(),
                        stored,
                        self.codec.algorithm()
                    )));
                }
            }
            None => {
                self.db
                    .put_cf(cf, META_HASH, self.codec.algorithm().as_str().as_bytes())?;
            }
        }
        Ok(())
    }

    fn node(&self, hash: &Value) -> Result<Option<NodeRecord>> {
        let cf = cf(&self.db, CF_NODES)?;
        match self.db.get_cf(cf, hash.as_str().as_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Queue the writes for one quad and accumulate its node deltas.
    fn stage(
        &self,
        batch: &mut WriteBatch,
        deltas: &mut HashMap<Value, (String, i64)>,
        key: &Value,
        quad: &Quad,
        delta: i64,
    ) -> Result<()> {
        let quads = cf(&self.db, CF_QUADS)?;
        let index = cf(&self.db, CF_INDEX)?;

        if delta > 0 {
            batch.put_cf(quads, key.as_str().as_bytes(), bincode::serialize(quad)?);
        } else {
            batch.delete_cf(quads, key.as_str().as_bytes());
        }

        for dir in Direction::QUAD {
            let name = quad.get(dir).unwrap_or_default();
            let hash = self.codec.hash(name);
            let mut entry = index_prefix(dir, &hash);
            entry.extend_from_slice(key.as_str().as_bytes());
            if delta > 0 {
                batch.put_cf(index, entry, b"");
            } else {
                batch.delete_cf(index, entry);
            }
            if !name.is_empty() {
                deltas.entry(hash).or_insert_with(|| (name.to_string(), 0)).1 += delta;
            }
        }
        Ok(())
    }

    fn apply_node_deltas(
        &self,
        batch: &mut WriteBatch,
        deltas: HashMap<Value, (String, i64)>,
    ) -> Result<()> {
        let nodes = cf(&self.db, CF_NODES)?;
        for (hash, (name, delta)) in deltas {
            let current = self.node(&hash)?.map_or(0, |n| n.size as i64);
            let size = current + delta;
            if size <= 0 {
                batch.delete_cf(nodes, hash.as_str().as_bytes());
            } else {
                let record = NodeRecord {
                    name,
                    size: size as u64,
                };
                batch.put_cf(nodes, hash.as_str().as_bytes(), bincode::serialize(&record)?);
            }
        }
        Ok(())
    }

    fn contains(&self, key: &Value) -> Result<bool> {
        let quads = cf(&self.db, CF_QUADS)?;
        Ok(self.db.get_cf(quads, key.as_str().as_bytes())?.is_some())
    }

    /// Column family and key prefix serving a query; matches are the prefix plus the key
    fn scan_plan(
        &self,
        collection: &Collection,
        constraint: Option<&Constraint>,
    ) -> Result<(&'static str, Vec<u8>)> {
        check_constraint(&self.codec, collection, constraint)?;
        Ok(match (collection.name(), constraint) {
            (NODES, _) => (CF_NODES, Vec::new()),
            (_, None) => (CF_QUADS, Vec::new()),
            (_, Some(c)) => (CF_INDEX, index_prefix(c.direction, &c.value)),
        })
    }
}

impl QuadBackend for RocksStore {
    type Cursor = RocksCursor;

    fn codec(&self) -> KeyCodec {
        self.codec
    }

    fn costs(&self) -> CostModel {
        self.costs
    }

    fn iterator_type(&self) -> IteratorType {
        self.iterator_type
    }

    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn name_of(&self, value: &Value) -> Result<Option<String>> {
        Ok(self.node(value)?.map(|node| node.name))
    }

    fn open_collection(&self, name: &str) -> Result<Collection> {
        match name {
            QUADS | NODES => {
                cf(&self.db, name)?;
                Ok(Collection::new(name))
            }
            other => Err(QuadStoreError::UnknownCollection(other.to_string())),
        }
    }

    fn count_matching(&self, collection: &Collection, constraint: Option<&Constraint>) -> Result<u64> {
        let (cf_name, prefix) = self.scan_plan(collection, constraint)?;
        let cf = cf(&self.db, cf_name)?;

        let mut count = 0u64;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_slice(), rocksdb::Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn find(&self, collection: &Collection, constraint: Option<&Constraint>) -> Result<RocksCursor> {
        let (cf_name, prefix) = self.scan_plan(collection, constraint)?;
        debug!(cf = cf_name, prefix_len = prefix.len(), "opening rocksdb cursor");
        Ok(RocksCursor {
            db: Arc::clone(&self.db),
            cf_name,
            strip: prefix.len(),
            prefix,
            resume: None,
            buffer: VecDeque::new(),
            batch: self.scan_batch,
            done: false,
            pending: None,
            closed: false,
        })
    }
}

impl QuadStore for RocksStore {
    fn add_quad(&self, quad: &Quad) -> Result<()> {
        self.add_quad_set(std::slice::from_ref(quad))
    }

    fn add_quad_set(&self, quads: &[Quad]) -> Result<()> {
        validate_quads(quads)?;
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let mut deltas = HashMap::new();
        let mut staged = std::collections::HashSet::new();
        for quad in quads {
            let key = self.codec.quad_key(quad);
            if staged.contains(&key) || self.contains(&key)? {
                continue;
            }
            self.stage(&mut batch, &mut deltas, &key, quad, 1)?;
            staged.insert(key);
        }
        self.apply_node_deltas(&mut batch, deltas)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn remove_quad(&self, quad: &Quad) -> Result<()> {
        let _guard = self.write_lock.lock();
        let key = self.codec.quad_key(quad);
        let stored = match self.quad(&key)? {
            Some(stored) => stored,
            None => return Ok(()),
        };

        let mut batch = WriteBatch::default();
        let mut deltas = HashMap::new();
        self.stage(&mut batch, &mut deltas, &key, &stored, -1)?;
        self.apply_node_deltas(&mut batch, deltas)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn quad(&self, key: &Value) -> Result<Option<Quad>> {
        let quads = cf(&self.db, CF_QUADS)?;
        match self.db.get_cf(quads, key.as_str().as_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn size(&self) -> Result<u64> {
        self.count_matching(&Collection::new(QUADS), None)
    }

    fn node_count(&self) -> Result<u64> {
        self.count_matching(&Collection::new(NODES), None)
    }
}

/// Paged forward scan over one key prefix
pub struct RocksCursor {
    db: Arc<DB>,
    cf_name: &'static str,
    prefix: Vec<u8>,
    strip: usize,
    resume: Option<Vec<u8>>,
    buffer: VecDeque<Value>,
    batch: usize,
    done: bool,
    // Error hit part-way through a page, reported once the buffer drains
    pending: Option<QuadStoreError>,
    closed: bool,
}

impl RocksCursor {
    fn refill(&mut self) -> Result<()> {
        let db = Arc::clone(&self.db);
        let cf = cf(&db, self.cf_name)?;
        let start = self.resume.clone().unwrap_or_else(|| self.prefix.clone());

        let mut fetched = 0;
        let iter = db.iterator_cf(cf, IteratorMode::From(start.as_slice(), rocksdb::Direction::Forward));
        for item in iter {
            let key = match item {
                Ok((key, _)) => key,
                Err(err) if self.buffer.is_empty() => return Err(err.into()),
                Err(err) => {
                    self.pending = Some(err.into());
                    self.done = true;
                    return Ok(());
                }
            };
            if !key.starts_with(&self.prefix) {
                break;
            }
            if self.resume.as_deref() == Some(&key[..]) {
                continue;
            }
            let raw = std::str::from_utf8(&key[self.strip..]).map_err(|e| {
                QuadStoreError::Serialization(format!("non-utf8 key in {}: {}", self.cf_name, e))
            })?;
            self.buffer.push_back(Value::new(raw));
            self.resume = Some(key.to_vec());
            fetched += 1;
            if fetched == self.batch {
                break;
            }
        }
        if fetched < self.batch {
            self.done = true;
        }
        Ok(())
    }
}

impl Cursor for RocksCursor {
    fn next_key(&mut self) -> Result<Option<Value>> {
        if self.closed {
            return Err(QuadStoreError::Backend("cursor is closed".to_string()));
        }
        if self.buffer.is_empty() && !self.done {
            self.refill()?;
        }
        match self.buffer.pop_front() {
            Some(value) => Ok(Some(value)),
            None => match self.pending.take() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a rocksdb::ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| QuadStoreError::Backend(format!("column family {} not found", name)))
}

fn index_prefix(dir: Direction, hash: &Value) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(1 + hash.len());
    prefix.push(dir.tag());
    prefix.extend_from_slice(hash.as_str().as_bytes());
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir, options: &StoreOptions) -> Result<RocksStore> {
        let mut registry = TypeRegistry::new();
        RocksStore::open(dir.path(), &mut registry, options)
    }

    fn drain(cursor: &mut RocksCursor) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(v) = cursor.next_key().unwrap() {
            out.push(v);
        }
        out
    }

    #[test]
    fn test_storage_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, &StoreOptions::default()).unwrap();

        let quad = Quad::new("A", "knows", "B", "g1");
        store.add_quad(&quad).unwrap();
        store.add_quad(&quad).unwrap();

        let key = store.codec().quad_key(&quad);
        assert_eq!(store.quad(&key).unwrap(), Some(quad));
        assert_eq!(store.size().unwrap(), 1);
        assert_eq!(store.node_count().unwrap(), 4);
        assert_eq!(store.name_of(&store.value_of("g1")).unwrap(), Some("g1".to_string()));
    }

    #[test]
    fn test_paged_cursor_crosses_batches() {
        let temp_dir = TempDir::new().unwrap();
        let options = StoreOptions {
            scan_batch: 2,
            ..StoreOptions::default()
        };
        let store = open(&temp_dir, &options).unwrap();

        let quads: Vec<Quad> = (0..7)
            .map(|i| Quad::new("A", "knows", format!("n{}", i), ""))
            .collect();
        store.add_quad_set(&quads).unwrap();

        let collection = store.open_collection(QUADS).unwrap();
        let constraint = Constraint {
            direction: Direction::Subject,
            value: store.value_of("A"),
        };
        assert_eq!(store.count_matching(&collection, Some(&constraint)).unwrap(), 7);

        let mut cursor = store.find(&collection, Some(&constraint)).unwrap();
        let keys = drain(&mut cursor);
        assert_eq!(keys.len(), 7);
        for key in &keys {
            assert_eq!(key.len(), store.codec().key_width());
        }
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_remove_updates_nodes_and_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, &StoreOptions::default()).unwrap();

        let first = Quad::new("A", "knows", "B", "");
        let second = Quad::new("A", "knows", "C", "");
        store.add_quad_set(&[first.clone(), second]).unwrap();
        store.remove_quad(&first).unwrap();

        let collection = store.open_collection(QUADS).unwrap();
        let object_b = Constraint {
            direction: Direction::Object,
            value: store.value_of("B"),
        };
        assert_eq!(store.count_matching(&collection, Some(&object_b)).unwrap(), 0);
        assert_eq!(store.name_of(&store.value_of("B")).unwrap(), None);
        assert_eq!(store.node_count().unwrap(), 3);
    }

    #[test]
    fn test_hash_algorithm_is_pinned() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open(&temp_dir, &StoreOptions::default()).unwrap();
            store.add_quad(&Quad::new("A", "knows", "B", "")).unwrap();
            store.flush().unwrap();
        }

        let other = StoreOptions::default().with_hash(HashAlgorithm::Sha512);
        let err = open(&temp_dir, &other).err().unwrap();
        assert!(matches!(err, QuadStoreError::Config(_)));

        let reopened = open(&temp_dir, &StoreOptions::default()).unwrap();
        assert_eq!(reopened.size().unwrap(), 1);
    }

    #[test]
    fn test_cursor_serves_buffer_before_page_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, &StoreOptions::default()).unwrap();
        let codec = store.codec();
        let first = codec.compound_key("A", "knows", "B", "");
        let second = codec.compound_key("A", "knows", "C", "");

        let mut cursor = RocksCursor {
            db: Arc::clone(&store.db),
            cf_name: CF_QUADS,
            prefix: Vec::new(),
            strip: 0,
            resume: None,
            buffer: VecDeque::from(vec![first.clone(), second.clone()]),
            batch: 2,
            done: true,
            pending: Some(QuadStoreError::Backend("io error".to_string())),
            closed: false,
        };

        assert_eq!(cursor.next_key().unwrap(), Some(first));
        assert_eq!(cursor.next_key().unwrap(), Some(second));
        assert!(matches!(cursor.next_key(), Err(QuadStoreError::Backend(_))));
        assert_eq!(cursor.next_key().unwrap(), None);
    }

    #[test]
    fn test_missing_store_without_create() {
        let temp_dir = TempDir::new().unwrap();
        let options = StoreOptions {
            create_if_missing: false,
            ..StoreOptions::default()
        };
        let err = open(&temp_dir, &options).err().unwrap();
        assert!(matches!(err, QuadStoreError::Config(_)));
    }
}
