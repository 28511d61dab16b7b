//! File-backed simulation persistence.
//!
//! Layout inside the store directory:
//! ```text
//! sim.meta.json              - metadata and schema versions
//! snapshots/
//!   000001.snapshot.cbor.zst - CBOR+zstd compressed snapshots
//! events/
//!   000001.log.cbor.zst      - CBOR+zstd compressed event log segments
//! integrity/
//!   manifest.json            - hash chain manifest
//! ```

use crate::snapshot::{Snapshot, apply_event};
use mizu_kernel::{SimEvent, World};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SIM_SCHEMA_VERSION: u32 = 1;
const EVENT_SCHEMA_VERSION: u32 = 1;

const META_FILE: &str = "sim.meta.json";

/// Errors from file-backed persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("no snapshots found")]
    NoSnapshots,
    #[error("replay failed: {0}")]
    Replay(#[from] mizu_common::Error),
}

/// Metadata stored in `sim.meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMeta {
    pub sim_schema_version: u32,
    pub event_schema_version: u32,
    pub snapshot_count: u32,
    pub event_segment_count: u32,
}

/// A single entry in the integrity manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Integrity manifest tracking all segment hashes in a chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

/// On-disk form of a snapshot: the segments numbered `first_segment` and up
/// were written after it.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    first_segment: u32,
    snapshot: Snapshot,
}

/// File-backed simulation store with schema versioning and integrity checking.
pub struct WorldStore {
    root: PathBuf,
    meta: SimMeta,
    manifest: IntegrityManifest,
}

impl WorldStore {
    /// Open or create a store at the given path.
    ///
    /// Fails closed on a schema version it does not know.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("snapshots"))?;
        std::fs::create_dir_all(root.join("events"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join(META_FILE);
        let manifest_path = root.join("integrity").join("manifest.json");

        let (meta, manifest) = if meta_path.exists() {
            let meta: SimMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            check_version(meta.sim_schema_version, SIM_SCHEMA_VERSION)?;
            check_version(meta.event_schema_version, EVENT_SCHEMA_VERSION)?;
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = SimMeta {
                sim_schema_version: SIM_SCHEMA_VERSION,
                event_schema_version: EVENT_SCHEMA_VERSION,
                snapshot_count: 0,
                event_segment_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            (meta, manifest)
        };

        debug!(root = %root.display(), snapshots = meta.snapshot_count, "store opened");
        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    /// Load the latest snapshot and re-apply the segments written after it.
    ///
    /// The returned world sits at the last logged tick with an empty event log.
    pub fn load_latest(&self) -> Result<World, StoreError> {
        if self.meta.snapshot_count == 0 {
            return Err(StoreError::NoSnapshots);
        }
        let record = self.load_snapshot(self.meta.snapshot_count)?;
        let snap = record.snapshot;
        if !snap.verify() {
            return Err(StoreError::IntegrityMismatch {
                expected: format!("{:016x}", snap.hash),
                actual: "snapshot content hash mismatch".into(),
            });
        }

        let mut world = snap.restore();
        for seg_idx in record.first_segment..=self.meta.event_segment_count {
            for event in &self.load_event_segment(seg_idx)? {
                apply_event(&mut world, event)?;
            }
        }
        world.drain_events();
        info!(
            snapshot_tick = snap.tick,
            tick = world.tick(),
            "world restored"
        );
        Ok(world)
    }

    /// Append events to the store as a new segment.
    pub fn append_events(&mut self, events: &[SimEvent]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        self.meta.event_segment_count += 1;
        let filename = format!("{:06}.log.cbor.zst", self.meta.event_segment_count);
        self.write_entry("events", filename, events)?;
        debug!(
            segment = self.meta.event_segment_count,
            events = events.len(),
            "event segment written"
        );
        Ok(())
    }

    /// Flush the world's pending events, then write a snapshot of it. The
    /// world records from here on so `load_latest` can re-apply later ticks.
    pub fn take_snapshot(&mut self, world: &mut World) -> Result<(), StoreError> {
        self.append_events(&world.drain_events())?;
        world.record_events(true);
        let record = SnapshotRecord {
            first_segment: self.meta.event_segment_count + 1,
            snapshot: Snapshot::capture(world),
        };
        self.meta.snapshot_count += 1;
        let filename = format!("{:06}.snapshot.cbor.zst", self.meta.snapshot_count);
        self.write_entry("snapshots", filename, &record)?;
        info!(
            snapshot = self.meta.snapshot_count,
            tick = record.snapshot.tick,
            "snapshot written"
        );
        Ok(())
    }

    /// Verify all integrity hashes in the manifest.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        let mut prev_hash: Option<String> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(StoreError::IntegrityMismatch {
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry
                        .prev_hash
                        .clone()
                        .unwrap_or_else(|| "None".into()),
                });
            }

            let data = std::fs::read(self.entry_path(&entry.filename))?;
            let actual_hash = sha256_hex(&data);
            if actual_hash != entry.sha256 {
                warn!(file = %entry.filename, "integrity mismatch");
                return Err(StoreError::IntegrityMismatch {
                    expected: entry.sha256.clone(),
                    actual: actual_hash,
                });
            }

            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &SimMeta {
        &self.meta
    }

    fn entry_path(&self, filename: &str) -> PathBuf {
        let dir = if filename.contains("snapshot") {
            "snapshots"
        } else {
            "events"
        };
        self.root.join(dir).join(filename)
    }

    /// Encode, compress, write and chain one file into the manifest.
    fn write_entry<T: Serialize + ?Sized>(
        &mut self,
        dir: &str,
        filename: String,
        value: &T,
    ) -> Result<(), StoreError> {
        let compressed = zstd_compress(&cbor_serialize(value)?)?;
        let hash = sha256_hex(&compressed);
        let prev_hash = self.manifest.entries.last().map(|e| e.sha256.clone());

        std::fs::write(self.root.join(dir).join(&filename), &compressed)?;

        self.manifest.entries.push(ManifestEntry {
            filename,
            sha256: hash,
            prev_hash,
        });
        self.save_meta()?;
        self.save_manifest()
    }

    fn load_snapshot(&self, index: u32) -> Result<SnapshotRecord, StoreError> {
        let filename = format!("{:06}.snapshot.cbor.zst", index);
        self.read_entry(&filename)
    }

    fn load_event_segment(&self, index: u32) -> Result<Vec<SimEvent>, StoreError> {
        let filename = format!("{:06}.log.cbor.zst", index);
        self.read_entry(&filename)
    }

    fn read_entry<T: for<'de> Deserialize<'de>>(&self, filename: &str) -> Result<T, StoreError> {
        let compressed = std::fs::read(self.entry_path(filename))?;
        self.verify_file_hash(filename, &compressed)?;
        cbor_deserialize(&zstd_decompress(&compressed)?)
    }

    fn verify_file_hash(&self, filename: &str, data: &[u8]) -> Result<(), StoreError> {
        let actual = sha256_hex(data);
        match self.manifest.entries.iter().find(|e| e.filename == filename) {
            Some(entry) if entry.sha256 != actual => Err(StoreError::IntegrityMismatch {
                expected: entry.sha256.clone(),
                actual,
            }),
            Some(_) => Ok(()),
            None => Err(StoreError::IntegrityMismatch {
                expected: format!("manifest entry for {filename}"),
                actual: "none".into(),
            }),
        }
    }

    fn save_meta(&self) -> Result<(), StoreError> {
        let path = self.root.join(META_FILE);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), StoreError> {
        let path = self.root.join("integrity").join("manifest.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

fn check_version(file_version: u32, expected_version: u32) -> Result<(), StoreError> {
    if file_version != expected_version {
        return Err(StoreError::SchemaMismatch {
            file_version,
            expected_version,
        });
    }
    Ok(())
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(data).map_err(|e| StoreError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
