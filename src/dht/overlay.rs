use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::obfuscate::ObfuscatedId;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Codec error: {0}")]
    Codec(String),
}

/// A node as seen through the privacy layer.
///
/// Lookups return obfuscated identifiers only; the façade never claims
/// to invert the obfuscation, and the descriptors remain usable for
/// further routing as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Obfuscated node identifier
    pub id: ObfuscatedId,

    /// The node's network address
    pub addr: SocketAddr,
}

/// The base overlay the privacy layer delegates to.
///
/// A leaf dependency with no knowledge of the privacy semantics: keys
/// and records are opaque bytes, and all routing, replication and
/// conflict resolution (e.g. last-write-wins between two racing stores
/// on the same key) follow the overlay's own rules.
#[allow(async_fn_in_trait)]
pub trait Overlay: Send + Sync {
    /// Stores an opaque record under a key.
    async fn store(&self, key: &[u8], record: &[u8]) -> Result<(), OverlayError>;

    /// Fetches the record stored under a key, if any.
    async fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>, OverlayError>;

    /// Announces that this node serves the given key on a port.
    async fn announce(&self, key: &[u8], port: u16) -> Result<(), OverlayError>;

    /// Looks up nodes close to an identifier.
    async fn lookup(&self, id: &[u8]) -> Result<Vec<NodeDescriptor>, OverlayError>;
}

/// Number of descriptors a lookup returns at most.
const LOOKUP_K: usize = 20;

/// A stored overlay record with expiry metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredValue {
    /// The record bytes
    pub data: Vec<u8>,

    /// When the record was stored
    pub timestamp: SystemTime,

    /// When the record expires, if ever
    pub expiry: Option<SystemTime>,

    /// Monotonic version, bumped on overwrite
    pub version: u64,
}

impl StoredValue {
    pub fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let now = SystemTime::now();
        Self {
            data,
            timestamp: now,
            expiry: ttl.map(|ttl| now + ttl),
            version: 1,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => SystemTime::now().duration_since(expiry).is_ok(),
            None => false,
        }
    }

    pub fn update(&mut self, data: Vec<u8>, ttl: Option<Duration>) {
        let now = SystemTime::now();
        self.data = data;
        self.timestamp = now;
        self.expiry = ttl.map(|ttl| now + ttl);
        self.version += 1;
    }
}

/// In-memory overlay, used by tests and single-process deployments.
/// Clones share the same underlying maps.
#[derive(Clone)]
pub struct MemoryOverlay {
    records: Arc<RwLock<HashMap<Vec<u8>, StoredValue>>>,
    announcements: Arc<RwLock<HashMap<Vec<u8>, Vec<u16>>>>,
    nodes: Arc<RwLock<Vec<NodeDescriptor>>>,
    record_ttl: Option<Duration>,
}

impl MemoryOverlay {
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    pub fn with_ttl(record_ttl: Option<Duration>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            announcements: Arc::new(RwLock::new(HashMap::new())),
            nodes: Arc::new(RwLock::new(Vec::new())),
            record_ttl,
        }
    }

    /// Seeds a known node for lookups.
    pub async fn add_node(&self, node: NodeDescriptor) {
        let mut nodes = self.nodes.write().await;
        if !nodes.iter().any(|n| n.id == node.id) {
            nodes.push(node);
        }
    }

    /// Returns the ports announced for a key.
    pub async fn announced_ports(&self, key: &[u8]) -> Vec<u16> {
        let announcements = self.announcements.read().await;
        announcements.get(key).cloned().unwrap_or_default()
    }

    /// Drops expired records, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, value| !value.is_expired());
        before - records.len()
    }
}

impl Default for MemoryOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for MemoryOverlay {
    async fn store(&self, key: &[u8], record: &[u8]) -> Result<(), OverlayError> {
        let mut records = self.records.write().await;
        match records.get_mut(key) {
            Some(existing) => existing.update(record.to_vec(), self.record_ttl),
            None => {
                records.insert(key.to_vec(), StoredValue::new(record.to_vec(), self.record_ttl));
            }
        }
        Ok(())
    }

    async fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>, OverlayError> {
        let records = self.records.read().await;
        match records.get(key) {
            Some(value) if !value.is_expired() => Ok(Some(value.data.clone())),
            _ => Ok(None),
        }
    }

    async fn announce(&self, key: &[u8], port: u16) -> Result<(), OverlayError> {
        let mut announcements = self.announcements.write().await;
        let ports = announcements.entry(key.to_vec()).or_default();
        if !ports.contains(&port) {
            ports.push(port);
        }
        Ok(())
    }

    async fn lookup(&self, id: &[u8]) -> Result<Vec<NodeDescriptor>, OverlayError> {
        let target = ObfuscatedId::try_from(id)
            .map_err(|e| OverlayError::Codec(e.to_string()))?;

        let nodes = self.nodes.read().await;
        let mut closest: Vec<NodeDescriptor> = nodes.clone();
        closest.sort_by(|a, b| a.id.distance(&target).cmp(&b.id.distance(&target)));
        closest.truncate(LOOKUP_K);
        Ok(closest)
    }
}

/// Persistent overlay backed by sled, for nodes that keep records
/// across restarts.
pub struct SledOverlay {
    db: sled::Db,
    records: sled::Tree,
    announcements: sled::Tree,
    nodes: sled::Tree,
    record_ttl: Option<Duration>,
}

impl SledOverlay {
    pub fn open(path: &Path, record_ttl: Option<Duration>) -> Result<Self, OverlayError> {
        let db = sled::open(path).map_err(|e| OverlayError::Storage(e.to_string()))?;
        let records = db
            .open_tree("records")
            .map_err(|e| OverlayError::Storage(e.to_string()))?;
        let announcements = db
            .open_tree("announcements")
            .map_err(|e| OverlayError::Storage(e.to_string()))?;
        let nodes = db
            .open_tree("nodes")
            .map_err(|e| OverlayError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            records,
            announcements,
            nodes,
            record_ttl,
        })
    }

    /// Seeds a known node for lookups.
    pub fn add_node(&self, node: &NodeDescriptor) -> Result<(), OverlayError> {
        let encoded =
            bincode::serialize(node).map_err(|e| OverlayError::Codec(e.to_string()))?;
        self.nodes
            .insert(node.id.as_bytes(), encoded)
            .map_err(|e| OverlayError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Drops expired records, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;

        for result in self.records.iter() {
            let (key, encoded) = match result {
                Ok(pair) => pair,
                Err(_) => continue,
            };

            let value: StoredValue = match bincode::deserialize(&encoded) {
                Ok(value) => value,
                Err(_) => continue,
            };

            if value.is_expired() && self.records.remove(key).is_ok() {
                removed += 1;
            }
        }

        removed
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<(), OverlayError> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| OverlayError::Storage(e.to_string()))
    }
}

impl Overlay for SledOverlay {
    async fn store(&self, key: &[u8], record: &[u8]) -> Result<(), OverlayError> {
        let value = match self
            .records
            .get(key)
            .map_err(|e| OverlayError::Storage(e.to_string()))?
        {
            Some(encoded) => {
                let mut existing: StoredValue = bincode::deserialize(&encoded)
                    .map_err(|e| OverlayError::Codec(e.to_string()))?;
                existing.update(record.to_vec(), self.record_ttl);
                existing
            }
            None => StoredValue::new(record.to_vec(), self.record_ttl),
        };

        let encoded =
            bincode::serialize(&value).map_err(|e| OverlayError::Codec(e.to_string()))?;
        self.records
            .insert(key, encoded)
            .map_err(|e| OverlayError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>, OverlayError> {
        let encoded = match self
            .records
            .get(key)
            .map_err(|e| OverlayError::Storage(e.to_string()))?
        {
            Some(encoded) => encoded,
            None => return Ok(None),
        };

        let value: StoredValue =
            bincode::deserialize(&encoded).map_err(|e| OverlayError::Codec(e.to_string()))?;

        if value.is_expired() {
            return Ok(None);
        }
        Ok(Some(value.data))
    }

    async fn announce(&self, key: &[u8], port: u16) -> Result<(), OverlayError> {
        let mut ports: Vec<u16> = match self
            .announcements
            .get(key)
            .map_err(|e| OverlayError::Storage(e.to_string()))?
        {
            Some(encoded) => bincode::deserialize(&encoded)
                .map_err(|e| OverlayError::Codec(e.to_string()))?,
            None => Vec::new(),
        };

        if !ports.contains(&port) {
            ports.push(port);
        }

        let encoded =
            bincode::serialize(&ports).map_err(|e| OverlayError::Codec(e.to_string()))?;
        self.announcements
            .insert(key, encoded)
            .map_err(|e| OverlayError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn lookup(&self, id: &[u8]) -> Result<Vec<NodeDescriptor>, OverlayError> {
        let target =
            ObfuscatedId::try_from(id).map_err(|e| OverlayError::Codec(e.to_string()))?;

        let mut descriptors = Vec::new();
        for result in self.nodes.iter() {
            let (_, encoded) = match result {
                Ok(pair) => pair,
                Err(_) => continue,
            };
            if let Ok(node) = bincode::deserialize::<NodeDescriptor>(&encoded) {
                descriptors.push(node);
            }
        }

        descriptors.sort_by(|a, b| a.id.distance(&target).cmp(&b.id.distance(&target)));
        descriptors.truncate(LOOKUP_K);
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_overlay_round_trip() {
        let overlay = MemoryOverlay::new();

        overlay.store(b"key", b"record").await.unwrap();
        assert_eq!(overlay.fetch(b"key").await.unwrap(), Some(b"record".to_vec()));
        assert_eq!(overlay.fetch(b"missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_overlay_overwrite_bumps_version() {
        let overlay = MemoryOverlay::new();

        overlay.store(b"key", b"one").await.unwrap();
        overlay.store(b"key", b"two").await.unwrap();

        let records = overlay.records.read().await;
        let value = records.get(&b"key"[..]).unwrap();
        assert_eq!(value.version, 2);
        assert_eq!(value.data, b"two".to_vec());
    }

    #[tokio::test]
    async fn test_memory_overlay_expiry() {
        let overlay = MemoryOverlay::with_ttl(Some(Duration::from_millis(10)));

        overlay.store(b"key", b"record").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(overlay.fetch(b"key").await.unwrap(), None);
        assert_eq!(overlay.cleanup_expired().await, 1);
    }

    #[tokio::test]
    async fn test_memory_overlay_announce_and_lookup() {
        use crate::obfuscate::obfuscate;

        let overlay = MemoryOverlay::new();

        overlay.announce(b"key", 6881).await.unwrap();
        overlay.announce(b"key", 6881).await.unwrap();
        assert_eq!(overlay.announced_ports(b"key").await, vec![6881]);

        let node = NodeDescriptor {
            id: obfuscate(b"node-a"),
            addr: "127.0.0.1:4000".parse().unwrap(),
        };
        overlay.add_node(node.clone()).await;

        let found = overlay.lookup(obfuscate(b"node-a").as_bytes()).await.unwrap();
        assert_eq!(found, vec![node]);
    }
}
