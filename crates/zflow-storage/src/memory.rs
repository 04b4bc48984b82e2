//! In-memory implementation of KeyValueStore
//!
//! Reference backend used by tests and small deployments. Data lives in a
//! single ordered map keyed by `(namespace, key, timestamp)`; scans are
//! cursor-style walks that re-acquire the lock per step, so the contract's
//! streaming semantics hold without snapshotting the table.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::RwLock;

use crate::kv::{KeyValueStore, KvError, KvStream, Timestamp};

type VersionKey = (String, Vec<u8>, Timestamp);

/// In-memory implementation of KeyValueStore
///
/// Provides the same semantics as the networked backends.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<RwLock<BTreeMap<VersionKey, Vec<u8>>>>,
}

impl InMemoryKeyValueStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored versions across all namespaces
    pub fn version_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn key_range(namespace: &str, key: &[u8]) -> (Bound<VersionKey>, Bound<VersionKey>) {
        (
            Bound::Included((namespace.to_string(), key.to_vec(), Timestamp::ZERO)),
            Bound::Included((namespace.to_string(), key.to_vec(), Timestamp::MAX)),
        )
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn put(
        &self,
        namespace: &str,
        key: &[u8],
        value: &[u8],
        timestamp: Timestamp,
    ) -> Result<(), KvError> {
        self.entries.write().insert(
            (namespace.to_string(), key.to_vec(), timestamp),
            value.to_vec(),
        );
        Ok(())
    }

    async fn get_latest(
        &self,
        namespace: &str,
        key: &[u8],
        before: Option<Timestamp>,
    ) -> Result<Option<Vec<u8>>, KvError> {
        let bound = before.unwrap_or(Timestamp::MAX);
        let entries = self.entries.read();
        Ok(entries
            .range((
                Bound::Included((namespace.to_string(), key.to_vec(), Timestamp::ZERO)),
                Bound::Included((namespace.to_string(), key.to_vec(), bound)),
            ))
            .next_back()
            .map(|(_, value)| value.clone()))
    }

    async fn get_latest_timestamp(
        &self,
        namespace: &str,
        key: &[u8],
    ) -> Result<Option<Timestamp>, KvError> {
        let entries = self.entries.read();
        Ok(entries
            .range(Self::key_range(namespace, key))
            .next_back()
            .map(|((_, _, ts), _)| *ts))
    }

    fn get_all_timestamps(&self, namespace: &str, key: &[u8]) -> KvStream<Timestamp> {
        let entries = Arc::clone(&self.entries);
        let namespace = namespace.to_string();
        let key = key.to_vec();

        stream::unfold(None::<Timestamp>, move |below| {
            let entries = Arc::clone(&entries);
            let namespace = namespace.clone();
            let key = key.clone();
            async move {
                let upper = match below {
                    None => Timestamp::MAX,
                    Some(Timestamp(0)) => return None,
                    Some(Timestamp(t)) => Timestamp(t - 1),
                };
                let guard = entries.read();
                let next = guard
                    .range((
                        Bound::Included((namespace.clone(), key.clone(), Timestamp::ZERO)),
                        Bound::Included((namespace, key, upper)),
                    ))
                    .next_back()
                    .map(|((_, _, ts), _)| *ts);
                next.map(|ts| (Ok(ts), Some(ts)))
            }
        })
        .boxed()
    }

    fn scan_all(&self, namespace: &str) -> KvStream<(Vec<u8>, Vec<u8>)> {
        let entries = Arc::clone(&self.entries);
        let namespace = namespace.to_string();

        stream::unfold(None::<Vec<u8>>, move |after| {
            let entries = Arc::clone(&entries);
            let namespace = namespace.clone();
            async move {
                let lower = match &after {
                    None => Bound::Included((namespace.clone(), Vec::new(), Timestamp::ZERO)),
                    Some(key) => Bound::Excluded((namespace.clone(), key.clone(), Timestamp::MAX)),
                };
                let guard = entries.read();
                let key = guard
                    .range((lower, Bound::Unbounded))
                    .next()
                    .and_then(|((ns, key, _), _)| (*ns == namespace).then(|| key.clone()))?;
                let value = guard
                    .range(Self::key_range(&namespace, &key))
                    .next_back()
                    .map(|(_, value)| value.clone())?;
                Some((Ok((key.clone(), value)), Some(key)))
            }
        })
        .boxed()
    }

    async fn delete(
        &self,
        namespace: &str,
        key: &[u8],
        marker: Option<Timestamp>,
    ) -> Result<(), KvError> {
        let mut entries = self.entries.write();
        let doomed: Vec<VersionKey> = match marker {
            None => entries
                .range(Self::key_range(namespace, key))
                .map(|(version, _)| version.clone())
                .collect(),
            Some(marker) => {
                // Ascending timestamps at or below the marker; the last one is
                // the retained snapshot.
                let mut versions: Vec<VersionKey> = entries
                    .range((
                        Bound::Included((namespace.to_string(), key.to_vec(), Timestamp::ZERO)),
                        Bound::Included((namespace.to_string(), key.to_vec(), marker)),
                    ))
                    .map(|(version, _)| version.clone())
                    .collect();
                versions.pop();
                versions
            }
        };
        for version in doomed {
            entries.remove(&version);
        }
        Ok(())
    }
}
