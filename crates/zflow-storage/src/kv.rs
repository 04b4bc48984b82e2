//! KeyValueStore trait definition
//!
//! The durable mapping `(namespace, key) -> ordered sequence of
//! (timestamp, value)` that backs all zflow state. Implementations must be
//! thread-safe; scans are lazy streams and must not buffer a whole namespace.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Monotonic logical timestamp supplied by callers.
///
/// Never read from system time inside the store; comparison is numeric.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    pub fn next(self) -> Self {
        Timestamp(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// Storage failure, carrying the failed operation and namespace.
    #[error("{op} failed in namespace {namespace}: {message}")]
    Io {
        op: &'static str,
        namespace: String,
        message: String,
    },
}

impl KvError {
    pub fn io(op: &'static str, namespace: &str, cause: impl std::fmt::Display) -> Self {
        Self::Io {
            op,
            namespace: namespace.to_string(),
            message: cause.to_string(),
        }
    }
}

/// A lazy stream of store results.
pub type KvStream<T> = BoxStream<'static, Result<T, KvError>>;

/// Versioned key-value store
///
/// Within a namespace, keys are opaque byte strings and every write carries a
/// caller-supplied timestamp. The logical identity for most reads is
/// `(namespace, key)` with the newest timestamp at or below a bound. Lookups
/// never fail for absence; they return `None` or an empty stream.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Insert the version `(namespace, key, timestamp, value)`.
    ///
    /// A write at an existing timestamp deterministically overwrites it.
    async fn put(
        &self,
        namespace: &str,
        key: &[u8],
        value: &[u8],
        timestamp: Timestamp,
    ) -> Result<(), KvError>;

    /// Value of the largest-timestamp version with `ts <= before`, or of the
    /// largest version overall when `before` is `None`.
    async fn get_latest(
        &self,
        namespace: &str,
        key: &[u8],
        before: Option<Timestamp>,
    ) -> Result<Option<Vec<u8>>, KvError>;

    /// Timestamp of the newest version of `(namespace, key)`.
    async fn get_latest_timestamp(
        &self,
        namespace: &str,
        key: &[u8],
    ) -> Result<Option<Timestamp>, KvError>;

    /// Every timestamp recorded for `(namespace, key)`, descending.
    fn get_all_timestamps(&self, namespace: &str, key: &[u8]) -> KvStream<Timestamp>;

    /// One `(key, value)` entry per key in the namespace, newest version per
    /// key.
    fn scan_all(&self, namespace: &str) -> KvStream<(Vec<u8>, Vec<u8>)>;

    /// As [`KeyValueStore::scan_all`] with values omitted.
    fn scan_all_keys(&self, namespace: &str) -> KvStream<Vec<u8>> {
        self.scan_all(namespace)
            .map(|entry| entry.map(|(key, _)| key))
            .boxed()
    }

    /// Remove versions of `(namespace, key)`.
    ///
    /// With `marker = Some(t)`: removes every version with `ts <= t` except
    /// the most recent such version, which is retained so later bounded reads
    /// keep answering consistently. With `marker = None`: removes all
    /// versions.
    async fn delete(
        &self,
        namespace: &str,
        key: &[u8],
        marker: Option<Timestamp>,
    ) -> Result<(), KvError>;
}
