//! PostgreSQL implementation of KeyValueStore
//!
//! Networked persistence over a connection pool. A single table holds every
//! version: `(namespace, key, timestamp, value)` with a primary key over all
//! three identity columns, so `get_latest` is one descending index probe.
//! Identifiers are quoted and prefixed (`zflow_kv_*`) to avoid reserved-word
//! collisions. Scans paginate with keyset cursors; nothing buffers a whole
//! namespace.

use async_trait::async_trait;
use futures::stream;
use futures::{StreamExt, TryStreamExt};
use sqlx::{PgPool, Row};
use tracing::{error, instrument};

use crate::kv::{KeyValueStore, KvError, KvStream, Timestamp};

/// Rows fetched per scan page.
const SCAN_PAGE: i64 = 256;

/// PostgreSQL implementation of KeyValueStore
///
/// # Example
///
/// ```ignore
/// use sqlx::PgPool;
/// use zflow_storage::PostgresKeyValueStore;
///
/// let pool = PgPool::connect("postgres://localhost/zflow").await?;
/// let store = PostgresKeyValueStore::new(pool);
/// store.init_schema().await?;
/// ```
#[derive(Clone)]
pub struct PostgresKeyValueStore {
    pool: PgPool,
}

impl PostgresKeyValueStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the backing table if it does not exist yet.
    pub async fn init_schema(&self) -> Result<(), KvError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS "zflow_kv_store" (
                "namespace" TEXT NOT NULL,
                "key" BYTEA NOT NULL,
                "timestamp" BIGINT NOT NULL,
                "value" BYTEA NOT NULL,
                PRIMARY KEY ("namespace", "key", "timestamp")
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create zflow_kv_store table: {}", e);
            KvError::io("initSchema", "zflow_kv_store", e)
        })?;
        Ok(())
    }
}

fn encode_timestamp(op: &'static str, namespace: &str, ts: Timestamp) -> Result<i64, KvError> {
    i64::try_from(ts.0).map_err(|_| KvError::io(op, namespace, format!("timestamp {ts} overflows")))
}

#[async_trait]
impl KeyValueStore for PostgresKeyValueStore {
    #[instrument(skip(self, value))]
    async fn put(
        &self,
        namespace: &str,
        key: &[u8],
        value: &[u8],
        timestamp: Timestamp,
    ) -> Result<(), KvError> {
        let ts = encode_timestamp("put", namespace, timestamp)?;
        sqlx::query(
            r#"
            INSERT INTO "zflow_kv_store" ("namespace", "key", "timestamp", "value")
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ("namespace", "key", "timestamp") DO UPDATE SET "value" = EXCLUDED."value"
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(ts)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to put key version: {}", e);
            KvError::io("put", namespace, e)
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_latest(
        &self,
        namespace: &str,
        key: &[u8],
        before: Option<Timestamp>,
    ) -> Result<Option<Vec<u8>>, KvError> {
        let bound = before
            .map(|ts| encode_timestamp("getLatest", namespace, ts))
            .transpose()?;
        let row = sqlx::query(
            r#"
            SELECT "value" FROM "zflow_kv_store"
            WHERE "namespace" = $1 AND "key" = $2
              AND ($3::BIGINT IS NULL OR "timestamp" <= $3)
            ORDER BY "timestamp" DESC
            LIMIT 1
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(bound)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KvError::io("getLatest", namespace, e))?;

        Ok(row.map(|row| row.get("value")))
    }

    #[instrument(skip(self))]
    async fn get_latest_timestamp(
        &self,
        namespace: &str,
        key: &[u8],
    ) -> Result<Option<Timestamp>, KvError> {
        let ts: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT "timestamp" FROM "zflow_kv_store"
            WHERE "namespace" = $1 AND "key" = $2
            ORDER BY "timestamp" DESC
            LIMIT 1
            "#,
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KvError::io("getLatestTimestamp", namespace, e))?;

        Ok(ts.map(|t| Timestamp(t as u64)))
    }

    fn get_all_timestamps(&self, namespace: &str, key: &[u8]) -> KvStream<Timestamp> {
        let pool = self.pool.clone();
        let namespace = namespace.to_string();
        let key = key.to_vec();

        stream::try_unfold(None::<i64>, move |below| {
            let pool = pool.clone();
            let namespace = namespace.clone();
            let key = key.clone();
            async move {
                let page: Vec<i64> = sqlx::query_scalar(
                    r#"
                    SELECT "timestamp" FROM "zflow_kv_store"
                    WHERE "namespace" = $1 AND "key" = $2
                      AND ($3::BIGINT IS NULL OR "timestamp" < $3)
                    ORDER BY "timestamp" DESC
                    LIMIT $4
                    "#,
                )
                .bind(&namespace)
                .bind(&key)
                .bind(below)
                .bind(SCAN_PAGE)
                .fetch_all(&pool)
                .await
                .map_err(|e| KvError::io("getAllTimestamps", &namespace, e))?;

                match page.last().copied() {
                    None => Ok(None),
                    Some(oldest) => Ok(Some((page, Some(oldest)))),
                }
            }
        })
        .map_ok(|page: Vec<i64>| stream::iter(page.into_iter().map(|t| Ok(Timestamp(t as u64)))))
        .try_flatten()
        .boxed()
    }

    fn scan_all(&self, namespace: &str) -> KvStream<(Vec<u8>, Vec<u8>)> {
        let pool = self.pool.clone();
        let namespace = namespace.to_string();

        stream::try_unfold(None::<Vec<u8>>, move |after| {
            let pool = pool.clone();
            let namespace = namespace.clone();
            async move {
                let rows = sqlx::query(
                    r#"
                    SELECT DISTINCT ON ("key") "key", "value"
                    FROM "zflow_kv_store"
                    WHERE "namespace" = $1 AND ($2::BYTEA IS NULL OR "key" > $2)
                    ORDER BY "key" ASC, "timestamp" DESC
                    LIMIT $3
                    "#,
                )
                .bind(&namespace)
                .bind(after)
                .bind(SCAN_PAGE)
                .fetch_all(&pool)
                .await
                .map_err(|e| KvError::io("scanAll", &namespace, e))?;

                let page: Vec<(Vec<u8>, Vec<u8>)> = rows
                    .into_iter()
                    .map(|row| (row.get("key"), row.get("value")))
                    .collect();

                match page.last() {
                    None => Ok(None),
                    Some((last_key, _)) => {
                        let cursor = Some(last_key.clone());
                        Ok(Some((page, cursor)))
                    }
                }
            }
        })
        .map_ok(|page: Vec<(Vec<u8>, Vec<u8>)>| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    fn scan_all_keys(&self, namespace: &str) -> KvStream<Vec<u8>> {
        let pool = self.pool.clone();
        let namespace = namespace.to_string();

        stream::try_unfold(None::<Vec<u8>>, move |after| {
            let pool = pool.clone();
            let namespace = namespace.clone();
            async move {
                let page: Vec<Vec<u8>> = sqlx::query_scalar(
                    r#"
                    SELECT DISTINCT "key" FROM "zflow_kv_store"
                    WHERE "namespace" = $1 AND ($2::BYTEA IS NULL OR "key" > $2)
                    ORDER BY "key" ASC
                    LIMIT $3
                    "#,
                )
                .bind(&namespace)
                .bind(after)
                .bind(SCAN_PAGE)
                .fetch_all(&pool)
                .await
                .map_err(|e| KvError::io("scanAllKeys", &namespace, e))?;

                match page.last().cloned() {
                    None => Ok(None),
                    Some(last_key) => Ok(Some((page, Some(last_key)))),
                }
            }
        })
        .map_ok(|page: Vec<Vec<u8>>| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    #[instrument(skip(self))]
    async fn delete(
        &self,
        namespace: &str,
        key: &[u8],
        marker: Option<Timestamp>,
    ) -> Result<(), KvError> {
        match marker {
            None => {
                sqlx::query(
                    r#"
                    DELETE FROM "zflow_kv_store"
                    WHERE "namespace" = $1 AND "key" = $2
                    "#,
                )
                .bind(namespace)
                .bind(key)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to delete key: {}", e);
                    KvError::io("delete", namespace, e)
                })?;
            }
            Some(marker) => {
                let bound = encode_timestamp("delete", namespace, marker)?;
                // Ascending timestamps at or below the marker; the last one is
                // the retained snapshot and must survive.
                let mut timestamps: Vec<i64> = sqlx::query_scalar(
                    r#"
                    SELECT "timestamp" FROM "zflow_kv_store"
                    WHERE "namespace" = $1 AND "key" = $2 AND "timestamp" <= $3
                    ORDER BY "timestamp" ASC
                    "#,
                )
                .bind(namespace)
                .bind(key)
                .bind(bound)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| KvError::io("delete", namespace, e))?;

                timestamps.pop();
                if !timestamps.is_empty() {
                    sqlx::query(
                        r#"
                        DELETE FROM "zflow_kv_store"
                        WHERE "namespace" = $1 AND "key" = $2 AND "timestamp" = ANY($3)
                        "#,
                    )
                    .bind(namespace)
                    .bind(key)
                    .bind(&timestamps)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        error!("Failed to truncate key history: {}", e);
                        KvError::io("delete", namespace, e)
                    })?;
                }
            }
        }
        Ok(())
    }
}
