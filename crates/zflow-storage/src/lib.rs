// Storage layer for the zflow service
//
// This crate provides the versioned key-value contract and its backends:
// - InMemoryKeyValueStore: reference backend for tests and small deployments
// - PostgresKeyValueStore: networked backend over sqlx
// - TemplateStore: flow-template registry layered on the KV contract

pub mod kv;
pub mod memory;
pub mod postgres;
pub mod templates;

pub use kv::{KeyValueStore, KvError, KvStream, Timestamp};
pub use memory::InMemoryKeyValueStore;
pub use postgres::PostgresKeyValueStore;
pub use templates::{TemplateError, TemplateStore, TEMPLATE_NAMESPACE};
