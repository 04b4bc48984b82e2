//! Flow-template registry
//!
//! Named templates persisted through the versioned KV contract in a dedicated
//! namespace. The registry is not versioned at this layer: every write lands
//! at timestamp zero and unbounded `get_latest` reads the current value.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::instrument;
use zflow_core::{FlowTemplate, TemplateId};

use crate::kv::{KeyValueStore, KvError, Timestamp};

/// Namespace holding all stored templates.
pub const TEMPLATE_NAMESPACE: &str = "_zflow_workflow_templates";

/// Error type for registry operations
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Underlying storage failure
    #[error(transparent)]
    Store(#[from] KvError),

    /// A stored template failed to decode; malformed data is an error, not
    /// an absent template.
    #[error("malformed template {id}: {message}")]
    Decode { id: TemplateId, message: String },
}

/// Registry of named flow templates.
#[derive(Clone)]
pub struct TemplateStore {
    kv: Arc<dyn KeyValueStore>,
}

impl TemplateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Store or replace the template under `id`.
    #[instrument(skip(self, template))]
    pub async fn put(&self, id: &TemplateId, template: &FlowTemplate) -> Result<(), TemplateError> {
        let bytes = serde_json::to_vec(template).map_err(|e| TemplateError::Decode {
            id: id.clone(),
            message: e.to_string(),
        })?;
        self.kv
            .put(
                TEMPLATE_NAMESPACE,
                id.as_str().as_bytes(),
                &bytes,
                Timestamp::ZERO,
            )
            .await?;
        Ok(())
    }

    /// Fetch the template stored under `id`, if any.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &TemplateId) -> Result<Option<FlowTemplate>, TemplateError> {
        let bytes = self
            .kv
            .get_latest(TEMPLATE_NAMESPACE, id.as_str().as_bytes(), None)
            .await?;
        match bytes {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| TemplateError::Decode {
                    id: id.clone(),
                    message: e.to_string(),
                }),
        }
    }

    /// Stream every stored template.
    pub fn all(&self) -> BoxStream<'static, Result<(TemplateId, FlowTemplate), TemplateError>> {
        self.kv
            .scan_all(TEMPLATE_NAMESPACE)
            .map(|entry| {
                let (key, value) = entry?;
                let id = TemplateId::new(String::from_utf8_lossy(&key).into_owned());
                let template =
                    serde_json::from_slice(&value).map_err(|e| TemplateError::Decode {
                        id: id.clone(),
                        message: e.to_string(),
                    })?;
                Ok((id, template))
            })
            .boxed()
    }

    /// Remove the template under `id`; removing an absent id is a no-op.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &TemplateId) -> Result<(), TemplateError> {
        self.kv
            .delete(TEMPLATE_NAMESPACE, id.as_str().as_bytes(), None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryKeyValueStore;
    use futures::TryStreamExt;
    use zflow_core::{FlowValue, Schema, TypedValue};

    fn registry() -> (TemplateStore, Arc<InMemoryKeyValueStore>) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        (TemplateStore::new(kv.clone()), kv)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_every_shape() {
        let (store, _) = registry();

        let shapes = [
            FlowTemplate::new(FlowValue::succeed(TypedValue::int(11))),
            FlowTemplate::with_input(FlowValue::input(), Schema::Int),
            FlowTemplate::with_input(
                FlowValue::input().provide(TypedValue::string("seed")),
                Schema::Str,
            ),
        ];

        for (i, template) in shapes.iter().enumerate() {
            let id = TemplateId::new(format!("template-{i}"));
            store.put(&id, template).await.unwrap();
            let got = store.get(&id).await.unwrap();
            assert_eq!(got.as_ref(), Some(template));
        }
    }

    #[tokio::test]
    async fn put_replaces_the_previous_template() {
        let (store, _) = registry();
        let id = TemplateId::new("test");

        store
            .put(&id, &FlowTemplate::new(FlowValue::succeed(TypedValue::int(1))))
            .await
            .unwrap();
        let replacement = FlowTemplate::with_input(FlowValue::input(), Schema::Int);
        store.put(&id, &replacement).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap(), Some(replacement));
    }

    #[tokio::test]
    async fn all_enumerates_every_stored_template() {
        let (store, _) = registry();
        for i in 0..4i64 {
            let id = TemplateId::new(format!("t{i}"));
            store
                .put(
                    &id,
                    &FlowTemplate::new(FlowValue::succeed(TypedValue::int(i))),
                )
                .await
                .unwrap();
        }

        let mut entries: Vec<(TemplateId, FlowTemplate)> =
            store.all().try_collect().await.unwrap();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let ids: Vec<&str> = entries.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["t0", "t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn delete_removes_only_the_named_template() {
        let (store, _) = registry();
        let keep = TemplateId::new("keep");
        let drop = TemplateId::new("drop");
        let template = FlowTemplate::new(FlowValue::succeed(TypedValue::unit()));

        store.put(&keep, &template).await.unwrap();
        store.put(&drop, &template).await.unwrap();
        store.delete(&drop).await.unwrap();

        assert_eq!(store.get(&drop).await.unwrap(), None);
        assert_eq!(store.get(&keep).await.unwrap(), Some(template));

        // Deleting an absent id stays a no-op.
        store.delete(&drop).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_stored_bytes_surface_as_decode_errors() {
        let (store, kv) = registry();
        kv.put(TEMPLATE_NAMESPACE, b"broken", b"not json", Timestamp::ZERO)
            .await
            .unwrap();

        let err = store.get(&TemplateId::new("broken")).await.unwrap_err();
        assert!(matches!(err, TemplateError::Decode { .. }));
    }
}
