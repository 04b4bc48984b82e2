//! Durable promises
//!
//! A durable promise is a persistent placeholder for a flow's terminal
//! result. Its id is derived one-to-one from the flow id and its fulfillment
//! state lives in the KV store; only the executor mutates it.

use zflow_core::{ExecutorError, FlowId, FlowOutcome, PromiseId};
use zflow_storage::{KeyValueStore, Timestamp};

/// Namespace holding promise fulfillment records.
pub const PROMISE_NAMESPACE: &str = "_zflow_durable_promises";

/// Handle to a flow's durable result slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurablePromise {
    id: PromiseId,
}

impl DurablePromise {
    pub fn for_flow(flow_id: &FlowId) -> Self {
        Self {
            id: PromiseId::for_flow(flow_id),
        }
    }

    pub fn id(&self) -> &PromiseId {
        &self.id
    }

    /// Record the terminal outcome, once.
    ///
    /// Returns `true` if this call fulfilled the promise and `false` if it
    /// was already fulfilled (the recorded outcome wins).
    pub async fn fulfill(
        &self,
        kv: &dyn KeyValueStore,
        outcome: &FlowOutcome,
    ) -> Result<bool, ExecutorError> {
        if self.peek(kv).await?.is_some() {
            return Ok(false);
        }
        let bytes = serde_json::to_vec(outcome).map_err(ExecutorError::storage_failure)?;
        kv.put(
            PROMISE_NAMESPACE,
            self.id.as_str().as_bytes(),
            &bytes,
            Timestamp::ZERO,
        )
        .await
        .map_err(ExecutorError::storage_failure)?;
        Ok(true)
    }

    /// Read the fulfillment state without waiting.
    pub async fn peek(&self, kv: &dyn KeyValueStore) -> Result<Option<FlowOutcome>, ExecutorError> {
        let bytes = kv
            .get_latest(PROMISE_NAMESPACE, self.id.as_str().as_bytes(), None)
            .await
            .map_err(ExecutorError::storage_failure)?;
        match bytes {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(ExecutorError::storage_failure),
        }
    }

    /// Drop the promise record entirely.
    pub async fn remove(&self, kv: &dyn KeyValueStore) -> Result<(), ExecutorError> {
        kv.delete(PROMISE_NAMESPACE, self.id.as_str().as_bytes(), None)
            .await
            .map_err(ExecutorError::storage_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zflow_core::TypedValue;
    use zflow_storage::InMemoryKeyValueStore;

    #[tokio::test]
    async fn fulfill_is_write_once() {
        let kv = InMemoryKeyValueStore::new();
        let promise = DurablePromise::for_flow(&FlowId::new("f"));

        assert_eq!(promise.peek(&kv).await.unwrap(), None);

        let first = FlowOutcome::Succeeded(TypedValue::int(1));
        let second = FlowOutcome::Succeeded(TypedValue::int(2));
        assert!(promise.fulfill(&kv, &first).await.unwrap());
        assert!(!promise.fulfill(&kv, &second).await.unwrap());

        assert_eq!(promise.peek(&kv).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn remove_clears_the_record() {
        let kv = InMemoryKeyValueStore::new();
        let promise = DurablePromise::for_flow(&FlowId::new("f"));

        let outcome = FlowOutcome::Succeeded(TypedValue::unit());
        promise.fulfill(&kv, &outcome).await.unwrap();
        promise.remove(&kv).await.unwrap();

        assert_eq!(promise.peek(&kv).await.unwrap(), None);
    }
}
