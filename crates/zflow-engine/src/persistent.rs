//! Reference executor over a versioned KV store
//!
//! Flow records live in `_zflow_workflow_flows`, one logical timestamp per
//! update, so garbage collection is a real marker-delete truncation. Terminal
//! results go through the flow's durable promise. In-memory scheduling state
//! (task handles, pause gates) is reconstructible from storage via
//! [`FlowExecutor::restart_all`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};
use zflow_core::{ExecutorError, FlowId, FlowOutcome, FlowStatus, FlowValue};
use zflow_storage::{KeyValueStore, Timestamp};

use crate::executor::{FlowExecutor, FlowListing};
use crate::interpret::{self, Eval};
use crate::promise::DurablePromise;

/// Namespace holding persisted flow records.
pub const FLOW_NAMESPACE: &str = "_zflow_workflow_flows";

/// Durable record of a flow instance.
///
/// `status` is the requested control state (`Running` or `Paused`); terminal
/// state is derived from the durable promise, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FlowRecord {
    flow: FlowValue,
    status: FlowStatus,
}

struct PauseGate {
    paused: AtomicBool,
    notify: Notify,
}

impl PauseGate {
    fn new(paused: bool) -> Self {
        Self {
            paused: AtomicBool::new(paused),
            notify: Notify::new(),
        }
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.notify.notify_waiters();
    }

    async fn wait_until_resumed(&self) {
        loop {
            if !self.paused.load(Ordering::Acquire) {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after registering so a resume between the two loads is
            // not lost.
            if !self.paused.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

struct FlowHandle {
    task: JoinHandle<()>,
    gate: Arc<PauseGate>,
}

/// Reference implementation of [`FlowExecutor`].
///
/// Works against any [`KeyValueStore`]; backends differ only in durability.
pub struct PersistentFlowExecutor {
    kv: Arc<dyn KeyValueStore>,
    live: Arc<RwLock<HashMap<FlowId, FlowHandle>>>,
}

impl PersistentFlowExecutor {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            live: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn read_record(&self, id: &FlowId) -> Result<Option<FlowRecord>, ExecutorError> {
        let bytes = self
            .kv
            .get_latest(FLOW_NAMESPACE, id.as_str().as_bytes(), None)
            .await
            .map_err(ExecutorError::storage_failure)?;
        match bytes {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(ExecutorError::storage_failure),
        }
    }

    /// Persist a record version at the next logical timestamp for this flow.
    async fn write_record(&self, id: &FlowId, record: &FlowRecord) -> Result<(), ExecutorError> {
        let key = id.as_str().as_bytes();
        let next = self
            .kv
            .get_latest_timestamp(FLOW_NAMESPACE, key)
            .await
            .map_err(ExecutorError::storage_failure)?
            .map(Timestamp::next)
            .unwrap_or(Timestamp::ZERO);
        let bytes = serde_json::to_vec(record).map_err(ExecutorError::storage_failure)?;
        self.kv
            .put(FLOW_NAMESPACE, key, &bytes, next)
            .await
            .map_err(ExecutorError::storage_failure)
    }

    async fn is_finished(&self, id: &FlowId) -> Result<bool, ExecutorError> {
        Ok(DurablePromise::for_flow(id)
            .peek(self.kv.as_ref())
            .await?
            .is_some())
    }

    fn schedule(&self, id: FlowId, flow: FlowValue, paused: bool) {
        let gate = Arc::new(PauseGate::new(paused));
        let task_gate = Arc::clone(&gate);
        let kv = Arc::clone(&self.kv);
        let live = Arc::clone(&self.live);
        let task_id = id.clone();

        let task = tokio::spawn(async move {
            task_gate.wait_until_resumed().await;
            let outcome = match interpret::run_flow(&task_id, &flow) {
                Ok(Eval::Success(value)) => FlowOutcome::Succeeded(value),
                Ok(Eval::Failure(value)) => FlowOutcome::Failed(value),
                Err(e) => FlowOutcome::Died(e),
            };
            let promise = DurablePromise::for_flow(&task_id);
            if let Err(e) = promise.fulfill(kv.as_ref(), &outcome).await {
                error!(flow_id = %task_id, "failed to fulfill durable promise: {}", e);
            }
            live.write().remove(&task_id);
        });

        self.live.write().insert(id, FlowHandle { task, gate });
    }
}

#[async_trait]
impl FlowExecutor for PersistentFlowExecutor {
    #[instrument(skip(self, flow))]
    async fn start(&self, id: &FlowId, flow: FlowValue) -> Result<DurablePromise, ExecutorError> {
        let record = FlowRecord {
            flow: flow.clone(),
            status: FlowStatus::Running,
        };
        self.write_record(id, &record).await?;
        info!(flow_id = %id, "flow recorded, scheduling");
        self.schedule(id.clone(), flow, false);
        Ok(DurablePromise::for_flow(id))
    }

    async fn poll(&self, id: &FlowId) -> Result<Option<FlowOutcome>, ExecutorError> {
        DurablePromise::for_flow(id).peek(self.kv.as_ref()).await
    }

    #[instrument(skip(self))]
    async fn pause(&self, id: &FlowId) -> Result<(), ExecutorError> {
        let Some(record) = self.read_record(id).await? else {
            return Ok(());
        };
        if self.is_finished(id).await? {
            return Ok(());
        }
        if let Some(handle) = self.live.read().get(id) {
            handle.gate.pause();
        }
        if record.status != FlowStatus::Paused {
            self.write_record(
                id,
                &FlowRecord {
                    flow: record.flow,
                    status: FlowStatus::Paused,
                },
            )
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn resume(&self, id: &FlowId) -> Result<(), ExecutorError> {
        let Some(record) = self.read_record(id).await? else {
            return Ok(());
        };
        if let Some(handle) = self.live.read().get(id) {
            handle.gate.resume();
        }
        if record.status == FlowStatus::Paused && !self.is_finished(id).await? {
            self.write_record(
                id,
                &FlowRecord {
                    flow: record.flow,
                    status: FlowStatus::Running,
                },
            )
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn abort(&self, id: &FlowId) -> Result<(), ExecutorError> {
        if self.read_record(id).await?.is_none() {
            return Ok(());
        }
        if let Some(handle) = self.live.write().remove(id) {
            handle.task.abort();
        }
        let outcome = FlowOutcome::Died(ExecutorError::invalid_arguments("flow aborted"));
        DurablePromise::for_flow(id)
            .fulfill(self.kv.as_ref(), &outcome)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &FlowId) -> Result<(), ExecutorError> {
        if self.read_record(id).await?.is_none() {
            return Ok(());
        }
        if !self.is_finished(id).await? {
            return Err(ExecutorError::invalid_arguments("flow is running"));
        }
        if let Some(handle) = self.live.write().remove(id) {
            handle.task.abort();
        }
        self.kv
            .delete(FLOW_NAMESPACE, id.as_str().as_bytes(), None)
            .await
            .map_err(ExecutorError::storage_failure)?;
        DurablePromise::for_flow(id).remove(self.kv.as_ref()).await
    }

    fn get_all(&self) -> FlowListing {
        let kv = Arc::clone(&self.kv);
        self.kv
            .scan_all(FLOW_NAMESPACE)
            .then(move |entry| {
                let kv = Arc::clone(&kv);
                async move {
                    let (key, value) = entry.map_err(ExecutorError::storage_failure)?;
                    let id = FlowId::new(String::from_utf8_lossy(&key).into_owned());
                    let record: FlowRecord =
                        serde_json::from_slice(&value).map_err(ExecutorError::storage_failure)?;
                    let finished = DurablePromise::for_flow(&id)
                        .peek(kv.as_ref())
                        .await?
                        .is_some();
                    let status = if finished {
                        FlowStatus::Done
                    } else {
                        record.status
                    };
                    Ok((id, status))
                }
            })
            .boxed()
    }

    #[instrument(skip(self))]
    async fn restart_all(&self) -> Result<(), ExecutorError> {
        let mut flows = self.kv.scan_all(FLOW_NAMESPACE);
        while let Some(entry) = flows.next().await {
            let (key, value) = entry.map_err(ExecutorError::storage_failure)?;
            let id = FlowId::new(String::from_utf8_lossy(&key).into_owned());
            if self.live.read().contains_key(&id) {
                continue;
            }
            let record: FlowRecord =
                serde_json::from_slice(&value).map_err(ExecutorError::storage_failure)?;
            if DurablePromise::for_flow(&id)
                .peek(self.kv.as_ref())
                .await?
                .is_some()
            {
                continue;
            }
            info!(flow_id = %id, "re-scheduling persisted flow");
            self.schedule(id, record.flow, record.status == FlowStatus::Paused);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn force_garbage_collection(&self) -> Result<(), ExecutorError> {
        let mut keys = self.kv.scan_all_keys(FLOW_NAMESPACE);
        while let Some(key) = keys.next().await {
            let key = key.map_err(ExecutorError::storage_failure)?;
            let latest = self
                .kv
                .get_latest_timestamp(FLOW_NAMESPACE, &key)
                .await
                .map_err(ExecutorError::storage_failure)?;
            if let Some(latest) = latest {
                self.kv
                    .delete(FLOW_NAMESPACE, &key, Some(latest))
                    .await
                    .map_err(ExecutorError::storage_failure)?;
            }
        }
        Ok(())
    }
}
