//! FlowExecutor trait definition
//!
//! The lifecycle contract between the HTTP façade and whatever runs flows.
//! Backends implement this; the façade only ever sees the trait object.

use async_trait::async_trait;
use futures::stream::BoxStream;
use zflow_core::{ExecutorError, FlowId, FlowOutcome, FlowStatus, FlowValue};

use crate::promise::DurablePromise;

/// A lazy enumeration of known flows and their statuses.
pub type FlowListing = BoxStream<'static, Result<(FlowId, FlowStatus), ExecutorError>>;

/// Lifecycle contract for running flows.
///
/// Implementations must be thread-safe. Control operations are semantically
/// idempotent: pausing a paused flow, resuming a running one, or aborting a
/// finished one are safe no-ops.
#[async_trait]
pub trait FlowExecutor: Send + Sync + 'static {
    /// Register a new flow instance under `id` and schedule it.
    ///
    /// Returning does not imply the flow is complete, only that it has been
    /// durably recorded and scheduled: the flow is observable to
    /// [`FlowExecutor::poll`] as soon as `start` returns. The returned
    /// promise's id is derived one-to-one from `id`.
    async fn start(&self, id: &FlowId, flow: FlowValue) -> Result<DurablePromise, ExecutorError>;

    /// Inspect the flow's durable promise.
    ///
    /// `None` while the flow is still running; the terminal outcome once it
    /// has been fulfilled.
    async fn poll(&self, id: &FlowId) -> Result<Option<FlowOutcome>, ExecutorError>;

    async fn pause(&self, id: &FlowId) -> Result<(), ExecutorError>;

    async fn resume(&self, id: &FlowId) -> Result<(), ExecutorError>;

    async fn abort(&self, id: &FlowId) -> Result<(), ExecutorError>;

    /// Reclaim the durable state of a finished flow.
    ///
    /// Fails with `InvalidOperationArguments("flow is running")` while the
    /// flow is live; succeeds if the flow is unknown or finished.
    async fn delete(&self, id: &FlowId) -> Result<(), ExecutorError>;

    /// Enumerate every known flow with its current status.
    fn get_all(&self) -> FlowListing;

    /// Re-schedule every persisted, non-terminal flow after a restart.
    ///
    /// No-op for backends without surviving durable state.
    async fn restart_all(&self) -> Result<(), ExecutorError>;

    /// Best-effort reclamation of finished-flow state.
    async fn force_garbage_collection(&self) -> Result<(), ExecutorError>;
}
