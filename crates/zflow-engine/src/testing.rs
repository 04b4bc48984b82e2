//! Recording test double for the executor contract
//!
//! This is primarily for exercising the HTTP façade. It records every
//! lifecycle call and delivers arranged outcomes after a configurable number
//! of polls, standing in for a real executor fulfilling durable promises.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;
use zflow_core::{ExecutorError, FlowId, FlowOutcome, FlowStatus, FlowValue};

use crate::executor::{FlowExecutor, FlowListing};
use crate::promise::DurablePromise;

struct ArrangedOutcome {
    outcome: FlowOutcome,
    skip_polls: u32,
    delivered: bool,
}

#[derive(Default)]
struct MockState {
    started: BTreeMap<FlowId, FlowValue>,
    arranged: HashMap<FlowId, ArrangedOutcome>,
    pause_requests: Vec<FlowId>,
    resume_requests: Vec<FlowId>,
    abort_requests: Vec<FlowId>,
}

/// Mock implementation of [`FlowExecutor`].
#[derive(Clone, Default)]
pub struct MockFlowExecutor {
    state: Arc<Mutex<MockState>>,
}

impl MockFlowExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrange the outcome a flow will report, after skipping `skip_polls`
    /// poll calls first.
    pub fn arrange_outcome(&self, id: &FlowId, outcome: FlowOutcome, skip_polls: u32) {
        self.state.lock().arranged.insert(
            id.clone(),
            ArrangedOutcome {
                outcome,
                skip_polls,
                delivered: false,
            },
        );
    }

    /// Every flow passed to `start`, with the exact flow value received.
    pub fn started(&self) -> BTreeMap<FlowId, FlowValue> {
        self.state.lock().started.clone()
    }

    pub fn pause_requests(&self) -> Vec<FlowId> {
        self.state.lock().pause_requests.clone()
    }

    pub fn resume_requests(&self) -> Vec<FlowId> {
        self.state.lock().resume_requests.clone()
    }

    pub fn abort_requests(&self) -> Vec<FlowId> {
        self.state.lock().abort_requests.clone()
    }
}

#[async_trait]
impl FlowExecutor for MockFlowExecutor {
    async fn start(&self, id: &FlowId, flow: FlowValue) -> Result<DurablePromise, ExecutorError> {
        self.state.lock().started.insert(id.clone(), flow);
        Ok(DurablePromise::for_flow(id))
    }

    async fn poll(&self, id: &FlowId) -> Result<Option<FlowOutcome>, ExecutorError> {
        let mut state = self.state.lock();
        match state.arranged.get_mut(id) {
            None => Ok(None),
            Some(arranged) if arranged.skip_polls > 0 => {
                arranged.skip_polls -= 1;
                Ok(None)
            }
            Some(arranged) => {
                arranged.delivered = true;
                Ok(Some(arranged.outcome.clone()))
            }
        }
    }

    async fn pause(&self, id: &FlowId) -> Result<(), ExecutorError> {
        self.state.lock().pause_requests.push(id.clone());
        Ok(())
    }

    async fn resume(&self, id: &FlowId) -> Result<(), ExecutorError> {
        self.state.lock().resume_requests.push(id.clone());
        Ok(())
    }

    async fn abort(&self, id: &FlowId) -> Result<(), ExecutorError> {
        self.state.lock().abort_requests.push(id.clone());
        Ok(())
    }

    async fn delete(&self, id: &FlowId) -> Result<(), ExecutorError> {
        let mut state = self.state.lock();
        if !state.started.contains_key(id) {
            return Ok(());
        }
        let finished = state
            .arranged
            .get(id)
            .is_some_and(|arranged| arranged.delivered);
        if !finished {
            return Err(ExecutorError::invalid_arguments("flow is running"));
        }
        state.started.remove(id);
        state.arranged.remove(id);
        Ok(())
    }

    fn get_all(&self) -> FlowListing {
        let state = self.state.lock();
        let listing: Vec<Result<(FlowId, FlowStatus), ExecutorError>> = state
            .started
            .keys()
            .map(|id| {
                let finished = state
                    .arranged
                    .get(id)
                    .is_some_and(|arranged| arranged.delivered);
                let status = if finished {
                    FlowStatus::Done
                } else {
                    FlowStatus::Running
                };
                Ok((id.clone(), status))
            })
            .collect();
        stream::iter(listing).boxed()
    }

    async fn restart_all(&self) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn force_garbage_collection(&self) -> Result<(), ExecutorError> {
        Ok(())
    }
}
