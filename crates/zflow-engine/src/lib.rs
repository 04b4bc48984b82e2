//! # Flow Execution Engine
//!
//! The executor turns persisted flow descriptions into running computations.
//! This crate defines the lifecycle contract ([`FlowExecutor`]), the durable
//! promise that carries a flow's terminal result, and a reference
//! implementation over any [`zflow_storage::KeyValueStore`]. A recording
//! test double lives in [`testing`].

mod interpret;

pub mod executor;
pub mod persistent;
pub mod promise;
pub mod testing;

pub use executor::{FlowExecutor, FlowListing};
pub use persistent::{PersistentFlowExecutor, FLOW_NAMESPACE};
pub use promise::{DurablePromise, PROMISE_NAMESPACE};
pub use testing::MockFlowExecutor;
