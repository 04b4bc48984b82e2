//! Opaque flow values
//!
//! A flow is a serializable description of a computation. The core treats it
//! as an opaque tagged tree: constructors exist per known shape, and equality
//! is structural on the serialized form. The engine's interpreter is the only
//! consumer that looks inside.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::schema::Schema;
use crate::value::TypedValue;

/// A serializable flow program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowValue(Value);

impl FlowValue {
    /// A flow that immediately succeeds with the given value.
    pub fn succeed(value: TypedValue) -> Self {
        Self(json!({ "Succeed": encode(&value) }))
    }

    /// A flow that immediately fails with the given user-level value.
    pub fn fail(value: TypedValue) -> Self {
        Self(json!({ "Fail": encode(&value) }))
    }

    /// A flow that reads the bound input parameter.
    pub fn input() -> Self {
        Self(json!({ "Input": {} }))
    }

    /// A flow that reads a named variable from the environment record.
    pub fn variable(name: impl Into<String>) -> Self {
        Self(json!({ "Variable": { "name": name.into() } }))
    }

    /// Bind an input value into this flow.
    ///
    /// The bound flow is what gets persisted and what equality observes.
    pub fn provide(self, value: TypedValue) -> Self {
        Self(json!({ "Provide": { "value": encode(&value), "flow": self.0 } }))
    }

    pub fn from_json(value: Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

fn encode(value: &TypedValue) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// A named, persisted flow, optionally parameterized by a typed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTemplate {
    pub flow: FlowValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Schema>,
}

impl FlowTemplate {
    pub fn new(flow: FlowValue) -> Self {
        Self {
            flow,
            input_schema: None,
        }
    }

    pub fn with_input(flow: FlowValue, input_schema: Schema) -> Self {
        Self {
            flow,
            input_schema: Some(input_schema),
        }
    }
}
