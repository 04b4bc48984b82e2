//! Interpreter for the known flow shapes
//!
//! Richer flow languages plug in behind [`crate::FlowExecutor`]; this walks
//! the constructor shapes the core ships (`Succeed`, `Fail`, `Input`,
//! `Variable`, `Provide`). Unknown operation tags are rejected rather than
//! silently skipped.

use serde_json::Value;
use zflow_core::{DynamicValue, ExecutorError, FlowId, FlowValue, Schema, TypedValue};

/// Result of evaluating a flow to completion.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Eval {
    Success(TypedValue),
    Failure(TypedValue),
}

/// Evaluate a flow with no initial environment.
pub(crate) fn run_flow(id: &FlowId, flow: &FlowValue) -> Result<Eval, ExecutorError> {
    eval(id, flow.as_json(), None)
}

fn eval(id: &FlowId, node: &Value, env: Option<&TypedValue>) -> Result<Eval, ExecutorError> {
    let (tag, body) = node
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next())
        .ok_or_else(|| ExecutorError::invalid_arguments("malformed flow node"))?;

    match tag.as_str() {
        "Succeed" => Ok(Eval::Success(decode_value(body)?)),
        "Fail" => Ok(Eval::Failure(decode_value(body)?)),
        "Input" => env
            .cloned()
            .map(Eval::Success)
            .ok_or_else(|| ExecutorError::missing_variable("input", id.as_str())),
        "Variable" => {
            let name = body
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ExecutorError::invalid_arguments("Variable node without a name"))?;
            lookup(id, name, env).map(Eval::Success)
        }
        "Provide" => {
            let value = body
                .get("value")
                .map(decode_value)
                .transpose()?
                .ok_or_else(|| ExecutorError::invalid_arguments("Provide node without a value"))?;
            let inner = body
                .get("flow")
                .ok_or_else(|| ExecutorError::invalid_arguments("Provide node without a flow"))?;
            eval(id, inner, Some(&value))
        }
        other => Err(ExecutorError::invalid_arguments(format!(
            "unsupported flow operation: {other}"
        ))),
    }
}

fn decode_value(body: &Value) -> Result<TypedValue, ExecutorError> {
    serde_json::from_value(body.clone())
        .map_err(|e| ExecutorError::invalid_arguments(format!("malformed flow value: {e}")))
}

/// Resolve a named variable from the bound environment record.
fn lookup(id: &FlowId, name: &str, env: Option<&TypedValue>) -> Result<TypedValue, ExecutorError> {
    let env = env.ok_or_else(|| ExecutorError::missing_variable(name, id.as_str()))?;
    if let (Schema::Record { fields, .. }, DynamicValue::Record(entries)) =
        (&env.schema, &env.value)
    {
        let field = fields.iter().find(|field| field.name == name);
        let entry = entries.iter().find(|(entry_name, _)| entry_name == name);
        if let (Some(field), Some((_, value))) = (field, entry) {
            return Ok(TypedValue::new(field.schema.clone(), value.clone()));
        }
    }
    Err(ExecutorError::missing_variable(name, id.as_str()))
}
