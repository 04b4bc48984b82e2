// Flow status and poll-outcome wire encoding

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ExecutorError;
use crate::value::{CodecError, TypedValue};

/// Status of a known flow instance.
///
/// The reference executor produces `Running`, `Paused`, and `Done`;
/// `Suspended` is reserved for richer executors and round-trips through the
/// API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStatus {
    Running,
    Done,
    Paused,
    Suspended,
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Done => write!(f, "Done"),
            Self::Paused => write!(f, "Paused"),
            Self::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Terminal outcome of a flow, as recorded on its durable promise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlowOutcome {
    /// The flow succeeded with a user-level value.
    Succeeded(TypedValue),

    /// The flow failed with a user-level value.
    Failed(TypedValue),

    /// The executor itself died while running the flow.
    Died(ExecutorError),
}

/// Poll outcome as exposed over HTTP.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    Running,
    Succeeded(TypedValue),
    Failed(TypedValue),
    Died(ExecutorError),
}

impl PollResponse {
    /// Map an executor poll result onto the wire shape; `None` means the flow
    /// is still running.
    pub fn from_poll(outcome: Option<FlowOutcome>) -> Self {
        match outcome {
            None => Self::Running,
            Some(FlowOutcome::Succeeded(value)) => Self::Succeeded(value),
            Some(FlowOutcome::Failed(value)) => Self::Failed(value),
            Some(FlowOutcome::Died(error)) => Self::Died(error),
        }
    }

    /// Encode to the wire JSON of §4.4: `{"Running": {}}`,
    /// `{"Succeeded": {"<TypeTag>": <payload>}}`, symmetric `Failed`, and
    /// `{"Died": <executor-error-json>}`.
    pub fn to_json(&self) -> Result<Value, CodecError> {
        match self {
            Self::Running => Ok(json!({ "Running": {} })),
            Self::Succeeded(value) => Ok(json!({ "Succeeded": value.to_json()? })),
            Self::Failed(value) => Ok(json!({ "Failed": value.to_json()? })),
            Self::Died(error) => {
                let encoded = serde_json::to_value(error)
                    .map_err(|e| CodecError::Unrepresentable(e.to_string()))?;
                Ok(json!({ "Died": encoded }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_as_bare_strings() {
        for status in [
            FlowStatus::Running,
            FlowStatus::Done,
            FlowStatus::Paused,
            FlowStatus::Suspended,
        ] {
            let encoded = serde_json::to_value(status).unwrap();
            assert_eq!(encoded, json!(status.to_string()));
            let decoded: FlowStatus = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, status);
        }
    }

    #[test]
    fn running_wire_form() {
        assert_eq!(
            PollResponse::from_poll(None).to_json().unwrap(),
            json!({"Running": {}})
        );
    }

    #[test]
    fn succeeded_wire_form() {
        let response =
            PollResponse::from_poll(Some(FlowOutcome::Succeeded(TypedValue::string("hello"))));
        assert_eq!(
            response.to_json().unwrap(),
            json!({"Succeeded": {"String": "hello"}})
        );
    }

    #[test]
    fn failed_wire_form() {
        let response =
            PollResponse::from_poll(Some(FlowOutcome::Failed(TypedValue::string("hello"))));
        assert_eq!(
            response.to_json().unwrap(),
            json!({"Failed": {"String": "hello"}})
        );
    }

    #[test]
    fn died_wire_form() {
        let response = PollResponse::from_poll(Some(FlowOutcome::Died(
            ExecutorError::missing_variable("x", "y"),
        )));
        assert_eq!(
            response.to_json().unwrap(),
            json!({"Died": {"MissingVariable": {"name": "x", "context": "y"}}})
        );
    }
}
