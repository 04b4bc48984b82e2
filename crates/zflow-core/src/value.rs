//! Dynamic values and the JSON codec
//!
//! A [`DynamicValue`] is a runtime-typed value; a [`TypedValue`] pairs it with
//! its [`Schema`]. The codec walks value and schema in lockstep and produces
//! the `{"<TypeTag>": <payload>}` wire form, e.g. `{"Int": 1}` or
//! `{"String": "hello"}`. Encoding and decoding are round-trip inverses for
//! every supported primitive and for records declared via schema.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::schema::Schema;

/// A runtime-typed value with a JSON-compatible payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DynamicValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Optional(Option<Box<DynamicValue>>),
    List(Vec<DynamicValue>),
    Record(Vec<(String, DynamicValue)>),
}

impl DynamicValue {
    fn describe(&self) -> &'static str {
        match self {
            Self::Unit => "Unit",
            Self::Bool(_) => "Bool",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::Str(_) => "String",
            Self::Optional(_) => "Optional",
            Self::List(_) => "List",
            Self::Record(_) => "Record",
        }
    }
}

/// Errors from the dynamic-value codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unexpected tag {found}, expected {expected}")]
    TagMismatch { expected: String, found: String },

    #[error("missing field {field} in record {record}")]
    MissingField { record: String, field: String },

    #[error("value is not representable in JSON: {0}")]
    Unrepresentable(String),
}

impl CodecError {
    fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// A dynamic value paired with its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    pub schema: Schema,
    pub value: DynamicValue,
}

impl TypedValue {
    pub fn new(schema: Schema, value: DynamicValue) -> Self {
        Self { schema, value }
    }

    pub fn unit() -> Self {
        Self::new(Schema::Unit, DynamicValue::Unit)
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(Schema::Bool, DynamicValue::Bool(b))
    }

    pub fn int(i: i64) -> Self {
        Self::new(Schema::Int, DynamicValue::Int(i))
    }

    pub fn float(f: f64) -> Self {
        Self::new(Schema::Float, DynamicValue::Float(f))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(Schema::Str, DynamicValue::Str(s.into()))
    }

    /// Encode to the tagged wire form, `{"<TypeTag>": <payload>}`.
    pub fn to_json(&self) -> Result<Value, CodecError> {
        let payload = encode_payload(&self.schema, &self.value)?;
        Ok(json!({ self.schema.type_tag(): payload }))
    }

    /// Decode a plain (untagged) payload under the given schema.
    pub fn from_json(schema: &Schema, payload: &Value) -> Result<Self, CodecError> {
        let value = decode_payload(schema, payload)?;
        Ok(Self::new(schema.clone(), value))
    }

    /// Decode the tagged wire form; the inverse of [`TypedValue::to_json`].
    pub fn from_tagged_json(schema: &Schema, json: &Value) -> Result<Self, CodecError> {
        let expected = schema.type_tag();
        let payload = json
            .as_object()
            .filter(|obj| obj.len() == 1)
            .and_then(|obj| obj.get(expected))
            .ok_or_else(|| CodecError::TagMismatch {
                expected: expected.to_string(),
                found: json.to_string(),
            })?;
        Self::from_json(schema, payload)
    }
}

fn encode_payload(schema: &Schema, value: &DynamicValue) -> Result<Value, CodecError> {
    match (schema, value) {
        (Schema::Unit, DynamicValue::Unit) => Ok(json!({})),
        (Schema::Bool, DynamicValue::Bool(b)) => Ok(json!(b)),
        (Schema::Int, DynamicValue::Int(i)) => Ok(json!(i)),
        (Schema::Float, DynamicValue::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| CodecError::Unrepresentable(format!("float {f}"))),
        (Schema::Str, DynamicValue::Str(s)) => Ok(json!(s)),
        (Schema::Optional(_), DynamicValue::Optional(None)) => Ok(Value::Null),
        (Schema::Optional(inner), DynamicValue::Optional(Some(v))) => encode_payload(inner, v),
        (Schema::List(element), DynamicValue::List(items)) => {
            let encoded = items
                .iter()
                .map(|item| encode_payload(element, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(encoded))
        }
        (Schema::Record { name, fields }, DynamicValue::Record(entries)) => {
            let mut object = serde_json::Map::with_capacity(fields.len());
            for field in fields {
                let (_, field_value) = entries
                    .iter()
                    .find(|(entry_name, _)| entry_name == &field.name)
                    .ok_or_else(|| CodecError::MissingField {
                        record: name.clone(),
                        field: field.name.clone(),
                    })?;
                object.insert(field.name.clone(), encode_payload(&field.schema, field_value)?);
            }
            Ok(Value::Object(object))
        }
        (schema, value) => Err(CodecError::mismatch(schema.type_tag(), value.describe())),
    }
}

fn decode_payload(schema: &Schema, payload: &Value) -> Result<DynamicValue, CodecError> {
    match schema {
        Schema::Unit => match payload {
            Value::Null => Ok(DynamicValue::Unit),
            Value::Object(obj) if obj.is_empty() => Ok(DynamicValue::Unit),
            other => Err(CodecError::mismatch("Unit", other.to_string())),
        },
        Schema::Bool => payload
            .as_bool()
            .map(DynamicValue::Bool)
            .ok_or_else(|| CodecError::mismatch("Bool", payload.to_string())),
        Schema::Int => payload
            .as_i64()
            .map(DynamicValue::Int)
            .ok_or_else(|| CodecError::mismatch("Int", payload.to_string())),
        Schema::Float => payload
            .as_f64()
            .map(DynamicValue::Float)
            .ok_or_else(|| CodecError::mismatch("Float", payload.to_string())),
        Schema::Str => payload
            .as_str()
            .map(|s| DynamicValue::Str(s.to_string()))
            .ok_or_else(|| CodecError::mismatch("String", payload.to_string())),
        Schema::Optional(inner) => match payload {
            Value::Null => Ok(DynamicValue::Optional(None)),
            other => Ok(DynamicValue::Optional(Some(Box::new(decode_payload(
                inner, other,
            )?)))),
        },
        Schema::List(element) => {
            let items = payload
                .as_array()
                .ok_or_else(|| CodecError::mismatch("List", payload.to_string()))?;
            let decoded = items
                .iter()
                .map(|item| decode_payload(element, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynamicValue::List(decoded))
        }
        Schema::Record { name, fields } => {
            let object = payload
                .as_object()
                .ok_or_else(|| CodecError::mismatch(name.clone(), payload.to_string()))?;
            let mut entries = Vec::with_capacity(fields.len());
            for field in fields {
                let field_payload =
                    object
                        .get(&field.name)
                        .ok_or_else(|| CodecError::MissingField {
                            record: name.clone(),
                            field: field.name.clone(),
                        })?;
                entries.push((
                    field.name.clone(),
                    decode_payload(&field.schema, field_payload)?,
                ));
            }
            Ok(DynamicValue::Record(entries))
        }
    }
}
