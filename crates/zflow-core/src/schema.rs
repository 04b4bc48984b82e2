//! Self-describing schemas for dynamic values
//!
//! A [`Schema`] describes the shape of a [`crate::DynamicValue`] and supplies
//! the type tag used by the JSON codec. Templates carry an optional input
//! schema; parameters are decoded under it before being bound into a flow.

use serde::{Deserialize, Serialize};

/// Schema descriptor for a dynamic value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schema {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    Optional(Box<Schema>),
    List(Box<Schema>),
    Record { name: String, fields: Vec<Field> },
}

/// A named field inside a record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

impl Schema {
    pub fn optional(inner: Schema) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(element: Schema) -> Self {
        Self::List(Box::new(element))
    }

    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::Record {
            name: name.into(),
            fields,
        }
    }

    /// The type tag the JSON codec wraps payloads with.
    ///
    /// Primitives use their canonical tag; records use their declared name.
    pub fn type_tag(&self) -> &str {
        match self {
            Self::Unit => "Unit",
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Str => "String",
            Self::Optional(_) => "Optional",
            Self::List(_) => "List",
            Self::Record { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_tags() {
        assert_eq!(Schema::Int.type_tag(), "Int");
        assert_eq!(Schema::Str.type_tag(), "String");
        assert_eq!(Schema::Unit.type_tag(), "Unit");
    }

    #[test]
    fn record_tag_is_declared_name() {
        let schema = Schema::record(
            "Point",
            vec![Field::new("x", Schema::Int), Field::new("y", Schema::Int)],
        );
        assert_eq!(schema.type_tag(), "Point");
    }
}
