// Loosely-typed wire values to declared parameter types.
// The intermediate representation is serde_json::Value; every TypeTag has an
// explicit conversion rule and anything outside it is rejected.

use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

/// Declared type of a parameter, field or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Void,
    Bool,
    Int,
    Float,
    String,
    Enum { name: String, variants: Vec<String> },
    List(Box<TypeTag>),
    Map(Box<TypeTag>),
    Struct { name: String, fields: Vec<(String, TypeTag)> },
    Optional(Box<TypeTag>),
    Any,
}

/// A value that could not be converted to its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} at '{path}', found {found}")]
pub struct TypeMismatch {
    pub path: String,
    pub expected: String,
    pub found: String,
}

/// Argument-level coercion failure reported by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("Malformed argument payload: {0}")]
    MalformedPayload(String),

    #[error("Argument {index} ('{name}'): {mismatch}")]
    Mismatch {
        index: usize,
        name: String,
        #[source]
        mismatch: TypeMismatch,
    },
}

impl TypeTag {
    pub fn list(element: TypeTag) -> Self {
        TypeTag::List(Box::new(element))
    }

    pub fn map(value: TypeTag) -> Self {
        TypeTag::Map(Box::new(value))
    }

    pub fn optional(inner: TypeTag) -> Self {
        TypeTag::Optional(Box::new(inner))
    }

    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeTag::Enum {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn structure<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeTag)>,
        S: Into<String>,
    {
        TypeTag::Struct {
            name: name.into(),
            fields: fields.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    /// Value used for a parameter slot that received nothing.
    pub fn zero_value(&self) -> Value {
        match self {
            TypeTag::Bool => Value::Bool(false),
            TypeTag::Int => Value::from(0i64),
            TypeTag::Float => Value::from(0.0f64),
            _ => Value::Null,
        }
    }

    /// Convert a decoded wire value into this type.
    pub fn coerce(&self, value: &Value) -> Result<Value, TypeMismatch> {
        self.coerce_at(value, "$")
    }

    fn coerce_at(&self, value: &Value, path: &str) -> Result<Value, TypeMismatch> {
        if value.is_null() {
            return Ok(self.zero_value());
        }

        match (self, value) {
            (TypeTag::Any, v) => Ok(v.clone()),
            (TypeTag::Optional(inner), v) => inner.coerce_at(v, path),

            (TypeTag::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (TypeTag::Bool, Value::String(s)) if s == "true" || s == "false" => {
                Ok(Value::Bool(s == "true"))
            }

            (TypeTag::Int, Value::Number(n)) => integral(n).ok_or_else(|| self.mismatch(path, value)),
            (TypeTag::Int, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| self.mismatch(path, value)),

            (TypeTag::Float, Value::Number(n)) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| self.mismatch(path, value)),
            (TypeTag::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| self.mismatch(path, value)),

            (TypeTag::String, Value::String(s)) => Ok(Value::String(s.clone())),
            (TypeTag::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (TypeTag::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

            (TypeTag::Enum { variants, .. }, Value::String(s)) if variants.contains(s) => {
                Ok(Value::String(s.clone()))
            }

            (TypeTag::List(element), Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| element.coerce_at(item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),

            (TypeTag::Map(inner), Value::Object(entries)) => {
                let mut out = Map::with_capacity(entries.len());
                for (key, item) in entries {
                    out.insert(key.clone(), inner.coerce_at(item, &format!("{}.{}", path, key))?);
                }
                Ok(Value::Object(out))
            }

            (TypeTag::Struct { fields, .. }, Value::Object(entries)) => {
                if let Some(unknown) = entries
                    .keys()
                    .find(|key| !fields.iter().any(|(name, _)| name == *key))
                {
                    return Err(TypeMismatch {
                        path: format!("{}.{}", path, unknown),
                        expected: format!("a field of {}", self),
                        found: "unknown field".to_string(),
                    });
                }

                let mut out = Map::with_capacity(fields.len());
                for (name, tag) in fields {
                    let coerced = match entries.get(name) {
                        Some(item) => tag.coerce_at(item, &format!("{}.{}", path, name))?,
                        None => tag.zero_value(),
                    };
                    out.insert(name.clone(), coerced);
                }
                Ok(Value::Object(out))
            }

            _ => Err(self.mismatch(path, value)),
        }
    }

    fn mismatch(&self, path: &str, found: &Value) -> TypeMismatch {
        TypeMismatch {
            path: path.to_string(),
            expected: self.to_string(),
            found: value_kind(found).to_string(),
        }
    }
}

/// Whole numbers within the i64 range. `i64::MAX as f64` rounds up to 2^63,
/// so the upper bound is exclusive.
fn integral(n: &Number) -> Option<Value> {
    if let Some(i) = n.as_i64() {
        return Some(Value::from(i));
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

/// Short name of a JSON value's variant, used in mismatch messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Void => write!(f, "void"),
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Int => write!(f, "int"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::String => write!(f, "string"),
            TypeTag::Enum { name, .. } | TypeTag::Struct { name, .. } => write!(f, "{}", name),
            TypeTag::List(element) => write!(f, "list<{}>", element),
            TypeTag::Map(value) => write!(f, "map<string, {}>", value),
            TypeTag::Optional(inner) => write!(f, "optional<{}>", inner),
            TypeTag::Any => write!(f, "any"),
        }
    }
}
