//! Typed tool arguments.
//!
//! Raw JSON arguments are parsed once into [`ArgValue`]s, coerced to the
//! declared parameter types, and checked against the schema. Handlers then
//! read plain values without re-validating.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use super::schema::{InputSchema, ParamType, PropertySchema};

/// A validated primitive argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Num(f64),
    Bool(bool),
}

impl ArgValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Num(_) => "number",
            Self::Bool(_) => "boolean",
        }
    }

    fn from_json(value: &Value) -> Result<Option<Self>, &'static str> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Self::Str(s.clone()))),
            Value::Bool(b) => Ok(Some(Self::Bool(*b))),
            Value::Number(n) => Ok(Some(match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Num(n.as_f64().unwrap_or(f64::NAN)),
            })),
            Value::Array(_) => Err("array"),
            Value::Object(_) => Err("object"),
        }
    }

    /// Coerce into the declared type, or `None` if no sensible conversion exists.
    #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
    fn coerce(self, target: ParamType) -> Option<Self> {
        match (target, self) {
            (ParamType::String, Self::Str(s)) => Some(Self::Str(s)),
            (ParamType::String, other) => Some(Self::Str(other.to_string())),
            (ParamType::Integer, Self::Int(i)) => Some(Self::Int(i)),
            (ParamType::Integer, Self::Num(f)) if f.fract() == 0.0 && f.is_finite() => {
                #[allow(clippy::cast_possible_truncation)]
                Some(Self::Int(f as i64))
            }
            (ParamType::Integer, Self::Str(s)) => s.trim().parse().ok().map(Self::Int),
            (ParamType::Number, Self::Num(f)) => Some(Self::Num(f)),
            (ParamType::Number, Self::Int(i)) => Some(Self::Num(i as f64)),
            (ParamType::Number, Self::Str(s)) => s.trim().parse().ok().map(Self::Num),
            (ParamType::Boolean, Self::Bool(b)) => Some(Self::Bool(b)),
            (ParamType::Boolean, Self::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Self::Bool(true)),
                "false" => Some(Self::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Why a set of arguments was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    #[error("arguments must be a JSON object")]
    NotAnObject,

    #[error("missing required argument '{0}'")]
    Missing(String),

    #[error("argument '{name}' expected {expected}, got {found}")]
    InvalidType {
        name: String,
        expected: ParamType,
        found: String,
    },

    #[error("argument '{name}' must be one of [{allowed}], got '{value}'")]
    NotAllowed {
        name: String,
        allowed: String,
        value: String,
    },
}

/// Arguments that passed schema validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: BTreeMap<String, ArgValue>,
}

impl ToolArguments {
    /// Validate raw JSON arguments against `schema`.
    ///
    /// `null` (or an absent object) means no arguments. JSON `null` values
    /// and blank strings count as absent. Undeclared arguments are dropped.
    pub fn validate(schema: &InputSchema, raw: &Value) -> Result<Self, ArgumentError> {
        match raw {
            Value::Null => Self::validate_object(schema, None),
            Value::Object(map) => Self::validate_object(schema, Some(map)),
            _ => Err(ArgumentError::NotAnObject),
        }
    }

    /// Validate an already-decoded argument object.
    pub fn validate_object(
        schema: &InputSchema,
        object: Option<&Map<String, Value>>,
    ) -> Result<Self, ArgumentError> {
        let mut values = BTreeMap::new();
        for (name, prop) in schema.properties.iter() {
            let Some(raw_value) = object.and_then(|o| o.get(name)) else {
                continue;
            };
            if let Some(value) = Self::check(name, prop, raw_value)? {
                values.insert(name.to_string(), value);
            }
        }

        if let Some(missing) = schema.required.iter().find(|r| !values.contains_key(*r)) {
            return Err(ArgumentError::Missing(missing.clone()));
        }

        Ok(Self { values })
    }

    fn check(
        name: &str,
        prop: &PropertySchema,
        raw: &Value,
    ) -> Result<Option<ArgValue>, ArgumentError> {
        let parsed = ArgValue::from_json(raw).map_err(|found| ArgumentError::InvalidType {
            name: name.to_string(),
            expected: prop.param_type,
            found: found.to_string(),
        })?;
        let Some(parsed) = parsed else {
            return Ok(None);
        };
        if matches!(&parsed, ArgValue::Str(s) if s.trim().is_empty()) {
            return Ok(None);
        }

        let found = parsed.kind();
        let value = parsed
            .coerce(prop.param_type)
            .ok_or_else(|| ArgumentError::InvalidType {
                name: name.to_string(),
                expected: prop.param_type,
                found: found.to_string(),
            })?;

        if let Some(allowed) = &prop.allowed {
            let text = value.to_string();
            if !allowed.iter().any(|a| *a == text) {
                return Err(ArgumentError::NotAllowed {
                    name: name.to_string(),
                    allowed: allowed.join(", "),
                    value: text,
                });
            }
        }

        Ok(Some(value))
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// String view of an argument, if present.
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// String view of an argument the schema marks as required.
    pub fn require_str(&self, name: &str) -> Result<&str, ArgumentError> {
        self.str(name)
            .ok_or_else(|| ArgumentError::Missing(name.to_string()))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn homework_schema() -> InputSchema {
        InputSchema::object()
            .required("student_name", "學生姓名")
            .optional("course_name", "課程名稱")
            .optional_enum("status", "狀態", &["Assigned", "Graded"])
            .param("limit", ParamType::Integer, "筆數", false)
    }

    #[test]
    fn accepts_required_and_drops_unknown() {
        let args = ToolArguments::validate(
            &homework_schema(),
            &json!({"student_name": "張小明", "extra": [1, 2]}),
        )
        .unwrap();
        assert_eq!(args.str("student_name"), Some("張小明"));
        assert!(args.get("extra").is_none());
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn missing_required_is_named() {
        let err = ToolArguments::validate(&homework_schema(), &json!({})).unwrap_err();
        assert_eq!(err, ArgumentError::Missing("student_name".into()));
        assert!(err.to_string().contains("student_name"));
    }

    #[test]
    fn null_and_blank_count_as_absent() {
        let err = ToolArguments::validate(&homework_schema(), &json!({"student_name": "  "}))
            .unwrap_err();
        assert_eq!(err, ArgumentError::Missing("student_name".into()));

        let err =
            ToolArguments::validate(&homework_schema(), &json!({"student_name": null})).unwrap_err();
        assert_eq!(err, ArgumentError::Missing("student_name".into()));
    }

    #[test]
    fn coerces_to_declared_type() {
        let args = ToolArguments::validate(
            &homework_schema(),
            &json!({"student_name": 42, "limit": "3"}),
        )
        .unwrap();
        assert_eq!(args.str("student_name"), Some("42"));
        assert_eq!(args.int("limit"), Some(3));
    }

    #[test]
    fn rejects_uncoercible_values() {
        let err = ToolArguments::validate(
            &homework_schema(),
            &json!({"student_name": "a", "limit": "many"}),
        )
        .unwrap_err();
        assert!(matches!(err, ArgumentError::InvalidType { ref name, .. } if name == "limit"));

        let err = ToolArguments::validate(&homework_schema(), &json!({"student_name": {"x": 1}}))
            .unwrap_err();
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn enforces_enum_membership() {
        let err = ToolArguments::validate(
            &homework_schema(),
            &json!({"student_name": "a", "status": "Lost"}),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Assigned, Graded"), "{msg}");
    }

    #[test]
    fn null_arguments_mean_empty_object() {
        let schema = InputSchema::object().optional("subject", "科目");
        let args = ToolArguments::validate(&schema, &Value::Null).unwrap();
        assert!(args.is_empty());
        assert_eq!(
            ToolArguments::validate(&schema, &json!([1])).unwrap_err(),
            ArgumentError::NotAnObject
        );
    }
}
