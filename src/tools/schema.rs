//! Tool definitions and their JSON input schemas.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Primitive type tag of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Schema of a single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    /// Closed set of accepted values, if any.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

/// Ordered parameter list, rendered as a JSON object.
///
/// Declaration order is kept on the wire so clients see parameters the way
/// the tool author listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, PropertySchema)>);

impl Properties {
    pub fn get(&self, name: &str) -> Option<&PropertySchema> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertySchema)> {
        self.0.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, name: String, schema: PropertySchema) {
        self.0.push((name, schema));
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, schema) in &self.0 {
            map.serialize_entry(name, schema)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Properties;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter schemas")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Properties, A::Error> {
                let mut props = Properties::default();
                while let Some((name, schema)) = access.next_entry::<String, PropertySchema>()? {
                    props.push(name, schema);
                }
                Ok(props)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

/// JSON-schema style description of a tool's input object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Properties::default(),
            required: Vec::new(),
        }
    }
}

impl InputSchema {
    /// An object schema with no parameters.
    #[must_use]
    pub fn object() -> Self {
        Self::default()
    }

    /// Declare a required string parameter.
    #[must_use]
    pub fn required(self, name: &str, description: &str) -> Self {
        self.param(name, ParamType::String, description, true)
    }

    /// Declare an optional string parameter.
    #[must_use]
    pub fn optional(self, name: &str, description: &str) -> Self {
        self.param(name, ParamType::String, description, false)
    }

    /// Declare an optional string parameter restricted to `values`.
    #[must_use]
    pub fn optional_enum(mut self, name: &str, description: &str, values: &[&str]) -> Self {
        self.properties.push(
            name.to_string(),
            PropertySchema {
                param_type: ParamType::String,
                description: description.to_string(),
                allowed: Some(values.iter().map(ToString::to_string).collect()),
            },
        );
        self
    }

    /// Declare a parameter of any primitive type.
    #[must_use]
    pub fn param(
        mut self,
        name: &str,
        param_type: ParamType,
        description: &str,
        required: bool,
    ) -> Self {
        self.properties.push(
            name.to_string(),
            PropertySchema {
                param_type,
                description: description.to_string(),
                allowed: None,
            },
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

/// A named, described, schema-typed tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl ToolDefinition {
    #[must_use]
    pub fn new(name: &str, description: &str, input_schema: InputSchema) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }

    /// Render in `OpenAI` function-calling format.
    pub fn to_openai_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_declaration_order() {
        let schema = InputSchema::object()
            .required("student_name", "學生姓名")
            .optional("course_name", "課程名稱")
            .optional("a_last", "sorted first alphabetically");

        let json = serde_json::to_string(&schema).unwrap();
        let student = json.find("student_name").unwrap();
        let course = json.find("course_name").unwrap();
        let last = json.find("a_last").unwrap();
        assert!(student < course && course < last);
        assert_eq!(schema.required, vec!["student_name"]);
    }

    #[test]
    fn definition_wire_shape() {
        let def = ToolDefinition::new(
            "list_courses",
            "列出課程",
            InputSchema::object().optional_enum("subject", "科目", &["數學", "英文"]),
        );
        let v = serde_json::to_value(&def).unwrap();
        assert_eq!(v["inputSchema"]["type"], "object");
        assert_eq!(v["inputSchema"]["properties"]["subject"]["type"], "string");
        assert_eq!(
            v["inputSchema"]["properties"]["subject"]["enum"],
            serde_json::json!(["數學", "英文"])
        );
        assert_eq!(v["inputSchema"]["required"], serde_json::json!([]));

        let back: ToolDefinition = serde_json::from_value(v).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn openai_rendering_wraps_function() {
        let def = ToolDefinition::new("x", "d", InputSchema::object().required("a", "A"));
        let v = def.to_openai_json();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], "x");
        assert_eq!(v["function"]["parameters"]["required"][0], "a");
    }
}
