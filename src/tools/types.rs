//! Tool-related types: parameter schemas, tool descriptions, results.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON Schema-based parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameters {
    pub schema: Value,
}

impl ToolParameters {
    pub fn from_schema(schema: Value) -> Self {
        Self { schema }
    }

    /// An object schema with no properties.
    pub fn empty() -> Self {
        Self::object().build()
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

/// Builder for object-shaped parameter and elicitation schemas.
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    /// Add a string property.
    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description.into()}),
            required,
        )
    }

    /// Add a string property restricted to `values`.
    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description.into(), "enum": values}),
            required,
        )
    }

    /// Add an array-of-strings property.
    pub fn string_array(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "array", "description": description.into(), "items": {"type": "string"}}),
            required,
        )
    }

    /// Add a multi-select property whose items are restricted to `values`.
    pub fn multi_select(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        self.property(
            name,
            json!({
                "type": "array",
                "description": description.into(),
                "items": {"type": "string", "enum": values},
            }),
            required,
        )
    }

    fn property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}

/// A tool as advertised by an executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    ToolParameters::empty().schema
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: ToolParameters) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: parameters.schema,
        }
    }

    /// The OpenAI function-tool declaration for this tool.
    pub fn to_function_declaration(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

/// Outcome of one tool invocation. Every invocation yields one.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Value),
    Error(String),
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The JSON payload reported to the model and the client.
    pub fn payload(&self) -> Value {
        match self {
            Self::Success(value) => value.clone(),
            Self::Error(message) => json!({ "error": message }),
        }
    }
}
