//! Tool definitions consumed when shaping outbound chat payloads
//!
//! Schema derivation happens upstream; this layer only needs a name, a
//! description and a JSON schema object per tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Function name the model will reference in its tool calls
    pub name: String,

    /// Description shown to the model
    pub description: String,

    /// JSON schema for the function parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// A tool taking no parameters
    pub fn without_parameters(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, schema::object(serde_json::json!({}), &[]))
    }
}

/// Helpers for hand-built parameter schemas
pub mod schema {
    use serde_json::{Value, json};

    /// Object schema with the given properties and required keys
    ///
    /// # Example
    ///
    /// ```
    /// use llm_endpoints::tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({ "city": schema::string("City name") }),
    ///     &["city"],
    /// );
    /// assert_eq!(schema["required"][0], "city");
    /// ```
    pub fn object(properties: Value, required: &[&str]) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// String property schema
    pub fn string(description: &str) -> Value {
        json!({ "type": "string", "description": description })
    }

    /// Integer property schema
    pub fn integer(description: &str) -> Value {
        json!({ "type": "integer", "description": description })
    }

    /// Array property schema
    pub fn array(description: &str, items: Value) -> Value {
        json!({ "type": "array", "description": description, "items": items })
    }
}
