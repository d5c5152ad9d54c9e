//! Tool traits and core abstractions

use crate::error::{ToolError, ToolResult};
use async_trait::async_trait;
use selkie_core::TOOL_TIMEOUT_MS_DEFAULT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Tool parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// JSON-schema type name
    pub fn schema_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// Tool parameter definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub param_type: ParamType,
    /// Whether the parameter is required
    pub required: bool,
    /// Description shown to the model
    pub description: String,
    /// Default value
    pub default: Option<Value>,
    /// Allowed values
    pub enum_values: Option<Vec<Value>>,
}

impl ToolParam {
    /// Required string parameter
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParamType::String,
            required: true,
            description: description.into(),
            default: None,
            enum_values: None,
        }
    }

    /// Required integer parameter
    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParamType::Integer,
            required: true,
            description: description.into(),
            default: None,
            enum_values: None,
        }
    }

    /// Required boolean parameter
    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParamType::Boolean,
            required: true,
            description: description.into(),
            default: None,
            enum_values: None,
        }
    }

    /// Required array parameter
    pub fn array(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParamType::Array,
            required: true,
            description: description.into(),
            default: None,
            enum_values: None,
        }
    }

    /// Make this parameter optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set a default value (implies optional)
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    /// Constrain to an enumerated set of values
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Metadata about a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Tool parameters
    pub parameters: Vec<ToolParam>,
    /// Destructive tools require a user confirmation round-trip
    pub needs_confirmation: bool,
    /// Execution timeout in milliseconds
    pub timeout_ms: u64,
}

impl ToolMetadata {
    /// Create new tool metadata
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            needs_confirmation: false,
            timeout_ms: TOOL_TIMEOUT_MS_DEFAULT,
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.parameters.push(param);
        self
    }

    /// Mark this tool as requiring confirmation before execution
    pub fn with_confirmation(mut self) -> Self {
        self.needs_confirmation = true;
        self
    }

    /// Set the execution timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Render the parameters as a JSON schema object for the LLM
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut prop = serde_json::Map::new();
            prop.insert(
                "type".to_string(),
                Value::String(param.param_type.schema_name().to_string()),
            );
            prop.insert(
                "description".to_string(),
                Value::String(param.description.clone()),
            );
            if let Some(values) = &param.enum_values {
                prop.insert("enum".to_string(), Value::Array(values.clone()));
            }
            if let Some(default) = &param.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));

            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Outcome of a tool execution
///
/// `observation` is the textual rendering fed back to the model; `data`
/// carries structured results for programmatic consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether execution succeeded
    pub success: bool,
    /// Structured result data
    pub data: Option<Value>,
    /// Text rendering for the model
    pub observation: String,
    /// Error message on failure
    pub error: Option<String>,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ToolOutput {
    /// Create a successful output
    pub fn success(observation: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            observation: observation.into(),
            error: None,
            duration_ms: 0,
            metadata: HashMap::new(),
        }
    }

    /// Create a failed output
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            data: None,
            observation: format!("error: {}", error),
            error: Some(error),
            duration_ms: 0,
            metadata: HashMap::new(),
        }
    }

    /// Attach structured data
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Core trait for tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool metadata
    fn metadata(&self) -> &ToolMetadata;

    /// Tool name
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Validate arguments against declared parameters
    fn validate(&self, args: &Value) -> ToolResult<()> {
        let metadata = self.metadata();
        let object = args.as_object();

        for param in &metadata.parameters {
            let present = object.map(|o| o.contains_key(&param.name)).unwrap_or(false);
            if param.required && !present {
                return Err(ToolError::MissingParameter {
                    tool: metadata.name.clone(),
                    param: param.name.clone(),
                });
            }
            if let (Some(values), Some(object)) = (&param.enum_values, object) {
                if let Some(value) = object.get(&param.name) {
                    if !values.contains(value) {
                        return Err(ToolError::InvalidParameter {
                            tool: metadata.name.clone(),
                            param: param.name.clone(),
                            reason: format!("{} is not an allowed value", value),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Execute the tool with JSON arguments
    async fn execute(&self, args: Value) -> ToolResult<ToolOutput>;

    /// Human-readable preview of what a call would do, shown in the
    /// confirmation prompt for destructive tools. None falls back to a
    /// generic prompt.
    async fn preview(&self, _args: &Value) -> Option<String> {
        None
    }
}
