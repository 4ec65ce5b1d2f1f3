//! Tool system for the agent.
//!
//! Every tool declares a typed parameter schema. The [`ToolRegistry`] checks
//! arguments against that schema before dispatch and bounds each call with a
//! timeout, so tools only ever see structurally valid input.

mod database;
mod filesystem;
mod web;

pub use database::{validate_select, Database, QueryDatabase};
pub use filesystem::{ListFiles, ReadFile, Sandbox, WriteFile};
pub use web::{GetWeather, HttpGet, WeatherEndpoints};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm::{FunctionDefinition, ToolSchema};

/// Per-call execution limit.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Information about a tool for display purposes.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Primitive type tag of a single parameter.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Whether `value` satisfies this tag. Only string and number are enforced.
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum SchemaKind {
    Object,
}

/// Parameter schema of a tool: named, typed properties plus a required set.
///
/// Built only through [`ParameterSchema::required`] and
/// [`ParameterSchema::optional`], so every required name is also a declared
/// property.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    kind: SchemaKind,
    properties: BTreeMap<String, ParamSpec>,
    required: Vec<String>,
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::object()
    }
}

impl ParameterSchema {
    /// An object schema with no properties.
    pub fn object() -> Self {
        Self {
            kind: SchemaKind::Object,
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn required(mut self, name: &str, kind: ParamType, description: &str) -> Self {
        self = self.optional(name, kind, description);
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn optional(mut self, name: &str, kind: ParamType, description: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            ParamSpec {
                kind,
                description: description.to_string(),
            },
        );
        self
    }

    pub fn properties(&self) -> &BTreeMap<String, ParamSpec> {
        &self.properties
    }

    pub fn required_names(&self) -> &[String] {
        &self.required
    }

    /// Structural validation. Unknown keys pass through unchecked.
    pub fn validate(&self, params: &Value) -> Result<(), String> {
        let empty = serde_json::Map::new();
        let params = match params {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err("parameters must be a JSON object".to_string()),
        };

        for name in &self.required {
            if !params.contains_key(name) {
                return Err(format!("Missing required field: {}", name));
            }
        }

        for (key, value) in params {
            let Some(spec) = self.properties.get(key) else {
                continue;
            };
            if !spec.kind.accepts(value) {
                let expected = match spec.kind {
                    ParamType::Number => "a number",
                    _ => "a string",
                };
                return Err(format!("{} must be {}", key, expected));
            }
        }

        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({"type": "object"}))
    }
}

/// Trait for implementing tools.
///
/// Expected failures (missing file, rejected query) are returned as
/// `{"success": false, "error": ...}` values. An `Err` is reserved for
/// unexpected failures; the registry turns it into a [`ToolError`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    fn name(&self) -> &str;

    /// Get the tool description shown to the model.
    fn description(&self) -> &str;

    /// Get the parameter schema.
    fn parameters_schema(&self) -> ParameterSchema;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<Value>;
}

/// Errors raised by [`ToolRegistry::execute`].
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution timeout: {name} exceeded {}s", .limit.as_secs())]
    Timeout { name: String, limit: Duration },

    #[error("{0}")]
    Execution(#[from] anyhow::Error),
}

/// Outcome of resolving a model-supplied tool name.
pub enum ToolLookup<'a> {
    Registered(&'a Arc<dyn Tool>),
    Unknown(&'a str),
}

/// Shared resources injected into the built-in tools.
#[derive(Clone)]
pub struct ToolContext {
    pub sandbox: Arc<Sandbox>,
    pub database: Arc<Database>,
    pub http: reqwest::Client,
    pub weather: WeatherEndpoints,
}

/// Wrapper for a failure the model should see as data rather than an error.
pub(crate) fn failure(error: impl std::fmt::Display) -> Value {
    json!({ "success": false, "error": error.to_string() })
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Create a registry with all built-in tools.
    pub fn with_builtin_tools(ctx: ToolContext) -> Self {
        let mut registry = Self::new();

        // File operations
        registry.register(ReadFile::new(Arc::clone(&ctx.sandbox)));
        registry.register(WriteFile::new(Arc::clone(&ctx.sandbox)));
        registry.register(ListFiles::new(Arc::clone(&ctx.sandbox)));

        // Database
        registry.register(QueryDatabase::new(Arc::clone(&ctx.database)));

        // Web access
        registry.register(GetWeather::new(ctx.http.clone(), ctx.weather.clone()));
        registry.register(HttpGet::new(ctx.http));

        registry
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            tracing::debug!("Replaced tool registration: {}", name);
        }
    }

    pub fn lookup<'a>(&'a self, name: &'a str) -> ToolLookup<'a> {
        match self.tools.get(name) {
            Some(tool) => ToolLookup::Registered(tool),
            None => ToolLookup::Unknown(name),
        }
    }

    /// List all available tools, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        let mut tools: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Get tool schemas in function-calling format.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolSchema {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema().to_value(),
                },
            })
            .collect()
    }

    /// Execute a tool by name.
    ///
    /// Invalid arguments produce `Ok({"success": false, ...})`; an unknown
    /// name, a timeout or a raised tool error produce `Err`.
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = match self.lookup(name) {
            ToolLookup::Registered(tool) => tool,
            ToolLookup::Unknown(name) => return Err(ToolError::NotFound(name.to_string())),
        };

        if let Err(reason) = tool.parameters_schema().validate(&args) {
            tracing::debug!("Rejected arguments for {}: {}", name, reason);
            return Ok(failure(format!("Validation failed: {}", reason)));
        }

        match tokio::time::timeout(self.timeout, tool.execute(args)).await {
            Ok(result) => result.map_err(ToolError::from),
            Err(_) => {
                tracing::warn!("Tool {} timed out after {:?}", name, self.timeout);
                Err(ToolError::Timeout {
                    name: name.to_string(),
                    limit: self.timeout,
                })
            }
        }
    }
}
