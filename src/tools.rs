//! Tool trait, canonical tool schema and the closure-backed `BaseTool`

use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// Named arguments passed to a tool
pub type ToolArgs = Map<String, Value>;

/// Async callable bound to a tool
pub type ToolFunction = Arc<dyn Fn(ToolArgs) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Recognized parameter type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// JSON string
    String,
    /// JSON integer
    Integer,
    /// Any JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// JSON array
    Array,
    /// JSON object
    Object,
}

impl ParamType {
    /// The JSON Schema type keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl FromStr for ParamType {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            other => Err(Error::config(format!("unrecognized parameter type '{other}'"))),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Type tag
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Description shown to the model
    pub description: String,
}

/// Canonical, provider-independent tool schema.
///
/// Every provider wire format is rendered from this one value, so a single
/// registration serves every supported provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,
    /// Description for function calling
    pub description: String,
    /// Parameters keyed by name
    pub parameters: BTreeMap<String, ParameterSpec>,
    /// Names of required parameters
    pub required: Vec<String>,
}

impl ToolSchema {
    /// Check the schema is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("tool name must not be empty"));
        }

        let mut seen = HashSet::new();
        for name in &self.required {
            if !self.parameters.contains_key(name) {
                return Err(Error::config(format!(
                    "tool '{}' requires undeclared parameter '{}'",
                    self.name, name
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::config(format!(
                    "tool '{}' lists required parameter '{}' twice",
                    self.name, name
                )));
            }
        }
        Ok(())
    }

    /// JSON Schema object describing the arguments
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    json!({
                        "type": spec.param_type.as_str(),
                        "description": spec.description,
                    }),
                )
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }

    /// Rebuild a schema from a name, description and JSON Schema object.
    ///
    /// Inverse of [`ToolSchema::to_json_schema`]; used when reading provider
    /// wire formats back.
    pub fn from_json_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Result<Self> {
        let mut parameters = BTreeMap::new();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (param, spec) in properties {
                let tag = spec.get("type").and_then(Value::as_str).unwrap_or_default();
                parameters.insert(
                    param.clone(),
                    ParameterSpec {
                        param_type: tag.parse()?,
                        description: spec
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    },
                );
            }
        }

        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let schema = Self {
            name: name.into(),
            description: description.into(),
            parameters,
            required,
        };
        schema.validate()?;
        Ok(schema)
    }
}

/// Named, schema-described callable
#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical schema
    fn schema(&self) -> &ToolSchema;

    /// Tool name
    fn name(&self) -> &str {
        &self.schema().name
    }

    /// Description for function calling
    fn description(&self) -> &str {
        &self.schema().description
    }

    /// Invoke the tool with decoded arguments
    async fn invoke(&self, args: ToolArgs) -> Result<Value>;
}

/// Tool backed by a closure
#[derive(Clone)]
pub struct BaseTool {
    schema: ToolSchema,
    function: ToolFunction,
}

impl BaseTool {
    /// Start building a tool
    pub fn builder(name: impl Into<String>) -> BaseToolBuilder {
        BaseToolBuilder::new(name)
    }
}

#[async_trait]
impl Tool for BaseTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value> {
        (self.function)(args).await
    }
}

impl fmt::Debug for BaseTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseTool")
            .field("schema", &self.schema)
            .field("function", &"<fn>")
            .finish()
    }
}

/// Builder for [`BaseTool`]
pub struct BaseToolBuilder {
    name: String,
    description: String,
    parameters: Vec<(String, String, String)>,
    required: Vec<String>,
    function: Option<ToolFunction>,
}

impl BaseToolBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            required: Vec::new(),
            function: None,
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a parameter with a type tag such as `"string"` or `"integer"`
    pub fn parameter(
        mut self,
        name: impl Into<String>,
        type_tag: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.parameters
            .push((name.into(), type_tag.into(), description.into()));
        self
    }

    /// Mark parameters as required
    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }

    /// Bind an async callable
    pub fn function<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.function = Some(Arc::new(move |args: ToolArgs| f(args).boxed()));
        self
    }

    /// Bind a synchronous callable
    pub fn sync_function<F>(mut self, f: F) -> Self
    where
        F: Fn(ToolArgs) -> Result<Value> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.function = Some(Arc::new(move |args: ToolArgs| {
            let f = Arc::clone(&f);
            async move { f(args) }.boxed()
        }));
        self
    }

    /// Build the tool, failing on a missing callable or an inconsistent
    /// parameter list
    pub fn build(self) -> Result<BaseTool> {
        let function = self
            .function
            .ok_or_else(|| Error::config(format!("tool '{}' has no callable", self.name)))?;

        let mut parameters = BTreeMap::new();
        for (name, tag, description) in self.parameters {
            let param_type = tag.parse::<ParamType>().map_err(|_| {
                Error::config(format!(
                    "tool '{}' parameter '{}' has unrecognized type '{}'",
                    self.name, name, tag
                ))
            })?;
            if parameters
                .insert(
                    name.clone(),
                    ParameterSpec {
                        param_type,
                        description,
                    },
                )
                .is_some()
            {
                return Err(Error::config(format!(
                    "tool '{}' declares parameter '{}' twice",
                    self.name, name
                )));
            }
        }

        let schema = ToolSchema {
            name: self.name,
            description: self.description,
            parameters,
            required: self.required,
        };
        schema.validate()?;

        Ok(BaseTool { schema, function })
    }
}

/// Tool that echoes its `message` argument
pub fn echo_tool() -> Result<BaseTool> {
    BaseTool::builder("echo")
        .description("Echoes back the input message")
        .parameter("message", "string", "The message to echo back")
        .required(["message"])
        .sync_function(|args| {
            let message = args
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("(no message)");
            Ok(json!(format!("Echo: {message}")))
        })
        .build()
}

/// Calculator tool for basic arithmetic
pub fn calculator_tool() -> Result<BaseTool> {
    BaseTool::builder("calculator")
        .description("Performs basic arithmetic operations (add, subtract, multiply, divide)")
        .parameter(
            "operation",
            "string",
            "The operation to perform: add, subtract, multiply or divide",
        )
        .parameter("a", "number", "First operand")
        .parameter("b", "number", "Second operand")
        .required(["operation", "a", "b"])
        .sync_function(|args| {
            let operation = args
                .get("operation")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidInput("Missing 'operation'".to_string()))?;
            let a = args
                .get("a")
                .and_then(Value::as_f64)
                .ok_or_else(|| Error::InvalidInput("Missing 'a'".to_string()))?;
            let b = args
                .get("b")
                .and_then(Value::as_f64)
                .ok_or_else(|| Error::InvalidInput("Missing 'b'".to_string()))?;

            let result = match operation {
                "add" => a + b,
                "subtract" => a - b,
                "multiply" => a * b,
                "divide" => {
                    if b == 0.0 {
                        return Err(Error::tool_invocation("calculator", "Division by zero"));
                    }
                    a / b
                }
                other => {
                    return Err(Error::tool_invocation(
                        "calculator",
                        format!("Unknown operation: {other}"),
                    ))
                }
            };

            Ok(json!({ "result": result }))
        })
        .build()
}
