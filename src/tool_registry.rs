//! Tool registry and multi-provider tool-call dispatch

use crate::error::{Error, Result};
use crate::providers::{builtin_formats, ProviderFormat};
use crate::tools::{Tool, ToolArgs, ToolSchema};
use futures::future::join_all;
use futures::FutureExt;
use jsonschema::Validator;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Normalized "call tool X with arguments Y" request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned (or synthesized) call id
    pub call_id: String,
    /// Requested tool
    pub tool_name: String,
    /// Serialized JSON arguments
    pub arguments: String,
}

/// Why a single call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// No tool registered under the requested name
    NotFound,
    /// Arguments did not decode or did not match the schema
    InvalidArguments,
    /// The callable failed
    Invocation,
}

/// Per-call error entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallError {
    /// Failure kind
    pub kind: ToolErrorKind,
    /// Human-readable message
    pub message: String,
}

impl ToolCallError {
    fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result or error of one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool returned a value
    Result(Value),
    /// The call failed
    Error(ToolCallError),
}

impl ToolOutcome {
    /// Whether the call failed
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The returned value, if the call succeeded
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Result(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// The error, if the call failed
    pub fn error(&self) -> Option<&ToolCallError> {
        match self {
            Self::Result(_) => None,
            Self::Error(err) => Some(err),
        }
    }

    /// Text sent back to the model
    pub fn content_string(&self) -> String {
        match self {
            Self::Result(Value::String(text)) => text.clone(),
            Self::Result(value) => value.to_string(),
            Self::Error(err) => format!("Error: {}", err.message),
        }
    }
}

/// Outcome of one call, keyed by its call id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Call id from the request
    pub call_id: String,
    /// Requested tool
    pub tool_name: String,
    /// Result or error
    pub outcome: ToolOutcome,
}

/// Results of one batch, in request order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResults {
    results: Vec<ToolCallResult>,
}

impl ToolCallResults {
    /// Look up a result by call id
    pub fn get(&self, call_id: &str) -> Option<&ToolOutcome> {
        self.results
            .iter()
            .find(|r| r.call_id == call_id)
            .map(|r| &r.outcome)
    }

    /// Iterate results in request order
    pub fn iter(&self) -> std::slice::Iter<'_, ToolCallResult> {
        self.results.iter()
    }

    /// Results as a slice
    pub fn as_slice(&self) -> &[ToolCallResult] {
        &self.results
    }

    /// Number of results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the batch was empty
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// call_id → outcome mapping
    pub fn into_map(self) -> HashMap<String, ToolOutcome> {
        self.results
            .into_iter()
            .map(|r| (r.call_id, r.outcome))
            .collect()
    }
}

impl IntoIterator for ToolCallResults {
    type Item = ToolCallResult;
    type IntoIter = std::vec::IntoIter<ToolCallResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    validator: Arc<Validator>,
}

/// Directory of callable tools plus the provider format table.
///
/// Tools and formats can be registered through a shared reference; a name
/// registered twice keeps only the latest tool.
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, RegisteredTool>>,
    formats: RwLock<HashMap<String, Arc<dyn ProviderFormat>>>,
}

impl ToolRegistry {
    /// Create a registry with every built-in provider format
    pub fn new() -> Self {
        let registry = Self {
            tools: RwLock::new(BTreeMap::new()),
            formats: RwLock::new(HashMap::new()),
        };
        for format in builtin_formats() {
            registry.register_provider(format);
        }
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    ///
    /// Fails when the tool's schema is inconsistent.
    pub fn register_tool(&self, tool: impl Tool + 'static) -> Result<()> {
        self.register(Arc::new(tool))
    }

    /// Register a shared tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.schema();
        schema.validate()?;
        let validator = jsonschema::validator_for(&schema.to_json_schema()).map_err(|e| {
            Error::config(format!("tool '{}' has an invalid schema: {}", schema.name, e))
        })?;

        let name = schema.name.clone();
        debug!(tool = %name, "registered tool");
        self.tools.write().insert(
            name,
            RegisteredTool {
                tool,
                validator: Arc::new(validator),
            },
        );
        Ok(())
    }

    /// Remove a tool. Returns true if it was present.
    pub fn remove_tool(&self, name: &str) -> bool {
        self.tools.write().remove(name).is_some()
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).map(|t| Arc::clone(&t.tool))
    }

    /// Canonical schemas of every registered tool, ordered by name
    pub fn list_tools(&self) -> Vec<ToolSchema> {
        self.tools
            .read()
            .values()
            .map(|t| t.tool.schema().clone())
            .collect()
    }

    /// Registered tool names, ordered
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Whether no tools are registered
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Register a provider format, replacing any format with the same tag
    pub fn register_provider(&self, format: Arc<dyn ProviderFormat>) {
        self.formats.write().insert(format.tag().to_string(), format);
    }

    /// Registered provider tags, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.formats.read().keys().cloned().collect();
        tags.sort();
        tags
    }

    /// The format registered for `provider`
    pub fn format(&self, provider: &str) -> Result<Arc<dyn ProviderFormat>> {
        self.formats
            .read()
            .get(provider)
            .cloned()
            .ok_or_else(|| Error::unsupported_provider(provider))
    }

    /// Every registered tool rendered in `provider`'s wire format
    pub fn tool_schemas(&self, provider: &str) -> Result<Vec<Value>> {
        let format = self.format(provider)?;
        Ok(self
            .tools
            .read()
            .values()
            .map(|t| format.tool_schema(t.tool.schema()))
            .collect())
    }

    /// Normalized tool-call requests found in a raw provider response
    pub fn extract_tool_calls(
        &self,
        provider: &str,
        response: &Value,
    ) -> Result<Vec<ToolCallRequest>> {
        Ok(self.format(provider)?.extract_tool_calls(response))
    }

    /// Extract and execute every tool call in a raw provider response.
    ///
    /// Only an unknown provider tag fails the whole batch; every other
    /// failure is reported per call.
    #[instrument(skip(self, response), fields(provider = %provider))]
    pub async fn handle_tool_call(
        &self,
        provider: &str,
        response: &Value,
    ) -> Result<ToolCallResults> {
        let calls = self.extract_tool_calls(provider, response)?;
        debug!(count = calls.len(), "dispatching tool calls");
        Ok(self.execute_tool_calls(calls).await)
    }

    /// Execute a batch of calls; results keep request order
    pub async fn execute_tool_calls(&self, calls: Vec<ToolCallRequest>) -> ToolCallResults {
        let results = join_all(calls.into_iter().map(|call| self.execute_call(call))).await;
        ToolCallResults { results }
    }

    /// Execute a single call
    pub async fn execute_call(&self, call: ToolCallRequest) -> ToolCallResult {
        let outcome = match self.run_call(&call).await {
            Ok(value) => ToolOutcome::Result(value),
            Err(err) => {
                warn!(
                    call_id = %call.call_id,
                    tool = %call.tool_name,
                    kind = ?err.kind,
                    "tool call failed: {}",
                    err.message
                );
                ToolOutcome::Error(err)
            }
        };

        ToolCallResult {
            call_id: call.call_id,
            tool_name: call.tool_name,
            outcome,
        }
    }

    async fn run_call(&self, call: &ToolCallRequest) -> std::result::Result<Value, ToolCallError> {
        let (tool, validator) = {
            let tools = self.tools.read();
            let entry = tools.get(&call.tool_name).ok_or_else(|| {
                ToolCallError::new(
                    ToolErrorKind::NotFound,
                    format!("tool '{}' not found", call.tool_name),
                )
            })?;
            (Arc::clone(&entry.tool), Arc::clone(&entry.validator))
        };

        let args = decode_arguments(&call.arguments)?;
        let instance = Value::Object(args);
        let violations: Vec<String> = match validator.validate(&instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| e.to_string()).collect(),
        };
        if !violations.is_empty() {
            return Err(ToolCallError::new(
                ToolErrorKind::InvalidArguments,
                violations.join("; "),
            ));
        }
        let Value::Object(args) = instance else {
            return Err(ToolCallError::new(
                ToolErrorKind::InvalidArguments,
                "arguments must be a JSON object",
            ));
        };

        match AssertUnwindSafe(tool.invoke(args)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ToolCallError::new(ToolErrorKind::Invocation, err.to_string())),
            Err(_) => Err(ToolCallError::new(
                ToolErrorKind::Invocation,
                format!("tool '{}' panicked", call.tool_name),
            )),
        }
    }
}

fn decode_arguments(raw: &str) -> std::result::Result<ToolArgs, ToolCallError> {
    if raw.trim().is_empty() {
        return Ok(ToolArgs::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(args)) => Ok(args),
        Ok(Value::Null) => Ok(ToolArgs::new()),
        Ok(other) => Err(ToolCallError::new(
            ToolErrorKind::InvalidArguments,
            format!("arguments must be a JSON object, got {other}"),
        )),
        Err(e) => Err(ToolCallError::new(
            ToolErrorKind::InvalidArguments,
            format!("arguments are not valid JSON: {e}"),
        )),
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .field("providers", &self.providers())
            .finish()
    }
}
