//! The hub's own MCP tools.
//!
//! Each tool is a `ToolHandler` over a shared `McpHub`. Results are JSON text;
//! failures come back as tool results flagged `isError` so the calling agent
//! can read them.

mod registry;

pub use registry::{ToolHandler, ToolRegistry};

mod call;
mod listing;
mod search;

pub use call::CallToolHandler;
pub use listing::{ListAllToolsHandler, ListServersHandler, ListToolsInServerHandler};
pub use search::{FindToolsHandler, FindToolsInServerHandler, GetToolHandler};

use anyhow::{Result, anyhow};
use rmcp::model::{CallToolResult, Content, JsonObject};
use serde::Serialize;
use serde_json::{Value, json};

use crate::discovery::SearchScope;
use crate::error::HubError;
use crate::hub::McpHub;
use crate::mcp_client::ToolDescriptor;

/// A registry holding every hub tool.
pub fn default_registry(hub: McpHub) -> ToolRegistry {
    ToolRegistry::new()
        .register_handler(ListAllToolsHandler::new(hub.clone()))
        .register_handler(ListToolsInServerHandler::new(hub.clone()))
        .register_handler(FindToolsHandler::new(hub.clone()))
        .register_handler(FindToolsInServerHandler::new(hub.clone()))
        .register_handler(GetToolHandler::new(hub.clone()))
        .register_handler(CallToolHandler::new(hub.clone()))
        .register_handler(ListServersHandler::new(hub))
}

/// Pretty JSON text result.
pub(crate) fn json_result<T: Serialize>(payload: &T) -> Result<CallToolResult> {
    let text = serde_json::to_string_pretty(payload)?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub(crate) fn error_result(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

pub(crate) fn hub_error_result(err: &HubError) -> CallToolResult {
    error_result(err.to_string())
}

/// Name and description only; the full schema is served by `get-tool`.
pub(crate) fn tool_summary(tool: &ToolDescriptor) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
    })
}

/// Build an object schema from its properties and required keys.
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), properties);
    schema.insert("required".to_string(), json!(required));
    schema
}

pub(crate) fn required_str<'a>(args: &'a JsonObject, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing required string argument '{}'", key))
}

pub(crate) fn optional_bool(args: &JsonObject, key: &str) -> Result<bool> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(anyhow!("Argument '{}' must be a boolean, got {}", key, other)),
    }
}

pub(crate) fn search_scope(args: &JsonObject) -> Result<SearchScope> {
    match args.get("searchIn") {
        None | Some(Value::Null) => Ok(SearchScope::default()),
        Some(Value::String(s)) => s.parse().map_err(|e: String| anyhow!(e)),
        Some(other) => Err(anyhow!("Argument 'searchIn' must be a string, got {}", other)),
    }
}

fn server_name_property() -> Value {
    json!({
        "type": "string",
        "description": "Name of the backend server as configured in the hub."
    })
}

fn search_properties() -> serde_json::Map<String, Value> {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "pattern".to_string(),
        json!({
            "type": "string",
            "description": "Regular expression matched against tool names and/or descriptions."
        }),
    );
    properties.insert(
        "searchIn".to_string(),
        json!({
            "type": "string",
            "enum": ["name", "description", "both"],
            "description": "Which fields to search (default: both).",
            "default": "both"
        }),
    );
    properties.insert(
        "caseSensitive".to_string(),
        json!({
            "type": "boolean",
            "description": "Whether matching is case sensitive (default: false).",
            "default": false
        }),
    );
    properties
}
