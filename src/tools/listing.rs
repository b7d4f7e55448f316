//! Handlers for `list-all-tools`, `list-all-tools-in-server` and `list-servers`.

use std::future::Future;
use std::pin::Pin;

use rmcp::model::{CallToolResult, Content, JsonObject};
use serde_json::{Map, Value, json};

use crate::discovery::ServerCatalogs;
use crate::hub::McpHub;
use crate::tools::{
    ToolHandler, hub_error_result, json_result, object_schema, required_str, server_name_property,
    tool_summary,
};

/// Render per-server catalogs as `{server: {tools: [...]}}` or `{server: {error}}`.
pub(crate) fn catalogs_payload(catalogs: &ServerCatalogs) -> Value {
    let servers: Map<String, Value> = catalogs
        .iter()
        .map(|(name, catalog)| {
            let entry = match catalog {
                Ok(tools) => json!({ "tools": tools.iter().map(tool_summary).collect::<Vec<_>>() }),
                Err(e) => json!({ "error": e.to_string() }),
            };
            (name.clone(), entry)
        })
        .collect();
    Value::Object(servers)
}

pub struct ListAllToolsHandler {
    hub: McpHub,
}

impl ListAllToolsHandler {
    pub fn new(hub: McpHub) -> Self {
        Self { hub }
    }
}

impl ToolHandler for ListAllToolsHandler {
    fn name(&self) -> &str {
        "list-all-tools"
    }

    fn title(&self) -> Option<&str> {
        Some("List All Tools")
    }

    fn description(&self) -> &str {
        "List the tools of every connected server. Only names and descriptions are \
         returned; use `get-tool` for a tool's input schema. A server that cannot be \
         reached is reported with an `error` entry."
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(json!({}), &[])
    }

    fn execute(
        &self,
        _args: JsonObject,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        Box::pin(async move {
            let catalogs = self.hub.list_all().await;
            if catalogs.is_empty() {
                return Ok(CallToolResult::success(vec![Content::text(
                    "No connected servers.",
                )]));
            }
            json_result(&catalogs_payload(&catalogs))
        })
    }
}

pub struct ListToolsInServerHandler {
    hub: McpHub,
}

impl ListToolsInServerHandler {
    pub fn new(hub: McpHub) -> Self {
        Self { hub }
    }
}

impl ToolHandler for ListToolsInServerHandler {
    fn name(&self) -> &str {
        "list-all-tools-in-server"
    }

    fn description(&self) -> &str {
        "List the tools of one connected server (names and descriptions)."
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(json!({ "serverName": server_name_property() }), &["serverName"])
    }

    fn execute(
        &self,
        args: JsonObject,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        Box::pin(async move {
            let server = required_str(&args, "serverName")?;
            match self.hub.list_in_server(server).await {
                Ok(tools) => json_result(&json!({
                    "tools": tools.iter().map(tool_summary).collect::<Vec<_>>()
                })),
                Err(e) => Ok(hub_error_result(&e)),
            }
        })
    }
}

pub struct ListServersHandler {
    hub: McpHub,
}

impl ListServersHandler {
    pub fn new(hub: McpHub) -> Self {
        Self { hub }
    }
}

impl ToolHandler for ListServersHandler {
    fn name(&self) -> &str {
        "list-servers"
    }

    fn description(&self) -> &str {
        "List the backend servers the hub is currently connected to."
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(json!({}), &[])
    }

    fn execute(
        &self,
        _args: JsonObject,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        Box::pin(async move {
            let registry = self.hub.registry();
            // A name may disconnect between the snapshot and the lookup.
            let servers: Vec<Value> = registry
                .list_names()
                .into_iter()
                .filter_map(|name| registry.lookup(&name).ok())
                .map(|connection| {
                    json!({
                        "name": connection.name(),
                        "state": connection.state(),
                        "transport": connection.descriptor().kind(),
                        "target": connection.descriptor().target(),
                    })
                })
                .collect();
            json_result(&json!({ "servers": servers }))
        })
    }
}
