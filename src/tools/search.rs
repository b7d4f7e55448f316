//! Handlers for `find-tools`, `find-tools-in-server` and `get-tool`.

use std::future::Future;
use std::pin::Pin;

use rmcp::model::{CallToolResult, JsonObject};
use serde_json::{Value, json};

use crate::hub::McpHub;
use crate::tools::listing::catalogs_payload;
use crate::tools::{
    ToolHandler, hub_error_result, json_result, object_schema, optional_bool, required_str,
    search_properties, search_scope, server_name_property, tool_summary,
};

pub struct FindToolsHandler {
    hub: McpHub,
}

impl FindToolsHandler {
    pub fn new(hub: McpHub) -> Self {
        Self { hub }
    }
}

impl ToolHandler for FindToolsHandler {
    fn name(&self) -> &str {
        "find-tools"
    }

    fn title(&self) -> Option<&str> {
        Some("Find Tools")
    }

    fn description(&self) -> &str {
        "Search the tools of every connected server with a regular expression. \
         Servers without matches are listed with an empty `tools` array; servers \
         that cannot be reached are listed with an `error` entry."
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(Value::Object(search_properties()), &["pattern"])
    }

    fn execute(
        &self,
        args: JsonObject,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        Box::pin(async move {
            let pattern = required_str(&args, "pattern")?;
            let scope = search_scope(&args)?;
            let case_sensitive = optional_bool(&args, "caseSensitive")?;

            match self.hub.find(pattern, scope, case_sensitive).await {
                Ok(found) => json_result(&catalogs_payload(&found)),
                Err(e) => Ok(hub_error_result(&e)),
            }
        })
    }
}

pub struct FindToolsInServerHandler {
    hub: McpHub,
}

impl FindToolsInServerHandler {
    pub fn new(hub: McpHub) -> Self {
        Self { hub }
    }
}

impl ToolHandler for FindToolsInServerHandler {
    fn name(&self) -> &str {
        "find-tools-in-server"
    }

    fn description(&self) -> &str {
        "Search the tools of one connected server with a regular expression."
    }

    fn input_schema(&self) -> JsonObject {
        let mut properties = search_properties();
        properties.insert("serverName".to_string(), server_name_property());
        object_schema(Value::Object(properties), &["serverName", "pattern"])
    }

    fn execute(
        &self,
        args: JsonObject,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        Box::pin(async move {
            let server = required_str(&args, "serverName")?;
            let pattern = required_str(&args, "pattern")?;
            let scope = search_scope(&args)?;
            let case_sensitive = optional_bool(&args, "caseSensitive")?;

            match self
                .hub
                .find_in_server(server, pattern, scope, case_sensitive)
                .await
            {
                Ok(tools) => json_result(&json!({
                    "tools": tools.iter().map(tool_summary).collect::<Vec<_>>()
                })),
                Err(e) => Ok(hub_error_result(&e)),
            }
        })
    }
}

pub struct GetToolHandler {
    hub: McpHub,
}

impl GetToolHandler {
    pub fn new(hub: McpHub) -> Self {
        Self { hub }
    }
}

impl ToolHandler for GetToolHandler {
    fn name(&self) -> &str {
        "get-tool"
    }

    fn description(&self) -> &str {
        "Get the full definition of one tool, including its input schema. Call this \
         before `call-tool` to learn which arguments the tool expects."
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            json!({
                "serverName": server_name_property(),
                "toolName": {
                    "type": "string",
                    "description": "Exact name of the tool on that server."
                }
            }),
            &["serverName", "toolName"],
        )
    }

    fn execute(
        &self,
        args: JsonObject,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        Box::pin(async move {
            let server = required_str(&args, "serverName")?;
            let tool_name = required_str(&args, "toolName")?;

            match self.hub.get_tool(server, tool_name).await {
                Ok(tool) => json_result(&tool),
                Err(e) => Ok(hub_error_result(&e)),
            }
        })
    }
}
