//! Handler for the `call-tool` tool.
//!
//! Forwards a call to one backend and hands its result back unchanged.

use std::future::Future;
use std::pin::Pin;

use rmcp::model::{CallToolResult, JsonObject};
use serde_json::{Value, json};

use crate::hub::McpHub;
use crate::tools::{
    ToolHandler, hub_error_result, json_result, object_schema, required_str, server_name_property,
};

pub struct CallToolHandler {
    hub: McpHub,
}

impl CallToolHandler {
    pub fn new(hub: McpHub) -> Self {
        Self { hub }
    }
}

impl ToolHandler for CallToolHandler {
    fn name(&self) -> &str {
        "call-tool"
    }

    fn title(&self) -> Option<&str> {
        Some("Call Tool")
    }

    fn description(&self) -> &str {
        "Call a tool on a connected server. Use `get-tool` first to learn the \
         arguments the tool expects; they are forwarded without validation."
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            json!({
                "serverName": server_name_property(),
                "toolName": {
                    "type": "string",
                    "description": "Name of the tool to call."
                },
                "toolArgs": {
                    "type": "object",
                    "description": "Arguments passed to the tool, shaped according to its inputSchema.",
                    "additionalProperties": true
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
            let tool_args = match args.get("toolArgs") {
                None | Some(Value::Null) => JsonObject::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(other) => anyhow::bail!("Argument 'toolArgs' must be an object, got {}", other),
            };

            match self.hub.invoke(server, tool_name, tool_args).await {
                // A well-formed backend result is passed through as is, `isError` included.
                Ok(value) => match serde_json::from_value::<CallToolResult>(value.clone()) {
                    Ok(result) => Ok(result),
                    Err(_) => json_result(&value),
                },
                Err(e) => Ok(hub_error_result(&e)),
            }
        })
    }
}
