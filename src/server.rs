//! MCP server implementation using rmcp.
//!
//! Exposes the hub's tools to the invoking agent over stdio.

use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    ErrorData as McpError, ServiceExt,
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
    transport::stdio,
};
use tracing::{error, info, warn};

use crate::hub::McpHub;
use crate::tools::{ToolRegistry, default_registry, error_result};

/// MCP server that handles protocol requests and delegates to tool handlers.
#[derive(Clone)]
pub struct HubServer {
    tool_registry: Arc<ToolRegistry>,
}

impl HubServer {
    /// Create a server exposing every hub tool.
    pub fn new(hub: McpHub) -> Self {
        Self {
            tool_registry: Arc::new(default_registry(hub)),
        }
    }
}

impl ServerHandler for HubServer {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let result = ListToolsResult {
            tools: self.tool_registry.list_tools(),
            ..Default::default()
        };
        std::future::ready(Ok(result))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let tool_name = request.name.to_string();
        let args = request.arguments.unwrap_or_default();
        let registry = self.tool_registry.clone();

        async move {
            if !registry.contains(&tool_name) {
                return Err(McpError::invalid_params(
                    format!("Unknown tool: {}", tool_name),
                    None,
                ));
            }

            match registry.call_tool(&tool_name, args).await {
                Ok(result) => Ok(result),
                Err(e) => {
                    warn!("Tool '{}' failed: {}", tool_name, e);
                    Ok(error_result(format!("Error: {}", e)))
                }
            }
        }
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "MCP hub that connects to many MCP servers. Use `list-all-tools` or \
                 `find-tools` to discover tools, `get-tool` to read a tool's input schema, \
                 and `call-tool` to run it on the server that provides it."
                    .to_string(),
            ),
        }
    }
}

/// Serve `server` on stdin/stdout until the client ends the session.
pub async fn serve_stdio(server: HubServer) -> Result<()> {
    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| error!("serving error: {:?}", e))?;

    let reason = service.waiting().await?;
    info!("MCP stdio session ended: {:?}", reason);
    Ok(())
}
