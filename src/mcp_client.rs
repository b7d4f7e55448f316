// MCP client implementation backed by rmcp

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use rmcp::model::{CallToolRequestParams, JsonObject, Tool as McpTool, ToolAnnotations};
use rmcp::service::{Peer, RoleClient, RunningService, ServiceError};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::ServiceExt;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{BackendDescriptor, header_map};


/// Failure reported by a backend session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session is gone: process exited, socket closed, send failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an error; the session is still usable.
    #[error("backend error: {0}")]
    Protocol(String),
}

impl SessionError {
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }
}

impl From<ServiceError> for SessionError {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::McpError(data) => SessionError::Protocol(data.message.to_string()),
            ServiceError::TransportClosed | ServiceError::TransportSend(_) => {
                SessionError::Transport(err.to_string())
            }
            _ => SessionError::Protocol(err.to_string()),
        }
    }
}

/// A tool as reported by a backend.
///
/// Schemas and annotations are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: JsonObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<JsonObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

impl From<McpTool> for ToolDescriptor {
    fn from(tool: McpTool) -> Self {
        Self {
            name: tool.name.to_string(),
            title: tool.title,
            description: tool.description.map(|d| d.to_string()),
            input_schema: (*tool.input_schema).clone(),
            output_schema: tool.output_schema.map(|schema| (*schema).clone()),
            annotations: tool.annotations,
        }
    }
}

/// One live session with a backend tool server.
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Fetch the backend's current tool list.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError>;

    /// Invoke a tool and return the backend's raw result.
    async fn call_tool(&self, tool_name: &str, args: JsonObject) -> Result<Value, SessionError>;

    /// Close the session and release its process or socket.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Establishes sessions from descriptors.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn establish(
        &self,
        name: &str,
        descriptor: &BackendDescriptor,
    ) -> Result<Arc<dyn BackendSession>, SessionError>;
}

/// rmcp client session.
///
/// Requests go through the cloned peer so they never contend on the
/// service handle, which is only taken on close.
pub struct RmcpSession {
    peer: Peer<RoleClient>,
    running: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl RmcpSession {
    pub fn new(running: RunningService<RoleClient, ()>) -> Self {
        Self {
            peer: running.peer().clone(),
            running: Mutex::new(Some(running)),
        }
    }
}

#[async_trait]
impl BackendSession for RmcpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let tools = self.peer.list_all_tools().await?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, tool_name: &str, args: JsonObject) -> Result<Value, SessionError> {
        let request = CallToolRequestParams {
            name: tool_name.to_string().into(),
            arguments: Some(args),
            meta: None,
            task: None,
        };

        let resp = self.peer.call_tool(request).await?;
        serde_json::to_value(resp).map_err(|e| SessionError::Protocol(e.to_string()))
    }

    async fn close(&self) -> Result<(), SessionError> {
        let running = self.running.lock().await.take();
        match running {
            Some(running) => {
                let reason = running
                    .cancel()
                    .await
                    .map_err(|e| SessionError::Transport(e.to_string()))?;
                debug!("MCP session closed: {:?}", reason);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Connector that speaks MCP through rmcp.
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpConnector;

impl RmcpConnector {
    async fn start_stdio_service(
        name: &str,
        command: &str,
        args: &[String],
        env: &std::collections::BTreeMap<String, String>,
    ) -> Result<RunningService<RoleClient, ()>, SessionError> {
        info!("Starting MCP stdio server `{name}`: {command}");

        let child = TokioChildProcess::new(Command::new(command).configure(|cmd| {
            cmd.args(args).envs(env.iter());
        }))
        .map_err(|e| SessionError::Transport(format!("failed to spawn `{}`: {}", command, e)))?;

        ().serve(child)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn start_http_service(
        name: &str,
        url: &url::Url,
        headers: &std::collections::BTreeMap<String, String>,
    ) -> Result<RunningService<RoleClient, ()>, SessionError> {
        info!("Connecting to MCP HTTP server `{name}` at `{url}`");

        let mut cfg = StreamableHttpClientTransportConfig::with_uri(url.as_str());
        let mut default_headers = header_map(headers).map_err(SessionError::Transport)?;
        // rmcp sends the bearer token itself; keep it out of the default headers.
        if let Some(value) = default_headers.remove(AUTHORIZATION) {
            let value = value
                .to_str()
                .map_err(|e| SessionError::Transport(format!("authorization header: {}", e)))?;
            cfg.auth_header = Some(bearer_token(value).to_string());
        }
        debug!(
            "Server `{name}` uses {} extra header(s)",
            default_headers.len()
        );

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| SessionError::Transport(format!("build HTTP client: {}", e)))?;

        let transport = StreamableHttpClientTransport::with_client(client, cfg);
        ().serve(transport)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Connector for RmcpConnector {
    async fn establish(
        &self,
        name: &str,
        descriptor: &BackendDescriptor,
    ) -> Result<Arc<dyn BackendSession>, SessionError> {
        let running = match descriptor {
            BackendDescriptor::Stdio { command, args, env } => {
                Self::start_stdio_service(name, command, args, env).await?
            }
            BackendDescriptor::Http { url, headers } => {
                Self::start_http_service(name, url, headers).await?
            }
        };

        if let Some(info) = running.peer_info() {
            debug!(
                "Server `{name}` identifies as {} {}",
                info.server_info.name, info.server_info.version
            );
        }

        Ok(Arc::new(RmcpSession::new(running)))
    }
}

/// Strip a `Bearer ` scheme; rmcp adds it back when sending.
fn bearer_token(value: &str) -> &str {
    let trimmed = value.trim();
    match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim_start(),
        _ => trimmed,
    }
}
