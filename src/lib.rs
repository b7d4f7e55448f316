// Core modules
pub mod config;
mod error;
pub mod mcp_client;
pub mod registry;

// Discovery and routing on top of the registry
pub mod discovery;
mod hub;
pub mod router;

// Outward MCP surface
mod tools;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types and functions
pub use config::{BackendDescriptor, McpJsonConfig, TransportKind, resolve_config_path};
pub use discovery::{DiscoveryEngine, SearchScope, ServerCatalogs, ToolMatcher};
pub use error::{HubError, HubResult};
pub use hub::McpHub;
pub use mcp_client::{
    BackendSession, Connector, RmcpConnector, RmcpSession, SessionError, ToolDescriptor,
};
pub use registry::{BackendConnection, ConnectionRegistry, ConnectionState};
pub use router::CallRouter;
pub use server::HubServer;
pub use tools::{ToolHandler, ToolRegistry};

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

/// Build a hub from the configuration at `config_path` (or the default
/// location) and connect its servers.
///
/// A missing configuration file yields an empty hub. Servers that fail to
/// connect are logged and skipped.
pub async fn create_hub(config_path: Option<&Path>) -> Result<McpHub> {
    let hub = McpHub::with_rmcp();

    match resolve_config_path(config_path) {
        Some(path) if !path.exists() => {
            warn!(
                "MCP configuration file {} not found; starting with no servers",
                path.display()
            );
        }
        Some(path) => {
            info!("Loading MCP servers from {}", path.display());
            let config = McpJsonConfig::load(&path)?;
            hub.load_from_config(&config).await;
        }
        None => warn!("No MCP configuration file found; starting with no servers"),
    }

    Ok(hub)
}

/// Convenience function to create a fully configured MCP server.
pub async fn create_server(config_path: Option<&Path>) -> Result<HubServer> {
    let hub = create_hub(config_path).await?;
    Ok(HubServer::new(hub))
}
