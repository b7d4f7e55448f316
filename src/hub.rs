//! The hub facade: one object owning the registry and the services built on
//! top of it.

use std::sync::Arc;

use futures::future::join_all;
use rmcp::model::JsonObject;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{BackendDescriptor, McpJsonConfig};
use crate::discovery::{DiscoveryEngine, SearchScope, ServerCatalogs};
use crate::error::{HubError, HubResult};
use crate::mcp_client::{Connector, RmcpConnector, ToolDescriptor};
use crate::registry::ConnectionRegistry;
use crate::router::CallRouter;

/// Aggregates many backend tool servers behind one entry point.
#[derive(Clone)]
pub struct McpHub {
    registry: Arc<ConnectionRegistry>,
    discovery: DiscoveryEngine,
    router: CallRouter,
}

impl McpHub {
    /// Create an empty hub that establishes sessions through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(connector));
        Self {
            discovery: DiscoveryEngine::new(registry.clone()),
            router: CallRouter::new(registry.clone()),
            registry,
        }
    }

    /// Create an empty hub backed by real rmcp sessions.
    pub fn with_rmcp() -> Self {
        Self::new(Arc::new(RmcpConnector))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Connect every enabled server in `config` that is not registered yet.
    ///
    /// Servers are connected concurrently. A failing server never stops the
    /// others; its error is logged and returned alongside its name.
    pub async fn load_from_config(&self, config: &McpJsonConfig) -> Vec<(String, HubError)> {
        let pending = config.descriptors().into_iter().filter_map(|(name, descriptor)| {
            if self.registry.contains(&name) {
                debug!("Server '{}' already registered, skipping", name);
                return None;
            }
            Some(async move {
                let result = match descriptor {
                    Ok(descriptor) => self.registry.connect(&name, descriptor).await,
                    Err(e) => Err(e),
                };
                (name, result)
            })
        });

        let mut failures = Vec::new();
        let mut connected = 0;
        for (name, result) in join_all(pending).await {
            match result {
                Ok(()) => connected += 1,
                Err(e) => {
                    warn!("Skipping server '{}': {}", name, e);
                    failures.push((name, e));
                }
            }
        }

        info!(
            "Loaded {} server(s) from config, {} failed",
            connected,
            failures.len()
        );
        failures
    }

    pub async fn connect(&self, name: &str, descriptor: BackendDescriptor) -> HubResult<()> {
        self.registry.connect(name, descriptor).await
    }

    pub async fn disconnect(&self, name: &str) -> HubResult<()> {
        self.registry.disconnect(name).await
    }

    /// Disconnect everything; returns the close failures that were skipped.
    pub async fn disconnect_all(&self) -> Vec<HubError> {
        self.registry.disconnect_all().await
    }

    pub fn list_names(&self) -> Vec<String> {
        self.registry.list_names()
    }

    pub async fn list_all(&self) -> ServerCatalogs {
        self.discovery.list_all().await
    }

    pub async fn list_in_server(&self, name: &str) -> HubResult<Vec<ToolDescriptor>> {
        self.discovery.list_in_server(name).await
    }

    pub async fn find(
        &self,
        pattern: &str,
        scope: SearchScope,
        case_sensitive: bool,
    ) -> HubResult<ServerCatalogs> {
        self.discovery.find(pattern, scope, case_sensitive).await
    }

    pub async fn find_in_server(
        &self,
        name: &str,
        pattern: &str,
        scope: SearchScope,
        case_sensitive: bool,
    ) -> HubResult<Vec<ToolDescriptor>> {
        self.discovery
            .find_in_server(name, pattern, scope, case_sensitive)
            .await
    }

    pub async fn get_tool(&self, name: &str, tool_name: &str) -> HubResult<ToolDescriptor> {
        self.discovery.get_tool(name, tool_name).await
    }

    pub async fn invoke(&self, name: &str, tool_name: &str, args: JsonObject) -> HubResult<Value> {
        self.router.invoke(name, tool_name, args).await
    }
}
