//! Live tool catalogs.
//!
//! Catalogs are fetched from the backend on every call. Backends may change
//! their tool set at any time, so nothing here is cached.

use tracing::debug;

use super::ConnectionRegistry;
use crate::error::{HubError, HubResult};
use crate::mcp_client::ToolDescriptor;

impl ConnectionRegistry {
    /// Fetch the current tool list of `name`.
    pub async fn fetch_catalog(&self, name: &str) -> HubResult<Vec<ToolDescriptor>> {
        let connection = self.lookup(name)?;

        debug!("Listing tools of server '{}'", name);
        match connection.list_tools().await {
            Ok(tools) => {
                debug!("Server '{}' reported {} tool(s)", name, tools.len());
                Ok(tools)
            }
            Err(cause) => {
                self.evict_if_failed(&connection, &cause).await;
                Err(HubError::CatalogUnavailable {
                    name: name.to_string(),
                    cause,
                })
            }
        }
    }
}
