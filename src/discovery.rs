//! Discovery over live tool catalogs: full listings and pattern search.
//!
//! Aggregate operations query every registered backend concurrently and
//! report failures per server. A single unreachable backend never fails the
//! whole request, and it is never silently dropped from the result.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{HubError, HubResult};
use crate::mcp_client::{SessionError, ToolDescriptor};
use crate::registry::ConnectionRegistry;

/// Per-server catalogs, or the reason a server's catalog is missing.
pub type ServerCatalogs = BTreeMap<String, HubResult<Vec<ToolDescriptor>>>;

/// Which tool fields a search pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Name,
    Description,
    #[default]
    Both,
}

impl FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SearchScope::Name),
            "description" => Ok(SearchScope::Description),
            "both" => Ok(SearchScope::Both),
            other => Err(format!(
                "invalid search scope '{}' (expected name, description or both)",
                other
            )),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchScope::Name => "name",
            SearchScope::Description => "description",
            SearchScope::Both => "both",
        })
    }
}

/// A compiled search, reusable across every catalog of one request.
#[derive(Debug, Clone)]
pub struct ToolMatcher {
    regex: Regex,
    scope: SearchScope,
}

impl ToolMatcher {
    /// Compile `pattern`. Malformed patterns are rejected, never treated as
    /// literal text.
    pub fn new(pattern: &str, scope: SearchScope, case_sensitive: bool) -> HubResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|source| HubError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self { regex, scope })
    }

    /// Tools without a description never match on the description field.
    pub fn matches(&self, tool: &ToolDescriptor) -> bool {
        let on_name = || self.regex.is_match(&tool.name);
        let on_description = || {
            tool.description
                .as_deref()
                .is_some_and(|d| self.regex.is_match(d))
        };

        match self.scope {
            SearchScope::Name => on_name(),
            SearchScope::Description => on_description(),
            SearchScope::Both => on_name() || on_description(),
        }
    }

    /// Keep matching tools in their original order.
    pub fn filter(&self, tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
        tools.into_iter().filter(|t| self.matches(t)).collect()
    }
}

/// Listing and search across the registry's backends.
#[derive(Clone)]
pub struct DiscoveryEngine {
    registry: Arc<ConnectionRegistry>,
}

impl DiscoveryEngine {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Catalog of every registered server.
    pub async fn list_all(&self) -> ServerCatalogs {
        self.collect_catalogs().await
    }

    /// Catalog of one server; its failure is returned as is.
    pub async fn list_in_server(&self, name: &str) -> HubResult<Vec<ToolDescriptor>> {
        self.registry.fetch_catalog(name).await
    }

    /// Search every registered server.
    ///
    /// Fails only on an invalid pattern, before any backend is contacted.
    /// Servers with no matches map to an empty list.
    pub async fn find(
        &self,
        pattern: &str,
        scope: SearchScope,
        case_sensitive: bool,
    ) -> HubResult<ServerCatalogs> {
        let matcher = ToolMatcher::new(pattern, scope, case_sensitive)?;

        Ok(self
            .collect_catalogs()
            .await
            .into_iter()
            .map(|(name, catalog)| (name, catalog.map(|tools| matcher.filter(tools))))
            .collect())
    }

    /// Search one server.
    pub async fn find_in_server(
        &self,
        name: &str,
        pattern: &str,
        scope: SearchScope,
        case_sensitive: bool,
    ) -> HubResult<Vec<ToolDescriptor>> {
        let matcher = ToolMatcher::new(pattern, scope, case_sensitive)?;
        let tools = self.registry.fetch_catalog(name).await?;
        Ok(matcher.filter(tools))
    }

    /// The full descriptor of `tool_name` on `name`, including its schema.
    pub async fn get_tool(&self, name: &str, tool_name: &str) -> HubResult<ToolDescriptor> {
        self.registry
            .fetch_catalog(name)
            .await?
            .into_iter()
            .find(|tool| tool.name == tool_name)
            .ok_or_else(|| HubError::ToolNotFound {
                name: name.to_string(),
                tool_name: tool_name.to_string(),
            })
    }

    /// Fetch every catalog on its own task and join them.
    async fn collect_catalogs(&self) -> ServerCatalogs {
        let fetches = self.registry.list_names().into_iter().map(|name| {
            let registry = Arc::clone(&self.registry);
            let task_name = name.clone();
            let handle =
                tokio::spawn(async move { registry.fetch_catalog(&task_name).await });
            async move { (name, handle.await) }
        });

        join_all(fetches)
            .await
            .into_iter()
            .map(|(name, joined)| {
                let catalog = joined.unwrap_or_else(|e| {
                    Err(HubError::CatalogUnavailable {
                        name: name.clone(),
                        cause: SessionError::Protocol(format!("catalog task failed: {}", e)),
                    })
                });
                if let Err(e) = &catalog {
                    warn!("{}", e);
                }
                (name, catalog)
            })
            .collect()
    }
}
