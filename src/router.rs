//! Forwarding of tool invocations to the owning backend.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{HubError, HubResult};
use crate::registry::ConnectionRegistry;

/// Routes a call to exactly one registered backend.
///
/// Calls are never retried. Tool names are not checked against the catalog
/// first; the backend is the authority on what it serves.
#[derive(Clone)]
pub struct CallRouter {
    registry: Arc<ConnectionRegistry>,
}

impl CallRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Invoke `tool_name` on `name` and return the backend's raw result.
    ///
    /// A result the backend flags as a tool error is still a success here.
    /// Only failures of the request itself become `InvocationFailed`.
    pub async fn invoke(&self, name: &str, tool_name: &str, args: JsonObject) -> HubResult<Value> {
        let connection = self.registry.lookup(name)?;

        debug!("Calling tool '{}' on server '{}'", tool_name, name);
        match connection.call_tool(tool_name, args).await {
            Ok(result) => Ok(result),
            Err(cause) => {
                warn!("Tool '{}' on server '{}' failed: {}", tool_name, name, cause);
                self.registry.evict_if_failed(&connection, &cause).await;
                Err(HubError::InvocationFailed {
                    name: name.to_string(),
                    tool_name: tool_name.to_string(),
                    cause,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp_client::{BackendSession, SessionError};
    use crate::testing::{MockConnector, MockServer};
    use serde_json::json;

    async fn router() -> (CallRouter, Arc<ConnectionRegistry>, Arc<MockConnector>) {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("calc", MockServer::with_tools(&[("add", "Add two numbers")])),
        );
        let registry = Arc::new(ConnectionRegistry::new(connector.clone()));
        registry.connect("calc", MockConnector::descriptor("calc")).await.unwrap();
        (CallRouter::new(registry.clone()), registry, connector)
    }

    fn args(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_invoke_forwards_arguments_verbatim() {
        let (router, _, connector) = router().await;
        let arguments = args(json!({"a": 2, "b": 3, "nested": {"k": [1, null]}}));

        let result = router.invoke("calc", "add", arguments.clone()).await.unwrap();
        assert_eq!(result["content"][0]["text"], "add ok");
        assert_eq!(result["arguments"], Value::Object(arguments.clone()));

        let calls = connector.session("calc").unwrap().calls();
        assert_eq!(calls, vec![("add".to_string(), arguments)]);
    }

    #[tokio::test]
    async fn test_unknown_tool_keeps_registry_unchanged() {
        let (router, registry, _) = router().await;

        let err = router.invoke("calc", "divide", JsonObject::new()).await.unwrap_err();
        match err {
            HubError::InvocationFailed { name, tool_name, cause } => {
                assert_eq!(name, "calc");
                assert_eq!(tool_name, "divide");
                assert_eq!(cause, SessionError::Protocol("Unknown tool: divide".into()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(registry.list_names(), vec!["calc"]);
    }

    #[tokio::test]
    async fn test_invoke_unknown_server() {
        let (router, _, connector) = router().await;
        let err = router.invoke("files", "read", JsonObject::new()).await.unwrap_err();
        assert!(matches!(err, HubError::NotConnected(ref n) if n == "files"));
        assert!(connector.session("calc").unwrap().calls().is_empty());
    }

    #[tokio::test]
    async fn test_dead_transport_evicts_server() {
        let (router, registry, connector) = router().await;
        connector.session("calc").unwrap().close().await.unwrap();

        let err = router.invoke("calc", "add", JsonObject::new()).await.unwrap_err();
        assert!(err.session_cause().is_some_and(SessionError::is_transport));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_all_fails_in_flight_invoke() {
        let connector = Arc::new(MockConnector::new().with_server(
            "calc",
            MockServer::with_tools(&[("add", "Add two numbers")]).hang_on_call(),
        ));
        let registry = Arc::new(ConnectionRegistry::new(connector.clone()));
        registry.connect("calc", MockConnector::descriptor("calc")).await.unwrap();
        let router = CallRouter::new(registry.clone());

        let pending = tokio::spawn(async move {
            router.invoke("calc", "add", args(json!({"a": 1}))).await
        });
        while connector.session("calc").unwrap().calls().is_empty() {
            tokio::task::yield_now().await;
        }

        assert!(registry.disconnect_all().await.is_empty());
        let err = tokio::time::timeout(std::time::Duration::from_secs(5), pending)
            .await
            .expect("invoke still pending after disconnect_all")
            .unwrap()
            .unwrap_err();
        match err {
            HubError::InvocationFailed { name, cause, .. } => {
                assert_eq!(name, "calc");
                assert!(cause.is_transport());
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(registry.is_empty());
    }
}
