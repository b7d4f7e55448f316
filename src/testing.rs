//! In-memory backends for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::model::JsonObject;
use serde_json::{Value, json};
use tokio::sync::watch;

use crate::config::BackendDescriptor;
use crate::mcp_client::{BackendSession, Connector, SessionError, ToolDescriptor};

/// Scripted behaviour of one fake backend.
#[derive(Clone, Default)]
pub(crate) struct MockServer {
    tools: Vec<ToolDescriptor>,
    connect_error: Option<SessionError>,
    list_error: Option<SessionError>,
    close_error: Option<SessionError>,
    connect_delay: Option<Duration>,
    list_delay: Option<Duration>,
    hang_on_list: bool,
    hang_on_call: bool,
}

impl MockServer {
    pub(crate) fn with_tools(tools: &[(&str, &str)]) -> Self {
        let tools = tools
            .iter()
            .map(|(name, description)| ToolDescriptor {
                name: name.to_string(),
                description: (!description.is_empty()).then(|| description.to_string()),
                input_schema: json!({"type": "object"}).as_object().cloned().unwrap_or_default(),
                ..Default::default()
            })
            .collect();
        Self {
            tools,
            ..Default::default()
        }
    }

    pub(crate) fn connect_error(mut self, err: SessionError) -> Self {
        self.connect_error = Some(err);
        self
    }

    pub(crate) fn list_error(mut self, err: SessionError) -> Self {
        self.list_error = Some(err);
        self
    }

    pub(crate) fn close_error(mut self, err: SessionError) -> Self {
        self.close_error = Some(err);
        self
    }

    pub(crate) fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub(crate) fn list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Listing never completes until the session is closed.
    pub(crate) fn hang_on_list(mut self) -> Self {
        self.hang_on_list = true;
        self
    }

    /// Calls never complete until the session is closed.
    pub(crate) fn hang_on_call(mut self) -> Self {
        self.hang_on_call = true;
        self
    }
}

pub(crate) struct MockSession {
    server: MockServer,
    closed: watch::Sender<bool>,
    close_count: AtomicUsize,
    calls: Mutex<Vec<(String, JsonObject)>>,
}

impl MockSession {
    pub(crate) fn new(server: MockServer) -> Self {
        Self {
            server,
            closed: watch::Sender::new(false),
            close_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<(String, JsonObject)> {
        self.calls.lock().clone()
    }

    fn check_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            Err(SessionError::Transport("session closed".into()))
        } else {
            Ok(())
        }
    }

    async fn wait_closed<T>(&self) -> Result<T, SessionError> {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
        Err(SessionError::Transport("session closed".into()))
    }
}

#[async_trait]
impl BackendSession for MockSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        self.check_open()?;
        if self.server.hang_on_list {
            return self.wait_closed().await;
        }
        if let Some(delay) = self.server.list_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.server.list_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.server.tools.clone()),
        }
    }

    async fn call_tool(&self, tool_name: &str, args: JsonObject) -> Result<Value, SessionError> {
        self.check_open()?;
        self.calls.lock().push((tool_name.to_string(), args.clone()));
        if self.server.hang_on_call {
            return self.wait_closed().await;
        }
        if self.server.tools.iter().any(|t| t.name == tool_name) {
            Ok(json!({
                "content": [{"type": "text", "text": format!("{} ok", tool_name)}],
                "arguments": args,
            }))
        } else {
            Err(SessionError::Protocol(format!("Unknown tool: {}", tool_name)))
        }
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.closed.send_replace(true);
        match &self.server.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Connector resolving stdio commands to scripted backends.
#[derive(Default)]
pub(crate) struct MockConnector {
    servers: Mutex<HashMap<String, MockServer>>,
    sessions: Mutex<HashMap<String, Arc<MockSession>>>,
    establish_count: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_server(self, command: &str, server: MockServer) -> Self {
        self.servers.lock().insert(command.to_string(), server);
        self
    }

    /// The most recent session established for `command`.
    pub(crate) fn session(&self, command: &str) -> Option<Arc<MockSession>> {
        self.sessions.lock().get(command).cloned()
    }

    pub(crate) fn establish_count(&self) -> usize {
        self.establish_count.load(Ordering::SeqCst)
    }

    pub(crate) fn descriptor(command: &str) -> BackendDescriptor {
        BackendDescriptor::stdio(command, Vec::<String>::new())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn establish(
        &self,
        _name: &str,
        descriptor: &BackendDescriptor,
    ) -> Result<Arc<dyn BackendSession>, SessionError> {
        self.establish_count.fetch_add(1, Ordering::SeqCst);

        let command = match descriptor {
            BackendDescriptor::Stdio { command, .. } => command.clone(),
            BackendDescriptor::Http { url, .. } => {
                return Err(SessionError::Transport(format!("connection refused: {}", url)));
            }
        };

        let server = self.servers.lock().get(&command).cloned().ok_or_else(|| {
            SessionError::Transport(format!("failed to spawn `{}`: not found", command))
        })?;

        if let Some(delay) = server.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &server.connect_error {
            return Err(err.clone());
        }

        let session = Arc::new(MockSession::new(server));
        self.sessions.lock().insert(command, session.clone());
        Ok(session)
    }
}
