//! A single logical link to one backend.

use std::sync::Arc;

use parking_lot::Mutex;
use rmcp::model::JsonObject;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::BackendDescriptor;
use crate::mcp_client::{BackendSession, SessionError, ToolDescriptor};

/// Lifecycle of a backend connection.
///
/// `Closed` and `Failed` are terminal; a name must be removed and
/// re-added to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Closing,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }
}

/// Owns exactly one live session. Only the registry holds these long-term.
pub struct BackendConnection {
    name: String,
    descriptor: BackendDescriptor,
    session: Arc<dyn BackendSession>,
    state: Mutex<ConnectionState>,
}

impl BackendConnection {
    pub(crate) fn new(
        name: String,
        descriptor: BackendDescriptor,
        session: Arc<dyn BackendSession>,
    ) -> Self {
        Self {
            name,
            descriptor,
            session,
            state: Mutex::new(ConnectionState::Connected),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        self.ensure_open()?;
        let result = self.session.list_tools().await;
        self.observe(&result);
        result
    }

    pub(crate) async fn call_tool(
        &self,
        tool_name: &str,
        args: JsonObject,
    ) -> Result<Value, SessionError> {
        self.ensure_open()?;
        let result = self.session.call_tool(tool_name, args).await;
        self.observe(&result);
        result
    }

    /// Close the session. The connection ends `Closed` even when the
    /// backend's close handshake errors.
    pub(crate) async fn close(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed || *state == ConnectionState::Closing {
                return Ok(());
            }
            *state = ConnectionState::Closing;
        }

        let result = self.session.close().await;
        *self.state.lock() = ConnectionState::Closed;
        result
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            state => Err(SessionError::Transport(format!(
                "connection to '{}' is {:?}",
                self.name, state
            ))),
        }
    }

    fn observe<T>(&self, result: &Result<T, SessionError>) {
        let Err(err) = result else { return };
        if !err.is_transport() {
            return;
        }

        let mut state = self.state.lock();
        if *state == ConnectionState::Connected {
            warn!("Connection to server '{}' failed: {}", self.name, err);
            *state = ConnectionState::Failed;
        }
    }
}

impl std::fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConnection")
            .field("name", &self.name)
            .field("target", &self.descriptor.target())
            .field("state", &self.state())
            .finish()
    }
}
