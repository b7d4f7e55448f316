//! Connection registry: the single source of truth for which backends are
//! currently reachable.
//!
//! The map lock is only held to read or edit the map, never across a
//! handshake, listing or call, so traffic to unrelated backends never
//! waits on each other. A name being connected is held by a reservation,
//! which makes a second concurrent `connect` for the same name fail with
//! `AlreadyConnected` while the first handshake is still running.

mod catalog;
mod connection;

pub use connection::{BackendConnection, ConnectionState};

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::BackendDescriptor;
use crate::error::{HubError, HubResult};
use crate::mcp_client::{Connector, SessionError};

enum Slot {
    /// Handshake in progress; not yet visible to queries.
    Connecting,
    Connected(Arc<BackendConnection>),
}

/// Owns every live backend connection, keyed by server name.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    entries: RwLock<HashMap<String, Slot>>,
}

/// Holds a name in `Connecting` until committed; released on drop.
struct Reservation<'a> {
    registry: &'a ConnectionRegistry,
    name: String,
    committed: bool,
}

impl Reservation<'_> {
    fn commit(mut self, connection: Arc<BackendConnection>) {
        self.registry
            .entries
            .write()
            .insert(self.name.clone(), Slot::Connected(connection));
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut entries = self.registry.entries.write();
        if matches!(entries.get(&self.name), Some(Slot::Connecting)) {
            entries.remove(&self.name);
        }
    }
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Establish a connection and register it under `name`.
    ///
    /// On failure the name stays unregistered.
    pub async fn connect(&self, name: &str, descriptor: BackendDescriptor) -> HubResult<()> {
        let reservation = self.reserve(name)?;

        info!("Connecting to server '{}' ({})", name, descriptor.target());
        match self.connector.establish(name, &descriptor).await {
            Ok(session) => {
                let connection = BackendConnection::new(name.to_string(), descriptor, session);
                reservation.commit(Arc::new(connection));
                info!("Connected to server '{}'", name);
                Ok(())
            }
            Err(cause) => {
                drop(reservation);
                warn!("Failed to connect to server '{}': {}", name, cause);
                Err(HubError::ConnectionFailed {
                    name: name.to_string(),
                    cause,
                })
            }
        }
    }

    fn reserve(&self, name: &str) -> HubResult<Reservation<'_>> {
        let mut entries = self.entries.write();
        if entries.contains_key(name) {
            return Err(HubError::AlreadyConnected(name.to_string()));
        }
        entries.insert(name.to_string(), Slot::Connecting);
        Ok(Reservation {
            registry: self,
            name: name.to_string(),
            committed: false,
        })
    }

    /// Close and remove `name`.
    ///
    /// The entry is removed before the close handshake runs, so a backend
    /// that fails to close is still gone afterwards and its error is
    /// reported as `CloseFailed`.
    pub async fn disconnect(&self, name: &str) -> HubResult<()> {
        let connection = {
            let mut entries = self.entries.write();
            match entries.remove(name) {
                Some(Slot::Connected(conn)) => conn,
                Some(Slot::Connecting) => {
                    entries.insert(name.to_string(), Slot::Connecting);
                    return Err(HubError::NotConnected(name.to_string()));
                }
                None => return Err(HubError::NotConnected(name.to_string())),
            }
        };

        info!("Disconnecting from server '{}'", name);
        close_connection(&connection).await
    }

    /// Disconnect every registered server, continuing past failures.
    ///
    /// Every entry is removed before any close runs. Close failures are
    /// logged and returned.
    pub async fn disconnect_all(&self) -> Vec<HubError> {
        let drained: Vec<Arc<BackendConnection>> = {
            let mut entries = self.entries.write();
            let names: Vec<String> = entries
                .iter()
                .filter(|(_, slot)| matches!(slot, Slot::Connected(_)))
                .map(|(name, _)| name.clone())
                .collect();
            names
                .iter()
                .filter_map(|name| match entries.remove(name) {
                    Some(Slot::Connected(conn)) => Some(conn),
                    _ => None,
                })
                .collect()
        };

        if drained.is_empty() {
            return Vec::new();
        }

        info!("Disconnecting from {} server(s)", drained.len());
        join_all(drained.iter().map(|conn| close_connection(conn)))
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect()
    }

    /// Snapshot of registered names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Connected(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Resolve `name` to its connection for the duration of one operation.
    pub fn lookup(&self, name: &str) -> HubResult<Arc<BackendConnection>> {
        match self.entries.read().get(name) {
            Some(Slot::Connected(conn)) => Ok(conn.clone()),
            _ => Err(HubError::NotConnected(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// State of `name`, including a handshake still in progress.
    pub fn state(&self, name: &str) -> Option<ConnectionState> {
        match self.entries.read().get(name)? {
            Slot::Connecting => Some(ConnectionState::Connecting),
            Slot::Connected(conn) => Some(conn.state()),
        }
    }

    pub fn len(&self) -> usize {
        self.list_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop `connection` from the registry after a transport failure.
    ///
    /// Only removes the entry if it still refers to this exact connection.
    pub(crate) async fn evict_if_failed(
        &self,
        connection: &Arc<BackendConnection>,
        cause: &SessionError,
    ) {
        if !cause.is_transport() || connection.state() != ConnectionState::Failed {
            return;
        }

        let removed = {
            let mut entries = self.entries.write();
            let same = matches!(
                entries.get(connection.name()),
                Some(Slot::Connected(current)) if Arc::ptr_eq(current, connection)
            );
            if same {
                entries.remove(connection.name());
            }
            same
        };

        if removed {
            warn!(
                "Removed server '{}' from registry after transport failure",
                connection.name()
            );
            if let Err(e) = connection.close().await {
                warn!("Failed to release server '{}': {}", connection.name(), e);
            }
        }
    }
}

async fn close_connection(connection: &BackendConnection) -> HubResult<()> {
    connection.close().await.map_err(|cause| {
        warn!(
            "Failed to disconnect from server '{}': {}",
            connection.name(),
            cause
        );
        HubError::CloseFailed {
            name: connection.name().to_string(),
            cause,
        }
    })
}
