//! [`DataProvider`] backed by a live ZooKeeper ensemble.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zookeeper_client as zk;

use crate::error::ProviderError;
use crate::node::NodePath;
use crate::provider::{ConnectionState, DataProvider, NodeData};

/// A ZooKeeper session opened lazily by the data worker.
///
/// Node payloads are decoded as UTF-8. Binary payloads are decoded lossily
/// and flagged so the viewer keeps them read-only. Writes are unconditional,
/// without a version check.
pub struct ZooKeeperProvider {
    connect_string: String,
    client: OnceCell<zk::Client>,
    state: Arc<AtomicU8>,
}

impl ZooKeeperProvider {
    pub fn new(connect_string: impl Into<String>) -> Self {
        Self {
            connect_string: connect_string.into(),
            client: OnceCell::new(),
            state: Arc::new(AtomicU8::new(encode_state(ConnectionState::Disconnected))),
        }
    }

    fn client(&self) -> Result<&zk::Client, ProviderError> {
        self.client.get().ok_or(ProviderError::Disconnected)
    }

    fn store_state(&self, state: ConnectionState) {
        self.state.store(encode_state(state), Ordering::SeqCst);
    }
}

#[async_trait]
impl DataProvider for ZooKeeperProvider {
    async fn connect(&self) -> Result<(), ProviderError> {
        if self.client.initialized() {
            return Ok(());
        }
        info!("Connecting to ZooKeeper at {}", self.connect_string);
        self.store_state(ConnectionState::Connecting);

        let client = match zk::Client::connect(&self.connect_string).await {
            Ok(client) => client,
            Err(e) => {
                self.store_state(ConnectionState::Disconnected);
                return Err(ProviderError::Other(format!(
                    "failed to connect to {}: {}",
                    self.connect_string, e
                )));
            }
        };
        self.store_state(ConnectionState::Connected);

        // Track session transitions for the edit gate
        let mut watcher = client.state_watcher();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            loop {
                let session_state = watcher.changed().await;
                let mapped = map_session_state(session_state);
                info!("ZooKeeper session is now {}", mapped);
                state.store(encode_state(mapped), Ordering::SeqCst);
                if matches!(mapped, ConnectionState::Expired | ConnectionState::Closed) {
                    break;
                }
            }
        });

        if self.client.set(client).is_err() {
            warn!("ZooKeeper client was already initialized");
        }
        Ok(())
    }

    async fn get_data(&self, path: &NodePath) -> Result<NodeData, ProviderError> {
        let client = self.client()?;
        let (data, _stat) = client
            .get_data(path.as_str())
            .await
            .map_err(|e| map_error(e, path))?;
        debug!("Read {} bytes from {}", data.len(), path);
        let data = NodeData::from_bytes(data);
        if data.binary {
            debug!("Payload of {} is not valid UTF-8", path);
        }
        Ok(data)
    }

    async fn set_data(&self, path: &NodePath, text: &str) -> Result<(), ProviderError> {
        let client = self.client()?;
        client
            .set_data(path.as_str(), text.as_bytes(), None)
            .await
            .map_err(|e| map_error(e, path))?;
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        decode_state(self.state.load(Ordering::SeqCst))
    }
}

fn map_error(err: zk::Error, path: &NodePath) -> ProviderError {
    match err {
        zk::Error::NoNode => ProviderError::NoNode(path.clone()),
        zk::Error::NoAuth => ProviderError::PermissionDenied(path.clone()),
        zk::Error::BadVersion => ProviderError::VersionConflict(path.clone()),
        zk::Error::ConnectionLoss | zk::Error::SessionExpired => ProviderError::Disconnected,
        other => ProviderError::Other(other.to_string()),
    }
}

fn map_session_state(state: zk::SessionState) -> ConnectionState {
    match state {
        zk::SessionState::SyncConnected => ConnectionState::Connected,
        zk::SessionState::ConnectedReadOnly => ConnectionState::ConnectedReadOnly,
        zk::SessionState::Expired => ConnectionState::Expired,
        zk::SessionState::Closed => ConnectionState::Closed,
        _ => ConnectionState::Disconnected,
    }
}

fn encode_state(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Connecting => 0,
        ConnectionState::Connected => 1,
        ConnectionState::ConnectedReadOnly => 2,
        ConnectionState::Disconnected => 3,
        ConnectionState::Expired => 4,
        ConnectionState::Closed => 5,
    }
}

fn decode_state(value: u8) -> ConnectionState {
    match value {
        0 => ConnectionState::Connecting,
        1 => ConnectionState::Connected,
        2 => ConnectionState::ConnectedReadOnly,
        4 => ConnectionState::Expired,
        5 => ConnectionState::Closed,
        _ => ConnectionState::Disconnected,
    }
}
