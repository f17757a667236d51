//! The store seen from the viewer: read, write and connection state.
//!
//! Implementations may block and may fail; the viewer only ever calls
//! `get_data`/`set_data` from its background worker.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ProviderError;
use crate::node::NodePath;

/// Session state of the underlying store client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Connected,
    ConnectedReadOnly,
    Disconnected,
    Expired,
    Closed,
}

impl ConnectionState {
    /// Only a fully connected session allows edits.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn text(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::ConnectedReadOnly => "Connected (read-only)",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Expired => "Session expired",
            ConnectionState::Closed => "Closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// A node payload as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub text: String,
    /// The stored bytes were not valid UTF-8 and `text` is a lossy decoding
    pub binary: bool,
}

impl NodeData {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            binary: false,
        }
    }

    /// Decodes raw bytes, replacing invalid sequences with U+FFFD.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::text(text),
            Err(e) => Self {
                text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                binary: true,
            },
        }
    }
}

/// Read/write access to node payloads.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Establishes the session. Called once by the worker before it serves
    /// any command.
    async fn connect(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Reads the payload of `path`.
    async fn get_data(&self, path: &NodePath) -> Result<NodeData, ProviderError>;

    /// Overwrites the payload of `path`.
    async fn set_data(&self, path: &NodePath, text: &str) -> Result<(), ProviderError>;

    /// Current session state; must not block.
    fn connection_state(&self) -> ConnectionState;
}

/// A provider backed by a map, used for demos and tests.
#[derive(Debug)]
pub struct InMemoryProvider {
    nodes: RwLock<BTreeMap<NodePath, Vec<u8>>>,
    state: RwLock<ConnectionState>,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    /// Creates an empty, connected store.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            state: RwLock::new(ConnectionState::Connected),
        }
    }

    /// Builder-style insert.
    pub fn with_node(self, path: NodePath, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&self, path: NodePath, text: impl Into<String>) {
        self.insert_bytes(path, text.into().into_bytes());
    }

    /// Stores a raw payload, which need not be UTF-8.
    pub fn insert_bytes(&self, path: NodePath, bytes: Vec<u8>) {
        if let Ok(mut nodes) = self.nodes.write() {
            nodes.insert(path, bytes);
        }
    }

    pub fn remove(&self, path: &NodePath) -> Option<Vec<u8>> {
        self.nodes.write().ok().and_then(|mut nodes| nodes.remove(path))
    }

    /// Direct read that bypasses connection checks; lossy for binary payloads.
    pub fn peek(&self, path: &NodePath) -> Option<String> {
        self.peek_bytes(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn peek_bytes(&self, path: &NodePath) -> Option<Vec<u8>> {
        self.nodes.read().ok().and_then(|nodes| nodes.get(path).cloned())
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        if let Ok(mut current) = self.state.write() {
            *current = state;
        }
    }

    fn ensure_readable(&self) -> Result<(), ProviderError> {
        match self.connection_state() {
            ConnectionState::Connected | ConnectionState::ConnectedReadOnly => Ok(()),
            _ => Err(ProviderError::Disconnected),
        }
    }
}

#[async_trait]
impl DataProvider for InMemoryProvider {
    async fn get_data(&self, path: &NodePath) -> Result<NodeData, ProviderError> {
        self.ensure_readable()?;
        debug!("In-memory read of {}", path);
        self.peek_bytes(path)
            .map(NodeData::from_bytes)
            .ok_or_else(|| ProviderError::NoNode(path.clone()))
    }

    async fn set_data(&self, path: &NodePath, text: &str) -> Result<(), ProviderError> {
        if !self.connection_state().is_connected() {
            return Err(ProviderError::Disconnected);
        }
        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| ProviderError::Other(e.to_string()))?;
        match nodes.get_mut(path) {
            Some(existing) => {
                debug!("In-memory write of {} ({} bytes)", path, text.len());
                *existing = text.as_bytes().to_vec();
                Ok(())
            }
            None => Err(ProviderError::NoNode(path.clone())),
        }
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
            .read()
            .map(|state| *state)
            .unwrap_or(ConnectionState::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> NodePath {
        NodePath::new(p).unwrap()
    }

    #[tokio::test]
    async fn reads_and_writes_existing_nodes() {
        let provider = InMemoryProvider::new().with_node(path("/a"), "one");
        assert_eq!(provider.get_data(&path("/a")).await.unwrap(), NodeData::text("one"));
        provider.set_data(&path("/a"), "two").await.unwrap();
        assert_eq!(provider.peek(&path("/a")).as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn missing_node_is_reported() {
        let provider = InMemoryProvider::new();
        assert_eq!(
            provider.get_data(&path("/gone")).await,
            Err(ProviderError::NoNode(path("/gone")))
        );
        assert_eq!(
            provider.set_data(&path("/gone"), "x").await,
            Err(ProviderError::NoNode(path("/gone")))
        );
    }

    #[tokio::test]
    async fn disconnected_store_refuses_calls() {
        let provider = InMemoryProvider::new().with_node(path("/a"), "one");
        provider.set_connection_state(ConnectionState::Disconnected);
        assert_eq!(provider.get_data(&path("/a")).await, Err(ProviderError::Disconnected));
        assert_eq!(provider.set_data(&path("/a"), "x").await, Err(ProviderError::Disconnected));
    }

    #[tokio::test]
    async fn read_only_session_can_read_but_not_write() {
        let provider = InMemoryProvider::new().with_node(path("/a"), "one");
        provider.set_connection_state(ConnectionState::ConnectedReadOnly);
        assert!(provider.get_data(&path("/a")).await.is_ok());
        assert!(provider.set_data(&path("/a"), "x").await.is_err());
        assert!(!provider.connection_state().is_connected());
    }

    #[tokio::test]
    async fn invalid_utf8_is_flagged_as_binary() {
        let provider = InMemoryProvider::new();
        provider.insert_bytes(path("/bin"), vec![b'o', b'k', 0xff, 0xfe]);
        let data = provider.get_data(&path("/bin")).await.unwrap();
        assert!(data.binary);
        assert_eq!(data.text, "ok\u{fffd}\u{fffd}");
    }

    #[test]
    fn valid_utf8_is_text() {
        let data = NodeData::from_bytes("größe".as_bytes().to_vec());
        assert_eq!(data, NodeData::text("größe"));
    }
}
