//! ZooInspector - browse and edit the data held in ZooKeeper znodes.
//!
//! The library holds everything below the window: the node data viewer's
//! state machine ([`ViewerController`]), the background worker that talks
//! to the store, the JSON format/unformat transforms and the case-insensitive
//! highlight engine. The `zooinspector` binary renders it with egui.

pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod highlight;
pub mod node;
pub mod provider;
pub mod worker;
#[cfg(feature = "zookeeper")]
pub mod zookeeper;

pub use config::{FormatTogglePolicy, ViewerConfig};
pub use controller::{
    Alert, AlertLevel, DisplayState, NodePayload, PayloadOrigin, SavePrompt, ViewerController,
    ViewerKey, ViewerPhase,
};
pub use error::{ConfigError, FormatError, PathError, ProviderError, ViewerError};
pub use highlight::{find_matches, MatchSpan, Matches};
pub use node::NodePath;
pub use provider::{ConnectionState, DataProvider, InMemoryProvider, NodeData};
#[cfg(feature = "zookeeper")]
pub use zookeeper::ZooKeeperProvider;
