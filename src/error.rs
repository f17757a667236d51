//! Error types for the node data viewer.
//!
//! Provider failures are surfaced to the user; format failures never are,
//! the viewer just falls back to the raw text.

use std::time::Duration;

use thiserror::Error;

use crate::controller::ViewerPhase;
use crate::node::NodePath;

/// Failures reported by a [`crate::provider::DataProvider`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The store session is not connected
    #[error("not connected to the store")]
    Disconnected,

    /// The node vanished or never existed
    #[error("node does not exist: {0}")]
    NoNode(NodePath),

    /// The session lacks the ACL rights for the operation
    #[error("permission denied for node: {0}")]
    PermissionDenied(NodePath),

    /// The store rejected a write because of a version mismatch
    #[error("version conflict on node: {0}")]
    VersionConflict(NodePath),

    /// The call did not complete within the configured request timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Anything else the client library reported
    #[error("{0}")]
    Other(String),
}

/// Errors raised by [`crate::controller::ViewerController`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewerError {
    /// Reading node data failed
    #[error("error retrieving data for node {path}: {source}")]
    Fetch {
        path: NodePath,
        #[source]
        source: ProviderError,
    },

    /// Writing node data failed
    #[error("error saving data for node {path}: {source}")]
    Save {
        path: NodePath,
        #[source]
        source: ProviderError,
    },

    /// Edit mode requires a connected session
    #[error("edit mode is only available while connected")]
    NotConnected,

    /// The payload is not UTF-8; writing the decoded text back would corrupt it
    #[error("node {0} holds binary data and cannot be edited as text")]
    BinaryPayload(NodePath),

    /// The operation needs a selected node
    #[error("no node selected")]
    NoSelection,

    /// The operation is not valid in the current phase
    #[error("cannot {action} while {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: ViewerPhase,
    },

    /// A save is already in flight for this viewer
    #[error("a save is already in progress")]
    SaveInFlight,

    /// `confirm_save` was called without a prior `request_save`
    #[error("no save is awaiting confirmation")]
    NoPendingConfirmation,

    /// The background worker has gone away
    #[error("data worker is not running")]
    WorkerUnavailable,
}

/// The payload is not parseable as structured data.
#[derive(Debug, Error)]
#[error("payload is not valid JSON: {0}")]
pub struct FormatError(#[from] pub serde_json::Error);

/// Rejected node path strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("node path is empty")]
    Empty,

    #[error("node path must start with '/': {0}")]
    NotAbsolute(String),

    #[error("node path must not end with '/': {0}")]
    TrailingSlash(String),

    #[error("node path contains an empty segment: {0}")]
    EmptySegment(String),

    #[error("node path contains a relative segment: {0}")]
    RelativeSegment(String),

    #[error("node path contains a NUL character")]
    NulCharacter,
}

/// Failures loading a [`crate::config::ViewerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
