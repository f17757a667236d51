//! Shared fixtures for the viewer integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use zooinspector::{
    ConnectionState, DataProvider, InMemoryProvider, NodeData, NodePath, ProviderError,
    ViewerConfig, ViewerController, ViewerPhase,
};

pub fn path(raw: &str) -> NodePath {
    NodePath::new(raw).unwrap()
}

pub fn test_config() -> ViewerConfig {
    ViewerConfig {
        request_timeout_ms: 2_000,
        worker_poll_interval_ms: 10,
        ..ViewerConfig::default()
    }
}

/// Pumps worker events into the viewer until `done` holds.
pub fn wait_until(
    viewer: &mut ViewerController,
    what: &str,
    done: impl Fn(&ViewerController) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(viewer) {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        viewer.wait_for_event(Duration::from_millis(20));
    }
}

/// Waits until no fetch or save is outstanding.
pub fn settle(viewer: &mut ViewerController) {
    wait_until(viewer, "viewer to settle", |v| {
        v.phase() != ViewerPhase::Loading && !v.is_saving()
    });
}

/// Selects `node` and waits for its data to be displayed.
pub fn open(viewer: &mut ViewerController, node: &NodePath) {
    viewer.select_node(node.clone()).unwrap();
    settle(viewer);
    assert_eq!(viewer.selected(), Some(node));
}

/// An in-memory store whose reads and writes can be held back per test.
///
/// Reads of a gated path block until the gate is opened; writes block on the
/// write gate when one is installed. Reads that get past their gate are
/// recorded.
pub struct GatedProvider {
    inner: InMemoryProvider,
    read_gates: Mutex<HashMap<NodePath, Arc<Semaphore>>>,
    write_gate: Mutex<Option<Arc<Semaphore>>>,
    reads: Mutex<Vec<NodePath>>,
}

impl GatedProvider {
    pub fn new(inner: InMemoryProvider) -> Self {
        Self {
            inner,
            read_gates: Mutex::new(HashMap::new()),
            write_gate: Mutex::new(None),
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Holds every read of `path` until a permit is added to the gate.
    pub fn gate_reads(&self, path: &NodePath) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.read_gates
            .lock()
            .unwrap()
            .insert(path.clone(), Arc::clone(&gate));
        gate
    }

    pub fn gate_writes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.write_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// How many reads of `path` reached the store.
    pub fn reads_of(&self, path: &NodePath) -> usize {
        self.reads.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    pub fn store(&self) -> &InMemoryProvider {
        &self.inner
    }
}

async fn pass(gate: Option<Arc<Semaphore>>) -> Result<(), ProviderError> {
    if let Some(gate) = gate {
        let permit = gate
            .acquire()
            .await
            .map_err(|e| ProviderError::Other(e.to_string()))?;
        permit.forget();
    }
    Ok(())
}

#[async_trait]
impl DataProvider for GatedProvider {
    async fn get_data(&self, path: &NodePath) -> Result<NodeData, ProviderError> {
        let gate = self.read_gates.lock().unwrap().get(path).cloned();
        pass(gate).await?;
        self.reads.lock().unwrap().push(path.clone());
        self.inner.get_data(path).await
    }

    async fn set_data(&self, path: &NodePath, text: &str) -> Result<(), ProviderError> {
        let gate = self.write_gate.lock().unwrap().clone();
        pass(gate).await?;
        self.inner.set_data(path, text).await
    }

    fn connection_state(&self) -> ConnectionState {
        self.inner.connection_state()
    }
}
