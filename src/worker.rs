//! Background worker that performs all blocking store I/O.
//!
//! The UI thread never awaits the store. It sends [`DataCommand`]s over a std
//! mpsc channel and drains [`DataEvent`]s once per frame. The worker owns a
//! Tokio runtime on its own thread and runs every request as a separate task,
//! so a slow read never delays a newer one. At most one read is in flight: a
//! new fetch aborts the one it supersedes.

use std::future::Future;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ViewerConfig;
use crate::error::ProviderError;
use crate::node::NodePath;
use crate::provider::{DataProvider, NodeData};

/// Commands sent from the UI thread to the data worker.
#[derive(Debug)]
pub enum DataCommand {
    Fetch {
        request_id: u64,
        path: NodePath,
    },
    Save {
        request_id: u64,
        path: NodePath,
        text: String,
    },
    /// Health check ping to verify the worker is alive
    Ping,
    Shutdown,
}

/// Events sent from the data worker back to the UI thread.
///
/// Every completion carries the `request_id` of the command that caused it;
/// the controller uses it to drop results for superseded requests.
#[derive(Debug)]
pub enum DataEvent {
    Connected,
    ConnectionError(String),
    DataFetched {
        request_id: u64,
        path: NodePath,
        result: Result<NodeData, ProviderError>,
    },
    DataSaved {
        request_id: u64,
        path: NodePath,
        text: String,
        result: Result<(), ProviderError>,
    },
    /// Health check pong response
    Pong,
}

/// Channel ends held by the UI side.
pub struct WorkerChannels {
    pub command_sender: Sender<DataCommand>,
    pub event_receiver: Receiver<DataEvent>,
}

/// Spawns the worker thread and its runtime.
pub fn spawn_data_worker(
    provider: Arc<dyn DataProvider>,
    config: &ViewerConfig,
) -> std::io::Result<WorkerChannels> {
    let (command_sender, command_receiver) = mpsc::channel();
    let (event_sender, event_receiver) = mpsc::channel();
    let request_timeout = config.request_timeout();
    let poll_interval = config.worker_poll_interval();

    std::thread::Builder::new()
        .name("zooinspector-data".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to start worker runtime: {}", e);
                    let _ = event_sender.send(DataEvent::ConnectionError(e.to_string()));
                    return;
                }
            };
            rt.block_on(async {
                data_worker(
                    provider,
                    command_receiver,
                    event_sender,
                    request_timeout,
                    poll_interval,
                )
                .await;
            });
        })?;

    info!("Data worker thread spawned");
    Ok(WorkerChannels {
        command_sender,
        event_receiver,
    })
}

/// The read currently running against the store.
struct ActiveFetch {
    request_id: u64,
    path: NodePath,
    task_handle: JoinHandle<()>,
}

impl ActiveFetch {
    /// Stops the read unless it already delivered its result.
    fn cancel(self) {
        if !self.task_handle.is_finished() {
            debug!("Aborting fetch #{} for {}", self.request_id, self.path);
            self.task_handle.abort();
        }
    }
}

/// Bounds a provider call by `limit`.
async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(limit)),
    }
}

/// Worker main loop.
///
/// # Arguments
/// * `provider` - Store the requests are executed against
/// * `command_receiver` - Channel to receive commands from the UI thread
/// * `event_sender` - Channel to send completions back to the UI thread
/// * `request_timeout` - Upper bound for every provider call
/// * `poll_interval` - How long to wait for a command before looping
async fn data_worker(
    provider: Arc<dyn DataProvider>,
    command_receiver: Receiver<DataCommand>,
    event_sender: Sender<DataEvent>,
    request_timeout: Duration,
    poll_interval: Duration,
) {
    info!("Data worker started");

    match with_timeout(request_timeout, provider.connect()).await {
        Ok(()) => {
            info!("Data provider connected");
            let _ = event_sender.send(DataEvent::Connected);
        }
        Err(e) => {
            error!("Data provider failed to connect: {}", e);
            let _ = event_sender.send(DataEvent::ConnectionError(e.to_string()));
        }
    }

    let mut active_fetch: Option<ActiveFetch> = None;

    loop {
        // recv_timeout instead of try_recv to avoid busy waiting
        match command_receiver.recv_timeout(poll_interval) {
            Ok(command) => {
                debug!("Worker received command: {:?}", command);
                match command {
                    DataCommand::Fetch { request_id, path } => {
                        if let Some(superseded) = active_fetch.take() {
                            superseded.cancel();
                        }
                        let provider = Arc::clone(&provider);
                        let sender = event_sender.clone();
                        let active_path = path.clone();
                        let task_handle = tokio::spawn(async move {
                            let result = with_timeout(request_timeout, provider.get_data(&path)).await;
                            if let Err(ref e) = result {
                                error!("Error retrieving data for node {}: {}", path, e);
                            }
                            if sender
                                .send(DataEvent::DataFetched {
                                    request_id,
                                    path,
                                    result,
                                })
                                .is_err()
                            {
                                debug!("UI went away before fetch #{} completed", request_id);
                            }
                        });
                        active_fetch = Some(ActiveFetch {
                            request_id,
                            path: active_path,
                            task_handle,
                        });
                    }
                    DataCommand::Save {
                        request_id,
                        path,
                        text,
                    } => {
                        let provider = Arc::clone(&provider);
                        let sender = event_sender.clone();
                        tokio::spawn(async move {
                            let result =
                                with_timeout(request_timeout, provider.set_data(&path, &text)).await;
                            match result {
                                Ok(()) => info!("Saved {} bytes to {}", text.len(), path),
                                Err(ref e) => error!("Error saving data for node {}: {}", path, e),
                            }
                            if sender
                                .send(DataEvent::DataSaved {
                                    request_id,
                                    path,
                                    text,
                                    result,
                                })
                                .is_err()
                            {
                                debug!("UI went away before save #{} completed", request_id);
                            }
                        });
                    }
                    DataCommand::Ping => {
                        debug!("Worker received ping, sending pong");
                        let _ = event_sender.send(DataEvent::Pong);
                    }
                    DataCommand::Shutdown => {
                        info!("Data worker shutting down");
                        if let Some(fetch) = active_fetch.take() {
                            fetch.cancel();
                        }
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("Command channel closed, data worker exiting");
                break;
            }
        }
    }
}
