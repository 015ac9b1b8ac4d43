// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the control socket.
//!
//! Each connection carries one request and one response. Requests are
//! answered straight from the supervisor; none of them block on a job.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};
use wd_adapters::WorkerAdapter;
use wd_core::{Clock, IdGen};
use wd_engine::{SpawnRequest, Supervisor};

use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Listener task for accepting socket connections.
pub struct Listener<W, C, G> {
    socket: UnixListener,
    supervisor: Supervisor<W, C, G>,
    shutdown: Arc<Notify>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl<W, C, G> Listener<W, C, G>
where
    W: WorkerAdapter,
    C: Clock,
    G: IdGen,
{
    pub fn new(socket: UnixListener, supervisor: Supervisor<W, C, G>, shutdown: Arc<Notify>) -> Self {
        Self {
            socket,
            supervisor,
            shutdown,
        }
    }

    /// Run the listener loop, spawning a task for each connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let supervisor = self.supervisor.clone();
                    let shutdown = Arc::clone(&self.shutdown);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &supervisor, &shutdown).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("Client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout(_)) => {
                                    warn!("Connection timeout")
                                }
                                _ => error!("Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection<W, C, G>(
    stream: UnixStream,
    supervisor: &Supervisor<W, C, G>,
    shutdown: &Notify,
) -> Result<(), ConnectionError>
where
    W: WorkerAdapter,
    C: Clock,
    G: IdGen,
{
    let (mut reader, mut writer) = stream.into_split();

    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    // Polling requests at debug level, mutations at info
    if is_query(&request) {
        debug!(request = ?request, "received query");
    } else {
        tracing::info!(request = ?request, "received request");
    }

    let response = handle_request(request, supervisor, shutdown).await;
    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

fn is_query(request: &Request) -> bool {
    matches!(
        request,
        Request::Ping
            | Request::Hello { .. }
            | Request::ListActive
            | Request::Get { .. }
            | Request::Stats
            | Request::Kinds
    )
}

/// Handle a single request and return a response.
pub async fn handle_request<W, C, G>(
    request: Request,
    supervisor: &Supervisor<W, C, G>,
    shutdown: &Notify,
) -> Response
where
    W: WorkerAdapter,
    C: Clock,
    G: IdGen,
{
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                warn!(client = %version, daemon = PROTOCOL_VERSION, "protocol version mismatch");
            }
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            }
        }

        Request::Spawn {
            id,
            kind,
            args,
            timeout_ms,
        } => {
            let mut spawn = SpawnRequest::new(kind).args(args);
            if let Some(id) = id {
                spawn = spawn.with_id(id);
            }
            if let Some(ms) = timeout_ms {
                spawn = spawn.timeout(Duration::from_millis(ms));
            }
            // The outcome is logged by the supervisor; the client only
            // learns the job was admitted.
            match supervisor.spawn(spawn) {
                Ok(completion) => Response::Spawned {
                    id: completion.id().to_string(),
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::Stop { id } => Response::Stopped {
            stopped: supervisor.stop(&id),
        },

        Request::StopAll => Response::StoppedAll {
            count: supervisor.stop_all(),
        },

        Request::ListActive => Response::Jobs {
            jobs: supervisor.list_active(),
        },

        Request::Get { id } => Response::Job {
            job: supervisor.get(&id).map(Box::new),
        },

        Request::Stats => Response::Stats {
            stats: supervisor.stats(),
        },

        Request::Kinds => Response::Kinds {
            kinds: supervisor.kinds(),
        },

        Request::Reconcile => Response::Reconciled {
            report: supervisor.reconcile().await,
        },

        Request::Shutdown => {
            shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
