//! The daemon's control socket drives a real supervisor.

use crate::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::Notify;
use wd_daemon::protocol;
use wd_daemon::{Config, Listener, Request, Response, StartupResult, DEFAULT_TIMEOUT};

async fn call(socket: &Path, request: Request) -> Response {
    let mut stream = UnixStream::connect(socket).await.unwrap();
    protocol::call(&mut stream, &request, DEFAULT_TIMEOUT)
        .await
        .unwrap()
}

#[tokio::test]
async fn control_socket_spawns_reports_and_stops_jobs() {
    let workers = Workers::standard();
    let state = tempfile::TempDir::new().unwrap();
    let config = Config::in_dir(state.path().join("state"), config(2), workers.config());

    let StartupResult { mut daemon, listener } = wd_daemon::lifecycle::startup(&config)
        .await
        .unwrap();
    let shutdown = Arc::new(Notify::new());
    let server = tokio::spawn(
        Listener::new(listener, daemon.supervisor.clone(), Arc::clone(&shutdown)).run(),
    );
    let socket = config.socket_path.clone();

    assert_eq!(call(&socket, Request::Ping).await, Response::Pong);

    let spawned = call(
        &socket,
        Request::Spawn {
            id: Some("remote".to_string()),
            kind: "sleeper".to_string(),
            args: Vec::new(),
            timeout_ms: None,
        },
    )
    .await;
    assert_eq!(
        spawned,
        Response::Spawned {
            id: "remote".to_string()
        }
    );

    let Response::Jobs { jobs } = call(&socket, Request::ListActive).await else {
        panic!("expected job list");
    };
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "remote");

    let unknown = call(
        &socket,
        Request::Spawn {
            id: None,
            kind: "missing".to_string(),
            args: Vec::new(),
            timeout_ms: None,
        },
    )
    .await;
    assert!(matches!(unknown, Response::Error { message } if message.contains("missing")));

    assert_eq!(
        call(&socket, Request::Stop { id: "remote".to_string() }).await,
        Response::Stopped { stopped: true }
    );
    let Response::Stats { stats } = call(&socket, Request::Stats).await else {
        panic!("expected stats");
    };
    assert_eq!(stats.active, 0);
    assert_eq!(stats.total_jobs, 1);

    assert_eq!(call(&socket, Request::Shutdown).await, Response::ShuttingDown);
    shutdown.notified().await;
    server.abort();
    daemon.shutdown().await.unwrap();
    assert!(!socket.exists());
}
