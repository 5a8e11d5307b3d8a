//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use traced_user_service::observability::InMemoryExporter;
use traced_user_service::persistence::MemoryStore;
use traced_user_service::service::UserService;
use traced_user_service::{
    AppConfig, Dependencies, LifecycleController, LifecycleError, LifecyclePhase, Mode,
    Observability, Telemetry,
};

/// A service running on an ephemeral port with an in-memory exporter.
pub struct TestServer {
    pub addr: SocketAddr,
    pub exporter: InMemoryExporter,
    pub store: MemoryStore,
    pub telemetry: Telemetry,
    pub client: reqwest::Client,
    pub phases: watch::Receiver<LifecyclePhase>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), LifecycleError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request termination and wait for the controller to finish.
    pub async fn stop(self) -> Result<(), LifecycleError> {
        let _ = self.stop.send(());
        self.handle.await.expect("controller task panicked")
    }
}

/// Fast defaults for tests: short sleeps, no Prometheus listener.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_address = None;
    config.work.min_sleep_ms = 1;
    config.work.max_sleep_ms = 5;
    config.timeouts.shutdown_secs = 5;
    config
}

pub async fn start_server(mode: Mode, config: AppConfig) -> TestServer {
    start_server_with(mode, config, InMemoryExporter::new()).await
}

pub async fn start_server_with(
    mode: Mode,
    config: AppConfig,
    exporter: InMemoryExporter,
) -> TestServer {
    let observability = Observability::with_exporter(mode, "test", Arc::new(exporter.clone()));
    let telemetry = observability.telemetry();
    let store = MemoryStore::new();
    let deps = Dependencies {
        user_service: Arc::new(UserService::new(Arc::new(store.clone()), telemetry.clone())),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let controller = LifecycleController::new(mode, deps, telemetry.clone(), config);
    let mut phases = controller.subscribe();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(controller.run(listener, observability, async move {
        let _ = stopped.await;
    }));
    phases
        .wait_for(|p| *p == LifecyclePhase::Serving)
        .await
        .unwrap();

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        addr,
        exporter,
        store,
        telemetry,
        client,
        phases,
        stop,
        handle,
    }
}

/// Start a programmable backend on an ephemeral port. Each connection gets
/// one response produced by `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;

                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}
