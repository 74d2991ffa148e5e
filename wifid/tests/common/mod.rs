//! Shared test utilities for wifid integration tests.

use reqwest::{Client, Response as ReqwestResponse, redirect};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use wifid::config::{ConfigState, MemoryStore, WifiConfig};
use wifid::radio::SimulatedRadio;
use wifid::rest::{AppState, create_router};

/// Delay between commit and radio apply used by test servers.
pub const APPLY_DELAY: Duration = Duration::from_millis(50);

/// Test server wrapper around the HTTP API with a simulated radio.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub radio: Arc<SimulatedRadio>,
    pub persist: Arc<MemoryStore>,
    pub state: Arc<AppState>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    /// Spawn a server with default settings and the sample networks.
    pub async fn spawn() -> Self {
        Self::spawn_with(WifiConfig::default()).await
    }

    /// Spawn a server starting from `initial` settings.
    pub async fn spawn_with(initial: WifiConfig) -> Self {
        let radio = Arc::new(
            SimulatedRadio::new(SimulatedRadio::sample_networks())
                .with_scan_delay(Duration::from_millis(100)),
        );
        let persist = Arc::new(MemoryStore::new());
        let config = Arc::new(ConfigState::new(initial, persist.clone()));

        let state = Arc::new(AppState::new(radio.clone(), config, APPLY_DELAY));
        let router = create_router(state.clone());

        // Use port 0 to let OS choose available port
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
        let actual_addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        // Redirects carry the result of a settings update, so don't follow them
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to build client");

        Self {
            addr: actual_addr,
            client,
            radio,
            persist,
            state,
            shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Perform a GET request.
    pub async fn get(&self, path: &str) -> ReqwestResponse {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Perform a POST request with a form body.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> ReqwestResponse {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("Request failed")
    }

    /// Value of the `Location` header of a redirect.
    pub fn location(response: &ReqwestResponse) -> String {
        response
            .headers()
            .get(reqwest::header::LOCATION)
            .expect("No Location header")
            .to_str()
            .unwrap()
            .to_string()
    }

    /// Wait until the running scan has published its results.
    pub async fn wait_scan_done(&self) {
        let store = self.state.orchestrator.store();
        for _ in 0..100 {
            if !store.in_progress() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Scan did not complete");
    }

    /// Wait past the deferred apply delay.
    pub async fn wait_applied(&self) {
        tokio::time::sleep(APPLY_DELAY * 4).await;
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
