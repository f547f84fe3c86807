//! Test utilities for merche-client
//!
//! [`MockApi`] serves canned responses per path and records every request it
//! receives. [`TestServer`] runs any axum router on a loopback port and hands
//! out a client pointed at it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::client::{container_path, encode_path_segment, API_PATH_PREFIX};
use crate::config::ClientConfig;
use crate::types::{Container, ResourceMetaInfo};
use crate::MercheClient;

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: MercheClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use merche_client::testing::{MockApi, TestServer};
    ///
    /// let api = MockApi::new().respond("/health", 200, "OK");
    /// let server = TestServer::start(api.router()).await?;
    /// ```
    pub async fn start(router: axum::Router) -> std::io::Result<Self> {
        Self::start_with_config(router, ClientConfig::default()).await
    }

    /// Create a new test server; `config.base_url` is replaced by the server's address
    pub async fn start_with_config(
        router: axum::Router,
        config: ClientConfig,
    ) -> std::io::Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let config = ClientConfig {
            base_url: format!("http://{}/", addr),
            ..config
        };
        let client = MercheClient::with_config(config).map_err(std::io::Error::other)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server, with trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &MercheClient {
        &self.client
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Mock API
// =============================================================================

/// Canned answer for one path
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub body: String,
    pub delay: Option<Duration>,
}

/// A request as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// In-memory stand-in for the vehicle data API
///
/// Paths without a canned response answer `404` with an empty body.
/// Clones share routes and the request log.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    routes: Arc<RwLock<HashMap<String, CannedResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `path` (absolute, e.g. `/vehicledata/...`) with `status` and `body`
    pub fn respond(self, path: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.routes.write().insert(
            path.into(),
            CannedResponse {
                status,
                body: body.into(),
                delay: None,
            },
        );
        self
    }

    /// Hold the response for `path` back by `delay`
    pub fn delay(self, path: &str, delay: Duration) -> Self {
        if let Some(canned) = self.routes.write().get_mut(path) {
            canned.delay = Some(delay);
        }
        self
    }

    /// Serve `items` as the container of `T::DOMAIN` for `vehicle_id`
    pub fn container<T: Container + Serialize>(self, vehicle_id: &str, items: &[T]) -> Self {
        let body = serde_json::to_string(items).unwrap_or_default();
        self.respond(format!("/{}", container_path(vehicle_id, T::DOMAIN)), 200, body)
    }

    /// Serve `items` as the discovery list for `vehicle_id`
    pub fn resources(self, vehicle_id: &str, items: &[ResourceMetaInfo]) -> Self {
        let body = serde_json::to_string(items).unwrap_or_default();
        self.respond(
            format!(
                "/{}/{}/resources",
                API_PATH_PREFIX,
                encode_path_segment(vehicle_id)
            ),
            200,
            body,
        )
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Router serving the canned responses
    pub fn router(&self) -> axum::Router {
        axum::Router::new()
            .fallback(handle_request)
            .with_state(self.clone())
    }
}

async fn handle_request(
    State(api): State<MockApi>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> axum::response::Response {
    api.requests.lock().push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        headers,
    });

    let canned = api.routes.read().get(uri.path()).cloned();
    let Some(canned) = canned else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }

    (
        canned.status,
        [(header::CONTENT_TYPE, "application/json")],
        canned.body,
    )
        .into_response()
}
