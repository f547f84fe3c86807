//! Vehicle data HTTP client implementation

use std::io::Write;

use bytes::Bytes;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{classify, ErrorHandlerError, MercheError, Result};
use crate::response::{ApiResponse, Response};
use crate::types::*;

/// Path prefix of the vehicle data endpoints
pub const API_PATH_PREFIX: &str = "vehicledata/v2/vehicles";

/// URL-encode a vehicle ID for use in a path segment.
pub(crate) fn encode_path_segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

/// Vehicle data REST API client
///
/// Holds the transport and the resolved configuration only; every call is
/// independent, so one instance can be cloned or shared across tasks.
#[derive(Debug, Clone)]
pub struct MercheClient {
    client: Client,
    base_url: String,
    user_agent: Option<HeaderValue>,
}

impl MercheClient {
    /// Create a client for the production API with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client, building the transport from `config.transport`
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = config.transport.apply(Client::builder()).build()?;
        Self::with_http_client(config, client)
    }

    /// Create a client on top of a preconfigured transport
    ///
    /// Use this to plug in a `reqwest::Client` that already attaches
    /// credentials, proxies or timeouts to every request.
    pub fn with_http_client(config: ClientConfig, client: Client) -> Result<Self> {
        let user_agent = match config.user_agent.as_deref() {
            None | Some("") => None,
            Some(agent) => Some(
                HeaderValue::from_str(agent)
                    .map_err(|e| MercheError::InvalidHeader(format!("user agent: {}", e)))?,
            ),
        };

        Ok(Self {
            client,
            base_url: config.base_url,
            user_agent,
        })
    }

    /// Create a client that sends a bearer token with every request.
    ///
    /// The token is set as a default `Authorization: Bearer <token>` header.
    /// Obtaining and refreshing the token is up to the caller.
    pub fn with_bearer_token(config: ClientConfig, token: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut header_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| MercheError::InvalidHeader(format!("auth token: {}", e)))?;
        header_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, header_value);

        let client = config
            .transport
            .apply(Client::builder())
            .default_headers(headers)
            .build()?;

        Self::with_http_client(config, client)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get a reference to the underlying HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    // =========================================================================
    // Request Builder
    // =========================================================================

    /// Build a request without a body for `path` relative to the base URL
    pub fn new_request(&self, ctx: &CancellationToken, method: Method, path: &str) -> Result<Request> {
        self.build_request(ctx, method, path, None)
    }

    /// Build a request carrying `body` encoded as JSON
    pub fn new_json_request<B: Serialize + ?Sized>(
        &self,
        ctx: &CancellationToken,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Request> {
        let body = serde_json::to_vec(body).map_err(MercheError::Serialize)?;
        self.build_request(ctx, method, path, Some(body))
    }

    fn build_request(
        &self,
        ctx: &CancellationToken,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Request> {
        let base = Url::parse(&self.base_url)?;
        if !has_directory_path(&self.base_url, &base) {
            return Err(MercheError::InvalidBaseUrl(self.base_url.clone()));
        }
        if ctx.is_cancelled() {
            return Err(MercheError::Cancelled);
        }

        let url = base.join(path)?;
        let mut request = Request::new(method, url);

        let headers = request.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(agent) = &self.user_agent {
            headers.insert(USER_AGENT, agent.clone());
        }
        *request.body_mut() = body.map(Into::into);

        Ok(request)
    }

    // =========================================================================
    // Response Pipeline
    // =========================================================================

    /// Execute a request and discard the body
    #[instrument(skip(self, ctx, request), fields(method = %request.method(), url = %request.url()))]
    pub async fn execute(&self, ctx: &CancellationToken, request: Request) -> Result<Response> {
        let (meta, response) = self.send(ctx, request).await?;
        read_body(ctx, response, &meta).await?;
        trace!("No destination, body discarded");
        Ok(meta)
    }

    /// Execute a request and copy the raw body into `sink`
    #[instrument(skip(self, ctx, request, sink), fields(method = %request.method(), url = %request.url()))]
    pub async fn execute_into<W: Write + ?Sized>(
        &self,
        ctx: &CancellationToken,
        request: Request,
        sink: &mut W,
    ) -> Result<Response> {
        let (meta, mut response) = self.send(ctx, request).await?;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    return Err(MercheError::Aborted { response: Some(meta) });
                }
                chunk = response.chunk() => chunk,
            };
            let chunk = match chunk {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(source) => return Err(MercheError::Body { source, response: meta }),
            };
            if let Err(source) = sink.write_all(&chunk) {
                return Err(MercheError::Io { source, response: meta });
            }
        }

        Ok(meta)
    }

    /// Execute a request and decode the JSON body
    ///
    /// An empty body is not an error: `data` is `None` and nothing was decoded.
    #[instrument(skip(self, ctx, request), fields(method = %request.method(), url = %request.url()))]
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        request: Request,
    ) -> Result<ApiResponse<Option<T>>> {
        let (meta, response) = self.send(ctx, request).await?;
        let body = read_body(ctx, response, &meta).await?;

        if body.iter().all(u8::is_ascii_whitespace) {
            trace!("Empty body, nothing to decode");
            return Ok(ApiResponse {
                data: None,
                response: meta,
            });
        }

        match serde_json::from_slice(&body) {
            Ok(data) => Ok(ApiResponse {
                data: Some(data),
                response: meta,
            }),
            Err(source) => Err(MercheError::Decode {
                source,
                response: meta,
            }),
        }
    }

    /// Send the request and turn non-2xx responses into errors
    async fn send(
        &self,
        ctx: &CancellationToken,
        request: Request,
    ) -> Result<(Response, reqwest::Response)> {
        debug!("Sending {} {}", request.method(), request.url());

        let response = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(MercheError::Aborted { response: None }),
            response = self.client.execute(request) => response?,
        };

        let meta = Response::from(&response);
        debug!("Received {}", meta.status);

        if meta.status.is_success() {
            return Ok((meta, response));
        }

        Err(self.extract_error(ctx, response, meta).await)
    }

    /// Classify a failed response from its status and body
    async fn extract_error(
        &self,
        ctx: &CancellationToken,
        response: reqwest::Response,
        meta: Response,
    ) -> MercheError {
        let body = tokio::select! {
            biased;
            _ = ctx.cancelled() => return MercheError::Aborted { response: Some(meta) },
            body = response.bytes() => body,
        };

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                return MercheError::ErrorHandler {
                    source: ErrorHandlerError::ReadBody(e),
                    response: meta,
                }
            }
        };

        match classify(meta.status, &body) {
            Ok(source) => MercheError::Api {
                source,
                response: meta,
            },
            Err(source) => MercheError::ErrorHandler {
                source,
                response: meta,
            },
        }
    }

    // =========================================================================
    // Resource Accessors
    // =========================================================================

    /// List the resources that can be read out for a vehicle
    #[instrument(skip(self, ctx, opts), fields(vehicle_id = %opts.vehicle_id))]
    pub async fn available_resources(
        &self,
        ctx: &CancellationToken,
        opts: &Options,
    ) -> Result<ApiResponse<Vec<ResourceMetaInfo>>> {
        let path = format!(
            "{}/{}/resources",
            API_PATH_PREFIX,
            encode_path_segment(&opts.vehicle_id)
        );
        self.get_list(ctx, &path).await
    }

    /// Read the container of domain `T::DOMAIN`
    ///
    /// Each element of the result carries one populated field, in wire order.
    #[instrument(skip(self, ctx, opts), fields(vehicle_id = %opts.vehicle_id, domain = %T::DOMAIN))]
    pub async fn container<T: Container>(
        &self,
        ctx: &CancellationToken,
        opts: &Options,
    ) -> Result<ApiResponse<Vec<T>>> {
        self.get_list(ctx, &container_path(&opts.vehicle_id, T::DOMAIN))
            .await
    }

    /// Door, window, light and roof state
    pub async fn vehicle_status(
        &self,
        ctx: &CancellationToken,
        opts: &Options,
    ) -> Result<ApiResponse<Vec<VehicleStatus>>> {
        self.container(ctx, opts).await
    }

    /// Fuel range and tank level
    pub async fn fuel_status(
        &self,
        ctx: &CancellationToken,
        opts: &Options,
    ) -> Result<ApiResponse<Vec<FuelStatus>>> {
        self.container(ctx, opts).await
    }

    /// State of charge and electric range
    pub async fn electric_vehicle_status(
        &self,
        ctx: &CancellationToken,
        opts: &Options,
    ) -> Result<ApiResponse<Vec<ElectricVehicleStatus>>> {
        self.container(ctx, opts).await
    }

    /// Door lock state and heading
    pub async fn vehicle_lock_status(
        &self,
        ctx: &CancellationToken,
        opts: &Options,
    ) -> Result<ApiResponse<Vec<VehicleLockStatus>>> {
        self.container(ctx, opts).await
    }

    /// Odometer for usage-based insurance
    pub async fn pay_as_you_drive_status(
        &self,
        ctx: &CancellationToken,
        opts: &Options,
    ) -> Result<ApiResponse<Vec<PayAsYouDriveStatus>>> {
        self.container(ctx, opts).await
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        path: &str,
    ) -> Result<ApiResponse<Vec<T>>> {
        let request = self.new_request(ctx, Method::GET, path)?;
        let response = self.execute_json::<Vec<T>>(ctx, request).await?;
        Ok(response.map(Option::unwrap_or_default))
    }
}

/// Relative path of a status container
pub fn container_path(vehicle_id: &str, domain: Domain) -> String {
    format!(
        "{}/{}/containers/{}",
        API_PATH_PREFIX,
        encode_path_segment(vehicle_id),
        domain
    )
}

/// True when the path of the base URL ends in `/`.
///
/// The parser turns an empty path into `/`, so a bare host is checked on
/// the raw string.
fn has_directory_path(raw: &str, base: &Url) -> bool {
    let raw_path = raw.split(['?', '#']).next().unwrap_or(raw);
    base.path().ends_with('/') && raw_path.ends_with('/')
}

/// Drain the full body so the connection can be reused
async fn read_body(
    ctx: &CancellationToken,
    response: reqwest::Response,
    meta: &Response,
) -> Result<Bytes> {
    let body = tokio::select! {
        biased;
        _ = ctx.cancelled() => {
            return Err(MercheError::Aborted { response: Some(meta.clone()) });
        }
        body = response.bytes() => body,
    };

    body.map_err(|source| MercheError::Body {
        source,
        response: meta.clone(),
    })
}
