//! Vehicle Data Client Library
//!
//! Provides a typed HTTP client for the Mercedes-Benz vehicle data REST API:
//! vehicle status, fuel, electric vehicle, lock status and pay-as-you-drive
//! odometer containers, plus resource discovery.
//!
//! # Example
//!
//! ```rust,no_run
//! use merche_client::{CancellationToken, ClientConfig, MercheClient, Options};
//!
//! #[tokio::main]
//! async fn main() -> merche_client::Result<()> {
//!     let client = MercheClient::with_bearer_token(ClientConfig::default(), "access-token")?;
//!     let ctx = CancellationToken::new();
//!     let opts = Options::new("EXVETESTVIN000001");
//!
//!     let fuel = client.fuel_status(&ctx, &opts).await?;
//!     for status in &fuel.data {
//!         if let Some(range) = &status.rangeliquid {
//!             println!("range: {:?} km", range.value);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Containers
//!
//! The API answers each container with an array whose elements carry one
//! populated field each. Accessors return that array as-is, in wire order;
//! merging the elements into a single view is left to the caller.
//!
//! # Errors
//!
//! Non-2xx responses are classified by status code into [`ApiError`]:
//! `ExVe` for 400/403/500/503, `Unauthorized` for 401 and `Status` for the
//! rest. The response metadata travels with the error, see
//! [`MercheError::response`].

mod client;
pub mod config;
mod error;
mod response;
pub mod testing;
mod types;

pub use client::{container_path, MercheClient, API_PATH_PREFIX};
pub use config::{ClientConfig, ConfigError};
pub use error::{
    classify, is_exve_status, ApiError, ErrorHandlerError, ExVeError, MercedesApiError,
    MercheError, Result, UnauthorizedError,
};
pub use response::{ApiResponse, Response};
pub use types::*;

// Re-export the cancellation token used as call context
pub use tokio_util::sync::CancellationToken;
