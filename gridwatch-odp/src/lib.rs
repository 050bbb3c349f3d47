//! # gridwatch-odp
//!
//! Fetches electrical network constraint records from UK Power Networks'
//! Open Data Portal.
//!
//! The portal serves the `ukpn-constraints-real-time-meter-readings` dataset
//! through its Explore v2.1 records API, authenticated with an API key. This
//! crate wraps that endpoint: build an [`OdpClient`], describe what you want
//! with a [`FetchQuery`], and receive a [`Batch`] of typed
//! [`ConstraintRecord`]s.
//!
//! ## Failure handling
//!
//! - A rejected key is [`FetchError::Authentication`]; retrying will not help.
//! - Timeouts, refused connections and 5xx/429 answers are transient and are
//!   retried by [`OdpClient::fetch_with_retry`] with linear backoff.
//! - A body that is not a records response is [`FetchError::Schema`].
//!   Individual malformed records are dropped with a warning and counted in
//!   [`Batch::skipped`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridwatch_odp::{FetchQuery, OdpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OdpClient::builder().api_key("my-key").build()?;
//!     let batch = client.fetch(&FetchQuery::new()).await?;
//!     println!("Fetched {} constraint records", batch.len());
//!     Ok(())
//! }
//! ```

mod client;
mod decode;
pub mod error;
mod query;
mod retry;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::{OdpClient, OdpClientBuilder, DEFAULT_ENDPOINT, DEFAULT_LIMIT};
pub use decode::{decode_record, decode_response, Batch, RecordError};
pub use error::FetchError;
pub use query::FetchQuery;
pub use retry::{BackoffPolicy, RetryPolicy};

// Re-export types for convenience
pub use gridwatch_types::{AmpReadings, ConstraintRecord};
