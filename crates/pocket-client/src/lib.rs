//! pocket-client: retrieval client for the Pocket bookmarking service.
//!
//! The service exposes a single retrieval call (`/v3/get`) that returns every
//! saved record matching a count or a `since` cutoff. This crate owns the
//! transport and the wire format; reconciliation lives in `pocket-core`.

pub mod client;
pub mod error;
pub mod types;

pub use client::{parse_get_response, ClientConfig, PocketClient, DEFAULT_BASE_URL};
pub use error::{ClientError, Result};
pub use types::{Credentials, FetchWindow, RawRecord, CONSUMER_KEY_VAR, ACCESS_TOKEN_VAR};
