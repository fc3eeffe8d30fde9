//! Fetch-style HTTP message model and client.
//!
//! Provides [`HeaderMap`], [`Body`], [`Request`] and [`Response`] types
//! modelled on the Fetch API, plus a [`fetch`] driver that sends requests
//! through a pluggable [`Transport`].
//!
//! # Bodies
//!
//! A body is read at most once, through exactly one of `bytes`, `text`,
//! `json`, `array_buffer` or `blob`. Stream-backed bodies are drained in
//! arrival order and bounded by a byte cap and a timeout taken from the
//! owning message. Before it is read, a message can be cloned; stream
//! bodies are then split so both copies yield the same bytes.
//!
//! # Errors
//!
//! Operational failures are [`FetchError`]s with a machine-readable
//! [`FetchErrorKind`]. A fired [`AbortSignal`] surfaces as [`AbortError`]
//! instead, so callers can tell "asked to stop" apart from "went wrong".
//!
//! # Example
//!
//! ```no_run
//! use exerlog_fetch::{HyperTransport, Request, RequestInit, fetch};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let transport = HyperTransport::new()?;
//! let request = Request::new("https://example.com/", RequestInit::new())?;
//! let mut response = fetch(&transport, request).await?;
//! println!("{} {}", response.status(), response.text().await?);
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod body;
pub mod config;
pub mod content_type;
mod decode;
pub mod error;
mod fetch;
pub mod form;
pub mod header;
pub mod request;
pub mod response;
pub mod signal;
mod tee;
pub mod timestamp;
pub mod transport;

pub use blob::Blob;
pub use body::{Body, BodyInit, ByteStream, DEFAULT_CHUNK_SIZE, DEFAULT_HIGH_WATER_MARK};
pub use config::{ConfigError, FetchConfig};
pub use content_type::extract_content_type;
pub use error::{AbortError, Error, FetchError, FetchErrorKind, Result, StreamError};
pub use fetch::fetch;
pub use form::{FormData, MultipartEncoder, UrlSearchParams};
pub use header::{Header, HeaderMap, HeaderValues, HeadersInit};
pub use request::{Agent, AgentSelector, Redirect, Request, RequestInit, TransportOptions};
pub use response::{Response, ResponseInit};
pub use signal::{AbortController, AbortSignal};
pub use timestamp::{Timestamp, TimestampClient, TimestampError};
pub use transport::{HyperTransport, Transport, TransportResponse};
