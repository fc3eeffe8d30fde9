//! Error types for outbound fetches.
//!
//! Two kinds of failure reach callers: [`FetchError`] for operational
//! failures (bad input, transport errors, body limits) and [`AbortError`]
//! when an [`AbortSignal`](crate::AbortSignal) fired. The crate-wide
//! [`Error`] also carries JSON parse failures untouched.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed lower-level error as produced by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for fetch operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Machine-readable classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Construction or validation error with no finer subtype.
    Invalid,
    /// Socket-level or stream-level failure wrapping a lower error.
    System,
    /// Body drain exceeded its timeout.
    BodyTimeout,
    /// Body drain exceeded its byte cap.
    MaxSize,
    /// Transport call exceeded the request timeout.
    RequestTimeout,
    NoRedirect,
    MaxRedirect,
    InvalidRedirect,
    UnsupportedRedirect,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Invalid => "invalid",
            FetchErrorKind::System => "system",
            FetchErrorKind::BodyTimeout => "body-timeout",
            FetchErrorKind::MaxSize => "max-size",
            FetchErrorKind::RequestTimeout => "request-timeout",
            FetchErrorKind::NoRedirect => "no-redirect",
            FetchErrorKind::MaxRedirect => "max-redirect",
            FetchErrorKind::InvalidRedirect => "invalid-redirect",
            FetchErrorKind::UnsupportedRedirect => "unsupported-redirect",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational fetch failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0:?} is not a legal HTTP header name")]
    InvalidHeaderName(String),

    #[error("{0:?} is not a legal HTTP header value")]
    InvalidHeaderValue(String),

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("only absolute URLs are supported: {0}")]
    NotAbsoluteUrl(String),

    #[error("only HTTP(S) protocols are supported: {0}")]
    UnsupportedScheme(String),

    #[error("request with GET/HEAD method cannot have body")]
    BodyNotAllowed,

    #[error("request body stream does not support cancellation")]
    AbortUnsupported,

    #[error("invalid redirect mode: {0}")]
    InvalidRedirectMode(String),

    #[error("body used already for: {0}")]
    BodyUsed(String),

    #[error("cannot clone body after it is used")]
    CloneAfterUse,

    #[error("content size at {url} over limit: {limit}")]
    MaxSize { url: String, limit: u64 },

    #[error("response timeout while trying to fetch {url} (over {}ms)", timeout.as_millis())]
    BodyTimeout { url: String, timeout: Duration },

    #[error("network timeout at: {0}")]
    RequestTimeout(String),

    #[error("request to {url} failed, reason: {source}")]
    System { url: String, source: BoxError },

    #[error("invalid response body while trying to fetch {url}: {source}")]
    InvalidBody { url: String, source: StreamError },

    #[error("uri requested responds with a redirect, redirect mode is set to error: {0}")]
    NoRedirect(String),

    #[error("maximum redirect reached at: {0}")]
    MaxRedirect(String),

    #[error("uri requested responds with an invalid redirect URL: {0}")]
    InvalidRedirect(String),

    #[error("cannot follow redirect with body being a readable stream")]
    UnsupportedRedirect,
}

impl FetchError {
    /// Machine-readable subtype of this error.
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::System { .. } | FetchError::InvalidBody { .. } => FetchErrorKind::System,
            FetchError::BodyTimeout { .. } => FetchErrorKind::BodyTimeout,
            FetchError::MaxSize { .. } => FetchErrorKind::MaxSize,
            FetchError::RequestTimeout(_) => FetchErrorKind::RequestTimeout,
            FetchError::NoRedirect(_) => FetchErrorKind::NoRedirect,
            FetchError::MaxRedirect(_) => FetchErrorKind::MaxRedirect,
            FetchError::InvalidRedirect(_) => FetchErrorKind::InvalidRedirect,
            FetchError::UnsupportedRedirect => FetchErrorKind::UnsupportedRedirect,
            _ => FetchErrorKind::Invalid,
        }
    }
}

/// The caller cancelled the operation through its abort signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the user aborted a request")]
pub struct AbortError;

/// Error yielded by a body stream.
///
/// Shared behind an `Arc` so that both branches of a duplicated stream
/// observe the same failure.
#[derive(Clone)]
pub struct StreamError(Arc<dyn std::error::Error + Send + Sync>);

impl StreamError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(Arc::from(err.into()))
    }

    /// Whether this stream failed because its abort signal fired.
    pub fn is_abort(&self) -> bool {
        self.0.downcast_ref::<AbortError>().is_some()
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<AbortError> for StreamError {
    fn from(err: AbortError) -> Self {
        Self::new(err)
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}

/// Any failure surfaced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Abort(#[from] AbortError),

    /// The body was read but is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort(_))
    }

    /// Subtype of the underlying [`FetchError`], if this is one.
    pub fn fetch_kind(&self) -> Option<FetchErrorKind> {
        match self {
            Error::Fetch(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Map a stream failure observed while reading the body of `url`.
    pub(crate) fn from_stream(url: &str, err: StreamError) -> Self {
        if err.is_abort() {
            Error::Abort(AbortError)
        } else {
            FetchError::InvalidBody {
                url: url.to_owned(),
                source: err,
            }
            .into()
        }
    }
}
