//! Client for the timestamp microservice.
//!
//! `GET <base>/api/timestamp/<date>` answers with
//! `{"unix": <ms>, "utc": "<http date>"}` for a parseable date, or
//! `{"error": "Invalid Date"}` otherwise. Omitting the date returns the
//! current time.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::{ConfigError, FetchConfig};
use crate::error::Error;
use crate::fetch::fetch;
use crate::request::Request;
use crate::transport::Transport;

/// A point in time as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Milliseconds since the Unix epoch.
    pub unix: i64,
    pub utc: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Reply {
    Ok(Timestamp),
    Err { error: String },
}

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error(transparent)]
    Fetch(#[from] Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid timestamp service URL {url:?}: {reason}")]
    Url { url: String, reason: String },

    #[error("timestamp service returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("timestamp service rejected {date:?}: {message}")]
    Rejected { date: String, message: String },
}

pub struct TimestampClient<T> {
    transport: T,
    base: Url,
    config: FetchConfig,
}

impl<T: Transport> TimestampClient<T> {
    pub fn new(transport: T, config: FetchConfig) -> Result<Self, TimestampError> {
        let raw = config.timestamp_url();
        let base = Url::parse(raw).map_err(|e| TimestampError::Url {
            url: raw.to_owned(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(TimestampError::Url {
                url: raw.to_owned(),
                reason: "cannot be a base URL".into(),
            });
        }
        Ok(Self {
            transport,
            base,
            config,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// The service's current time.
    pub async fn now(&self) -> Result<Timestamp, TimestampError> {
        self.lookup(None).await
    }

    /// Resolve `date` (a date string or Unix milliseconds), or the current
    /// time when `None`.
    pub async fn lookup(&self, date: Option<&str>) -> Result<Timestamp, TimestampError> {
        let url = self.endpoint(date);
        let init = self.config.request_init()?.header("Accept", "application/json");
        let request = Request::new(&url, init)?;

        debug!(%url, "requesting timestamp");
        let mut response = fetch(&self.transport, request).await?;
        if !response.ok() {
            return Err(TimestampError::Status {
                status: response.status(),
                url: response.url().to_owned(),
            });
        }

        match response.json::<Reply>().await? {
            Reply::Ok(timestamp) => Ok(timestamp),
            Reply::Err { error } => Err(TimestampError::Rejected {
                date: date.unwrap_or_default().to_owned(),
                message: error,
            }),
        }
    }

    fn endpoint(&self, date: Option<&str>) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base URL has path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "timestamp"]);
            if let Some(date) = date {
                segments.push(date);
            }
        }
        url
    }
}
