//! Inbound responses.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::blob::Blob;
use crate::body::{Body, BodyInit, DEFAULT_HIGH_WATER_MARK};
use crate::error::Result;
use crate::header::{HeaderMap, HeadersInit};

/// Options for building a [`Response`].
#[derive(Debug, Clone, Default)]
pub struct ResponseInit {
    pub url: Option<String>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub headers: Option<HeadersInit>,
    pub counter: Option<u32>,
    pub size: Option<u64>,
    pub timeout: Option<Duration>,
    pub high_water_mark: Option<usize>,
}

impl ResponseInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = Some(status_text.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn counter(mut self, counter: u32) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = Some(high_water_mark);
        self
    }
}

/// An HTTP response: status, headers and a single-use body.
#[derive(Debug)]
pub struct Response {
    url: String,
    status: u16,
    status_text: String,
    headers: HeaderMap,
    body: Body,
    counter: u32,
    high_water_mark: usize,
}

impl Response {
    pub fn new(body: impl Into<BodyInit>, init: ResponseInit) -> Result<Self> {
        let mut headers = match init.headers {
            Some(headers) => HeaderMap::try_from_init(headers)?,
            None => HeaderMap::new(),
        };
        let mut body = Body::new(body);
        let url = init.url.unwrap_or_default();
        let high_water_mark = init.high_water_mark.unwrap_or(DEFAULT_HIGH_WATER_MARK);
        body.set_limits(init.size.unwrap_or(0), init.timeout);
        body.set_url(&url);
        body.set_high_water_mark(high_water_mark);

        if !body.is_null() && !headers.has("Content-Type")? {
            if let Some(content_type) = body.inferred_content_type() {
                headers.append("Content-Type", content_type)?;
            }
        }

        Ok(Self {
            url,
            status: init.status.unwrap_or(200),
            status_text: init.status_text.unwrap_or_default(),
            headers,
            body,
            counter: init.counter.unwrap_or(0),
            high_water_mark,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Whether the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this response was reached through at least one redirect.
    pub fn redirected(&self) -> bool {
        self.counter > 0
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn body_used(&self) -> bool {
        self.body.body_used()
    }

    pub async fn bytes(&mut self) -> Result<Bytes> {
        self.body.bytes().await
    }

    pub async fn array_buffer(&mut self) -> Result<Vec<u8>> {
        self.body.array_buffer().await
    }

    pub async fn text(&mut self) -> Result<String> {
        self.body.text().await
    }

    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.body.json().await
    }

    /// Read the body as a [`Blob`] typed after this response's `Content-Type`.
    pub async fn blob(&mut self) -> Result<Blob> {
        let content_type = self.headers.get("Content-Type")?;
        self.body.blob_with_type(content_type).await
    }

    /// Duplicate this response, splitting a stream body between the two.
    pub fn try_clone(&mut self) -> Result<Response> {
        Ok(Response {
            body: self.body.try_clone()?,
            url: self.url.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            counter: self.counter,
            high_water_mark: self.high_water_mark,
        })
    }
}
