//! Outbound requests and their projection into transport call options.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use url::Url;

use crate::blob::Blob;
use crate::body::{Body, BodyInit, DEFAULT_HIGH_WATER_MARK};
use crate::error::{FetchError, Result};
use crate::header::{HeaderMap, HeaderValues, HeadersInit};
use crate::signal::AbortSignal;

/// Default number of redirects a request may follow.
pub const DEFAULT_FOLLOW: u32 = 20;

/// Default `User-Agent` sent when the caller sets none.
pub const DEFAULT_USER_AGENT: &str = concat!("exerlog-fetch/", env!("CARGO_PKG_VERSION"));

/// What to do when a response is a redirect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Redirect {
    /// Follow it, up to the request's follow count.
    #[default]
    Follow,
    /// Fail with a `NoRedirect` error.
    Error,
    /// Hand the redirect response to the caller.
    Manual,
}

impl Redirect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Redirect::Follow => "follow",
            Redirect::Error => "error",
            Redirect::Manual => "manual",
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Redirect {
    type Err = FetchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "follow" => Ok(Redirect::Follow),
            "error" => Ok(Redirect::Error),
            "manual" => Ok(Redirect::Manual),
            other => Err(FetchError::InvalidRedirectMode(other.to_owned())),
        }
    }
}

/// Transport-selection hint: which connection setup a transport should use.
///
/// Supplying an agent means the caller manages connection reuse, so no
/// `Connection: close` default is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub name: String,
    pub connect_timeout: Option<Duration>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connect_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

type AgentFn = dyn Fn(&Url) -> Option<Agent> + Send + Sync;

/// A fixed agent, or one chosen per target URL.
#[derive(Clone)]
pub enum AgentSelector {
    Fixed(Agent),
    PerTarget(Arc<AgentFn>),
}

impl AgentSelector {
    pub fn per_target(select: impl Fn(&Url) -> Option<Agent> + Send + Sync + 'static) -> Self {
        AgentSelector::PerTarget(Arc::new(select))
    }

    pub fn resolve(&self, url: &Url) -> Option<Agent> {
        match self {
            AgentSelector::Fixed(agent) => Some(agent.clone()),
            AgentSelector::PerTarget(select) => select(url),
        }
    }
}

impl fmt::Debug for AgentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentSelector::Fixed(agent) => f.debug_tuple("Fixed").field(agent).finish(),
            AgentSelector::PerTarget(_) => f.write_str("PerTarget(..)"),
        }
    }
}

impl From<Agent> for AgentSelector {
    fn from(agent: Agent) -> Self {
        AgentSelector::Fixed(agent)
    }
}

/// Something that names a request target.
pub trait Href {
    fn href(&self) -> Cow<'_, str>;
}

impl Href for &str {
    fn href(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Href for String {
    fn href(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Href for &String {
    fn href(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl Href for Url {
    fn href(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl Href for &Url {
    fn href(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

/// Overrides applied when constructing a [`Request`]. Unset fields fall
/// back to the source request (if any), then to defaults.
#[derive(Debug, Default)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: Option<HeadersInit>,
    pub body: Option<BodyInit>,
    pub redirect: Option<Redirect>,
    pub follow: Option<u32>,
    pub compress: Option<bool>,
    pub counter: Option<u32>,
    pub agent: Option<AgentSelector>,
    /// `Some(None)` explicitly clears a signal inherited from the source.
    pub signal: Option<Option<AbortSignal>>,
    pub timeout: Option<Duration>,
    pub size: Option<u64>,
    pub high_water_mark: Option<usize>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    /// Append a single header to the initializer.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let init = self
            .headers
            .take()
            .unwrap_or(HeadersInit::Pairs(Vec::new()));
        self.headers = Some(init.push(name, value));
        self
    }

    pub fn body(mut self, body: impl Into<BodyInit>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn redirect(mut self, redirect: Redirect) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn follow(mut self, follow: u32) -> Self {
        self.follow = Some(follow);
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    pub fn counter(mut self, counter: u32) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn agent(mut self, agent: impl Into<AgentSelector>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(Some(signal));
        self
    }

    pub fn no_signal(mut self) -> Self {
        self.signal = Some(None);
        self
    }

    /// Timeout for the transport call and for body drains; zero disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Body byte cap; zero disables it.
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = Some(high_water_mark);
        self
    }
}

#[derive(Debug, Clone)]
struct Target {
    raw: String,
    // None for relative references; rejected at projection time.
    url: Option<Url>,
}

impl Target {
    fn parse(href: &str) -> Result<Self> {
        let url = match Url::parse(href) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => None,
            Err(err) => {
                return Err(FetchError::InvalidUrl {
                    url: href.to_owned(),
                    reason: err.to_string(),
                }
                .into());
            }
        };
        Ok(Self {
            raw: url.as_ref().map_or_else(|| href.to_owned(), |u| u.to_string()),
            url,
        })
    }
}

/// Everything a transport needs to perform one call.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub url: Url,
    pub method: String,
    pub headers: Vec<(String, HeaderValues)>,
    pub agent: Option<Agent>,
}

impl TransportOptions {
    /// First value of `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.iter().next())
    }
}

/// An outbound HTTP request.
#[derive(Debug)]
pub struct Request {
    method: String,
    target: Target,
    headers: HeaderMap,
    body: Body,
    redirect: Redirect,
    follow: u32,
    counter: u32,
    compress: bool,
    agent: Option<AgentSelector>,
    signal: Option<AbortSignal>,
    high_water_mark: usize,
}

impl Request {
    /// Build a request for `target`.
    pub fn new(target: impl Href, init: RequestInit) -> Result<Self> {
        let target = Target::parse(&target.href())?;
        let method = normalize_method(init.method.as_deref().unwrap_or("GET"));
        let body = Body::new(init.body.unwrap_or(BodyInit::Empty));
        if is_bodyless(&method) && !body.is_null() {
            return Err(FetchError::BodyNotAllowed.into());
        }
        let headers = match init.headers {
            Some(headers) => HeaderMap::try_from_init(headers)?,
            None => HeaderMap::new(),
        };
        Self::assemble(
            method,
            target,
            headers,
            body,
            init.timeout,
            init.size.unwrap_or(0),
            Inherited {
                redirect: init.redirect.unwrap_or_default(),
                follow: init.follow.unwrap_or(DEFAULT_FOLLOW),
                counter: init.counter.unwrap_or(0),
                compress: init.compress.unwrap_or(true),
                agent: init.agent,
                signal: init.signal.flatten(),
                high_water_mark: init.high_water_mark.unwrap_or(DEFAULT_HIGH_WATER_MARK),
            },
        )
    }

    /// Build a request from `source`, applying `init` on top.
    ///
    /// Without a body override, an unread source body is duplicated so both
    /// requests can be sent.
    pub fn from_request(source: &mut Request, init: RequestInit) -> Result<Self> {
        let method = match init.method.as_deref() {
            Some(method) => normalize_method(method),
            None => source.method.clone(),
        };
        // A source body counts even when the override replaces it.
        if is_bodyless(&method) && !source.body.is_null() {
            return Err(FetchError::BodyNotAllowed.into());
        }
        let body = match init.body {
            Some(body) => Body::new(body),
            None if !source.body.is_null() => source.body.try_clone()?,
            None => Body::empty(),
        };
        if is_bodyless(&method) && !body.is_null() {
            return Err(FetchError::BodyNotAllowed.into());
        }
        let headers = match init.headers {
            Some(headers) => HeaderMap::try_from_init(headers)?,
            None => source.headers.clone(),
        };
        let timeout = init.timeout.or(source.body.timeout());
        let size = init.size.unwrap_or(source.body.size_limit());
        Self::assemble(
            method,
            source.target.clone(),
            headers,
            body,
            timeout,
            size,
            Inherited {
                redirect: init.redirect.unwrap_or(source.redirect),
                follow: init.follow.unwrap_or(source.follow),
                counter: init.counter.unwrap_or(source.counter),
                compress: init.compress.unwrap_or(source.compress),
                agent: init.agent.or_else(|| source.agent.clone()),
                signal: match init.signal {
                    Some(signal) => signal,
                    None => source.signal.clone(),
                },
                high_water_mark: init.high_water_mark.unwrap_or(source.high_water_mark),
            },
        )
    }

    fn assemble(
        method: String,
        target: Target,
        mut headers: HeaderMap,
        mut body: Body,
        timeout: Option<Duration>,
        size: u64,
        inherited: Inherited,
    ) -> Result<Self> {
        body.set_limits(size, timeout);
        body.set_url(&target.raw);
        body.set_high_water_mark(inherited.high_water_mark);
        if !body.is_null() && !headers.has("Content-Type")? {
            if let Some(content_type) = body.inferred_content_type() {
                headers.append("Content-Type", content_type)?;
            }
        }
        Ok(Self {
            method,
            target,
            headers,
            body,
            redirect: inherited.redirect,
            follow: inherited.follow,
            counter: inherited.counter,
            compress: inherited.compress,
            agent: inherited.agent,
            signal: inherited.signal,
            high_water_mark: inherited.high_water_mark,
        })
    }

    /// Duplicate this request. Fails if its body was already read.
    pub fn try_clone(&mut self) -> Result<Request> {
        Request::from_request(self, RequestInit::default())
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.target.raw
    }

    /// The parsed target, when it is absolute.
    pub fn parsed_url(&self) -> Option<&Url> {
        self.target.url.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn redirect(&self) -> Redirect {
        self.redirect
    }

    pub fn follow(&self) -> u32 {
        self.follow
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn agent(&self) -> Option<&AgentSelector> {
        self.agent.as_ref()
    }

    pub fn signal(&self) -> Option<&AbortSignal> {
        self.signal.as_ref()
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Timeout applied to the transport call and to body drains.
    pub fn timeout(&self) -> Option<Duration> {
        self.body.timeout()
    }

    /// Byte cap applied to body drains; 0 means unlimited.
    pub fn size(&self) -> u64 {
        self.body.size_limit()
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

    /// Read the body as a [`Blob`] typed after this request's `Content-Type`.
    pub async fn blob(&mut self) -> Result<Blob> {
        let content_type = self.headers.get("Content-Type")?;
        self.body.blob_with_type(content_type).await
    }

    /// Describe this request as a transport call.
    pub fn transport_options(&self) -> Result<TransportOptions> {
        let mut headers = self.headers.clone();
        if !headers.has("Accept")? {
            headers.set("Accept", "*/*")?;
        }

        let url = match &self.target.url {
            Some(url) if url.has_host() => url.clone(),
            _ => return Err(FetchError::NotAbsoluteUrl(self.target.raw.clone()).into()),
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(self.target.raw.clone()).into());
        }
        if self.signal.is_some() && !self.body.supports_cancellation() {
            return Err(FetchError::AbortUnsupported.into());
        }

        let mut content_length = None;
        if self.body.is_null() && matches!(self.method.as_str(), "POST" | "PUT") {
            content_length = Some(0);
        }
        if !self.body.is_null() {
            if let Some(total) = self.body.total_bytes() {
                content_length = Some(total);
            }
        }
        if let Some(length) = content_length {
            headers.set("Content-Length", &length.to_string())?;
        }

        if !headers.has("User-Agent")? {
            headers.set("User-Agent", DEFAULT_USER_AGENT)?;
        }
        if self.compress && !headers.has("Accept-Encoding")? {
            headers.set("Accept-Encoding", "gzip,deflate")?;
        }

        let agent = self.agent.as_ref().and_then(|selector| selector.resolve(&url));
        if agent.is_none() && !headers.has("Connection")? {
            headers.set("Connection", "close")?;
        }

        Ok(TransportOptions {
            url,
            method: self.method.clone(),
            headers: headers.to_transport_record(),
            agent,
        })
    }
}

struct Inherited {
    redirect: Redirect,
    follow: u32,
    counter: u32,
    compress: bool,
    agent: Option<AgentSelector>,
    signal: Option<AbortSignal>,
    high_water_mark: usize,
}

fn normalize_method(method: &str) -> String {
    method.to_ascii_uppercase()
}

fn is_bodyless(method: &str) -> bool {
    matches!(method, "GET" | "HEAD")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::form::{FormData, UrlSearchParams};
    use crate::signal::AbortController;

    fn header<'a>(options: &'a TransportOptions, name: &str) -> Option<&'a str> {
        options.header(name)
    }

    #[test]
    fn get_projection_defaults() {
        let request = Request::new("https://example.com/x", RequestInit::new()).unwrap();
        let options = request.transport_options().unwrap();
        assert_eq!(options.method, "GET");
        assert_eq!(header(&options, "accept"), Some("*/*"));
        assert_eq!(header(&options, "connection"), Some("close"));
        assert_eq!(header(&options, "accept-encoding"), Some("gzip,deflate"));
        assert_eq!(header(&options, "user-agent"), Some(DEFAULT_USER_AGENT));
        assert_eq!(header(&options, "content-length"), None);
    }

    #[test]
    fn post_text_infers_type_and_length() {
        let request = Request::new(
            "https://example.com",
            RequestInit::new().method("POST").body("abc"),
        )
        .unwrap();
        assert_eq!(
            request.headers().get("content-type").unwrap().as_deref(),
            Some("text/plain;charset=UTF-8")
        );
        let options = request.transport_options().unwrap();
        assert_eq!(header(&options, "Content-Length"), Some("3"));
    }

    #[test]
    fn bodyless_post_and_put_send_zero_length() {
        for method in ["post", "PUT"] {
            let request =
                Request::new("http://example.com/", RequestInit::new().method(method)).unwrap();
            let options = request.transport_options().unwrap();
            assert_eq!(header(&options, "content-length"), Some("0"));
        }
        let request = Request::new("http://example.com/", RequestInit::new().method("DELETE")).unwrap();
        assert_eq!(header(&request.transport_options().unwrap(), "content-length"), None);
    }

    #[test]
    fn stream_body_has_no_length() {
        let stream = BodyInit::stream(futures_util::stream::iter(vec![Ok::<_, std::io::Error>(
            Bytes::from("x"),
        )]));
        let request = Request::new("http://a/", RequestInit::new().method("POST").body(stream)).unwrap();
        assert_eq!(header(&request.transport_options().unwrap(), "content-length"), None);
        assert_eq!(request.headers().get("content-type").unwrap(), None);
    }

    #[test]
    fn method_is_upper_cased() {
        let request = Request::new("http://a/", RequestInit::new().method("patch")).unwrap();
        assert_eq!(request.method(), "PATCH");
    }

    #[test]
    fn get_or_head_with_body_fails() {
        for method in ["GET", "head"] {
            let err = Request::new("http://a/", RequestInit::new().method(method).body("x")).unwrap_err();
            assert!(matches!(err, Error::Fetch(FetchError::BodyNotAllowed)));
        }
        assert!(Request::new("http://a/", RequestInit::new().method("POST").body("x")).is_ok());
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let request = Request::new(
            "http://a/",
            RequestInit::new()
                .method("POST")
                .header("Content-Type", "application/json")
                .body("{}"),
        )
        .unwrap();
        assert_eq!(
            request.headers().get_all("content-type").unwrap(),
            ["application/json"]
        );
    }

    #[test]
    fn form_and_multipart_bodies() {
        let params: UrlSearchParams = [("q", "1")].into_iter().collect();
        let request = Request::new("http://a/", RequestInit::new().method("POST").body(params)).unwrap();
        let options = request.transport_options().unwrap();
        assert_eq!(
            header(&options, "content-type"),
            Some("application/x-www-form-urlencoded;charset=UTF-8")
        );
        assert_eq!(header(&options, "content-length"), Some("3"));

        let mut form = FormData::with_boundary("b0");
        form.append_text("k", "v");
        let request = Request::new("http://a/", RequestInit::new().method("POST").body(form)).unwrap();
        let options = request.transport_options().unwrap();
        assert_eq!(header(&options, "content-type"), Some("multipart/form-data;boundary=b0"));
        assert!(header(&options, "content-length").is_some());
    }

    #[test]
    fn relative_and_non_http_targets_fail_projection() {
        let relative = Request::new("/only/a/path", RequestInit::new()).unwrap();
        assert_eq!(relative.url(), "/only/a/path");
        assert!(matches!(
            relative.transport_options(),
            Err(Error::Fetch(FetchError::NotAbsoluteUrl(_)))
        ));

        let ftp = Request::new("ftp://example.com/file", RequestInit::new()).unwrap();
        assert!(matches!(
            ftp.transport_options(),
            Err(Error::Fetch(FetchError::UnsupportedScheme(_)))
        ));
    }

    #[test]
    fn agent_suppresses_connection_close() {
        let request = Request::new(
            "http://a/",
            RequestInit::new().agent(Agent::new("pool")),
        )
        .unwrap();
        let options = request.transport_options().unwrap();
        assert_eq!(header(&options, "connection"), None);
        assert_eq!(options.agent.unwrap().name, "pool");
    }

    #[test]
    fn agent_can_depend_on_target() {
        let selector = AgentSelector::per_target(|url| {
            (url.scheme() == "https").then(|| Agent::new("tls"))
        });
        let https = Request::new("https://a/", RequestInit::new().agent(selector.clone())).unwrap();
        assert_eq!(https.transport_options().unwrap().agent.unwrap().name, "tls");

        let http = Request::new("http://a/", RequestInit::new().agent(selector)).unwrap();
        let options = http.transport_options().unwrap();
        assert!(options.agent.is_none());
        assert_eq!(header(&options, "connection"), Some("close"));
    }

    #[test]
    fn compression_can_be_disabled() {
        let request = Request::new("http://a/", RequestInit::new().compress(false)).unwrap();
        assert_eq!(header(&request.transport_options().unwrap(), "accept-encoding"), None);
    }

    #[test]
    fn signal_with_reader_body_is_rejected() {
        let controller = AbortController::new();
        let request = Request::new(
            "http://a/",
            RequestInit::new()
                .method("POST")
                .body(BodyInit::reader(std::io::Cursor::new(b"x".to_vec())))
                .signal(controller.signal()),
        )
        .unwrap();
        assert!(matches!(
            request.transport_options(),
            Err(Error::Fetch(FetchError::AbortUnsupported))
        ));
    }

    #[test]
    fn invalid_header_in_init_fails_construction() {
        let err = Request::new("http://a/", RequestInit::new().header("bad name", "v")).unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::InvalidHeaderName(_))));
    }

    #[test]
    fn redirect_mode_parses() {
        assert_eq!("manual".parse::<Redirect>().unwrap(), Redirect::Manual);
        assert!(matches!(
            "sometimes".parse::<Redirect>(),
            Err(FetchError::InvalidRedirectMode(_))
        ));
    }

    #[tokio::test]
    async fn from_request_copies_fields_and_duplicates_body() {
        let controller = AbortController::new();
        let mut source = Request::new(
            "https://example.com/a",
            RequestInit::new()
                .method("PUT")
                .header("X-Trace", "1")
                .body("payload")
                .redirect(Redirect::Manual)
                .follow(3)
                .compress(false)
                .signal(controller.signal()),
        )
        .unwrap();

        let mut copy = Request::from_request(&mut source, RequestInit::new()).unwrap();
        assert_eq!(copy.method(), "PUT");
        assert_eq!(copy.url(), "https://example.com/a");
        assert_eq!(copy.redirect(), Redirect::Manual);
        assert_eq!(copy.follow(), 3);
        assert!(!copy.compress());
        assert!(copy.signal().is_some());
        assert_eq!(copy.headers().get("x-trace").unwrap().as_deref(), Some("1"));

        copy.headers_mut().set("X-Trace", "2").unwrap();
        assert_eq!(source.headers().get("x-trace").unwrap().as_deref(), Some("1"));

        assert_eq!(copy.text().await.unwrap(), "payload");
        assert_eq!(source.text().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn from_request_overrides_win() {
        let mut source = Request::new(
            "http://a/",
            RequestInit::new().method("POST").body("old").signal(AbortController::new().signal()),
        )
        .unwrap();
        let mut copy = Request::from_request(
            &mut source,
            RequestInit::new().body("new").follow(0).no_signal(),
        )
        .unwrap();
        assert_eq!(copy.follow(), 0);
        assert!(copy.signal().is_none());
        assert_eq!(copy.text().await.unwrap(), "new");
        assert!(!source.body_used());
    }

    #[test]
    fn from_request_rejects_get_over_source_body() {
        let mut source =
            Request::new("http://a/", RequestInit::new().method("POST").body("x")).unwrap();
        let err = Request::from_request(&mut source, RequestInit::new().method("GET")).unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::BodyNotAllowed)));
    }

    #[test]
    fn get_accepts_wrapped_null_body() {
        let request =
            Request::new("http://a/", RequestInit::new().body(Body::empty())).unwrap();
        assert!(request.body().is_null());
    }

    #[test]
    fn null_override_does_not_hide_source_body() {
        let mut source =
            Request::new("http://a/", RequestInit::new().method("POST").body("x")).unwrap();
        let err = Request::from_request(
            &mut source,
            RequestInit::new().method("HEAD").body(BodyInit::Empty),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::BodyNotAllowed)));
        assert!(!source.body_used());
    }

    #[tokio::test]
    async fn clone_after_body_read_fails() {
        let mut request =
            Request::new("http://a/", RequestInit::new().method("POST").body("x")).unwrap();
        request.text().await.unwrap();
        assert!(matches!(
            request.try_clone(),
            Err(Error::Fetch(FetchError::CloneAfterUse))
        ));
    }

    #[tokio::test]
    async fn blob_uses_content_type_header() {
        let mut request = Request::new(
            "http://a/",
            RequestInit::new()
                .method("POST")
                .body(Blob::new(["x"], "image/png")),
        )
        .unwrap();
        let blob = request.blob().await.unwrap();
        assert_eq!(blob.content_type(), "image/png");
    }
}
