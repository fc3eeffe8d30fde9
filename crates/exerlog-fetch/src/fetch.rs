//! The fetch driver: send a [`Request`] through a [`Transport`] and
//! assemble the [`Response`].
//!
//! The transport call races the request's abort signal and its timeout.
//! Redirects are handled according to the request's [`Redirect`] mode, and
//! `gzip`/`deflate` payloads are decoded while the body is read.

use tracing::{debug, warn};
use url::Url;

use crate::body::{Body, BodyInit};
use crate::decode::{Encoding, decode};
use crate::error::{AbortError, Error, FetchError, Result};
use crate::header::HeaderMap;
use crate::request::{Redirect, Request, RequestInit};
use crate::response::{Response, ResponseInit};
use crate::signal::{AbortSignal, abortable};
use crate::transport::{Transport, TransportResponse};

/// Headers dropped when a redirect leaves the original host or protocol.
const CREDENTIAL_HEADERS: [&str; 4] = ["authorization", "www-authenticate", "cookie", "cookie2"];

/// Perform `request` and every redirect it is allowed to follow.
pub async fn fetch<T: Transport>(transport: &T, mut request: Request) -> Result<Response> {
    loop {
        let signal = request.signal().cloned();
        if signal.as_ref().is_some_and(AbortSignal::aborted) {
            debug!(url = %request.url(), "request aborted before sending");
            return Err(AbortError.into());
        }

        // Buffered bodies are kept so a redirect can send them again.
        let replay = match request.body().total_bytes() {
            Some(_) if !request.body().is_null() => Some(request.body_mut().try_clone()?),
            _ => None,
        };

        let sent = send(transport, &mut request, signal.as_ref()).await?;
        let mut headers = HeaderMap::from_lenient(
            sent.headers.iter().map(|(name, value)| (name.as_str(), value.as_str())),
        );

        if is_redirect(sent.status) {
            if let Some(next) = redirect(&request, sent.status, &mut headers, replay)? {
                request = next;
                continue;
            }
        }

        return respond(&request, sent, headers, signal);
    }
}

async fn send<T: Transport>(
    transport: &T,
    request: &mut Request,
    signal: Option<&AbortSignal>,
) -> Result<TransportResponse> {
    let options = request.transport_options()?;
    let url = request.url().to_owned();
    let timeout = request.timeout();
    let body = request.body_mut().take_stream()?;

    let exchange = async {
        let call = transport.send(options, body);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%url, timeout_ms = limit.as_millis() as u64, "request timed out");
                    return Err(Error::from(FetchError::RequestTimeout(url.clone())));
                }
            },
            None => call.await,
        };
        result.map_err(|source| {
            debug!(%url, error = %source, "transport failed");
            Error::from(FetchError::System {
                url: url.clone(),
                source,
            })
        })
    };

    match signal {
        Some(signal) => tokio::select! {
            biased;
            _ = signal.cancelled() => {
                debug!(%url, "request aborted");
                Err(AbortError.into())
            }
            result = exchange => result,
        },
        None => exchange.await,
    }
}

/// Apply the redirect mode. Returns the request to send next, or `None`
/// when the redirect response itself goes back to the caller.
fn redirect(
    request: &Request,
    status: u16,
    headers: &mut HeaderMap,
    replay: Option<Body>,
) -> Result<Option<Request>> {
    let Some(location) = headers.get("Location")? else {
        if request.redirect() == Redirect::Error {
            return Err(FetchError::NoRedirect(request.url().to_owned()).into());
        }
        return Ok(None);
    };
    let resolved = request.parsed_url().and_then(|base| base.join(&location).ok());

    if resolved.is_none() && request.redirect() != Redirect::Manual {
        return Err(FetchError::InvalidRedirect(location).into());
    }

    match request.redirect() {
        Redirect::Error => Err(FetchError::NoRedirect(request.url().to_owned()).into()),
        Redirect::Manual => {
            if let Some(target) = resolved {
                headers.set("Location", target.as_str())?;
            }
            Ok(None)
        }
        Redirect::Follow => {
            let Some(target) = resolved else {
                return Ok(None);
            };
            if request.follow() == 0 {
                return Err(FetchError::MaxRedirect(request.url().to_owned()).into());
            }
            follow(request, status, target, replay).map(Some)
        }
    }
}

fn follow(request: &Request, status: u16, target: Url, replay: Option<Body>) -> Result<Request> {
    let mut headers = request.headers().clone();
    let same_site = request.parsed_url().is_some_and(|current| {
        is_domain_or_subdomain(&target, current) && target.scheme() == current.scheme()
    });
    if !same_site {
        for name in CREDENTIAL_HEADERS {
            headers.delete(name)?;
        }
    }

    if status != 303 && !request.body().is_null() && replay.is_none() {
        return Err(FetchError::UnsupportedRedirect.into());
    }

    let mut method = request.method().to_owned();
    let mut body = replay;
    if status == 303 || (matches!(status, 301 | 302) && method == "POST") {
        method = "GET".to_owned();
        body = None;
        headers.delete("Content-Length")?;
    }

    debug!(from = %request.url(), to = %target, status, "following redirect");

    let init = RequestInit {
        method: Some(method),
        headers: Some(headers.into()),
        body: body.map(BodyInit::Body),
        redirect: Some(request.redirect()),
        follow: Some(request.follow() - 1),
        counter: Some(request.counter() + 1),
        compress: Some(request.compress()),
        agent: request.agent().cloned(),
        signal: Some(request.signal().cloned()),
        timeout: request.timeout(),
        size: Some(request.size()),
        high_water_mark: Some(request.high_water_mark()),
    };
    Request::new(target, init)
}

fn respond(
    request: &Request,
    sent: TransportResponse,
    headers: HeaderMap,
    signal: Option<AbortSignal>,
) -> Result<Response> {
    let mut stream = sent.body;

    let decodable = request.compress()
        && request.method() != "HEAD"
        && !matches!(sent.status, 204 | 304);
    if decodable {
        let coding = headers.get("Content-Encoding")?;
        if let Some(encoding) = coding.as_deref().and_then(Encoding::from_header) {
            stream = decode(stream, encoding);
        }
    }

    let aborted = signal.as_ref().is_some_and(AbortSignal::aborted);
    if let Some(signal) = signal {
        stream = abortable(stream, signal);
    }

    let init = ResponseInit {
        url: Some(request.url().to_owned()),
        status: Some(sent.status),
        status_text: Some(sent.status_text),
        headers: Some(headers.into()),
        counter: Some(request.counter()),
        size: Some(request.size()),
        timeout: request.timeout(),
        high_water_mark: Some(request.high_water_mark()),
    };
    let mut response = Response::new(BodyInit::Stream(stream), init)?;
    if aborted {
        response.body_mut().record_error(AbortError.into());
    }
    Ok(response)
}

pub(crate) fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Whether `destination` is `original`'s host or one of its subdomains.
fn is_domain_or_subdomain(destination: &Url, original: &Url) -> bool {
    let (Some(dest), Some(orig)) = (destination.host_str(), original.host_str()) else {
        return false;
    };
    dest == orig || dest.strip_suffix(orig).is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn redirect_statuses() {
        for status in [301, 302, 303, 307, 308] {
            assert!(is_redirect(status));
        }
        for status in [200, 300, 304, 305, 306, 400] {
            assert!(!is_redirect(status));
        }
    }

    #[test]
    fn subdomain_matching() {
        let original = url("https://example.com/");
        assert!(is_domain_or_subdomain(&url("https://example.com/x"), &original));
        assert!(is_domain_or_subdomain(&url("https://api.example.com/"), &original));
        assert!(!is_domain_or_subdomain(&url("https://badexample.com/"), &original));
        assert!(!is_domain_or_subdomain(&url("https://other.org/"), &original));
        assert!(!is_domain_or_subdomain(&original, &url("https://api.example.com/")));
    }

    #[test]
    fn follow_strips_credentials_across_hosts() {
        let request = Request::new(
            "https://example.com/start",
            RequestInit::new()
                .header("Authorization", "Bearer t")
                .header("Cookie", "a=1")
                .header("X-Keep", "yes"),
        )
        .unwrap();

        let same = follow(&request, 302, url("https://api.example.com/next"), None).unwrap();
        assert!(same.headers().has("authorization").unwrap());

        let other = follow(&request, 302, url("https://elsewhere.test/next"), None).unwrap();
        assert!(!other.headers().has("authorization").unwrap());
        assert!(!other.headers().has("cookie").unwrap());
        assert!(other.headers().has("x-keep").unwrap());

        let downgraded = follow(&request, 302, url("http://example.com/next"), None).unwrap();
        assert!(!downgraded.headers().has("authorization").unwrap());
    }

    #[test]
    fn follow_updates_counters() {
        let request = Request::new("http://a/", RequestInit::new().follow(5)).unwrap();
        let next = follow(&request, 301, url("http://a/b"), None).unwrap();
        assert_eq!(next.follow(), 4);
        assert_eq!(next.counter(), 1);
        assert_eq!(next.url(), "http://a/b");
    }

    #[test]
    fn see_other_switches_to_get() {
        let mut request = Request::new(
            "http://a/",
            RequestInit::new().method("PUT").body("data"),
        )
        .unwrap();
        let replay = request.body_mut().try_clone().unwrap();
        let next = follow(&request, 303, url("http://a/done"), Some(replay)).unwrap();
        assert_eq!(next.method(), "GET");
        assert!(next.body().is_null());
    }

    #[test]
    fn post_becomes_get_on_301_and_302_only() {
        for (status, expected) in [(301, "GET"), (302, "GET"), (307, "POST"), (308, "POST")] {
            let mut request =
                Request::new("http://a/", RequestInit::new().method("POST").body("x")).unwrap();
            let replay = request.body_mut().try_clone().unwrap();
            let next = follow(&request, status, url("http://a/b"), Some(replay)).unwrap();
            assert_eq!(next.method(), expected, "status {status}");
        }
    }

    #[test]
    fn unreplayable_body_cannot_follow() {
        let stream = BodyInit::stream(futures_util::stream::iter(vec![Ok::<_, std::io::Error>(
            bytes::Bytes::from("x"),
        )]));
        let request = Request::new("http://a/", RequestInit::new().method("POST").body(stream)).unwrap();
        let err = follow(&request, 307, url("http://a/b"), None).unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::UnsupportedRedirect)));
    }

    #[test]
    fn manual_mode_rewrites_location() {
        let request = Request::new(
            "http://a/dir/page",
            RequestInit::new().redirect(Redirect::Manual),
        )
        .unwrap();
        let mut headers = HeaderMap::try_from_init([("Location", "../other")]).unwrap();
        let next = redirect(&request, 302, &mut headers, None).unwrap();
        assert!(next.is_none());
        assert_eq!(headers.get("location").unwrap().as_deref(), Some("http://a/other"));
    }

    #[test]
    fn error_mode_rejects() {
        let request = Request::new("http://a/", RequestInit::new().redirect(Redirect::Error)).unwrap();
        let mut headers = HeaderMap::try_from_init([("Location", "/b")]).unwrap();
        let err = redirect(&request, 301, &mut headers, None).unwrap_err();
        assert_eq!(err.fetch_kind(), Some(crate::error::FetchErrorKind::NoRedirect));
    }

    #[test]
    fn exhausted_follow_count() {
        let request = Request::new("http://a/", RequestInit::new().follow(0)).unwrap();
        let mut headers = HeaderMap::try_from_init([("Location", "/b")]).unwrap();
        let err = redirect(&request, 302, &mut headers, None).unwrap_err();
        assert_eq!(err.fetch_kind(), Some(crate::error::FetchErrorKind::MaxRedirect));
    }

    #[test]
    fn redirect_without_location_is_returned() {
        let request = Request::new("http://a/", RequestInit::new()).unwrap();
        let mut headers = HeaderMap::new();
        assert!(redirect(&request, 302, &mut headers, None).unwrap().is_none());
    }
}
