//! The byte-moving boundary beneath [`fetch`](crate::fetch).
//!
//! A [`Transport`] receives a projected [`TransportOptions`] plus an
//! optional request body stream, and returns the raw status, headers and
//! body stream of the reply. [`HyperTransport`] performs HTTP/1.1 over TCP,
//! with TLS through rustls for `https` targets.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::{Frame, Incoming};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::body::ByteStream;
use crate::error::{BoxError, StreamError};
use crate::request::TransportOptions;

/// Raw reply of a transport call.
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: ByteStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Performs one HTTP exchange.
///
/// Socket-level failures are returned as-is; the caller wraps them into a
/// `System` fetch error.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        options: TransportOptions,
        body: Option<ByteStream>,
    ) -> impl Future<Output = Result<TransportResponse, BoxError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        options: TransportOptions,
        body: Option<ByteStream>,
    ) -> impl Future<Output = Result<TransportResponse, BoxError>> + Send {
        (**self).send(options, body)
    }
}

type RequestBody = UnsyncBoxBody<Bytes, StreamError>;

/// HTTP/1.1 transport over plain TCP or rustls.
///
/// Opens one connection per call; the request's `Connection` header
/// decides whether the server keeps it open.
#[derive(Clone)]
pub struct HyperTransport {
    tls: Arc<rustls::ClientConfig>,
}

impl HyperTransport {
    /// A transport trusting the Mozilla root certificate store.
    pub fn new() -> Result<Self, BoxError> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self::with_tls_config(Arc::new(config)))
    }

    pub fn with_tls_config(tls: Arc<rustls::ClientConfig>) -> Self {
        Self { tls }
    }

    async fn exchange(
        &self,
        options: TransportOptions,
        body: Option<ByteStream>,
    ) -> Result<TransportResponse, BoxError> {
        let url = &options.url;
        let host = url.host_str().ok_or("target has no host")?;
        let port = url
            .port_or_known_default()
            .ok_or("target has no port")?;
        let connect_host = host.trim_start_matches('[').trim_end_matches(']');

        let connect = TcpStream::connect((connect_host, port));
        let stream = match options.agent.as_ref().and_then(|agent| agent.connect_timeout) {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??,
            None => connect.await?,
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }

        let tls = url.scheme() == "https";
        debug!(host = %connect_host, port, tls, "connected");

        let request = build_request(&options, body)?;
        let response = if tls {
            let server_name = rustls::pki_types::ServerName::try_from(connect_host)?.to_owned();
            let stream = tokio_rustls::TlsConnector::from(Arc::clone(&self.tls))
                .connect(server_name, stream)
                .await?;
            send_over(stream, request).await?
        } else {
            send_over(stream, request).await?
        };

        let (parts, incoming) = response.into_parts();
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        Ok(TransportResponse {
            status: parts.status.as_u16(),
            status_text: parts.status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body: Box::pin(TryStreamExt::map_err(
                incoming.into_data_stream(),
                StreamError::new,
            )),
        })
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl Transport for HyperTransport {
    fn send(
        &self,
        options: TransportOptions,
        body: Option<ByteStream>,
    ) -> impl Future<Output = Result<TransportResponse, BoxError>> + Send {
        self.exchange(options, body)
    }
}

fn build_request(
    options: &TransportOptions,
    body: Option<ByteStream>,
) -> Result<http::Request<RequestBody>, BoxError> {
    let url = &options.url;
    let mut target = url.path().to_owned();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut builder = http::Request::builder()
        .method(options.method.as_str())
        .uri(target);
    for (name, values) in &options.headers {
        for value in values.iter() {
            builder = builder.header(name.as_str(), value);
        }
    }
    if options.header("Host").is_none() {
        let host = url.host_str().unwrap_or_default();
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        builder = builder.header("Host", authority);
    }

    let body = match body {
        Some(stream) => StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
        None => Empty::<Bytes>::new()
            .map_err(|never| match never {})
            .boxed_unsync(),
    };
    Ok(builder.body(body)?)
}

async fn send_over<S>(
    io: S,
    request: http::Request<RequestBody>,
) -> Result<http::Response<Incoming>, BoxError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = hyper_util::rt::TokioIo::new(io);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "connection closed with error");
        }
    });

    Ok(sender.send_request(request).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderValues;

    fn options(url: &str, headers: Vec<(&str, &str)>) -> TransportOptions {
        TransportOptions {
            url: url::Url::parse(url).unwrap(),
            method: "POST".into(),
            headers: headers
                .into_iter()
                .map(|(n, v)| (n.to_owned(), HeaderValues::Many(vec![v.to_owned()])))
                .collect(),
            agent: None,
        }
    }

    #[test]
    fn request_uses_origin_form_and_host() {
        let request = build_request(&options("http://example.com:8080/a/b?x=1", vec![]), None).unwrap();
        assert_eq!(request.uri(), "/a/b?x=1");
        assert_eq!(request.method(), "POST");
        assert_eq!(request.headers()["host"], "example.com:8080");
    }

    #[test]
    fn default_port_is_omitted_from_host() {
        let request = build_request(&options("https://example.com/", vec![]), None).unwrap();
        assert_eq!(request.headers()["host"], "example.com");
    }

    #[test]
    fn explicit_host_and_repeated_headers_are_kept() {
        let mut opts = options("http://a/", vec![("Host", "b.test")]);
        opts.headers.push((
            "Accept".into(),
            HeaderValues::Many(vec!["text/html".into(), "*/*".into()]),
        ));
        let request = build_request(&opts, None).unwrap();
        assert_eq!(request.headers()["host"], "b.test");
        assert_eq!(request.headers().get_all("accept").iter().count(), 2);
    }

    #[test]
    fn tls_config_builds() {
        assert!(HyperTransport::new().is_ok());
    }
}
