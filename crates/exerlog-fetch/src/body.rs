//! Single-use message bodies.
//!
//! A [`Body`] wraps one of: nothing, an in-memory buffer, a [`Blob`], or a
//! byte stream. It may be read exactly once through one of the consuming
//! accessors ([`bytes`](Body::bytes), [`text`](Body::text),
//! [`json`](Body::json), [`blob`](Body::blob), ...). Stream drains honor a
//! byte cap and a timeout; whichever of completion, cap or timeout comes
//! first decides the outcome.
//!
//! Before it is read, a body can be duplicated with
//! [`try_clone`](Body::try_clone). Stream-backed bodies are split with a
//! tee so that both copies observe the same bytes independently.

use std::fmt;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::blob::Blob;
use crate::content_type::extract_content_type;
use crate::error::{BoxError, Error, FetchError, Result, StreamError};
use crate::form::{MultipartEncoder, UrlSearchParams};
use crate::tee::tee;

/// Default chunk size for breaking buffered bodies into stream chunks (64 KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default chunk size used when a buffered body is streamed to a transport.
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

/// A type-erased, fallible async stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, StreamError>> + Send>>;

/// Recognized inputs for a message body.
///
/// Anything outside this set goes through [`BodyInit::display`], which
/// stringifies the value and encodes it as UTF-8.
pub enum BodyInit {
    Empty,
    Bytes(Bytes),
    Text(String),
    Form(UrlSearchParams),
    Blob(Blob),
    Stream(ByteStream),
    /// A blocking reader. It is pumped from a blocking thread and cannot be
    /// cancelled once a read is in flight.
    Reader(Box<dyn Read + Send>),
    Multipart(Box<dyn MultipartEncoder>),
    /// An existing body, moved as is.
    Body(Body),
}

impl BodyInit {
    /// Wrap any fallible stream of byte chunks.
    pub fn stream<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: Into<Bytes>,
        E: Into<BoxError>,
    {
        BodyInit::Stream(Box::pin(
            stream.map(|item| item.map(Into::into).map_err(StreamError::new)),
        ))
    }

    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        BodyInit::Reader(Box::new(reader))
    }

    /// Fallback for values outside the recognized set: their string form.
    pub fn display(value: impl fmt::Display) -> Self {
        BodyInit::Text(value.to_string())
    }
}

impl fmt::Debug for BodyInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BodyInit::Empty => "Empty",
            BodyInit::Bytes(_) => "Bytes",
            BodyInit::Text(_) => "Text",
            BodyInit::Form(_) => "Form",
            BodyInit::Blob(_) => "Blob",
            BodyInit::Stream(_) => "Stream",
            BodyInit::Reader(_) => "Reader",
            BodyInit::Multipart(_) => "Multipart",
            BodyInit::Body(_) => "Body",
        };
        f.debug_tuple("BodyInit").field(&name).finish()
    }
}

impl From<()> for BodyInit {
    fn from(_: ()) -> Self {
        BodyInit::Empty
    }
}

impl From<&str> for BodyInit {
    fn from(text: &str) -> Self {
        BodyInit::Text(text.to_owned())
    }
}

impl From<String> for BodyInit {
    fn from(text: String) -> Self {
        BodyInit::Text(text)
    }
}

impl From<Bytes> for BodyInit {
    fn from(bytes: Bytes) -> Self {
        BodyInit::Bytes(bytes)
    }
}

impl From<Vec<u8>> for BodyInit {
    fn from(bytes: Vec<u8>) -> Self {
        BodyInit::Bytes(bytes.into())
    }
}

impl From<&'static [u8]> for BodyInit {
    fn from(bytes: &'static [u8]) -> Self {
        BodyInit::Bytes(Bytes::from_static(bytes))
    }
}

impl From<Blob> for BodyInit {
    fn from(blob: Blob) -> Self {
        BodyInit::Blob(blob)
    }
}

impl From<UrlSearchParams> for BodyInit {
    fn from(params: UrlSearchParams) -> Self {
        BodyInit::Form(params)
    }
}

impl From<crate::form::FormData> for BodyInit {
    fn from(form: crate::form::FormData) -> Self {
        BodyInit::Multipart(Box::new(form))
    }
}

impl From<serde_json::Value> for BodyInit {
    fn from(value: serde_json::Value) -> Self {
        BodyInit::display(value)
    }
}

impl From<ByteStream> for BodyInit {
    fn from(stream: ByteStream) -> Self {
        BodyInit::Stream(stream)
    }
}

impl From<Body> for BodyInit {
    fn from(body: Body) -> Self {
        BodyInit::Body(body)
    }
}

enum Source {
    Empty,
    Bytes(Bytes),
    Blob(Blob),
    Stream(StreamSource),
    /// The payload was handed out; only the disturbed flag remains.
    Taken,
}

struct StreamSource {
    stream: ByteStream,
    known_length: Option<u64>,
    cancellable: bool,
}

/// A single-use message payload.
pub struct Body {
    source: Source,
    disturbed: bool,
    error: Option<Error>,
    content_type: Option<String>,
    size: u64,
    timeout: Option<Duration>,
    url: String,
    high_water_mark: usize,
}

impl Body {
    pub fn new(init: impl Into<BodyInit>) -> Self {
        let init = init.into();
        let content_type = extract_content_type(&init);
        let source = match init {
            BodyInit::Body(body) => return body,
            BodyInit::Empty => Source::Empty,
            BodyInit::Bytes(bytes) => Source::Bytes(bytes),
            BodyInit::Text(text) => Source::Bytes(text.into()),
            BodyInit::Form(params) => Source::Bytes(params.to_string().into()),
            BodyInit::Blob(blob) => Source::Blob(blob),
            BodyInit::Stream(stream) => Source::Stream(StreamSource {
                stream,
                known_length: None,
                cancellable: true,
            }),
            BodyInit::Reader(reader) => Source::Stream(StreamSource {
                stream: reader_stream(reader, DEFAULT_HIGH_WATER_MARK),
                known_length: None,
                cancellable: false,
            }),
            BodyInit::Multipart(encoder) => Source::Stream(StreamSource {
                known_length: encoder.known_length(),
                stream: encoder.into_stream(),
                cancellable: true,
            }),
        };
        Self {
            source,
            disturbed: false,
            error: None,
            content_type,
            size: 0,
            timeout: None,
            url: String::new(),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }

    pub fn empty() -> Self {
        Self::new(BodyInit::Empty)
    }

    /// Whether the body was constructed without a payload.
    pub fn is_null(&self) -> bool {
        matches!(self.source, Source::Empty)
    }

    /// Whether a consuming accessor has been called.
    pub fn body_used(&self) -> bool {
        self.disturbed
    }

    /// Media type inferred from the construction input.
    pub fn inferred_content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Byte cap for stream drains; 0 means unlimited.
    pub fn size_limit(&self) -> u64 {
        self.size
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Total payload length, when it is known without reading.
    pub fn total_bytes(&self) -> Option<u64> {
        match &self.source {
            Source::Empty => Some(0),
            Source::Bytes(bytes) => Some(bytes.len() as u64),
            Source::Blob(blob) => Some(blob.size()),
            Source::Stream(stream) => stream.known_length,
            Source::Taken => None,
        }
    }

    /// Whether an in-flight read of this body can be cancelled.
    pub fn supports_cancellation(&self) -> bool {
        match &self.source {
            Source::Stream(stream) => stream.cancellable,
            _ => true,
        }
    }

    pub(crate) fn set_limits(&mut self, size: u64, timeout: Option<Duration>) {
        self.size = size;
        self.timeout = timeout.filter(|t| !t.is_zero());
    }

    pub(crate) fn set_url(&mut self, url: &str) {
        self.url = url.to_owned();
    }

    pub(crate) fn set_high_water_mark(&mut self, high_water_mark: usize) {
        self.high_water_mark = high_water_mark.max(1);
    }

    /// Record a failure to replay on the first read.
    pub(crate) fn record_error(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Read the whole payload.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        self.consume().await
    }

    pub async fn array_buffer(&mut self) -> Result<Vec<u8>> {
        Ok(self.consume().await?.to_vec())
    }

    /// Read the whole payload as UTF-8, replacing invalid sequences.
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.consume().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the whole payload and parse it as JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.consume().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read the whole payload into a [`Blob`] typed after the source blob.
    pub async fn blob(&mut self) -> Result<Blob> {
        self.blob_with_type(None).await
    }

    /// Like [`blob`](Body::blob), preferring `content_type` (typically the
    /// owning message's `Content-Type`) over the source blob's type.
    pub(crate) async fn blob_with_type(&mut self, content_type: Option<String>) -> Result<Blob> {
        let source_type = match &self.source {
            Source::Blob(blob) => Some(blob.content_type().to_owned()),
            _ => None,
        };
        let bytes = self.consume().await?;
        let content_type = content_type.or(source_type).unwrap_or_default();
        Ok(Blob::from_bytes(bytes, &content_type))
    }

    /// Hand the payload out as a stream, marking the body used.
    ///
    /// Returns `None` for a body without payload.
    pub fn take_stream(&mut self) -> Result<Option<ByteStream>> {
        if self.disturbed {
            return Err(FetchError::BodyUsed(self.url.clone()).into());
        }
        self.disturbed = true;
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if self.is_null() {
            return Ok(None);
        }
        Ok(match std::mem::replace(&mut self.source, Source::Taken) {
            Source::Empty | Source::Taken => None,
            Source::Bytes(bytes) => Some(Box::pin(ChunkedBytesStream::new(
                bytes,
                self.high_water_mark,
            ))),
            Source::Blob(blob) => Some(blob.stream_chunked(self.high_water_mark)),
            Source::Stream(stream) => Some(stream.stream),
        })
    }

    /// Duplicate an unread body.
    ///
    /// Buffered payloads are shared; stream payloads are split so that this
    /// body keeps one branch and the returned body owns the other.
    pub fn try_clone(&mut self) -> Result<Body> {
        if self.disturbed {
            return Err(FetchError::CloneAfterUse.into());
        }
        let source = match &mut self.source {
            Source::Empty => Source::Empty,
            Source::Bytes(bytes) => Source::Bytes(bytes.clone()),
            Source::Blob(blob) => Source::Blob(blob.clone()),
            Source::Stream(stream) => {
                let upstream = std::mem::replace(&mut stream.stream, Box::pin(futures_util::stream::empty()));
                let (mine, theirs) = tee(upstream);
                stream.stream = mine;
                Source::Stream(StreamSource {
                    stream: theirs,
                    known_length: stream.known_length,
                    cancellable: stream.cancellable,
                })
            }
            Source::Taken => return Err(FetchError::CloneAfterUse.into()),
        };
        Ok(Body {
            source,
            disturbed: false,
            error: None,
            content_type: self.content_type.clone(),
            size: self.size,
            timeout: self.timeout,
            url: self.url.clone(),
            high_water_mark: self.high_water_mark,
        })
    }

    async fn consume(&mut self) -> Result<Bytes> {
        if self.disturbed {
            return Err(FetchError::BodyUsed(self.url.clone()).into());
        }
        self.disturbed = true;
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if self.is_null() {
            return Ok(Bytes::new());
        }
        match std::mem::replace(&mut self.source, Source::Taken) {
            Source::Empty | Source::Taken => Ok(Bytes::new()),
            Source::Bytes(bytes) => Ok(bytes),
            Source::Blob(blob) => {
                let stream = blob.stream_chunked(self.high_water_mark);
                drain(stream, self.size, self.timeout, &self.url).await
            }
            Source::Stream(stream) => drain(stream.stream, self.size, self.timeout, &self.url).await,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Empty => "empty",
            Source::Bytes(_) => "bytes",
            Source::Blob(_) => "blob",
            Source::Stream(_) => "stream",
            Source::Taken => "taken",
        };
        f.debug_struct("Body")
            .field("source", &source)
            .field("disturbed", &self.disturbed)
            .field("size", &self.size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Accumulate a stream in arrival order, bounded by `size` bytes (0 means
/// unlimited) and by `timeout` measured from the first poll.
async fn drain(
    mut stream: ByteStream,
    size: u64,
    timeout: Option<Duration>,
    url: &str,
) -> Result<Bytes> {
    let collect = async {
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut total: u64 = 0;
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|err| {
                debug!(%url, error = %err, "body stream failed");
                Error::from_stream(url, err)
            })?;
            if size > 0 && total + chunk.len() as u64 > size {
                warn!(%url, limit = size, "body exceeded size limit");
                return Err(FetchError::MaxSize {
                    url: url.to_owned(),
                    limit: size,
                }
                .into());
            }
            total += chunk.len() as u64;
            chunks.push(chunk);
        }
        Ok(concat(chunks, total))
    };

    match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, collect).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%url, timeout_ms = timeout.as_millis() as u64, "body read timed out");
                Err(FetchError::BodyTimeout {
                    url: url.to_owned(),
                    timeout,
                }
                .into())
            }
        },
        None => collect.await,
    }
}

/// A single chunk is returned as is; several are copied once.
fn concat(mut chunks: Vec<Bytes>, total: u64) -> Bytes {
    match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.pop().unwrap_or_default(),
        _ => {
            let mut buf = BytesMut::with_capacity(total as usize);
            for chunk in chunks {
                buf.extend_from_slice(&chunk);
            }
            buf.freeze()
        }
    }
}

/// Pump a blocking reader from a blocking thread. The thread is spawned on
/// first poll so the body can be built outside a runtime.
fn reader_stream(reader: Box<dyn Read + Send>, chunk_size: usize) -> ByteStream {
    struct State {
        reader: Option<Box<dyn Read + Send>>,
        rx: Option<tokio::sync::mpsc::Receiver<std::io::Result<Bytes>>>,
    }

    let state = State {
        reader: Some(reader),
        rx: None,
    };
    Box::pin(futures_util::stream::unfold(state, move |mut state| async move {
        if let Some(reader) = state.reader.take() {
            state.rx = Some(spawn_reader(reader, chunk_size));
        }
        let item = state.rx.as_mut()?.recv().await?;
        Some((item.map_err(StreamError::from), state))
    }))
}

fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    chunk_size: usize,
) -> tokio::sync::mpsc::Receiver<std::io::Result<Bytes>> {
    let (tx, rx) = tokio::sync::mpsc::channel(2);
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; chunk_size.max(1)];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    let _ = tx.blocking_send(Err(err));
                    break;
                }
            }
        }
    });
    rx
}

/// Yields a `Bytes` buffer in fixed-size chunks without copying.
///
/// Uses `Bytes::slice()` for zero-copy sub-slicing backed by the same
/// reference-counted allocation.
pub(crate) struct ChunkedBytesStream {
    buf: Bytes,
    chunk_size: usize,
    offset: usize,
}

impl ChunkedBytesStream {
    pub fn new(buf: Bytes, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be > 0");
        Self {
            buf,
            chunk_size,
            offset: 0,
        }
    }
}

impl Stream for ChunkedBytesStream {
    type Item = std::result::Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.offset >= this.buf.len() {
            return Poll::Ready(None);
        }
        let end = std::cmp::min(this.offset + this.chunk_size, this.buf.len());
        let chunk = this.buf.slice(this.offset..end);
        this.offset = end;
        Poll::Ready(Some(Ok(chunk)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AbortError, FetchErrorKind};

    fn chunks(parts: &[&'static str]) -> BodyInit {
        let items: Vec<std::result::Result<Bytes, StreamError>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        BodyInit::Stream(Box::pin(futures_util::stream::iter(items)))
    }

    fn collect_sync(stream: &mut ChunkedBytesStream) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        let waker = std::task::Waker::noop();
        let mut cx = Context::from_waker(waker);
        loop {
            match Pin::new(&mut *stream).poll_next(&mut cx) {
                Poll::Ready(Some(Ok(chunk))) => chunks.push(chunk),
                Poll::Ready(Some(Err(e))) => panic!("unexpected error: {e}"),
                Poll::Ready(None) => break,
                Poll::Pending => panic!("ChunkedBytesStream should never pend"),
            }
        }
        chunks
    }

    #[test]
    fn chunked_stream_remainder() {
        let data = Bytes::from(vec![0xBB; 3000]);
        let mut stream = ChunkedBytesStream::new(data, 1024);
        let chunks = collect_sync(&mut stream);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1024);
        assert_eq!(chunks[2].len(), 952);
    }

    #[test]
    fn chunked_stream_is_zero_copy() {
        let original = Bytes::from(vec![0xFF; 8192]);
        let ptr_before = original.as_ptr();

        let mut stream = ChunkedBytesStream::new(original, 4096);
        let chunks = collect_sync(&mut stream);

        assert_eq!(chunks[0].as_ptr(), ptr_before);
    }

    #[test]
    #[should_panic(expected = "chunk_size must be > 0")]
    fn chunked_stream_zero_chunk_size_panics() {
        let _ = ChunkedBytesStream::new(Bytes::new(), 0);
    }

    #[tokio::test]
    async fn null_body_reads_empty() {
        let mut body = Body::empty();
        assert!(body.is_null());
        assert_eq!(body.text().await.unwrap(), "");
        assert!(body.body_used());
        assert!(body.is_null());
        assert!(matches!(
            body.bytes().await,
            Err(Error::Fetch(FetchError::BodyUsed(_)))
        ));
    }

    #[tokio::test]
    async fn text_body_round_trips() {
        let mut body = Body::new("héllo");
        assert_eq!(body.total_bytes(), Some(6));
        assert_eq!(body.text().await.unwrap(), "héllo");
    }

    #[tokio::test]
    async fn second_read_fails_whatever_the_accessor() {
        let mut body = Body::new("{}");
        let _: serde_json::Value = body.json().await.unwrap();
        let err = body.text().await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::BodyUsed(_))));
        assert!(body.bytes().await.is_err());
        assert!(body.blob().await.is_err());
        assert!(body.array_buffer().await.is_err());
    }

    #[tokio::test]
    async fn stream_chunks_concatenate_in_order() {
        let mut body = Body::new(chunks(&["a", "b", "c"]));
        assert_eq!(body.total_bytes(), None);
        assert_eq!(body.bytes().await.unwrap(), Bytes::from("abc"));
    }

    #[tokio::test]
    async fn json_parse_failure_is_not_a_fetch_error() {
        let mut body = Body::new("{not json");
        let err = body.json::<serde_json::Value>().await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(body.body_used());
    }

    #[tokio::test]
    async fn size_cap_rejects_without_partial_data() {
        let mut body = Body::new(chunks(&["abc", "def", "ghi"]));
        body.set_limits(5, None);
        let err = body.bytes().await.unwrap_err();
        assert_eq!(err.fetch_kind(), Some(FetchErrorKind::MaxSize));

        let again = body.bytes().await.unwrap_err();
        assert!(matches!(again, Error::Fetch(FetchError::BodyUsed(_))));
    }

    #[tokio::test]
    async fn size_cap_allows_exact_fit() {
        let mut body = Body::new(chunks(&["abc", "de"]));
        body.set_limits(5, None);
        assert_eq!(body.text().await.unwrap(), "abcde");
    }

    #[tokio::test]
    async fn blob_source_honours_size_cap() {
        let mut body = Body::new(Blob::new(["0123456789"], ""));
        body.set_limits(4, None);
        let err = body.bytes().await.unwrap_err();
        assert_eq!(err.fetch_kind(), Some(FetchErrorKind::MaxSize));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_after_deadline_not_before() {
        let stream = futures_util::stream::pending::<std::result::Result<Bytes, StreamError>>();
        let mut body = Body::new(BodyInit::Stream(Box::pin(stream)));
        body.set_limits(0, Some(Duration::from_millis(100)));

        let started = tokio::time::Instant::now();
        let err = body.text().await.unwrap_err();
        assert_eq!(err.fetch_kind(), Some(FetchErrorKind::BodyTimeout));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_does_not_fire_on_fast_streams() {
        let mut body = Body::new(chunks(&["ok"]));
        body.set_limits(0, Some(Duration::from_millis(100)));
        assert_eq!(body.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn stream_error_surfaces_as_system_error() {
        let items: Vec<std::result::Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from("a")),
            Err(std::io::Error::other("connection reset").into()),
        ];
        let mut body = Body::new(BodyInit::Stream(Box::pin(futures_util::stream::iter(items))));
        let err = body.bytes().await.unwrap_err();
        assert_eq!(err.fetch_kind(), Some(FetchErrorKind::System));
    }

    #[tokio::test]
    async fn abort_in_stream_surfaces_as_abort() {
        let items: Vec<std::result::Result<Bytes, StreamError>> = vec![Err(AbortError.into())];
        let mut body = Body::new(BodyInit::Stream(Box::pin(futures_util::stream::iter(items))));
        assert!(body.bytes().await.unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn recorded_error_is_replayed_once() {
        let mut body = Body::new("data");
        body.record_error(AbortError.into());
        assert!(body.text().await.unwrap_err().is_abort());
        let again = body.text().await.unwrap_err();
        assert!(matches!(again, Error::Fetch(FetchError::BodyUsed(_))));
    }

    #[tokio::test]
    async fn clone_stream_yields_identical_bytes() {
        let mut original = Body::new(chunks(&["one ", "two ", "three"]));
        let mut copy = original.try_clone().unwrap();

        assert_eq!(copy.text().await.unwrap(), "one two three");
        assert_eq!(original.text().await.unwrap(), "one two three");
    }

    #[tokio::test]
    async fn clone_of_buffer_is_value_copy() {
        let mut original = Body::new("abc");
        let mut copy = original.try_clone().unwrap();
        assert_eq!(copy.inferred_content_type(), Some("text/plain;charset=UTF-8"));
        assert_eq!(original.text().await.unwrap(), "abc");
        assert_eq!(copy.text().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn clone_after_use_fails() {
        let mut body = Body::new(chunks(&["x"]));
        body.bytes().await.unwrap();
        assert!(matches!(
            body.try_clone(),
            Err(Error::Fetch(FetchError::CloneAfterUse))
        ));
    }

    #[tokio::test]
    async fn blob_type_falls_back_to_source() {
        let mut body = Body::new(Blob::new(["x"], "image/png"));
        let blob = body.blob().await.unwrap();
        assert_eq!(blob.content_type(), "image/png");

        let mut body = Body::new(Blob::new(["x"], "image/png"));
        let blob = body.blob_with_type(Some("text/plain".into())).await.unwrap();
        assert_eq!(blob.content_type(), "text/plain");

        let mut body = Body::new("x");
        assert_eq!(body.blob().await.unwrap().content_type(), "");
    }

    #[tokio::test]
    async fn reader_body_is_not_cancellable() {
        let mut body = Body::new(BodyInit::reader(std::io::Cursor::new(b"from reader".to_vec())));
        assert!(!body.supports_cancellation());
        assert_eq!(body.text().await.unwrap(), "from reader");
    }

    #[tokio::test]
    async fn take_stream_marks_used() {
        let mut body = Body::new("abc");
        let stream = body.take_stream().unwrap().expect("payload");
        let collected: Vec<Bytes> = futures_util::TryStreamExt::try_collect(stream).await.unwrap();
        assert_eq!(collected.concat(), b"abc");
        assert!(body.body_used());
        assert!(body.take_stream().is_err());
    }

    #[test]
    fn display_fallback_stringifies() {
        let body = Body::new(BodyInit::display(42));
        assert_eq!(body.total_bytes(), Some(2));
        assert_eq!(body.inferred_content_type(), Some("text/plain;charset=UTF-8"));
    }
}
