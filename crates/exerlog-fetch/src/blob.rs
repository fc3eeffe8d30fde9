//! Immutable, typed binary payloads.

use bytes::{Bytes, BytesMut};

use crate::body::{ByteStream, ChunkedBytesStream, DEFAULT_CHUNK_SIZE};

/// An immutable byte payload with a declared media type.
///
/// Cloning is cheap: the bytes are reference counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    content_type: String,
}

impl Blob {
    /// Concatenate `parts` into a new blob.
    ///
    /// The media type is lower-cased; a type containing characters outside
    /// printable ASCII is dropped.
    pub fn new<I, P>(parts: I, content_type: &str) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut buf = BytesMut::new();
        for part in parts {
            buf.extend_from_slice(part.as_ref());
        }
        Self {
            bytes: buf.freeze(),
            content_type: normalize_type(content_type),
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>, content_type: &str) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: normalize_type(content_type),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// A sub-range of this blob. Negative offsets count from the end.
    pub fn slice(&self, start: Option<i64>, end: Option<i64>, content_type: &str) -> Blob {
        let size = self.bytes.len() as i64;
        let clamp = |offset: i64| {
            if offset < 0 {
                (size + offset).max(0)
            } else {
                offset.min(size)
            }
        };
        let from = clamp(start.unwrap_or(0));
        let to = clamp(end.unwrap_or(size));
        let span = if to > from { from as usize..to as usize } else { 0..0 };
        Blob {
            bytes: self.bytes.slice(span),
            content_type: normalize_type(content_type),
        }
    }

    /// Stream the blob in chunks without copying.
    pub fn stream(&self) -> ByteStream {
        self.stream_chunked(DEFAULT_CHUNK_SIZE)
    }

    pub(crate) fn stream_chunked(&self, chunk_size: usize) -> ByteStream {
        Box::pin(ChunkedBytesStream::new(self.bytes.clone(), chunk_size))
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

fn normalize_type(content_type: &str) -> String {
    if content_type.chars().all(|c| (' '..='~').contains(&c)) {
        content_type.to_ascii_lowercase()
    } else {
        String::new()
    }
}
