//! Form payloads: URL-encoded parameters and multipart encoders.

use std::fmt;

use bytes::Bytes;
use futures_util::StreamExt;
use url::form_urlencoded;

use crate::blob::Blob;
use crate::body::ByteStream;
use crate::error::StreamError;

/// Ordered `application/x-www-form-urlencoded` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlSearchParams {
    pairs: Vec<(String, String)>,
}

impl UrlSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string, with or without a leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// Replace the first `name` pair and drop the rest, or append.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(n, _)| n == name) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut index = 0;
                self.pairs.retain(|(n, _)| {
                    let keep = index <= first || n != name;
                    index += 1;
                    keep
                });
            }
            None => self.append(name, value),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.pairs.iter().any(|(n, _)| n == name)
    }

    pub fn delete(&mut self, name: &str) {
        self.pairs.retain(|(n, _)| n != name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for UrlSearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish();
        f.write_str(&encoded)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UrlSearchParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Capability of a multipart/form-data encoder.
///
/// Bodies recognize multipart payloads through this trait rather than a
/// concrete type, so other encoders can be plugged in.
pub trait MultipartEncoder: Send {
    /// Boundary used between parts (without the leading `--`).
    fn boundary(&self) -> &str;

    /// Total encoded length, when every part has a known size.
    fn known_length(&self) -> Option<u64>;

    /// Consume the encoder into its encoded byte stream.
    fn into_stream(self: Box<Self>) -> ByteStream;
}

enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        blob: Blob,
    },
    Stream {
        name: String,
        filename: String,
        content_type: String,
        stream: ByteStream,
    },
}

/// A multipart/form-data encoder with text, blob and streamed fields.
pub struct FormData {
    boundary: String,
    parts: Vec<Part>,
}

impl FormData {
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn append_blob(&mut self, name: impl Into<String>, filename: impl Into<String>, blob: Blob) {
        self.parts.push(Part::File {
            name: name.into(),
            filename: filename.into(),
            blob,
        });
    }

    /// Append a field whose content is only known as a stream; the encoded
    /// length becomes unknown.
    pub fn append_stream(
        &mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        stream: ByteStream,
    ) {
        self.parts.push(Part::Stream {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            stream,
        });
    }

    fn part_header(&self, part: &Part) -> String {
        let mut header = format!("--{}\r\n", self.boundary);
        match part {
            Part::Text { name, .. } => {
                header.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n",
                    escape(name)
                ));
            }
            Part::File { name, filename, blob } => {
                let content_type = match blob.content_type() {
                    "" => "application/octet-stream",
                    other => other,
                };
                header.push_str(&file_disposition(name, filename, content_type));
            }
            Part::Stream {
                name,
                filename,
                content_type,
                ..
            } => {
                header.push_str(&file_disposition(name, filename, content_type));
            }
        }
        header.push_str("\r\n");
        header
    }

    fn footer(&self) -> String {
        format!("--{}--\r\n", self.boundary)
    }
}

impl Default for FormData {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormData")
            .field("boundary", &self.boundary)
            .field("parts", &self.parts.len())
            .finish()
    }
}

impl MultipartEncoder for FormData {
    fn boundary(&self) -> &str {
        &self.boundary
    }

    fn known_length(&self) -> Option<u64> {
        let mut total = self.footer().len() as u64;
        for part in &self.parts {
            let content = match part {
                Part::Text { value, .. } => value.len() as u64,
                Part::File { blob, .. } => blob.size(),
                Part::Stream { .. } => return None,
            };
            total += self.part_header(part).len() as u64 + content + 2;
        }
        Some(total)
    }

    fn into_stream(self: Box<Self>) -> ByteStream {
        let footer = self.footer();
        let mut segments: Vec<ByteStream> = Vec::with_capacity(self.parts.len() * 3 + 1);
        let headers: Vec<String> = self.parts.iter().map(|p| self.part_header(p)).collect();
        for (part, header) in self.parts.into_iter().zip(headers) {
            segments.push(once(Bytes::from(header)));
            match part {
                Part::Text { value, .. } => segments.push(once(Bytes::from(value))),
                Part::File { blob, .. } => segments.push(blob.stream()),
                Part::Stream { stream, .. } => segments.push(stream),
            }
            segments.push(once(Bytes::from_static(b"\r\n")));
        }
        segments.push(once(Bytes::from(footer)));
        Box::pin(futures_util::stream::iter(segments).flatten())
    }
}

fn once(bytes: Bytes) -> ByteStream {
    Box::pin(futures_util::stream::once(async move {
        Ok::<_, StreamError>(bytes)
    }))
}

fn file_disposition(name: &str, filename: &str, content_type: &str) -> String {
    format!(
        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n",
        escape(name),
        escape(filename),
        content_type
    )
}

fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn generate_boundary() -> String {
    let digits: String = (0..24)
        .map(|_| char::from(b'0' + rand::random_range(0..10u8)))
        .collect();
    format!("--------------------------{digits}")
}
