//! Incremental `Content-Encoding` decoding of response bodies.

use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use flate2::write::{DeflateDecoder, GzDecoder, ZlibDecoder};
use futures_core::Stream;

use crate::body::ByteStream;
use crate::error::StreamError;

/// A supported content coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    Gzip,
    /// zlib-wrapped or raw deflate, decided from the first byte.
    Deflate,
}

impl Encoding {
    /// Parse a `Content-Encoding` value (already lower-cased).
    pub(crate) fn from_header(value: &str) -> Option<Self> {
        match value.trim() {
            "gzip" | "x-gzip" => Some(Encoding::Gzip),
            "deflate" | "x-deflate" => Some(Encoding::Deflate),
            _ => None,
        }
    }
}

enum Decoder {
    // deflate before the first byte is seen
    Undecided,
    Gzip(GzDecoder<Vec<u8>>),
    Zlib(ZlibDecoder<Vec<u8>>),
    Raw(DeflateDecoder<Vec<u8>>),
}

impl Decoder {
    fn feed(&mut self, chunk: &[u8]) -> std::io::Result<Bytes> {
        if let Decoder::Undecided = self {
            // zlib streams start with a CMF byte whose low nibble is 8.
            *self = if chunk[0] & 0x0F == 0x08 {
                Decoder::Zlib(ZlibDecoder::new(Vec::new()))
            } else {
                Decoder::Raw(DeflateDecoder::new(Vec::new()))
            };
        }
        match self {
            Decoder::Undecided => Ok(Bytes::new()),
            Decoder::Gzip(d) => {
                d.write_all(chunk)?;
                Ok(take(d.get_mut()))
            }
            Decoder::Zlib(d) => {
                d.write_all(chunk)?;
                Ok(take(d.get_mut()))
            }
            Decoder::Raw(d) => {
                d.write_all(chunk)?;
                Ok(take(d.get_mut()))
            }
        }
    }

    fn finish(&mut self) -> std::io::Result<Bytes> {
        match self {
            Decoder::Undecided => Ok(Bytes::new()),
            Decoder::Gzip(d) => {
                d.try_finish()?;
                Ok(take(d.get_mut()))
            }
            Decoder::Zlib(d) => {
                d.try_finish()?;
                Ok(take(d.get_mut()))
            }
            Decoder::Raw(d) => {
                d.try_finish()?;
                Ok(take(d.get_mut()))
            }
        }
    }
}

fn take(buf: &mut Vec<u8>) -> Bytes {
    Bytes::from(std::mem::take(buf))
}

/// Decode `stream` on the fly.
pub(crate) fn decode(stream: ByteStream, encoding: Encoding) -> ByteStream {
    let decoder = match encoding {
        Encoding::Gzip => Decoder::Gzip(GzDecoder::new(Vec::new())),
        Encoding::Deflate => Decoder::Undecided,
    };
    Box::pin(Decoded {
        upstream: stream,
        decoder,
        done: false,
    })
}

struct Decoded {
    upstream: ByteStream,
    decoder: Decoder,
    done: bool,
}

impl Stream for Decoded {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.done {
                return Poll::Ready(None);
            }
            match ready!(this.upstream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => match this.decoder.feed(&chunk) {
                    Ok(out) if out.is_empty() => continue,
                    Ok(out) => return Poll::Ready(Some(Ok(out))),
                    Err(err) => {
                        this.done = true;
                        return Poll::Ready(Some(Err(err.into())));
                    }
                },
                Some(Err(err)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    this.done = true;
                    return match this.decoder.finish() {
                        Ok(out) if out.is_empty() => Poll::Ready(None),
                        Ok(out) => Poll::Ready(Some(Ok(out))),
                        Err(err) => Poll::Ready(Some(Err(err.into()))),
                    };
                }
            }
        }
    }
}
