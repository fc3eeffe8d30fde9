//! Cooperative cancellation for requests and body drains.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::body::ByteStream;
use crate::error::{AbortError, StreamError};

/// Owner side of a cancellation handle.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Fire the signal. Idempotent.
    pub fn abort(&self) {
        self.signal.token.cancel();
    }
}

/// Observer side of a cancellation handle. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    pub fn aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Ends `stream` with an [`AbortError`] as soon as `signal` fires.
pub(crate) fn abortable(stream: ByteStream, signal: AbortSignal) -> ByteStream {
    let token = signal.token.clone();
    Box::pin(Abortable {
        stream: Some(stream),
        cancelled: Box::pin(async move { token.cancelled_owned().await }),
    })
}

struct Abortable {
    stream: Option<ByteStream>,
    cancelled: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Stream for Abortable {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.stream.is_none() {
            return Poll::Ready(None);
        }
        if self.cancelled.as_mut().poll(cx).is_ready() {
            self.stream = None;
            return Poll::Ready(Some(Err(AbortError.into())));
        }
        match self.stream.as_mut() {
            Some(stream) => stream.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn controller_fires_every_clone() {
        let controller = AbortController::new();
        let a = controller.signal();
        let b = a.clone();
        assert!(!a.aborted());
        controller.abort();
        controller.abort();
        assert!(a.aborted() && b.aborted());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_abort() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let waiter = tokio::spawn(async move { signal.cancelled().await });
        controller.abort();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn abortable_passes_chunks_until_fired() {
        let controller = AbortController::new();
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, StreamError>>(4);
        let inner: ByteStream = Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }));
        let mut stream = abortable(inner, controller.signal());

        tx.send(Ok(Bytes::from("a"))).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");

        controller.abort();
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.is_abort());
        assert!(stream.next().await.is_none());
    }
}
