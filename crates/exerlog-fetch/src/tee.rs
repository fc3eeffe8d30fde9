//! Splitting one byte stream into two independent readers.
//!
//! Both branches observe every chunk in order. A chunk pulled from upstream
//! by one branch is queued for the other, so a slow branch buffers while a
//! fast one keeps reading. Dropping a branch stops queueing for it.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll, Wake, Waker};

use bytes::Bytes;
use futures_core::Stream;

use crate::body::ByteStream;
use crate::error::StreamError;

type Item = Result<Bytes, StreamError>;

struct Shared {
    state: Mutex<State>,
    // Kept apart from `state`: upstream may wake synchronously while polled.
    wakers: Mutex<[Option<Waker>; 2]>,
}

struct State {
    upstream: ByteStream,
    queues: [VecDeque<Item>; 2],
    alive: [bool; 2],
    finished: bool,
}

impl Shared {
    fn register(&self, index: usize, waker: &Waker) {
        let mut wakers = self.wakers.lock().unwrap_or_else(PoisonError::into_inner);
        wakers[index] = Some(waker.clone());
    }

    fn take_waker(&self, index: usize) -> Option<Waker> {
        let mut wakers = self.wakers.lock().unwrap_or_else(PoisonError::into_inner);
        wakers[index].take()
    }
}

/// Wakes whichever branches are parked on the upstream.
struct TeeWaker {
    shared: Weak<Shared>,
}

impl Wake for TeeWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let parked: Vec<Waker> = {
            let mut wakers = shared.wakers.lock().unwrap_or_else(PoisonError::into_inner);
            wakers.iter_mut().filter_map(Option::take).collect()
        };
        for waker in parked {
            waker.wake();
        }
    }
}

/// One side of a split stream.
pub(crate) struct TeeBranch {
    index: usize,
    shared: Arc<Shared>,
    waker: Waker,
}

/// Split `upstream` into two branches yielding identical sequences.
pub(crate) fn tee(upstream: ByteStream) -> (ByteStream, ByteStream) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            upstream,
            queues: [VecDeque::new(), VecDeque::new()],
            alive: [true, true],
            finished: false,
        }),
        wakers: Mutex::new([None, None]),
    });
    let waker = Waker::from(Arc::new(TeeWaker {
        shared: Arc::downgrade(&shared),
    }));
    let left = TeeBranch {
        index: 0,
        shared: Arc::clone(&shared),
        waker: waker.clone(),
    };
    let right = TeeBranch {
        index: 1,
        shared,
        waker,
    };
    (Box::pin(left), Box::pin(right))
}

impl Stream for TeeBranch {
    type Item = Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Item>> {
        let this = self.get_mut();
        let me = this.index;
        let other = 1 - me;
        let mut state = this.shared.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(item) = state.queues[me].pop_front() {
            return Poll::Ready(Some(item));
        }
        if state.finished {
            return Poll::Ready(None);
        }

        this.shared.register(me, cx.waker());
        let mut upstream_cx = Context::from_waker(&this.waker);
        let polled = state.upstream.as_mut().poll_next(&mut upstream_cx);
        let wake_other = match polled {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Some(ref item)) => {
                if state.alive[other] {
                    state.queues[other].push_back(item.clone());
                    true
                } else {
                    false
                }
            }
            Poll::Ready(None) => {
                state.finished = true;
                true
            }
        };
        drop(state);

        this.shared.take_waker(me);
        if wake_other {
            if let Some(waker) = this.shared.take_waker(other) {
                waker.wake();
            }
        }
        polled
    }
}

impl Drop for TeeBranch {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.alive[self.index] = false;
        state.queues[self.index].clear();
        drop(state);
        self.shared.take_waker(self.index);
    }
}
