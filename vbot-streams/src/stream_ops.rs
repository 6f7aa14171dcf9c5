//! The reactive-streams operator algebra (spec §4.1).
//!
//! A `Publisher<T>` here is simply a `futures::Stream<Item = T> + Send`:
//! polling is the backpressure mechanism (a consumer that doesn't call
//! `poll_next`/`.next()` again is withholding demand exactly the way
//! `request(n)` withholds it in the spec's push-pull model), and dropping a
//! stream is `cancel()`. This is the same shape `pilatus::subscribe` uses —
//! `SubscribeState` builds its fan-out purely out of `futures::Stream`
//! combinators (`.then`, `.flat_map`) plus `stream_broadcast::StreamBroadcast`,
//! rather than hand-rolling Reactive-Streams `Publisher`/`Subscriber` types.
//!
//! Most operators in the spec (`map`, `flat_map`, `take`, `take_while`,
//! `flatten`, `merge`, `concat`) are therefore *exactly*
//! `futures::StreamExt` methods and don't need wrappers; this module adds
//! the ones with non-obvious semantics (`do_finally`'s guaranteed
//! terminal-transition hook, `publishers::*` sources) plus the shared
//! "drain source" demand-tracking helper the concurrency adapters
//! (`vbot-streams-rt`) and the decoder stage (`vbot-media`) build on.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Runs `f` exactly once on any terminal transition: normal completion,
/// being dropped early (~= `cancel()`), or (the caller's responsibility)
/// propagating an error that ends the stream.
pub fn do_finally<S, F>(stream: S, f: F) -> DoFinally<S, F>
where
    S: Stream,
    F: FnMut(),
{
    DoFinally {
        stream,
        finalizer: Some(f),
    }
}

pub struct DoFinally<S, F> {
    stream: S,
    finalizer: Option<F>,
}

impl<S, F> Stream for DoFinally<S, F>
where
    S: Stream + Unpin,
    F: FnMut() + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.stream).poll_next(cx);
        if let Poll::Ready(None) = &poll {
            if let Some(mut f) = self.finalizer.take() {
                f();
            }
        }
        poll
    }
}

impl<S, F> Drop for DoFinally<S, F>
where
    F: FnMut(),
{
    fn drop(&mut self) {
        if let Some(mut f) = self.finalizer.take() {
            f();
        }
    }
}

/// Source constructors matching the spec's `publishers::{empty, error, of,
/// range}`.
pub mod publishers {
    use super::*;
    use crate::StreamError;

    pub fn empty<T: Send + 'static>() -> BoxStream<'static, T> {
        stream::empty().boxed()
    }

    pub fn error<T: Send + 'static>(err: StreamError) -> BoxStream<'static, Result<T, StreamError>> {
        stream::once(async move { Err(err) }).boxed()
    }

    pub fn of<T: Send + 'static>(items: Vec<T>) -> BoxStream<'static, T> {
        stream::iter(items).boxed()
    }

    pub fn range(start: i64, end_exclusive: i64) -> BoxStream<'static, i64> {
        stream::iter(start..end_exclusive).boxed()
    }
}

/// Matches the spec's `generators::stateful`: a pull-driven source that
/// folds a state value across yields until it signals completion.
pub mod generators {
    use super::*;

    pub enum Step<T, S> {
        Yield(T, S),
        Done,
    }

    /// `f` is called each time the consumer asks for another item; it owns
    /// the current state and returns either the next item plus the updated
    /// state, or `Done`.
    pub fn stateful<T, S, F, Fut>(initial: S, mut f: F) -> BoxStream<'static, T>
    where
        T: Send + 'static,
        S: Send + 'static,
        F: FnMut(S) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Step<T, S>> + Send + 'static,
    {
        stream::unfold(Some(initial), move |state| {
            let state = state;
            let fut = async {
                match state {
                    None => None,
                    Some(s) => match f(s).await {
                        Step::Yield(item, next) => Some((item, Some(next))),
                        Step::Done => None,
                    },
                }
            };
            fut
        })
        .boxed()
    }
}

/// The shared "drain" discipline (spec §4.1): tracks `requested - delivered`
/// as outstanding demand. `request(n)` adds to demand; `note_delivered`
/// subtracts. A drain loop should keep producing while `outstanding() > 0`
/// and stop (awaiting the next async event) once it reaches zero. Re-entrant
/// `request` calls while a drain is already running should set
/// `drain_again` instead of recursing - callers own that flag because only
/// they know what "running" means for their drain loop.
#[derive(Debug, Default)]
pub struct Demand {
    outstanding: u64,
}

impl Demand {
    pub fn new() -> Self {
        Self::default()
    }

    /// `request(n)` is cumulative and saturating (a publisher must never be
    /// asked to track more than `u64::MAX` outstanding items).
    pub fn request(&mut self, n: u64) {
        self.outstanding = self.outstanding.saturating_add(n);
    }

    pub fn note_delivered(&mut self, n: u64) {
        self.outstanding = self.outstanding.saturating_sub(n);
    }

    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    pub fn has_demand(&self) -> bool {
        self.outstanding > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn do_finally_runs_on_normal_completion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let s = do_finally(stream::iter(vec![1, 2, 3]), move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        let items: Vec<_> = s.collect().await;
        assert_eq!(vec![1, 2, 3], items);
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn do_finally_runs_on_early_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        {
            let s = do_finally(stream::iter(vec![1, 2, 3]), move || {
                calls2.fetch_add(1, Ordering::SeqCst);
            });
            let mut s = Box::pin(s);
            assert_eq!(Some(1), s.next().await);
        }
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn take_while_cancels_upstream_once() {
        // S3: a range through take(3) - downstream sees 0,1,2,complete;
        // upstream drop (our analogue of cancel) happens exactly once.
        let drops = Arc::new(AtomicUsize::new(0));
        let drops2 = drops.clone();
        let upstream = do_finally(publishers::range(0, i64::MAX), move || {
            drops2.fetch_add(1, Ordering::SeqCst);
        });
        let items: Vec<_> = upstream.take(3).collect().await;
        assert_eq!(vec![0, 1, 2], items);
        assert_eq!(1, drops.load(Ordering::SeqCst));
    }

    #[test]
    fn demand_tracks_outstanding_requests() {
        let mut demand = Demand::new();
        assert!(!demand.has_demand());
        demand.request(5);
        assert_eq!(5, demand.outstanding());
        demand.note_delivered(2);
        assert_eq!(3, demand.outstanding());
        demand.note_delivered(10);
        assert_eq!(0, demand.outstanding());
        assert!(!demand.has_demand());
    }

    #[tokio::test]
    async fn generators_stateful_counts_to_three() {
        use generators::Step;
        let s = generators::stateful(0i32, |state| async move {
            if state < 3 {
                Step::Yield(state, state + 1)
            } else {
                Step::Done
            }
        });
        let items: Vec<_> = s.collect().await;
        assert_eq!(vec![0, 1, 2], items);
    }
}
