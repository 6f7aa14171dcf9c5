//! `signal_breaker(signals)` (spec §4.2, invariant 9): installs a
//! process-level handler; at most one instance may exist per process. On
//! any of the listed signals it cancels upstream and completes downstream.
//! Grounded on `pilatus::shutdown`'s `SystemShutdown`/`SystemTerminator`
//! pair (an `AbortHandle` racing `tokio::signal::ctrl_c()`), generalized to
//! an arbitrary signal set.

use futures::stream::{BoxStream, Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::info;

static REGISTERED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Interrupt,
    Terminate,
}

#[derive(Debug, Error)]
#[error("a signal_breaker is already registered for this process")]
pub struct SignalBreakerError;

/// Wraps `upstream` so it is cancelled and the output completes as soon as
/// any signal in `signals` is received. Panics (via `expect`, matching the
/// spec's "aborts during construction") if another `signal_breaker` is
/// already live - use [`try_signal_breaker`] to handle that case instead.
pub fn signal_breaker<S, T>(upstream: S, signals: Vec<Signal>) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    try_signal_breaker(upstream, signals).expect("only one signal_breaker per process")
}

pub fn try_signal_breaker<S, T>(
    upstream: S,
    signals: Vec<Signal>,
) -> Result<BoxStream<'static, T>, SignalBreakerError>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return Err(SignalBreakerError);
    }

    let triggered = wait_for_any(signals);
    let upstream = upstream.fuse();
    Ok(async_stream::stream! {
        futures::pin_mut!(upstream);
        futures::pin_mut!(triggered);
        loop {
            tokio::select! {
                biased;
                _ = &mut triggered => {
                    info!("signal_breaker: received signal, completing stream");
                    break;
                }
                item = upstream.next() => {
                    match item {
                        Some(item) => yield item,
                        None => break,
                    }
                }
            }
        }
        REGISTERED.store(false, Ordering::SeqCst);
    }
    .boxed())
}

fn wait_for_any(signals: Vec<Signal>) -> impl std::future::Future<Output = ()> {
    async move {
        let mut futs: Vec<futures::future::BoxFuture<'static, ()>> = Vec::new();
        for s in signals {
            futs.push(match s {
                Signal::Interrupt => Box::pin(async {
                    let _ = tokio::signal::ctrl_c().await;
                }),
                Signal::Terminate => Box::pin(terminate_signal()),
            });
        }
        if futs.is_empty() {
            std::future::pending::<()>().await;
        } else {
            futures::future::select_all(futs).await;
        }
    }
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Resets the process-wide guard between tests since they all run in
    // the same process; real callers only ever construct one.
    fn reset_guard() {
        REGISTERED.store(false, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn second_registration_errors() {
        reset_guard();
        let s1 = futures::stream::pending::<()>();
        let _first = try_signal_breaker(s1, vec![]).unwrap();

        let s2 = futures::stream::pending::<()>();
        assert!(try_signal_breaker(s2, vec![]).is_err());
        reset_guard();
    }

    #[tokio::test]
    async fn passes_items_through_when_no_signal_fires() {
        reset_guard();
        let s = futures::stream::iter(vec![1, 2, 3]);
        let wrapped = try_signal_breaker(s, vec![]).unwrap();
        let items: Vec<_> = wrapped.collect().await;
        assert_eq!(vec![1, 2, 3], items);
        reset_guard();
    }
}
