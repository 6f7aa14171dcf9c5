//! Process-wide shutdown signal shared by every long-running stage.
//! Ported directly from `pilatus::shutdown` / `pilatus-rt::shutdown`: a
//! `SystemShutdown` future that resolves once on ctrl-c (or whenever a
//! `SystemTerminator` fires it manually, which tests use in place of a
//! real signal). The teacher wires this pair through its `minfac` DI
//! container; this crate has no such container, so [`system_shutdown`]
//! constructs the pair directly.

use std::pin::Pin;
use std::task::{self, Poll};

use futures::future::Shared;
use futures::stream::{AbortHandle, Abortable};
use futures::{Future, FutureExt};

type InnerPrivateState =
    Shared<Pin<Box<dyn futures::Future<Output = ()> + 'static + Send + Sync>>>;

#[derive(Clone)]
pub struct SystemShutdown(InnerPrivateState);

impl Future for SystemShutdown {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

pub struct SystemTerminator(AbortHandle);

impl SystemTerminator {
    pub fn shutdown(&self) {
        self.0.abort();
    }
}

/// Builds a fresh shutdown pair. The `SystemShutdown` resolves on ctrl-c
/// or when the paired `SystemTerminator::shutdown` is called, whichever
/// comes first.
pub fn system_shutdown() -> (SystemTerminator, SystemShutdown) {
    let (abort_handle, abort_registration) = AbortHandle::new_pair();
    let fut: Pin<Box<dyn Future<Output = ()> + Send + Sync>> = Box::pin(async {
        Abortable::new(tokio::signal::ctrl_c(), abort_registration)
            .await
            .ok();
    });
    (SystemTerminator(abort_handle), SystemShutdown(fut.shared()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminator_resolves_the_paired_shutdown() {
        let (terminator, shutdown) = system_shutdown();
        terminator.shutdown();
        shutdown.await;
    }

    #[tokio::test]
    async fn shutdown_clones_share_the_same_signal() {
        let (terminator, shutdown) = system_shutdown();
        let other = shutdown.clone();
        terminator.shutdown();
        shutdown.await;
        other.await;
    }
}
