//! A single-assignment async cell, modeled the way `pilatus::device::system`
//! pairs a `futures::channel::oneshot` sender/receiver for its ask/response
//! calls: resolving/failing is the sender half, `on`/`map`/`then` consume the
//! receiver half exactly once.

use futures::channel::oneshot;
use futures::FutureExt;

use crate::StreamError;

/// The producer half: resolves or fails the paired [`Deferred`] exactly once.
/// Dropping it without calling either fails the `Deferred` with
/// [`crate::ErrorKind::NotInitialized`].
pub struct DeferredResolver<T> {
    tx: oneshot::Sender<Result<T, StreamError>>,
}

impl<T> DeferredResolver<T> {
    pub fn resolve(self, value: T) {
        let _ignore_disconnected = self.tx.send(Ok(value));
    }

    pub fn fail(self, err: StreamError) {
        let _ignore_disconnected = self.tx.send(Err(err));
    }
}

/// The consumer half of a single-assignment async value.
pub struct Deferred<T> {
    rx: oneshot::Receiver<Result<T, StreamError>>,
}

pub fn deferred<T>() -> (DeferredResolver<T>, Deferred<T>) {
    let (tx, rx) = oneshot::channel();
    (DeferredResolver { tx }, Deferred { rx })
}

impl<T: Send + 'static> Deferred<T> {
    /// Invokes `cb` exactly once with the eventual result. If the resolver
    /// was dropped without resolving, `cb` sees `NotInitialized`.
    pub async fn on(self, cb: impl FnOnce(Result<T, StreamError>) + Send) {
        let result = self
            .rx
            .await
            .unwrap_or(Err(StreamError::new(crate::ErrorKind::NotInitialized)));
        cb(result)
    }

    pub async fn wait(self) -> Result<T, StreamError> {
        self.rx
            .await
            .unwrap_or(Err(StreamError::new(crate::ErrorKind::NotInitialized)))
    }

    /// `f` only runs on success; an error bypasses `f` and propagates as-is,
    /// per spec invariant 7 (Testable Properties §8).
    pub fn map<U: Send + 'static>(
        self,
        f: impl FnOnce(T) -> U + Send + 'static,
    ) -> Deferred<U> {
        let (resolver, out) = deferred();
        let fut = self.wait().map(move |result| match result {
            Ok(value) => resolver.resolve(f(value)),
            Err(e) => resolver.fail(e),
        });
        // The continuation is driven the moment something polls `out`; since
        // `out` is itself backed by a oneshot, we need a driver. We spawn it
        // onto the same executor that eventually polls `out` by boxing it as
        // a detached future the caller's runtime must poll - callers in this
        // workspace always run inside a tokio runtime, so `tokio::spawn` is
        // appropriate here.
        tokio::spawn(fut);
        out
    }

    /// Chains another `Deferred`-returning step; `f` only runs on success.
    pub fn then<U: Send + 'static>(
        self,
        f: impl FnOnce(T) -> Deferred<U> + Send + 'static,
    ) -> Deferred<U> {
        let (resolver, out) = deferred();
        let fut = async move {
            match self.wait().await {
                Ok(value) => match f(value).wait().await {
                    Ok(v) => resolver.resolve(v),
                    Err(e) => resolver.fail(e),
                },
                Err(e) => resolver.fail(e),
            }
        };
        tokio::spawn(fut);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn resolve_then_on_delivers_value() {
        let (resolver, d) = deferred::<i32>();
        resolver.resolve(42);
        assert_eq!(Ok(42), d.wait().await.map_err(|e| e.kind.to_string()));
    }

    #[tokio::test]
    async fn fail_then_on_delivers_error() {
        let (resolver, d) = deferred::<i32>();
        resolver.fail(StreamError::timeout());
        let err = d.wait().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn dropped_resolver_yields_not_initialized() {
        let (resolver, d) = deferred::<i32>();
        drop(resolver);
        let err = d.wait().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NotInitialized));
    }

    #[tokio::test]
    async fn map_only_runs_on_success() {
        let (resolver, d) = deferred::<i32>();
        let mapped = d.map(|v| v + 1);
        resolver.resolve(41);
        assert_eq!(42, mapped.wait().await.unwrap());
    }

    #[tokio::test]
    async fn map_skips_user_fn_on_error() {
        let (resolver, d) = deferred::<i32>();
        let mapped = d.map(|_v| panic!("must not run on error path"));
        resolver.fail(StreamError::timeout());
        let err = mapped.wait().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn then_chains_success() {
        let (resolver1, d1) = deferred::<i32>();
        let chained = d1.then(|v| {
            let (resolver2, d2) = deferred();
            resolver2.resolve(v * 2);
            d2
        });
        resolver1.resolve(21);
        assert_eq!(42, chained.wait().await.unwrap());
    }
}
