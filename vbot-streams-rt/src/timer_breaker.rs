//! `timer_breaker(d)` (spec §4.2): once `d` has elapsed since the stream was
//! subscribed to, the upstream is cancelled and the output completes -
//! modeled as a `take_while` whose predicate flips to `false` the instant
//! the timer fires.

use futures::stream::{BoxStream, Stream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

pub fn timer_breaker<S, T>(upstream: S, d: Duration) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let deadline = Instant::now() + d;
    upstream
        .take_while(move |_| {
            let expired = Instant::now() >= deadline;
            async move { !expired }
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test(start_paused = true)]
    async fn cuts_off_after_the_deadline() {
        // A stream that ticks forever once every 10ms; the breaker must
        // stop delivery once the configured duration elapses.
        let infinite = async_stream::stream! {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                yield ();
            }
        };
        let bounded = timer_breaker(infinite, Duration::from_millis(35));
        let items: Vec<_> = bounded.collect::<Vec<_>>().await;
        // ~3 ticks fit in 35ms at 10ms apiece.
        assert!(items.len() >= 2 && items.len() <= 4, "got {}", items.len());
    }

    #[tokio::test]
    async fn zero_duration_cancels_immediately() {
        let s = stream::iter(vec![1, 2, 3]);
        let bounded = timer_breaker(s, Duration::from_millis(0));
        let items: Vec<_> = bounded.collect().await;
        assert!(items.is_empty());
    }
}
