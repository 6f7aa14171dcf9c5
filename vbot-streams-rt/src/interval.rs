//! `interval(period)` (spec §4.2): delays item `k` until `last_emit +
//! period`, logging and emitting immediately when the upstream is already
//! late rather than accumulating drift.

use async_stream::stream;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

pub fn interval<S, T>(upstream: S, period: Duration) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    stream! {
        let mut upstream = Box::pin(upstream);
        let mut last_emit: Option<Instant> = None;

        while let Some(item) = upstream.next().await {
            let now = Instant::now();
            let target = last_emit.map(|t| t + period);
            match target {
                Some(target) if target > now => {
                    tokio::time::sleep_until(target).await;
                    last_emit = Some(target);
                }
                Some(target) => {
                    trace!(late_by = ?(now - target), "interval: emitting late item immediately");
                    last_emit = Some(now);
                }
                None => {
                    last_emit = Some(now);
                }
            }
            yield item;
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn paces_items_by_period() {
        let upstream = futures::stream::iter(0..3u32);
        let start = tokio::time::Instant::now();
        let items: Vec<_> = interval(upstream, Duration::from_millis(20)).collect().await;
        assert_eq!(vec![0, 1, 2], items);
        assert!(tokio::time::Instant::now() - start >= Duration::from_millis(40));
    }
}
