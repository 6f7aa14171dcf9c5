//! `delay(f)` (spec §4.2): buffers items in a FIFO, schedules a timer for
//! the head item, emits it on fire and reschedules until the buffer is
//! empty. Upstream completion/error is latched and only delivered once the
//! buffer has fully drained, so a fast upstream burst followed by
//! completion still plays out at the configured pace.

use async_stream::stream;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;

pub fn delay<S, T, F>(upstream: S, mut delay_for: F) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
    F: FnMut(&T) -> Duration + Send + 'static,
{
    stream! {
        let mut upstream = Box::pin(upstream);
        let mut buffer: VecDeque<T> = VecDeque::new();
        let mut upstream_done = false;

        loop {
            if let Some(head) = buffer.front() {
                tokio::time::sleep(delay_for(head)).await;
                yield buffer.pop_front().expect("checked non-empty above");
                continue;
            }

            if upstream_done {
                break;
            }

            match upstream.next().await {
                Some(item) => buffer.push_back(item),
                None => upstream_done = true,
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn emits_head_after_its_own_delay_and_drains_buffer_before_completing() {
        let upstream = futures::stream::iter(vec![1u32, 2, 3]);
        let delayed = delay(upstream, |_| Duration::from_millis(10));
        let start = tokio::time::Instant::now();
        let items: Vec<_> = delayed.collect().await;
        assert_eq!(vec![1, 2, 3], items);
        // Every item pays its own 10ms, emitted sequentially.
        assert!(tokio::time::Instant::now() - start >= Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn buffers_a_burst_and_paces_output() {
        let upstream = futures::stream::iter(0..5u32);
        let mut delayed = Box::pin(delay(upstream, |_| Duration::from_millis(5)));
        for expected in 0..5u32 {
            assert_eq!(Some(expected), delayed.next().await);
        }
        assert_eq!(None, delayed.next().await);
    }
}
