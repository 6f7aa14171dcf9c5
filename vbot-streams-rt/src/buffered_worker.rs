//! `buffered_worker(name, capacity)` (spec §4.2): moves item delivery onto a
//! single dedicated consumer thread behind a bounded channel. The producer
//! side never blocks - once the channel is full, further items are dropped
//! and counted rather than letting the upstream back up. The worker thread
//! owns the channel's sending half for its entire lifetime and exits once
//! upstream completes or every receiver is gone.
//!
//! Grounded on `pilatus`'s `UntypedActorMessageSender::get_channel` (bounded
//! mpsc + `try_send`, `ExceededQueueCapacity` on overflow), generalized from
//! a request/response slot into a droppable item stream driven by its own
//! thread rather than the actor runtime's.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Clone, Default)]
pub struct BufferedWorkerHandle {
    dropped: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
}

impl BufferedWorkerHandle {
    /// Items the worker thread could not hand to a full channel. Per spec
    /// invariant 8 this never exceeds `received - capacity`.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Acquire)
    }

    /// Whether the worker thread has drained the upstream to completion (or
    /// the upstream stream ended) and exited.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Spawns the dedicated consumer thread and returns the channel's receiving
/// half as a stream, plus a handle for observing drops.
pub fn buffered_worker<S, T>(name: impl Into<String>, upstream: S, capacity: usize) -> (BoxStream<'static, T>, BufferedWorkerHandle)
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let name = name.into();
    let capacity = capacity.max(1);
    let (tx, rx) = tokio::sync::mpsc::channel(capacity);

    let handle = BufferedWorkerHandle::default();
    let dropped = handle.dropped.clone();
    let finished = handle.finished.clone();

    std::thread::Builder::new()
        .name(format!("buffered-worker-{name}"))
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("buffered_worker: failed to start worker thread runtime");

            runtime.block_on(async move {
                futures::pin_mut!(upstream);
                while let Some(item) = upstream.next().await {
                    match tx.try_send(item) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped.fetch_add(1, Ordering::AcqRel);
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
            });

            finished.store(true, Ordering::Release);
        })
        .expect("buffered_worker: failed to spawn worker thread");

    (ReceiverStream::new(rx).boxed(), handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;

    fn wait_until_finished(handle: &BufferedWorkerHandle) {
        for _ in 0..500 {
            if handle.is_finished() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("buffered_worker: worker thread did not finish in time");
    }

    /// Scenario S4: capacity 2, 100 items pushed with no downstream
    /// request. Exactly `100 - 2` items are reported dropped, and the 2
    /// that made it into the channel are delivered once something polls.
    #[tokio::test]
    async fn drops_under_sustained_overflow_then_delivers_the_rest() {
        let upstream = stream::iter(0..100u32);
        let (out, handle) = buffered_worker("test", upstream, 2);

        wait_until_finished(&handle);
        assert_eq!(98, handle.dropped());

        let items: Vec<_> = out.collect().await;
        assert_eq!(2, items.len());
    }

    #[tokio::test]
    async fn delivers_every_item_in_order_when_under_capacity() {
        let upstream = stream::iter(0..5u32);
        let (out, handle) = buffered_worker("ordered", upstream, 16);

        let items: Vec<_> = out.collect().await;
        assert_eq!(vec![0, 1, 2, 3, 4], items);
        assert_eq!(0, handle.dropped());
    }
}
