//! `threaded_worker(name)` (spec §4.2): moves item delivery onto a single
//! dedicated consumer thread behind an unbounded channel, batching whatever
//! the consumer thread collects between polls - turning `publisher<T>` into
//! `publisher<Vec<T>>`. Unlike [`buffered_worker`](crate::buffered_worker),
//! nothing is ever dropped (spec invariant 8): the channel has no capacity
//! ceiling, so this is the adapter to reach for when every item must
//! survive the thread handoff and batching the output is acceptable.
//!
//! Grounded on the same dedicated-thread shape as `buffered_worker`,
//! generalized to batch its output via [`StreamExt::ready_chunks`] instead
//! of delivering one item per channel receive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Upper bound on how many items `ready_chunks` collects into a single
/// batch. A soft cap to satisfy its nonzero-capacity requirement, not a
/// drop boundary - a batch only reaches it under an extreme burst.
const BATCH_CAP: usize = 4096;

#[derive(Clone, Default)]
pub struct ThreadedWorkerHandle {
    finished: Arc<AtomicBool>,
}

impl ThreadedWorkerHandle {
    /// Whether the consumer thread has drained the upstream to completion
    /// and exited.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

pub fn threaded_worker<S, T>(name: impl Into<String>, upstream: S) -> (BoxStream<'static, Vec<T>>, ThreadedWorkerHandle)
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let name = name.into();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let handle = ThreadedWorkerHandle::default();
    let finished = handle.finished.clone();

    std::thread::Builder::new()
        .name(format!("threaded-worker-{name}"))
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("threaded_worker: failed to start worker thread runtime");

            runtime.block_on(async move {
                futures::pin_mut!(upstream);
                while let Some(item) = upstream.next().await {
                    if tx.send(item).is_err() {
                        break;
                    }
                }
            });

            finished.store(true, Ordering::Release);
        })
        .expect("threaded_worker: failed to spawn worker thread");

    let batched = UnboundedReceiverStream::new(rx).ready_chunks(BATCH_CAP).boxed();
    (batched, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;

    fn wait_until_finished(handle: &ThreadedWorkerHandle) {
        for _ in 0..500 {
            if handle.is_finished() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("threaded_worker: worker thread did not finish in time");
    }

    #[tokio::test]
    async fn batches_every_item_without_loss_or_reordering() {
        let upstream = stream::iter(0..500u32);
        let (mut out, handle) = threaded_worker("test", upstream);

        wait_until_finished(&handle);

        let mut collected = Vec::new();
        while let Some(batch) = out.next().await {
            collected.extend(batch);
        }
        assert_eq!((0..500).collect::<Vec<_>>(), collected);
    }

    #[tokio::test]
    async fn preserves_order_for_a_small_upstream() {
        let upstream = stream::iter(vec!["a", "b", "c"]);
        let (mut out, handle) = threaded_worker("order", upstream);

        wait_until_finished(&handle);

        let mut collected = Vec::new();
        while let Some(batch) = out.next().await {
            collected.extend(batch);
        }
        assert_eq!(vec!["a", "b", "c"], collected);
    }
}
