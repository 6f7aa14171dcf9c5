//! Thread-affinity wrapper (spec §4.3): all public methods of the
//! resilient/ws client assert they run on a designated I/O thread; this
//! wrapper is what lets other stages call into the broker client without
//! caring which thread they happen to run on - it forwards the call as a
//! task to the I/O thread when necessary, otherwise invokes directly.

use std::thread::ThreadId;

use serde_json::Value;
use tokio::runtime::Handle;
use vbot_broker::{BrokerClient, ErrorListener, PublishCallback, SubscribeOptions, SubscriptionCallbacks};
use vbot_streams::Deferred;

pub struct ThreadPinnedClient<C> {
    inner: std::sync::Arc<C>,
    io_thread: ThreadId,
    io_handle: Handle,
}

impl<C: BrokerClient + 'static> ThreadPinnedClient<C> {
    /// `io_thread`/`io_handle` identify the thread this client must run
    /// on; typically captured from within the task that owns the tokio
    /// runtime driving the broker connection.
    pub fn new(inner: C, io_thread: ThreadId, io_handle: Handle) -> Self {
        Self {
            inner: std::sync::Arc::new(inner),
            io_thread,
            io_handle,
        }
    }

    fn on_io_thread(&self) -> bool {
        std::thread::current().id() == self.io_thread
    }
}

impl<C: BrokerClient + Send + Sync + 'static> BrokerClient for ThreadPinnedClient<C> {
    fn start(&self) -> Deferred<()> {
        if self.on_io_thread() {
            self.inner.start()
        } else {
            let inner = self.inner.clone();
            let (resolver, fut) = vbot_streams::deferred::<()>();
            self.io_handle.spawn(async move {
                let result = inner.start().wait().await;
                match result {
                    Ok(()) => resolver.resolve(()),
                    Err(err) => resolver.fail(err),
                }
            });
            fut
        }
    }

    fn stop(&self) -> Deferred<()> {
        if self.on_io_thread() {
            self.inner.stop()
        } else {
            let inner = self.inner.clone();
            let (resolver, fut) = vbot_streams::deferred::<()>();
            self.io_handle.spawn(async move {
                match inner.stop().wait().await {
                    Ok(()) => resolver.resolve(()),
                    Err(err) => resolver.fail(err),
                }
            });
            fut
        }
    }

    fn publish(&self, channel: &str, message: Value, cb: Option<PublishCallback>) {
        if self.on_io_thread() {
            self.inner.publish(channel, message, cb);
            return;
        }
        let inner = self.inner.clone();
        let channel = channel.to_string();
        self.io_handle.spawn(async move {
            inner.publish(&channel, message, cb);
        });
    }

    fn subscribe(
        &self,
        channel: &str,
        sub_handle: &str,
        callbacks: SubscriptionCallbacks,
        options: SubscribeOptions,
    ) {
        if self.on_io_thread() {
            self.inner.subscribe(channel, sub_handle, callbacks, options);
            return;
        }
        let inner = self.inner.clone();
        let channel = channel.to_string();
        let sub_handle = sub_handle.to_string();
        self.io_handle.spawn(async move {
            inner.subscribe(&channel, &sub_handle, callbacks, options);
        });
    }

    fn unsubscribe(&self, sub_handle: &str) {
        if self.on_io_thread() {
            self.inner.unsubscribe(sub_handle);
            return;
        }
        let inner = self.inner.clone();
        let sub_handle = sub_handle.to_string();
        self.io_handle.spawn(async move {
            inner.unsubscribe(&sub_handle);
        });
    }

    fn set_error_listener(&self, listener: ErrorListener) {
        self.inner.set_error_listener(listener);
    }
}
