//! Auto-reconnecting wrapper (spec §4.3): on any error callback from the
//! inner client, tears it down, reconstructs it from the factory, and
//! re-subscribes every held subscription in insertion order. Grounded on
//! `pilatus-rt::shutdown`'s abort-and-rebuild shape, generalized from a
//! one-shot signal into a retry loop driven by transport errors.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tracing::{info, warn};
use vbot_broker::{BrokerClient, BrokerError, PublishCallback, SubscribeOptions, SubscriptionCallbacks};
use vbot_streams::Deferred;

/// A held subscription's callbacks, shared so the wrapper can re-register
/// them against a freshly reconstructed inner client without the caller
/// having to subscribe again.
struct HeldSubscription {
    channel: String,
    sub_handle: String,
    options: SubscribeOptions,
    callbacks: Arc<Mutex<SubscriptionCallbacks>>,
}

fn forwarding_callbacks(shared: Arc<Mutex<SubscriptionCallbacks>>) -> SubscriptionCallbacks {
    let on_data_shared = shared.clone();
    let on_error_shared = shared;
    SubscriptionCallbacks {
        on_data: Box::new(move |messages| (on_data_shared.lock().unwrap().on_data)(messages)),
        on_error: Box::new(move |err| (on_error_shared.lock().unwrap().on_error)(err)),
    }
}

pub struct ResilientClient<F> {
    factory: F,
    inner: Mutex<Box<dyn BrokerClient>>,
    held: Mutex<Vec<HeldSubscription>>,
    self_weak: Weak<ResilientClient<F>>,
}

impl<F> ResilientClient<F>
where
    F: Fn() -> Box<dyn BrokerClient> + Send + Sync + 'static,
{
    /// Built via `Arc::new_cyclic` so the inner transport's error listener
    /// can hold a `Weak` back-reference to this client without a separate
    /// wiring step the caller could forget.
    pub fn new(factory: F) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let inner = (factory)();
            wire_listener(&inner, weak.clone());
            Self {
                factory,
                inner: Mutex::new(inner),
                held: Mutex::new(Vec::new()),
                self_weak: weak.clone(),
            }
        })
    }

    /// Tears down and rebuilds the inner client, then replays every held
    /// subscription in insertion order against the new one.
    pub fn reconnect(&self) {
        warn!("resilient_client: reconnecting after transport error");
        let fresh = (self.factory)();
        wire_listener(&fresh, self.self_weak.clone());
        *self.inner.lock().unwrap() = fresh;

        let inner = self.inner.lock().unwrap();
        for sub in self.held.lock().unwrap().iter() {
            info!(channel = %sub.channel, handle = %sub.sub_handle, "resilient_client: re-subscribing");
            inner.subscribe(
                &sub.channel,
                &sub.sub_handle,
                forwarding_callbacks(sub.callbacks.clone()),
                sub.options,
            );
        }
    }
}

/// Registers a listener on `inner` that upgrades `weak` and routes the
/// transport failure into [`ResilientClient::on_transport_error`].
fn wire_listener<F>(inner: &Box<dyn BrokerClient>, weak: Weak<ResilientClient<F>>)
where
    F: Fn() -> Box<dyn BrokerClient> + Send + Sync + 'static,
{
    inner.set_error_listener(Box::new(move |err| {
        if let Some(this) = weak.upgrade() {
            this.on_transport_error(err);
        }
    }));
}

impl<F> BrokerClient for ResilientClient<F>
where
    F: Fn() -> Box<dyn BrokerClient> + Send + Sync + 'static,
{
    fn start(&self) -> Deferred<()> {
        self.inner.lock().unwrap().start()
    }

    fn stop(&self) -> Deferred<()> {
        self.inner.lock().unwrap().stop()
    }

    fn publish(&self, channel: &str, message: Value, cb: Option<PublishCallback>) {
        self.inner.lock().unwrap().publish(channel, message, cb);
    }

    fn subscribe(
        &self,
        channel: &str,
        sub_handle: &str,
        callbacks: SubscriptionCallbacks,
        options: SubscribeOptions,
    ) {
        let shared = Arc::new(Mutex::new(callbacks));
        self.held.lock().unwrap().push(HeldSubscription {
            channel: channel.to_string(),
            sub_handle: sub_handle.to_string(),
            options,
            callbacks: shared.clone(),
        });
        self.inner
            .lock()
            .unwrap()
            .subscribe(channel, sub_handle, forwarding_callbacks(shared), options);
    }

    fn unsubscribe(&self, sub_handle: &str) {
        self.held.lock().unwrap().retain(|s| s.sub_handle != sub_handle);
        self.inner.lock().unwrap().unsubscribe(sub_handle);
    }
}

/// Error-callback hook the transport layer calls when it observes a
/// transport-level failure (spec: "on any error callback"). Not part of
/// `BrokerClient` itself, since the trigger is the inner client's error
/// signal, not an operation the caller invokes directly.
impl<F> ResilientClient<F>
where
    F: Fn() -> Box<dyn BrokerClient> + Send + Sync + 'static,
{
    pub fn on_transport_error(&self, err: BrokerError) {
        warn!(%err, "resilient_client: transport error observed");
        self.reconnect();
    }
}

pub fn resilient_client<F>(factory: F) -> Arc<ResilientClient<F>>
where
    F: Fn() -> Box<dyn BrokerClient> + Send + Sync + 'static,
{
    ResilientClient::new(factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vbot_broker::ErrorListener;
    use vbot_streams::deferred;

    struct FakeClient {
        id: usize,
        subscribe_calls: Arc<Mutex<Vec<(usize, String, String, SubscribeOptions)>>>,
        listeners: Arc<Mutex<Vec<(usize, ErrorListener)>>>,
    }

    impl BrokerClient for FakeClient {
        fn start(&self) -> Deferred<()> {
            let (resolver, fut) = deferred::<()>();
            resolver.resolve(());
            fut
        }

        fn stop(&self) -> Deferred<()> {
            let (resolver, fut) = deferred::<()>();
            resolver.resolve(());
            fut
        }

        fn publish(&self, _channel: &str, _message: Value, _cb: Option<PublishCallback>) {}

        fn subscribe(
            &self,
            channel: &str,
            sub_handle: &str,
            _callbacks: SubscriptionCallbacks,
            options: SubscribeOptions,
        ) {
            self.subscribe_calls
                .lock()
                .unwrap()
                .push((self.id, channel.to_string(), sub_handle.to_string(), options));
        }

        fn unsubscribe(&self, _sub_handle: &str) {}

        fn set_error_listener(&self, listener: ErrorListener) {
            self.listeners.lock().unwrap().push((self.id, listener));
        }
    }

    /// Scenario S6: inject a transport error after one successful
    /// subscribe (via the same listener hook a real transport's read loop
    /// would call); the wrapper must issue exactly one re-subscribe with
    /// the same channel and options, and the dead client must never be
    /// touched again.
    #[test]
    fn reconnects_and_replays_the_held_subscription_exactly_once() {
        let next_id = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let listeners: Arc<Mutex<Vec<(usize, ErrorListener)>>> = Arc::new(Mutex::new(Vec::new()));
        let next_id_for_factory = next_id.clone();
        let calls_for_factory = calls.clone();
        let listeners_for_factory = listeners.clone();

        let client = resilient_client(move || -> Box<dyn BrokerClient> {
            let id = next_id_for_factory.fetch_add(1, Ordering::SeqCst);
            Box::new(FakeClient {
                id,
                subscribe_calls: calls_for_factory.clone(),
                listeners: listeners_for_factory.clone(),
            })
        });

        let options = SubscribeOptions::default();
        client.subscribe(
            "frames",
            "frames#1",
            SubscriptionCallbacks {
                on_data: Box::new(|_| {}),
                on_error: Box::new(|_| {}),
            },
            options,
        );

        assert_eq!(
            vec![(0, "frames".to_string(), "frames#1".to_string(), options)],
            *calls.lock().unwrap()
        );
        assert_eq!(1, listeners.lock().unwrap().len(), "the first client must have registered a listener");

        // Simulate the dead client's transport observing the failure.
        let (dead_id, dead_listener) = listeners.lock().unwrap().remove(0);
        assert_eq!(0, dead_id);
        dead_listener(BrokerError::TransportClosed("connection reset".to_string()));

        let seen = calls.lock().unwrap().clone();
        assert_eq!(2, seen.len(), "expected exactly one resubscribe after reconnect");
        assert_eq!(0, seen[0].0, "first subscribe went to the original client");
        assert_eq!(1, seen[1].0, "resubscribe must target the freshly built client, not the dead one");
        assert_eq!("frames", seen[1].1);
        assert_eq!("frames#1", seen[1].2);
        assert_eq!(options, seen[1].3);

        // The dead client's own listener is no longer wired into anything
        // that can deliver data; only the fresh client registered one.
        assert_eq!(1, listeners.lock().unwrap().len());
        assert_eq!(1, listeners.lock().unwrap()[0].0);
    }
}
