//! Transport-agnostic broker client contract (spec §4.3). A concrete
//! transport (`vbot-broker-rt`'s WebSocket implementation) drives this
//! trait; the resilient and thread-pinning wrappers described in the
//! spec are themselves implementations of the same trait, so they
//! compose without the caller knowing which layer it is talking to -
//! the same "wrapper implements the wrapped trait" shape as
//! `pilatus::device::system::sender`'s ask/response abstraction.

use serde_json::Value;
use vbot_streams::Deferred;

use crate::protocol::History;
use crate::subscription::SubscriptionCallbacks;
use crate::BrokerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub history: Option<History>,
}

pub type PublishCallback = Box<dyn FnOnce(Result<(), BrokerError>) + Send>;
/// Notified when a transport observes a failure it cannot recover from
/// itself (read error, unexpected close). Registered by wrappers that
/// need to react to connection loss, e.g. the auto-reconnect wrapper.
pub type ErrorListener = Box<dyn Fn(BrokerError) + Send + Sync>;

pub trait BrokerClient: Send + Sync {
    /// Connects and performs the protocol handshake.
    fn start(&self) -> Deferred<()>;
    /// Disconnects, releasing any held subscriptions.
    fn stop(&self) -> Deferred<()>;
    fn publish(&self, channel: &str, message: Value, cb: Option<PublishCallback>);
    fn subscribe(
        &self,
        channel: &str,
        sub_handle: &str,
        callbacks: SubscriptionCallbacks,
        options: SubscribeOptions,
    );
    fn unsubscribe(&self, sub_handle: &str);

    /// Registers a listener invoked when this client's transport fails.
    /// The default is a no-op; only transports that can actually observe
    /// failures (and wrappers that forward to one) override it.
    fn set_error_listener(&self, _listener: ErrorListener) {}
}

impl<T: BrokerClient + ?Sized> BrokerClient for std::sync::Arc<T> {
    fn start(&self) -> Deferred<()> {
        (**self).start()
    }

    fn stop(&self) -> Deferred<()> {
        (**self).stop()
    }

    fn publish(&self, channel: &str, message: Value, cb: Option<PublishCallback>) {
        (**self).publish(channel, message, cb);
    }

    fn subscribe(
        &self,
        channel: &str,
        sub_handle: &str,
        callbacks: SubscriptionCallbacks,
        options: SubscribeOptions,
    ) {
        (**self).subscribe(channel, sub_handle, callbacks, options);
    }

    fn unsubscribe(&self, sub_handle: &str) {
        (**self).unsubscribe(sub_handle);
    }

    fn set_error_listener(&self, listener: ErrorListener) {
        (**self).set_error_listener(listener);
    }
}
