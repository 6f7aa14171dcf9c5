//! Broker-level error kinds (spec §7): protocol-surface failures,
//! distinct from the core `vbot_streams::ErrorKind` used inside the
//! reactive-streams pipeline itself.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BrokerError {
    #[error("not connected to broker")]
    NotConnected,
    #[error("invalid response from broker: {0}")]
    InvalidResponse(String),
    #[error("subscribe failed: {0}")]
    SubscribeError(String),
    #[error("unsubscribe failed: {0}")]
    UnsubscribeError(String),
    #[error("subscription error: {0}")]
    SubscriptionError(String),
    #[error("publish failed: {0}")]
    PublishError(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("transport closed: {0}")]
    TransportClosed(String),
}
