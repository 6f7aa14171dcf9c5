//! Subscription state machine (spec §4.3): `{PendingSubscribe, Current,
//! PendingUnsubscribe}` with transitions driven by acks. Data arriving
//! while `PendingUnsubscribe` is dropped silently rather than delivered
//! or erred - the subscriber already asked to leave.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    PendingSubscribe,
    Current,
    PendingUnsubscribe,
}

pub struct SubscriptionCallbacks {
    pub on_data: Box<dyn FnMut(Vec<Value>) + Send>,
    pub on_error: Box<dyn FnMut(crate::BrokerError) + Send>,
}

pub struct SubscriptionEntry {
    pub channel: String,
    pub subscription_id: String,
    pub history: Option<crate::protocol::History>,
    pub state: SubscriptionState,
    pub callbacks: SubscriptionCallbacks,
}

impl SubscriptionEntry {
    pub fn new(
        channel: impl Into<String>,
        subscription_id: impl Into<String>,
        history: Option<crate::protocol::History>,
        callbacks: SubscriptionCallbacks,
    ) -> Self {
        Self {
            channel: channel.into(),
            subscription_id: subscription_id.into(),
            history,
            state: SubscriptionState::PendingSubscribe,
            callbacks,
        }
    }

    /// Delivers incoming data, honoring the "drop silently while
    /// PendingUnsubscribe" rule. Returns whether the data was delivered.
    pub fn deliver_data(&mut self, messages: Vec<Value>) -> bool {
        if self.state == SubscriptionState::PendingUnsubscribe {
            return false;
        }
        (self.callbacks.on_data)(messages);
        true
    }

    pub fn deliver_error(&mut self, err: crate::BrokerError) {
        if self.state == SubscriptionState::PendingUnsubscribe {
            return;
        }
        (self.callbacks.on_error)(err);
    }

    pub fn mark_current(&mut self) {
        if self.state == SubscriptionState::PendingSubscribe {
            self.state = SubscriptionState::Current;
        }
    }

    pub fn mark_pending_unsubscribe(&mut self) {
        self.state = SubscriptionState::PendingUnsubscribe;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn entry_with_sink() -> (SubscriptionEntry, Arc<Mutex<Vec<Vec<Value>>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let entry = SubscriptionEntry::new(
            "frames",
            "frames",
            None,
            SubscriptionCallbacks {
                on_data: Box::new(move |msgs| received_clone.lock().unwrap().push(msgs)),
                on_error: Box::new(|_| {}),
            },
        );
        (entry, received)
    }

    #[test]
    fn drops_data_while_pending_unsubscribe() {
        let (mut entry, received) = entry_with_sink();
        entry.mark_current();
        entry.mark_pending_unsubscribe();
        let delivered = entry.deliver_data(vec![Value::Null]);
        assert!(!delivered);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn delivers_data_while_current() {
        let (mut entry, received) = entry_with_sink();
        entry.mark_current();
        assert!(entry.deliver_data(vec![Value::Bool(true)]));
        assert_eq!(1, received.lock().unwrap().len());
    }

    #[test]
    fn pending_subscribe_only_advances_forward() {
        let (mut entry, _) = entry_with_sink();
        entry.mark_current();
        entry.state = SubscriptionState::PendingUnsubscribe;
        entry.mark_current();
        assert_eq!(SubscriptionState::PendingUnsubscribe, entry.state);
    }
}
