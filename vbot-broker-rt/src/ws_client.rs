//! WebSocket transport implementing [`BrokerClient`] (spec §4.3 contract
//! over §6's JSON wire protocol). Grounded on `pilatus-axum-rt`'s
//! "integration" feature, which already carries `tokio-tungstenite` for
//! its own WS integration tests - promoted here to a first-class,
//! always-on transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;
use vbot_broker::protocol::{
    self, History, IncomingMessage, OutgoingMessage, PublishBody, SubscribeBody, UnsubscribeBody,
};
use vbot_broker::{BrokerClient, BrokerError, ErrorListener, PublishCallback, SubscribeOptions, SubscriptionCallbacks};
use vbot_streams::{deferred, Deferred};

type PendingAck = Box<dyn FnOnce(Result<Value, BrokerError>) + Send>;

struct Shared {
    url: Url,
    next_id: AtomicU64,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    pending_acks: Mutex<HashMap<protocol::RequestId, PendingAck>>,
    pending_subscribes: Mutex<HashMap<protocol::RequestId, String>>,
    subscriptions: Mutex<HashMap<String, vbot_broker::SubscriptionEntry>>,
    error_listener: Mutex<Option<ErrorListener>>,
}

fn notify_transport_error(shared: &Arc<Shared>, err: BrokerError) {
    if let Some(listener) = shared.error_listener.lock().unwrap().as_ref() {
        listener(err);
    }
}

pub struct WsBrokerClient {
    shared: Arc<Shared>,
}

impl WsBrokerClient {
    pub fn new(url: Url) -> Self {
        Self {
            shared: Arc::new(Shared {
                url,
                next_id: AtomicU64::new(1),
                outgoing: Mutex::new(None),
                pending_acks: Mutex::new(HashMap::new()),
                pending_subscribes: Mutex::new(HashMap::new()),
                subscriptions: Mutex::new(HashMap::new()),
                error_listener: Mutex::new(None),
            }),
        }
    }

    fn send(&self, msg: OutgoingMessage) {
        let text = serde_json::to_string(&msg).expect("OutgoingMessage always serializes");
        let tx = self.shared.outgoing.lock().unwrap().clone();
        match tx {
            Some(tx) => {
                if tx.send(Message::Text(text.into())).is_err() {
                    warn!("ws_client: outgoing channel closed, dropping message");
                }
            }
            None => warn!("ws_client: send before start() completed"),
        }
    }
}

impl BrokerClient for WsBrokerClient {
    fn start(&self) -> Deferred<()> {
        let (resolver, fut) = deferred::<()>();
        let shared = self.shared.clone();

        tokio::spawn(async move {
            let (ws, _) = match tokio_tungstenite::connect_async(shared.url.as_str()).await {
                Ok(pair) => pair,
                Err(err) => {
                    resolver.fail(vbot_streams::StreamError::stream_init(err.to_string()));
                    return;
                }
            };

            let (mut write, mut read) = ws.split();
            let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
            *shared.outgoing.lock().unwrap() = Some(tx);
            resolver.resolve(());

            let writer_shared = shared.clone();
            let writer_task = tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if write.send(msg).await.is_err() {
                        warn!("ws_client: write failed, connection likely dead");
                        break;
                    }
                }
                let _ = &writer_shared;
            });

            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => dispatch_incoming(&shared, text.as_str()),
                    Ok(Message::Close(_)) => {
                        debug!("ws_client: server closed connection");
                        notify_transport_error(&shared, BrokerError::TransportClosed("server closed connection".to_string()));
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "ws_client: read error");
                        notify_transport_error(&shared, BrokerError::TransportClosed(err.to_string()));
                        break;
                    }
                }
            }
            writer_task.abort();
        });

        fut
    }

    fn stop(&self) -> Deferred<()> {
        let (resolver, fut) = deferred::<()>();
        *self.shared.outgoing.lock().unwrap() = None;
        resolver.resolve(());
        fut
    }

    fn publish(&self, channel: &str, message: Value, cb: Option<PublishCallback>) {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        if let Some(cb) = cb {
            self.shared.pending_acks.lock().unwrap().insert(
                id,
                Box::new(move |result| cb(result.map(|_| ()))),
            );
        }
        self.send(OutgoingMessage::Publish {
            id: Some(id),
            body: PublishBody {
                channel: channel.to_string(),
                message,
            },
        });
    }

    fn subscribe(
        &self,
        channel: &str,
        sub_handle: &str,
        callbacks: SubscriptionCallbacks,
        options: SubscribeOptions,
    ) {
        let entry = vbot_broker::SubscriptionEntry::new(channel, sub_handle, options.history, callbacks);
        self.shared
            .subscriptions
            .lock()
            .unwrap()
            .insert(sub_handle.to_string(), entry);

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared
            .pending_subscribes
            .lock()
            .unwrap()
            .insert(id, sub_handle.to_string());
        self.send(OutgoingMessage::Subscribe {
            id,
            body: SubscribeBody {
                channel: channel.to_string(),
                subscription_id: sub_handle.to_string(),
                history: options.history.map(|h| History { age: h.age, count: h.count }),
            },
        });
    }

    fn unsubscribe(&self, sub_handle: &str) {
        if let Some(entry) = self.shared.subscriptions.lock().unwrap().get_mut(sub_handle) {
            entry.mark_pending_unsubscribe();
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.send(OutgoingMessage::Unsubscribe {
            id,
            body: UnsubscribeBody {
                subscription_id: sub_handle.to_string(),
            },
        });
    }

    fn set_error_listener(&self, listener: ErrorListener) {
        *self.shared.error_listener.lock().unwrap() = Some(listener);
    }
}

fn dispatch_incoming(shared: &Arc<Shared>, text: &str) {
    let parsed = match protocol::parse_incoming(text) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(error = %err, "ws_client: unparseable/unknown frame, treating as fatal");
            return;
        }
    };

    match parsed {
        IncomingMessage::SubscriptionData {
            subscription_id,
            messages,
        } => {
            if let Some(entry) = shared.subscriptions.lock().unwrap().get_mut(&subscription_id) {
                entry.deliver_data(messages);
            }
        }
        IncomingMessage::SubscriptionError {
            subscription_id,
            body,
        } => {
            if let Some(id) = subscription_id {
                if let Some(entry) = shared.subscriptions.lock().unwrap().get_mut(&id) {
                    entry.deliver_error(BrokerError::SubscriptionError(body.to_string()));
                }
            }
        }
        IncomingMessage::SubscribeOk { id, .. } => {
            if let Some(sub_handle) = shared.pending_subscribes.lock().unwrap().remove(&id) {
                if let Some(entry) = shared.subscriptions.lock().unwrap().get_mut(&sub_handle) {
                    entry.mark_current();
                }
            }
            resolve_ack(shared, id, Ok(Value::Null))
        }
        IncomingMessage::SubscribeError { id, body } => {
            resolve_ack(shared, id, Err(BrokerError::SubscribeError(body.to_string())))
        }
        IncomingMessage::UnsubscribeOk { id, .. } => resolve_ack(shared, id, Ok(Value::Null)),
        IncomingMessage::UnsubscribeError { id, body } => {
            resolve_ack(shared, id, Err(BrokerError::UnsubscribeError(body.to_string())))
        }
        IncomingMessage::PublishOk { id, .. } => resolve_ack(shared, id, Ok(Value::Null)),
        IncomingMessage::PublishError { id, body } => {
            resolve_ack(shared, id, Err(BrokerError::PublishError(body.to_string())))
        }
    }
}

fn resolve_ack(shared: &Arc<Shared>, id: protocol::RequestId, result: Result<Value, BrokerError>) {
    if let Some(cb) = shared.pending_acks.lock().unwrap().remove(&id) {
        cb(result);
    }
}
