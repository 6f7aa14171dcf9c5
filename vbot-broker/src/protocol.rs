//! RTM JSON wire protocol (spec §6): outgoing requests carry a monotonic
//! `id` used to correlate the matching `ok`/`error` ack; incoming frames
//! are dispatched on their `action` string. Kept separate from the
//! client/subscription state machine so the wire shape can be tested in
//! isolation, the way `pilatus-axum`'s request/response types are tested
//! apart from its router.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type RequestId = u64;

#[derive(Clone, Serialize)]
#[serde(tag = "action")]
pub enum OutgoingMessage {
    #[serde(rename = "rtm/subscribe")]
    Subscribe {
        id: RequestId,
        body: SubscribeBody,
    },
    #[serde(rename = "rtm/unsubscribe")]
    Unsubscribe {
        id: RequestId,
        body: UnsubscribeBody,
    },
    #[serde(rename = "rtm/publish")]
    Publish {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        body: PublishBody,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeBody {
    pub channel: String,
    pub subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<History>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct History {
    pub age: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeBody {
    pub subscription_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishBody {
    pub channel: String,
    pub message: Value,
}

/// A parsed incoming frame. `action` values outside this set are fatal
/// protocol violations (spec §6: "unknown actions are treated as fatal").
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    SubscriptionData {
        subscription_id: String,
        messages: Vec<Value>,
    },
    SubscriptionError {
        subscription_id: Option<String>,
        body: Value,
    },
    SubscribeOk { id: RequestId, body: Value },
    SubscribeError { id: RequestId, body: Value },
    UnsubscribeOk { id: RequestId, body: Value },
    UnsubscribeError { id: RequestId, body: Value },
    PublishOk { id: RequestId, body: Value },
    PublishError { id: RequestId, body: Value },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    action: String,
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionDataBody {
    subscription_id: String,
    #[serde(default)]
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize, Default)]
struct SubscriptionErrorBody {
    #[serde(default)]
    subscription_id: Option<String>,
}

pub fn parse_incoming(text: &str) -> Result<IncomingMessage, crate::BrokerError> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| crate::BrokerError::InvalidMessage(e.to_string()))?;

    let require_id = |id: Option<RequestId>| -> Result<RequestId, crate::BrokerError> {
        id.ok_or_else(|| {
            crate::BrokerError::InvalidMessage(format!("missing id on {} frame", raw.action))
        })
    };

    match raw.action.as_str() {
        "rtm/subscription/data" => {
            let data: SubscriptionDataBody = serde_json::from_value(raw.body)
                .map_err(|e| crate::BrokerError::InvalidMessage(e.to_string()))?;
            Ok(IncomingMessage::SubscriptionData {
                subscription_id: data.subscription_id,
                messages: data.messages,
            })
        }
        "rtm/subscription/error" => {
            let parsed: SubscriptionErrorBody =
                serde_json::from_value(raw.body.clone()).unwrap_or_default();
            Ok(IncomingMessage::SubscriptionError {
                subscription_id: parsed.subscription_id,
                body: raw.body,
            })
        }
        "rtm/subscribe/ok" => Ok(IncomingMessage::SubscribeOk {
            id: require_id(raw.id)?,
            body: raw.body,
        }),
        "rtm/subscribe/error" => Ok(IncomingMessage::SubscribeError {
            id: require_id(raw.id)?,
            body: raw.body,
        }),
        "rtm/unsubscribe/ok" => Ok(IncomingMessage::UnsubscribeOk {
            id: require_id(raw.id)?,
            body: raw.body,
        }),
        "rtm/unsubscribe/error" => Ok(IncomingMessage::UnsubscribeError {
            id: require_id(raw.id)?,
            body: raw.body,
        }),
        "rtm/publish/ok" => Ok(IncomingMessage::PublishOk {
            id: require_id(raw.id)?,
            body: raw.body,
        }),
        "rtm/publish/error" => Ok(IncomingMessage::PublishError {
            id: require_id(raw.id)?,
            body: raw.body,
        }),
        other => Err(crate::BrokerError::InvalidMessage(format!(
            "unknown action: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_subscribe_with_history() {
        let msg = OutgoingMessage::Subscribe {
            id: 7,
            body: SubscribeBody {
                channel: "frames".into(),
                subscription_id: "frames".into(),
                history: Some(History { age: 1, count: 0 }),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["action"], "rtm/subscribe");
        assert_eq!(json["id"], 7);
        assert_eq!(json["body"]["channel"], "frames");
        assert_eq!(json["body"]["history"]["age"], 1);
    }

    #[test]
    fn publish_without_id_omits_the_field() {
        let msg = OutgoingMessage::Publish {
            id: None,
            body: PublishBody {
                channel: "control".into(),
                message: serde_json::json!({"x": 1}),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("id").is_none());
    }

    #[test]
    fn parses_subscription_data() {
        let text = r#"{"action":"rtm/subscription/data","body":{"subscription_id":"c","messages":[1,2]}}"#;
        match parse_incoming(text).unwrap() {
            IncomingMessage::SubscriptionData {
                subscription_id,
                messages,
            } => {
                assert_eq!("c", subscription_id);
                assert_eq!(2, messages.len());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_action_is_an_error() {
        let text = r#"{"action":"rtm/frobnicate","body":{}}"#;
        assert!(parse_incoming(text).is_err());
    }

    #[test]
    fn ack_without_id_is_an_error() {
        let text = r#"{"action":"rtm/subscribe/ok","body":{}}"#;
        assert!(parse_incoming(text).is_err());
    }
}

impl std::fmt::Debug for OutgoingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscribe { id, .. } => write!(f, "Subscribe(id={id})"),
            Self::Unsubscribe { id, .. } => write!(f, "Unsubscribe(id={id})"),
            Self::Publish { id, .. } => write!(f, "Publish(id={id:?})"),
        }
    }
}
