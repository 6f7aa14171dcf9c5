//! Message enrichment (spec §4.5 step 4, §3 "bot message" invariant):
//! fills in fields the user callback is allowed to leave blank.

use serde_json::Value;
use vbot_media::{BotMessage, BotMessageKind};
use vbot_streams::FrameId;

/// A message as queued by the user callback, before enrichment - `id`
/// defaults to the current-frame sentinel unless the callback set it
/// explicitly.
pub struct QueuedMessage {
    pub kind: BotMessageKind,
    pub payload: Value,
    pub id: FrameId,
}

impl QueuedMessage {
    pub fn new(kind: BotMessageKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            id: FrameId::CURRENT,
        }
    }

    pub fn with_id(mut self, id: FrameId) -> Self {
        self.id = id;
        self
    }
}

/// Fills in the fields a queued message is missing (spec §4.5):
/// - `id` inherited from the current frame when `(0,0)`.
/// - `from` set to `bot_id`.
/// - a two-element `i` array emitted in the payload when the resolved id
///   is non-negative (spec's "unassociated" convention, §3).
pub fn enrich(queued: QueuedMessage, current_frame_id: FrameId, bot_id: &str) -> BotMessage {
    let resolved_id = queued.id.resolve(current_frame_id);

    let mut payload = queued.payload;
    if let Value::Object(ref mut map) = payload {
        map.insert("from".to_string(), Value::String(bot_id.to_string()));
        if !resolved_id.is_unassociated() {
            map.insert(
                "i".to_string(),
                Value::Array(vec![resolved_id.i1.into(), resolved_id.i2.into()]),
            );
        }
    }

    BotMessage {
        kind: queued.kind,
        payload,
        id: resolved_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinel_id_inherits_current_frame() {
        let msg = QueuedMessage::new(BotMessageKind::Analysis, json!({}));
        let enriched = enrich(msg, FrameId::new(7, 9), "bot-1");
        assert_eq!(FrameId::new(7, 9), enriched.id);
        assert_eq!("bot-1", enriched.payload["from"]);
        assert_eq!(json!([7, 9]), enriched.payload["i"]);
    }

    #[test]
    fn explicit_negative_id_stays_unassociated_and_has_no_i_array() {
        let msg = QueuedMessage::new(BotMessageKind::Debug, json!({})).with_id(FrameId::new(-1, -1));
        let enriched = enrich(msg, FrameId::new(7, 9), "bot-1");
        assert_eq!(FrameId::new(-1, -1), enriched.id);
        assert!(enriched.payload.get("i").is_none());
    }

    #[test]
    fn explicit_non_sentinel_id_passes_through() {
        let msg = QueuedMessage::new(BotMessageKind::Control, json!({})).with_id(FrameId::new(3, 3));
        let enriched = enrich(msg, FrameId::new(7, 9), "bot-1");
        assert_eq!(FrameId::new(3, 3), enriched.id);
    }
}
