//! `bot_instance` (spec §4.5): owns the user descriptor and context,
//! drives the image and control paths, and emits `bot_output`.

use serde_json::Value;
use tracing::instrument;
use vbot_media::{BotMessage, BotMessageKind, BotOutput, OwnedImageFrame, OwnedImagePacket};
use vbot_streams::FrameId;

use crate::context::{BotContext, ExecutionMode};
use crate::message::{enrich, QueuedMessage};

pub struct BotDescriptor<D> {
    pub pixel_format: vbot_streams::PixelFormat,
    pub image_callback: Box<dyn FnMut(&BotContext<D>, &OwnedImageFrame) -> Vec<QueuedMessage> + Send>,
    pub control_callback: Box<dyn FnMut(&BotContext<D>, Value) -> Option<Value> + Send>,
}

pub struct BotInstance<D> {
    pub bot_id: String,
    pub context: BotContext<D>,
    descriptor: BotDescriptor<D>,
    message_buffer: Vec<BotMessage>,
}

impl<D> BotInstance<D> {
    pub fn new(bot_id: impl Into<String>, mode: ExecutionMode, instance_data: D, descriptor: BotDescriptor<D>) -> Self {
        Self {
            bot_id: bot_id.into(),
            context: BotContext::new(instance_data, mode),
            descriptor,
            message_buffer: Vec::new(),
        }
    }

    /// Drains and returns every message queued so far (e.g. by
    /// `configure`), leaving the buffer empty.
    pub fn drain_messages(&mut self) -> Vec<BotMessage> {
        std::mem::take(&mut self.message_buffer)
    }

    /// `configure(cfg)` (spec §4.5): called unconditionally at startup,
    /// even with an empty config map. Any DEBUG response is queued and
    /// retrievable via `drain_messages`.
    pub fn configure(&mut self, cfg: Value) {
        let request = serde_json::json!({"action": "configure", "body": cfg});
        if let Some(response) = (self.descriptor.control_callback)(&self.context, request) {
            self.message_buffer.push(enrich(
                QueuedMessage::new(BotMessageKind::Debug, response),
                FrameId::CURRENT,
                &self.bot_id,
            ));
            self.context.metrics.messages_sent.increment();
            self.context.metrics.messages_sent_debug.increment();
        }
    }

    /// Drives the image path for one frame, returning the frame followed
    /// by each message the callback queued (spec §4.5 step 5).
    #[instrument(skip(self, frame), fields(bot_id = %self.bot_id))]
    pub fn process_image(&mut self, frame: OwnedImageFrame) -> Vec<BotOutput> {
        let started = std::time::Instant::now();

        self.context
            .update_image_metadata_if_changed(frame.width, frame.height, frame.pixel_format);

        let queued = (self.descriptor.image_callback)(&self.context, &frame);
        let current_id = frame.id;

        let mut out = vec![BotOutput::Image(OwnedImagePacket::Frame(frame))];
        for msg in queued {
            let kind = msg.kind;
            let enriched = enrich(msg, current_id, &self.bot_id);
            self.context.metrics.messages_sent.increment();
            match kind {
                BotMessageKind::Analysis => self.context.metrics.messages_sent_analysis.increment(),
                BotMessageKind::Debug => self.context.metrics.messages_sent_debug.increment(),
                BotMessageKind::Control => self.context.metrics.messages_sent_control.increment(),
            }
            out.push(BotOutput::Message(enriched));
        }

        self.context
            .metrics
            .frame_processing_time
            .observe_ms(started.elapsed().as_millis() as u64);
        self.context.metrics.frames_processed.increment();

        out
    }

    /// Drives the control path (spec §4.5): arrays are iterated and each
    /// element re-entered; a map addressed to this bot is forwarded to
    /// the control callback, and any response is queued as a CONTROL
    /// message with `request_id` copied through.
    pub fn process_control(&mut self, payload: Value) -> Vec<BotMessage> {
        self.context.metrics.control_received.increment();
        let mut emitted = Vec::new();
        self.process_control_into(payload, &mut emitted);
        emitted
    }

    fn process_control_into(&mut self, payload: Value, emitted: &mut Vec<BotMessage>) {
        match payload {
            Value::Array(items) => {
                for item in items {
                    self.process_control_into(item, emitted);
                }
            }
            Value::Object(ref map) => {
                let addressed_to_me = map
                    .get("to")
                    .and_then(Value::as_str)
                    .is_some_and(|to| to == self.bot_id);
                if !addressed_to_me {
                    return;
                }
                let request_id = map.get("request_id").cloned();
                if let Some(mut response) = (self.descriptor.control_callback)(&self.context, payload.clone()) {
                    if let (Some(request_id), Value::Object(ref mut response_map)) =
                        (request_id, &mut response)
                    {
                        response_map.insert("request_id".to_string(), request_id);
                    }
                    self.context.metrics.control_sent.increment();
                    self.context.metrics.messages_sent.increment();
                    self.context.metrics.messages_sent_control.increment();
                    emitted.push(enrich(
                        QueuedMessage::new(BotMessageKind::Control, response),
                        FrameId::CURRENT,
                        &self.bot_id,
                    ));
                }
            }
            _ => {}
        }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.context.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> BotDescriptor<()> {
        BotDescriptor {
            pixel_format: vbot_streams::PixelFormat::Rgb0,
            image_callback: Box::new(|_ctx, _frame| {
                vec![QueuedMessage::new(BotMessageKind::Analysis, json!({"score": 1}))]
            }),
            control_callback: Box::new(|_ctx, req| {
                Some(json!({"ack": req["action"]}))
            }),
        }
    }

    fn frame(id: FrameId) -> OwnedImageFrame {
        OwnedImageFrame {
            id,
            pixel_format: vbot_streams::PixelFormat::Rgb0,
            width: 4,
            height: 4,
            pts: 0.0,
            planes: Default::default(),
            strides: [16, 0, 0, 0],
        }
    }

    #[test]
    fn configure_runs_even_with_empty_config_and_queues_debug_message() {
        let mut bot = BotInstance::new("bot-1", ExecutionMode::Live, (), descriptor());
        bot.configure(json!({}));
        assert_eq!(1, bot.context.metrics.messages_sent_debug.get());
    }

    #[test]
    fn process_image_emits_frame_then_enriched_messages() {
        let mut bot = BotInstance::new("bot-1", ExecutionMode::Live, (), descriptor());
        let out = bot.process_image(frame(FrameId::new(5, 5)));
        assert_eq!(2, out.len());
        match &out[0] {
            BotOutput::Image(_) => {}
            _ => panic!("expected image first"),
        }
        match &out[1] {
            BotOutput::Message(m) => {
                assert_eq!(FrameId::new(5, 5), m.id);
                assert_eq!("bot-1", m.payload["from"]);
            }
            _ => panic!("expected message second"),
        }
    }

    #[test]
    fn control_array_is_iterated_and_only_addressed_entries_forwarded() {
        let mut bot = BotInstance::new("bot-1", ExecutionMode::Live, (), descriptor());
        let payload = json!([
            {"to": "bot-1", "action": "ping", "request_id": "r1"},
            {"to": "other-bot", "action": "ping"},
        ]);
        let out = bot.process_control(payload);
        assert_eq!(1, out.len());
        assert_eq!("r1", out[0].payload["request_id"]);
    }
}
