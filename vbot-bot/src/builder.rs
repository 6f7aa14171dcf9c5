//! `bot_builder` (spec §4.5): assembles a `BotInstance` from a pixel
//! format and the two user callbacks, the way the teacher's recipe
//! builders assemble a pipeline stage from its constituent closures.

use serde_json::Value;
use vbot_media::OwnedImageFrame;

use crate::context::{BotContext, ExecutionMode};
use crate::instance::{BotDescriptor, BotInstance};
use crate::message::QueuedMessage;

pub struct BotBuilder<D> {
    pixel_format: Option<vbot_streams::PixelFormat>,
    image_callback: Option<Box<dyn FnMut(&BotContext<D>, &OwnedImageFrame) -> Vec<QueuedMessage> + Send>>,
    control_callback: Option<Box<dyn FnMut(&BotContext<D>, Value) -> Option<Value> + Send>>,
    startup_config: Option<Value>,
}

impl<D> Default for BotBuilder<D> {
    fn default() -> Self {
        Self {
            pixel_format: None,
            image_callback: None,
            control_callback: None,
            startup_config: None,
        }
    }
}

impl<D> BotBuilder<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixel_format(mut self, format: vbot_streams::PixelFormat) -> Self {
        self.pixel_format = Some(format);
        self
    }

    pub fn on_image(
        mut self,
        callback: impl FnMut(&BotContext<D>, &OwnedImageFrame) -> Vec<QueuedMessage> + Send + 'static,
    ) -> Self {
        self.image_callback = Some(Box::new(callback));
        self
    }

    pub fn on_control(
        mut self,
        callback: impl FnMut(&BotContext<D>, Value) -> Option<Value> + Send + 'static,
    ) -> Self {
        self.control_callback = Some(Box::new(callback));
        self
    }

    /// The config object passed to the unconditional startup `configure`
    /// call; defaults to an empty map if never set.
    pub fn startup_config(mut self, cfg: Value) -> Self {
        self.startup_config = Some(cfg);
        self
    }

    /// Builds the instance, failing only if a required callback was never
    /// supplied; a missing control callback defaults to "no response".
    /// Runs `configure` once, unconditionally, before returning the
    /// instance - any DEBUG response it queues is retrievable via
    /// `BotInstance::drain_messages`.
    pub fn build(self, bot_id: impl Into<String>, mode: ExecutionMode, instance_data: D) -> Result<BotInstance<D>, &'static str> {
        let pixel_format = self.pixel_format.ok_or("bot builder: pixel_format not set")?;
        let image_callback = self.image_callback.ok_or("bot builder: image callback not set")?;
        let control_callback = self.control_callback.unwrap_or_else(|| Box::new(|_ctx, _req| None));
        let startup_config = self.startup_config.unwrap_or_else(|| Value::Object(Default::default()));

        let mut instance = BotInstance::new(
            bot_id,
            mode,
            instance_data,
            BotDescriptor {
                pixel_format,
                image_callback,
                control_callback,
            },
        );
        instance.configure(startup_config);
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbot_media::BotMessageKind;

    #[test]
    fn build_fails_without_image_callback() {
        let result = BotBuilder::<()>::new()
            .pixel_format(vbot_streams::PixelFormat::Rgb0)
            .build("bot-1", ExecutionMode::Live, ());
        assert!(result.is_err());
    }

    #[test]
    fn build_succeeds_with_required_fields() {
        let result = BotBuilder::<()>::new()
            .pixel_format(vbot_streams::PixelFormat::Rgb0)
            .on_image(|_ctx, _frame| vec![QueuedMessage::new(BotMessageKind::Analysis, serde_json::json!({}))])
            .build("bot-1", ExecutionMode::Live, ());
        assert!(result.is_ok());
    }

    #[test]
    fn build_runs_configure_and_its_response_is_drainable() {
        let mut instance = BotBuilder::<()>::new()
            .pixel_format(vbot_streams::PixelFormat::Rgb0)
            .on_image(|_ctx, _frame| Vec::new())
            .on_control(|_ctx, req| Some(serde_json::json!({"ack": req["action"]})))
            .build("bot-1", ExecutionMode::Live, ())
            .unwrap();

        let queued = instance.drain_messages();
        assert_eq!(1, queued.len());
        assert_eq!(vbot_media::BotMessageKind::Debug, queued[0].kind);
        assert!(instance.drain_messages().is_empty());
    }
}
