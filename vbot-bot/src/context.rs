//! `bot_context` (spec §4.5): exposes instance data, the current image
//! metadata, execution mode, and the metrics registry to the user
//! callback.

use std::sync::{Arc, RwLock};

use vbot_media::metrics::BotMetrics;
use vbot_media::OwnedImageMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Live,
    Batch,
}

pub struct BotContext<D> {
    pub instance_data: D,
    image_metadata: RwLock<Option<OwnedImageMetadata>>,
    pub mode: ExecutionMode,
    pub metrics: Arc<BotMetrics>,
}

impl<D> BotContext<D> {
    pub fn new(instance_data: D, mode: ExecutionMode) -> Self {
        Self {
            instance_data,
            image_metadata: RwLock::new(None),
            mode,
            metrics: Arc::new(BotMetrics::default()),
        }
    }

    pub fn image_metadata(&self) -> Option<OwnedImageMetadata> {
        self.image_metadata.read().unwrap().clone()
    }

    /// Updates `image_metadata` when size/stride-bearing fields change
    /// (spec §3: "set on the first frame and updated whenever
    /// width/height/stride change").
    pub fn update_image_metadata_if_changed(&self, width: u32, height: u32, pixel_format: vbot_streams::PixelFormat) {
        let mut current = self.image_metadata.write().unwrap();
        let changed = match current.as_ref() {
            Some(m) => m.width != width || m.height != height || m.pixel_format != pixel_format,
            None => true,
        };
        if changed {
            *current = Some(OwnedImageMetadata {
                pixel_format,
                width,
                height,
            });
        }
    }
}
