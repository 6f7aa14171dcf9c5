use serde::{Deserialize, Serialize};

/// Images carry at most this many planes; packed formats only use plane 0,
/// planar formats use one plane per component.
pub const MAX_IMAGE_PLANES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixelFormat {
    Rgb0,
    Bgr,
}

impl PixelFormat {
    /// Name understood by the external filter graph (`decode_image_frames`,
    /// spec §4.4.2) as the final comma-joined filter component.
    pub fn filter_name(self) -> &'static str {
        match self {
            PixelFormat::Rgb0 => "rgb0",
            PixelFormat::Bgr => "bgr24",
        }
    }

    pub fn is_packed(self) -> bool {
        matches!(self, PixelFormat::Rgb0 | PixelFormat::Bgr)
    }
}
