//! Seams for the external codec/filter library (spec §1 Out-of-scope:
//! "the specific codec/filter library" is an external collaborator - the
//! core only specifies the interface it consumes). Concrete bindings
//! would live in a separate crate; `vbot-media` only needs these traits
//! to drive `decode_image_frames` and `encode_vp9` against something.

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("decoder initialization failed: {0}")]
    InitFailed(String),
    #[error("decoder needs more input")]
    NeedMoreInput,
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("encode failed: {0}")]
    EncodeFailed(String),
}

/// One decoded raw frame as reported by the external decoder, before it
/// is wrapped into an `owned_image_frame` with a resolved [`FrameId`].
pub struct DecodedFrame {
    pub planes: Vec<Bytes>,
    pub strides: Vec<u32>,
    pub width: u32,
    pub height: u32,
    /// Byte position of the packet this frame was decoded from, as
    /// reported by the decoder - used to resynchronize `pending_ids`.
    pub packet_pos: i64,
    pub packet_duration: i64,
    pub is_key_frame: bool,
}

/// Interface the `decode_image_frames` operator drives. A real
/// implementation wraps a hardware/software codec library; this crate
/// only specifies the contract.
pub trait VideoDecoder: Send {
    fn push_packet(
        &mut self,
        bytes: &[u8],
        pts_ms: i64,
        is_key_frame: bool,
    ) -> Result<(), CodecError>;

    /// Pulls the next decoded frame, or `Err(NeedMoreInput)` if the
    /// decoder has nothing ready yet.
    fn pull_frame(&mut self) -> Result<DecodedFrame, CodecError>;

    /// Applies the filter-graph description built by
    /// [`crate::image_decode::build_filter_graph`]; a no-op for decoders
    /// that only pass raw frames through to a separate filter step.
    fn set_filter_graph(&mut self, graph: &str) -> Result<(), CodecError>;
}

pub trait VideoDecoderFactory: Send + Sync {
    fn create(&self, codec_name: &str, extradata: &[u8]) -> Result<Box<dyn VideoDecoder>, CodecError>;
}

/// One packet produced by an encoder, paired with the pts it was
/// encoded at.
pub struct EncodedOutput {
    pub bytes: Bytes,
    pub pts: f64,
    pub key_frame: bool,
}

pub trait VideoEncoder: Send {
    /// Pushes one raw frame (RGB0/BGR, per `pixel_format`) for encoding.
    fn push_frame(
        &mut self,
        planes: &[Bytes],
        strides: &[u32],
        width: u32,
        height: u32,
        pts: f64,
    ) -> Result<(), CodecError>;

    /// Pulls the next packet the encoder has ready, if any.
    fn pull_packet(&mut self) -> Option<EncodedOutput>;

    /// Codec extradata to publish in the one `encoded_metadata` frame
    /// emitted after the encoder initializes.
    fn extradata(&self) -> Bytes;
}

#[derive(Debug, Clone, Copy)]
pub struct Vp9EncoderConfig {
    pub threads: u32,
    pub frame_parallel: bool,
    pub tile_columns: u32,
    pub auto_alt_ref: u32,
    pub lag_in_frames: u32,
}

impl Vp9EncoderConfig {
    /// Encoder configuration is fixed (spec §4.4.3) except for the
    /// caller-supplied lag.
    pub fn with_lag(lag_in_frames: u32) -> Self {
        Self {
            threads: 4,
            frame_parallel: true,
            tile_columns: 6,
            auto_alt_ref: 1,
            lag_in_frames,
        }
    }
}

pub trait VideoEncoderFactory: Send + Sync {
    fn create(
        &self,
        config: Vp9EncoderConfig,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn VideoEncoder>, CodecError>;
}
