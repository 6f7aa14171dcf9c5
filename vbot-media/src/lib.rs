pub mod codec;
pub mod encode;
pub mod image_decode;
pub mod metrics;
pub mod network_decode;
pub mod packet;

pub use codec::{
    CodecError, DecodedFrame, EncodedOutput, VideoDecoder, VideoDecoderFactory, VideoEncoder,
    VideoEncoderFactory, Vp9EncoderConfig,
};
pub use encode::{encode_vp9, EncodeVp9};
pub use image_decode::{build_filter_graph, decode_image_frames, BoundingSize, DecodeImageFrames};
pub use network_decode::{decode_network_stream, DecodeNetworkStream};
pub use packet::{
    BotInput, BotMessage, BotMessageKind, BotOutput, EncodedFrame, EncodedMetadata, EncodedPacket,
    NetworkFrame, NetworkMetadata, NetworkPacket, OwnedImageFrame, OwnedImageMetadata,
    OwnedImagePacket,
};
