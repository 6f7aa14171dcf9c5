//! `encode_vp9(lag_in_frames)` (spec §4.4.3): initializes the encoder on
//! the first raw frame, emits one `encoded_metadata`, then one
//! `encoded_frame` per packet the encoder produces.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use vbot_streams::FrameId;

use crate::codec::{Vp9EncoderConfig, VideoEncoder, VideoEncoderFactory};
use crate::packet::{EncodedFrame, EncodedMetadata, EncodedPacket, OwnedImageFrame, OwnedImagePacket};

pub struct EncodeVp9<S> {
    upstream: S,
    factory: Box<dyn VideoEncoderFactory>,
    config: Vp9EncoderConfig,
    encoder: Option<Box<dyn VideoEncoder>>,
    image_size: Option<(u32, u32)>,
    metadata_emitted: bool,
    last_frame_id: FrameId,
}

pub fn encode_vp9<S>(
    upstream: S,
    lag_in_frames: u32,
    factory: Box<dyn VideoEncoderFactory>,
) -> EncodeVp9<S>
where
    S: Stream<Item = OwnedImagePacket> + Unpin,
{
    EncodeVp9 {
        upstream,
        factory,
        config: Vp9EncoderConfig::with_lag(lag_in_frames),
        encoder: None,
        image_size: None,
        metadata_emitted: false,
        last_frame_id: FrameId::CURRENT,
    }
}

impl<S> EncodeVp9<S> {
    fn ensure_encoder(&mut self, frame: &OwnedImageFrame) {
        if self.encoder.is_some() {
            return;
        }
        if let Ok(encoder) = self
            .factory
            .create(self.config, frame.width, frame.height)
        {
            self.encoder = Some(encoder);
            self.image_size = Some((frame.width, frame.height));
        }
    }
}

impl<S> Stream for EncodeVp9<S>
where
    S: Stream<Item = OwnedImagePacket> + Unpin,
{
    type Item = EncodedPacket;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(encoder) = this.encoder.as_mut() {
                if !this.metadata_emitted {
                    this.metadata_emitted = true;
                    return Poll::Ready(Some(EncodedPacket::Metadata(EncodedMetadata {
                        codec_name: "vp9".to_string(),
                        codec_bytes: encoder.extradata(),
                        image_size: this.image_size,
                        extra: Default::default(),
                    })));
                }
                if let Some(packet) = encoder.pull_packet() {
                    return Poll::Ready(Some(EncodedPacket::Frame(EncodedFrame {
                        bytes: packet.bytes,
                        id: this.last_frame_id,
                        pts: packet.pts,
                        key_frame: packet.key_frame,
                        arrival_ts: packet.pts,
                    })));
                }
            }

            match Pin::new(&mut this.upstream).poll_next(cx) {
                Poll::Ready(Some(OwnedImagePacket::Frame(frame))) => {
                    this.ensure_encoder(&frame);
                    this.last_frame_id = frame.id;
                    if let Some(encoder) = this.encoder.as_mut() {
                        let _ = encoder.push_frame(
                            &frame.planes,
                            &frame.strides,
                            frame.width,
                            frame.height,
                            frame.pts,
                        );
                    }
                }
                Poll::Ready(Some(OwnedImagePacket::Metadata(_))) => {}
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
