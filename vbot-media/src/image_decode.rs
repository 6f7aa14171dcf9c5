//! `decode_image_frames` (spec §4.4.2): drives a [`VideoDecoder`], builds
//! the filter-graph string once per run, and resynchronizes output ids
//! against a FIFO of pending source ids.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use serde_json::Value;
use tracing::warn;
use vbot_streams::{FrameId, PixelFormat, MAX_IMAGE_PLANES};

use crate::codec::{CodecError, DecodedFrame, VideoDecoder};
use crate::metrics::ImageDecodeMetrics;
use crate::packet::{EncodedFrame, EncodedMetadata, EncodedPacket, OwnedImageFrame, OwnedImagePacket};

/// Bounding box for the decoded output; `(-1, -1)` means "use the
/// original decoded size".
#[derive(Debug, Clone, Copy)]
pub struct BoundingSize {
    pub width: i32,
    pub height: i32,
}

impl BoundingSize {
    pub const ORIGINAL: BoundingSize = BoundingSize {
        width: -1,
        height: -1,
    };

    fn is_original(&self) -> bool {
        self.width == -1 && self.height == -1
    }
}

/// Builds the filter-graph string (spec §4.4.2): an optional rotation
/// filter, a scale filter, and the output pixel format, comma-joined.
pub fn build_filter_graph(
    display_rotation: Option<i64>,
    bounding: BoundingSize,
    keep_aspect_ratio: bool,
    format: PixelFormat,
) -> String {
    let mut parts = Vec::new();

    if let Some(rotation) = display_rotation {
        let rotate_filter = match rotation {
            90 => "transpose=clock".to_string(),
            180 => "hflip,vflip".to_string(),
            270 => "transpose=cclock".to_string(),
            other => format!("rotate={other}*PI/180"),
        };
        parts.push(rotate_filter);
    }

    if !bounding.is_original() {
        let mut scale = format!("scale=w={}:h={}", bounding.width, bounding.height);
        if keep_aspect_ratio {
            scale.push_str(":force_original_aspect_ratio=decrease");
        }
        parts.push(scale);
    }

    parts.push(format.filter_name().to_string());

    parts.join(",")
}

pub struct DecodeImageFrames<S> {
    upstream: S,
    decoder_factory: Box<dyn FnMut(&str, &[u8]) -> Result<Box<dyn VideoDecoder>, CodecError> + Send>,
    decoder: Option<Box<dyn VideoDecoder>>,
    current_metadata: Option<(String, Bytes)>,
    display_rotation: Option<i64>,
    bounding: BoundingSize,
    keep_aspect_ratio: bool,
    format: PixelFormat,
    filter_graph_built: bool,
    pending_ids: VecDeque<FrameId>,
    metrics: ImageDecodeMetrics,
}

pub fn decode_image_frames<S>(
    upstream: S,
    bounding: BoundingSize,
    keep_aspect_ratio: bool,
    format: PixelFormat,
    decoder_factory: impl FnMut(&str, &[u8]) -> Result<Box<dyn VideoDecoder>, CodecError>
        + Send
        + 'static,
) -> DecodeImageFrames<S>
where
    S: Stream<Item = EncodedPacket> + Unpin,
{
    DecodeImageFrames {
        upstream,
        decoder_factory: Box::new(decoder_factory),
        decoder: None,
        current_metadata: None,
        display_rotation: None,
        bounding,
        keep_aspect_ratio,
        format,
        filter_graph_built: false,
        pending_ids: VecDeque::new(),
        metrics: ImageDecodeMetrics::default(),
    }
}

impl<S> DecodeImageFrames<S> {
    pub fn metrics(&self) -> &ImageDecodeMetrics {
        &self.metrics
    }

    fn handle_metadata(&mut self, meta: EncodedMetadata) {
        let same = self
            .current_metadata
            .as_ref()
            .is_some_and(|(name, bytes)| *name == meta.codec_name && *bytes == meta.codec_bytes);
        if same {
            return;
        }

        self.display_rotation = meta
            .extra
            .get("display_rotation")
            .and_then(Value::as_i64);

        match (self.decoder_factory)(&meta.codec_name, &meta.codec_bytes) {
            Ok(decoder) => {
                self.decoder = Some(decoder);
                self.current_metadata = Some((meta.codec_name, meta.codec_bytes));
                self.filter_graph_built = false;
                self.pending_ids.clear();
            }
            Err(err) => {
                warn!(error = %err, "decode_image_frames: failed to initialize decoder");
                self.decoder = None;
                self.current_metadata = None;
            }
        }
    }

    fn handle_frame(&mut self, frame: EncodedFrame) -> Option<CodecError> {
        let Some(decoder) = self.decoder.as_mut() else {
            self.metrics.dropped_messages.increment();
            return None;
        };
        self.metrics.received_messages.increment();
        self.metrics.received_bytes.add(frame.bytes.len() as u64);
        self.pending_ids.push_back(frame.id);

        let pts_ms = (frame.pts * 1000.0).round() as i64;
        match decoder.push_packet(&frame.bytes, pts_ms, frame.key_frame) {
            Ok(()) => None,
            Err(err) => Some(err),
        }
    }

    fn maybe_build_filter_graph(&mut self) {
        if self.filter_graph_built {
            return;
        }
        let graph = build_filter_graph(
            self.display_rotation,
            self.bounding,
            self.keep_aspect_ratio,
            self.format,
        );
        if let Some(decoder) = self.decoder.as_mut() {
            let _ = decoder.set_filter_graph(&graph);
        }
        self.filter_graph_built = true;
    }

    fn resolve_id(&mut self, decoded: &DecodedFrame) -> FrameId {
        if decoded.is_key_frame {
            while let Some(front) = self.pending_ids.front() {
                if front.i1 == decoded.packet_pos {
                    break;
                }
                self.pending_ids.pop_front();
            }
        }
        self.pending_ids.pop_front().unwrap_or_else(|| {
            FrameId::new(decoded.packet_pos, decoded.packet_pos + decoded.packet_duration)
        })
    }

    fn to_owned_frame(&mut self, decoded: DecodedFrame) -> OwnedImageFrame {
        self.maybe_build_filter_graph();
        let id = self.resolve_id(&decoded);
        self.metrics.received_frames.increment();

        let mut planes: [Bytes; MAX_IMAGE_PLANES] = Default::default();
        let mut strides = [0u32; MAX_IMAGE_PLANES];
        for (i, plane) in decoded.planes.into_iter().take(MAX_IMAGE_PLANES).enumerate() {
            planes[i] = plane;
        }
        for (i, stride) in decoded.strides.into_iter().take(MAX_IMAGE_PLANES).enumerate() {
            strides[i] = stride;
        }

        OwnedImageFrame {
            id,
            pixel_format: self.format,
            width: decoded.width,
            height: decoded.height,
            pts: decoded.packet_pos as f64,
            planes,
            strides,
        }
    }
}

impl<S> Stream for DecodeImageFrames<S>
where
    S: Stream<Item = EncodedPacket> + Unpin,
{
    type Item = OwnedImagePacket;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(decoder) = this.decoder.as_mut() {
                match decoder.pull_frame() {
                    Ok(decoded) => {
                        let frame = this.to_owned_frame(decoded);
                        return Poll::Ready(Some(OwnedImagePacket::Frame(frame)));
                    }
                    Err(CodecError::NeedMoreInput) => {}
                    Err(err) => {
                        warn!(error = %err, "decode_image_frames: decode error");
                    }
                }
            }

            match Pin::new(&mut this.upstream).poll_next(cx) {
                Poll::Ready(Some(EncodedPacket::Metadata(meta))) => {
                    this.handle_metadata(meta);
                }
                Poll::Ready(Some(EncodedPacket::Frame(frame))) => {
                    if let Some(err) = this.handle_frame(frame) {
                        warn!(error = %err, "decode_image_frames: push_packet failed");
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_graph_joins_rotation_scale_and_format() {
        let graph = build_filter_graph(
            Some(90),
            BoundingSize { width: 640, height: 480 },
            true,
            PixelFormat::Rgb0,
        );
        assert_eq!(
            "transpose=clock,scale=w=640:h=480:force_original_aspect_ratio=decrease,rgb0",
            graph
        );
    }

    #[test]
    fn filter_graph_skips_scale_for_original_size() {
        let graph = build_filter_graph(None, BoundingSize::ORIGINAL, false, PixelFormat::Bgr);
        assert_eq!("bgr24", graph);
    }

    #[test]
    fn non_standard_rotation_uses_generic_rotate_filter() {
        let graph = build_filter_graph(Some(45), BoundingSize::ORIGINAL, false, PixelFormat::Bgr);
        assert_eq!("rotate=45*PI/180,bgr24", graph);
    }
}
