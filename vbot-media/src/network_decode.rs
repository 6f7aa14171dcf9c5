//! `decode_network_stream` (spec §4.4.1): reassembles base64-chunked
//! `network_frame`s into `encoded_frame`s. A manual `Stream` impl rather
//! than a combinator chain, since the operator needs to drop items
//! (mismatched chunks) without producing downstream output - the same
//! shape as `vbot_streams::stream_ops::DoFinally`.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use vbot_streams::base64_decode;

use crate::metrics::NetworkDecodeMetrics;
use crate::packet::{EncodedFrame, EncodedMetadata, EncodedPacket, NetworkFrame, NetworkPacket};

struct ReassemblyState {
    expected_chunk: u32,
    chunks: u32,
    id: vbot_streams::FrameId,
    accum: String,
}

impl Default for ReassemblyState {
    fn default() -> Self {
        Self {
            expected_chunk: 1,
            chunks: 1,
            id: vbot_streams::FrameId::new(0, 0),
            accum: String::new(),
        }
    }
}

pub struct DecodeNetworkStream<S> {
    upstream: S,
    state: ReassemblyState,
    metrics: NetworkDecodeMetrics,
}

pub fn decode_network_stream<S>(upstream: S) -> DecodeNetworkStream<S>
where
    S: Stream<Item = NetworkPacket> + Unpin,
{
    DecodeNetworkStream {
        upstream,
        state: ReassemblyState::default(),
        metrics: NetworkDecodeMetrics::default(),
    }
}

impl<S> DecodeNetworkStream<S> {
    pub fn metrics(&self) -> &NetworkDecodeMetrics {
        &self.metrics
    }

    fn handle_frame(&mut self, frame: NetworkFrame) -> Option<EncodedFrame> {
        if frame.chunk != self.state.expected_chunk {
            self.metrics.chunks_mismatch.increment();
            self.state = ReassemblyState::default();
            return None;
        }

        if frame.chunk == 1 {
            self.state.id = frame.id;
        }
        self.state.chunks = frame.chunks;
        self.state.accum.push_str(&frame.base64_data);

        if frame.chunk == frame.chunks {
            let decoded = base64_decode(&self.state.accum).ok();
            let id = self.state.id;
            self.state = ReassemblyState::default();
            let bytes = decoded?;
            self.metrics.frames_emitted.increment();
            Some(EncodedFrame {
                bytes: Bytes::from(bytes),
                id,
                pts: frame.pts,
                key_frame: frame.key_frame,
                arrival_ts: frame.departure_ts,
            })
        } else {
            self.state.expected_chunk += 1;
            None
        }
    }
}

impl<S> Stream for DecodeNetworkStream<S>
where
    S: Stream<Item = NetworkPacket> + Unpin,
{
    type Item = EncodedPacket;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.upstream).poll_next(cx) {
                Poll::Ready(Some(NetworkPacket::Metadata(meta))) => {
                    let decoded = base64_decode(&meta.base64_codec_data).unwrap_or_default();
                    return Poll::Ready(Some(EncodedPacket::Metadata(EncodedMetadata {
                        codec_name: meta.codec_name,
                        codec_bytes: Bytes::from(decoded),
                        image_size: None,
                        extra: meta.extra,
                    })));
                }
                Poll::Ready(Some(NetworkPacket::Frame(frame))) => {
                    if let Some(encoded) = this.handle_frame(frame) {
                        return Poll::Ready(Some(EncodedPacket::Frame(encoded)));
                    }
                    // dropped or mid-reassembly: loop and poll again
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
    use futures::stream::{self, StreamExt};
    use std::collections::HashMap;

    fn frame(chunk: u32, chunks: u32, data: &str) -> NetworkPacket {
        NetworkPacket::Frame(NetworkFrame {
            base64_data: data.to_string(),
            id: vbot_streams::FrameId::new(5, 5),
            pts: 1.0,
            departure_ts: 0.5,
            chunk,
            chunks,
            key_frame: true,
        })
    }

    #[tokio::test]
    async fn reassembles_chunks_in_order() {
        let upstream = stream::iter(vec![
            frame(1, 2, "aGVs"),
            frame(2, 2, "bG8="),
        ]);
        let mut decoder = decode_network_stream(upstream);
        let out = decoder.next().await.unwrap();
        match out {
            EncodedPacket::Frame(f) => {
                assert_eq!(b"hello".as_slice(), f.bytes.as_ref());
                assert_eq!(vbot_streams::FrameId::new(5, 5), f.id);
            }
            _ => panic!("expected frame"),
        }
        assert_eq!(0, decoder.metrics().chunks_mismatch.get());
    }

    #[tokio::test]
    async fn out_of_order_chunk_is_dropped_and_counted() {
        let upstream = stream::iter(vec![frame(2, 2, "aGVs")]);
        let mut decoder = decode_network_stream(upstream);
        assert!(decoder.next().await.is_none());
        assert_eq!(1, decoder.metrics().chunks_mismatch.get());
    }

    #[tokio::test]
    async fn metadata_is_decoded_and_passed_through() {
        let upstream = stream::iter(vec![NetworkPacket::Metadata(
            crate::packet::NetworkMetadata {
                codec_name: "vp9".into(),
                base64_codec_data: "d29ybGQ=".into(),
                extra: HashMap::new(),
            },
        )]);
        let mut decoder = decode_network_stream(upstream);
        match decoder.next().await.unwrap() {
            EncodedPacket::Metadata(m) => {
                assert_eq!("vp9", m.codec_name);
                assert_eq!(b"world".as_slice(), m.codec_bytes.as_ref());
            }
            _ => panic!("expected metadata"),
        }
    }
}
