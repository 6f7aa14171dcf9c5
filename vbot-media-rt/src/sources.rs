//! File/URL/camera sources (spec §4.4.4). Each is a stateful async
//! generator over a [`RawPacketSource`] - the external demuxer this
//! core only specifies the interface for (spec §1 Out-of-scope names
//! "the specific codec/filter library"; demuxing is the same kind of
//! external collaborator). The generator owns id bookkeeping, wall-time
//! pts conversion and, for files, fps pacing via
//! [`vbot_streams_rt::interval`].

use std::time::Duration;

use async_stream::stream;
use futures::stream::{BoxStream, StreamExt};
use vbot_media::{EncodedMetadata, EncodedPacket, EncodedFrame};
use vbot_streams::FrameId;

/// What `decode_network_stream`'s counterpart on the source side needs
/// from a demuxer: enough to build `encoded_packet`s without the core
/// knowing which container/codec library is behind it.
pub trait RawPacketSource: Send {
    fn codec_name(&self) -> String;
    fn extradata(&self) -> Vec<u8>;
    fn stream_time_base(&self) -> f64;

    /// Reads the next packet, or `None` on end of stream.
    fn next_packet(&mut self) -> Option<RawPacket>;
    /// Seeks back to the start, used for `loop = true`.
    fn seek_start(&mut self);
}

pub struct RawPacket {
    pub bytes: Vec<u8>,
    /// Byte position of this packet's end, per the demuxer.
    pub pos: i64,
    pub pts: i64,
    pub key_frame: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceConfig {
    pub looping: bool,
    pub batch: bool,
    pub fps: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            looping: false,
            batch: false,
            fps: 30.0,
        }
    }
}

fn generator(
    mut source: Box<dyn RawPacketSource>,
    config: SourceConfig,
) -> BoxStream<'static, EncodedPacket> {
    let raw = stream! {
        yield EncodedPacket::Metadata(EncodedMetadata {
            codec_name: source.codec_name(),
            codec_bytes: source.extradata().into(),
            image_size: None,
            extra: Default::default(),
        });

        let time_base = source.stream_time_base();
        let start = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let mut last_pos: i64 = 0;

        loop {
            match source.next_packet() {
                Some(packet) => {
                    let id = FrameId::new(last_pos, packet.pos);
                    last_pos = packet.pos + 1;
                    let wall_pts = start + packet.pts as f64 * time_base;
                    yield EncodedPacket::Frame(EncodedFrame {
                        bytes: packet.bytes.into(),
                        id,
                        pts: wall_pts,
                        key_frame: packet.key_frame,
                        arrival_ts: wall_pts,
                    });
                }
                None if config.looping => {
                    source.seek_start();
                    last_pos = 0;
                }
                None => break,
            }
        }
    };

    if config.batch {
        raw.boxed()
    } else {
        let period = Duration::from_secs_f64(1.0 / config.fps.max(f64::MIN_POSITIVE));
        vbot_streams_rt::interval(raw, period)
    }
}

pub fn file_source(
    source: Box<dyn RawPacketSource>,
    config: SourceConfig,
) -> BoxStream<'static, EncodedPacket> {
    generator(source, config)
}

pub fn url_source(
    source: Box<dyn RawPacketSource>,
    config: SourceConfig,
) -> BoxStream<'static, EncodedPacket> {
    generator(source, SourceConfig { batch: true, ..config })
}

pub fn camera_source(source: Box<dyn RawPacketSource>) -> BoxStream<'static, EncodedPacket> {
    generator(
        source,
        SourceConfig {
            looping: false,
            batch: true,
            fps: 30.0,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        packets: Vec<(Vec<u8>, i64)>,
        idx: usize,
    }

    impl RawPacketSource for FakeSource {
        fn codec_name(&self) -> String {
            "h264".to_string()
        }
        fn extradata(&self) -> Vec<u8> {
            vec![1, 2, 3]
        }
        fn stream_time_base(&self) -> f64 {
            1.0
        }
        fn next_packet(&mut self) -> Option<RawPacket> {
            let (bytes, pos) = self.packets.get(self.idx)?.clone();
            self.idx += 1;
            Some(RawPacket {
                bytes,
                pos,
                pts: pos,
                key_frame: self.idx == 1,
            })
        }
        fn seek_start(&mut self) {
            self.idx = 0;
        }
    }

    #[tokio::test]
    async fn emits_metadata_then_frames_with_advancing_ids() {
        let source = FakeSource {
            packets: vec![(vec![1], 10), (vec![2], 20)],
            idx: 0,
        };
        let mut out = generator(
            Box::new(source),
            SourceConfig {
                batch: true,
                ..Default::default()
            },
        );
        match out.next().await.unwrap() {
            EncodedPacket::Metadata(m) => assert_eq!("h264", m.codec_name),
            _ => panic!("expected metadata first"),
        }
        match out.next().await.unwrap() {
            EncodedPacket::Frame(f) => assert_eq!(FrameId::new(0, 10), f.id),
            _ => panic!("expected frame"),
        }
        match out.next().await.unwrap() {
            EncodedPacket::Frame(f) => assert_eq!(FrameId::new(11, 20), f.id),
            _ => panic!("expected frame"),
        }
        assert!(out.next().await.is_none());
    }

    #[tokio::test]
    async fn loop_restarts_from_the_beginning() {
        let source = FakeSource {
            packets: vec![(vec![1], 10)],
            idx: 0,
        };
        let mut out = generator(
            Box::new(source),
            SourceConfig {
                batch: true,
                looping: true,
                ..Default::default()
            },
        );
        let _meta = out.next().await.unwrap();
        let _first = out.next().await.unwrap();
        let second = out.next().await.unwrap();
        match second {
            EncodedPacket::Frame(f) => assert_eq!(FrameId::new(0, 10), f.id),
            _ => panic!("expected looped frame"),
        }
    }
}
