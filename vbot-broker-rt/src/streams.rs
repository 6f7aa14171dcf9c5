//! Streams adapters (spec §4.3): expose broker channels as
//! `Stream`/sink-shaped values so the rest of the pipeline never touches
//! `BrokerClient` directly. Grounded on `pilatus::subscribe`'s pattern of
//! wrapping a callback-based subscription in an async generator that
//! holds the subscription for its lifetime, using
//! `vbot_streams::stream_ops::do_finally` to guarantee the unsubscribe
//! happens exactly once when the stream is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use futures::channel::mpsc;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vbot_broker::{channel_suffix, BrokerClient, SubscribeOptions, SubscriptionCallbacks};
use vbot_media::{EncodedFrame, EncodedMetadata, EncodedPacket, NetworkFrame, NetworkMetadata, NetworkPacket};
use vbot_streams::{base64_encode, stream_ops::do_finally, FrameId};

/// Per-message size limit imposed by the broker (spec glossary: "Chunk").
const CHUNK_SIZE: usize = 65_000;

/// `channel(client, name, options)` → `publisher<Value>`: one item per
/// message delivered to the subscription, for the lifetime of the
/// returned stream.
pub fn channel(
    client: Arc<dyn BrokerClient>,
    name: impl Into<String>,
    options: SubscribeOptions,
) -> BoxStream<'static, Value> {
    let name = name.into();
    let (tx, rx) = mpsc::unbounded::<Value>();
    let handle = format!("{name}#{:x}", rand_u64());

    client.subscribe(
        &name,
        &handle,
        SubscriptionCallbacks {
            on_data: Box::new({
                let tx = tx.clone();
                move |messages| {
                    for m in messages {
                        let _ = tx.unbounded_send(m);
                    }
                }
            }),
            on_error: Box::new(|_err| {}),
        },
        options,
    );

    let unsub_client = client.clone();
    let unsub_handle = handle.clone();
    do_finally(rx, move || {
        unsub_client.unsubscribe(&unsub_handle);
    })
    .boxed()
}

#[derive(Debug, Deserialize)]
struct WireMetadata {
    #[serde(rename = "codecName")]
    codec_name: String,
    #[serde(rename = "codecData")]
    codec_data: String,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    d: String,
    i: [i64; 2],
    t: f64,
    dt: f64,
    c: u32,
    l: u32,
    k: bool,
}

#[derive(Debug, Serialize)]
struct WireMetadataOut<'a> {
    #[serde(rename = "codecName")]
    codec_name: &'a str,
    #[serde(rename = "codecData")]
    codec_data: String,
}

#[derive(Debug, Serialize)]
struct WireFrameOut {
    d: String,
    i: [i64; 2],
    t: f64,
    dt: f64,
    c: u32,
    l: u32,
    k: bool,
}

fn parse_value_as_network_packet(value: Value, is_metadata: bool) -> Option<NetworkPacket> {
    if is_metadata {
        let wire: WireMetadata = serde_json::from_value(value).ok()?;
        Some(NetworkPacket::Metadata(NetworkMetadata {
            codec_name: wire.codec_name,
            base64_codec_data: wire.codec_data,
            extra: wire.extra,
        }))
    } else {
        let wire: WireFrame = serde_json::from_value(value).ok()?;
        Some(NetworkPacket::Frame(NetworkFrame {
            base64_data: wire.d,
            id: FrameId::new(wire.i[0], wire.i[1]),
            pts: wire.t,
            departure_ts: wire.dt,
            chunk: wire.c,
            chunks: wire.l,
            key_frame: wire.k,
        }))
    }
}

/// `rtm_source(client, name)` → `publisher<network_packet>`: merges a
/// history-age-1 metadata sub-channel with the frames channel.
pub fn rtm_source(client: Arc<dyn BrokerClient>, name: impl Into<String>) -> BoxStream<'static, NetworkPacket> {
    let name = name.into();
    let metadata_channel = format!("{name}{}", channel_suffix::METADATA);

    let metadata = channel(
        client.clone(),
        metadata_channel,
        SubscribeOptions {
            history: Some(vbot_broker::protocol::History { age: 1, count: 0 }),
        },
    )
    .filter_map(|v| async move { parse_value_as_network_packet(v, true) });

    let frames = channel(client, name, SubscribeOptions::default())
        .filter_map(|v| async move { parse_value_as_network_packet(v, false) });

    futures::stream::select(metadata, frames).boxed()
}

/// `rtm_sink(client, name)`: publishes metadata to the metadata
/// sub-channel and each chunk of an `encoded_frame` to the frames
/// channel.
pub async fn rtm_sink<S>(client: Arc<dyn BrokerClient>, name: impl Into<String>, mut upstream: S)
where
    S: Stream<Item = EncodedPacket> + Unpin,
{
    let name = name.into();
    let metadata_channel = format!("{name}{}", channel_suffix::METADATA);

    while let Some(packet) = upstream.next().await {
        match packet {
            EncodedPacket::Metadata(meta) => publish_metadata(&client, &metadata_channel, &meta),
            EncodedPacket::Frame(frame) => publish_frame_chunks(&client, &name, &frame),
        }
    }
}

fn publish_metadata(client: &Arc<dyn BrokerClient>, channel: &str, meta: &EncodedMetadata) {
    let message = serde_json::to_value(WireMetadataOut {
        codec_name: &meta.codec_name,
        codec_data: base64_encode(&meta.codec_bytes),
    })
    .expect("WireMetadataOut always serializes");
    client.publish(channel, message, None);
}

fn publish_frame_chunks(client: &Arc<dyn BrokerClient>, channel: &str, frame: &EncodedFrame) {
    let chunks: Vec<&[u8]> = if frame.bytes.is_empty() {
        vec![&[]]
    } else {
        frame.bytes.chunks(CHUNK_SIZE).collect()
    };
    let total = chunks.len() as u32;
    for (idx, chunk) in chunks.into_iter().enumerate() {
        let wire = WireFrameOut {
            d: base64_encode(chunk),
            i: [frame.id.i1, frame.id.i2],
            t: frame.pts,
            dt: frame.arrival_ts,
            c: idx as u32 + 1,
            l: total,
            k: frame.key_frame,
        };
        let message = serde_json::to_value(wire).expect("WireFrameOut always serializes");
        client.publish(channel, message, None);
    }
}

fn rand_u64() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
