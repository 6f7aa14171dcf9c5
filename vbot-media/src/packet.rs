//! Packet variants flowing through the media pipeline (spec §3). Each
//! `*_packet` is a sum type; we model the sum as an enum rather than a
//! trait object, matching how `pilatus-engineering::image` represents
//! its frame/metadata union.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;
use vbot_streams::{FrameId, PixelFormat, MAX_IMAGE_PLANES};

#[derive(Debug, Clone)]
pub struct NetworkMetadata {
    pub codec_name: String,
    pub base64_codec_data: String,
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct NetworkFrame {
    pub base64_data: String,
    pub id: FrameId,
    pub pts: f64,
    pub departure_ts: f64,
    pub chunk: u32,
    pub chunks: u32,
    pub key_frame: bool,
}

#[derive(Debug, Clone)]
pub enum NetworkPacket {
    Metadata(NetworkMetadata),
    Frame(NetworkFrame),
}

#[derive(Debug, Clone)]
pub struct EncodedMetadata {
    pub codec_name: String,
    pub codec_bytes: Bytes,
    pub image_size: Option<(u32, u32)>,
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub bytes: Bytes,
    pub id: FrameId,
    pub pts: f64,
    pub key_frame: bool,
    pub arrival_ts: f64,
}

#[derive(Debug, Clone)]
pub enum EncodedPacket {
    Metadata(EncodedMetadata),
    Frame(EncodedFrame),
}

#[derive(Debug, Clone)]
pub struct OwnedImageMetadata {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct OwnedImageFrame {
    pub id: FrameId,
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub pts: f64,
    pub planes: [Bytes; MAX_IMAGE_PLANES],
    pub strides: [u32; MAX_IMAGE_PLANES],
}

#[derive(Debug, Clone)]
pub enum OwnedImagePacket {
    Metadata(OwnedImageMetadata),
    Frame(OwnedImageFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMessageKind {
    Analysis,
    Debug,
    Control,
}

#[derive(Debug, Clone)]
pub struct BotMessage {
    pub kind: BotMessageKind,
    pub payload: Value,
    pub id: FrameId,
}

#[derive(Debug, Clone)]
pub enum BotOutput {
    Image(OwnedImagePacket),
    Message(BotMessage),
}

#[derive(Debug, Clone)]
pub enum BotInput {
    Image(OwnedImagePacket),
    Control(Value),
}
