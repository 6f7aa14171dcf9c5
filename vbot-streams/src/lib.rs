mod base64_codec;
mod cbor_json;
mod deferred;
mod error;
mod frame_id;
mod pixel_format;
pub mod stream_ops;

pub use base64_codec::{decode as base64_decode, encode as base64_encode, Base64DecodeError};
pub use cbor_json::{cbor_to_json, json_to_cbor, CborError};
pub use deferred::{deferred, Deferred, DeferredResolver};
pub use error::{ErrorKind, StreamError};
pub use frame_id::FrameId;
pub use pixel_format::{PixelFormat, MAX_IMAGE_PLANES};

/// Re-exported so downstream crates don't need to depend on `serde_json`
/// just to name the type used for `extra`/`additional data` maps.
///
/// Per Open Question (iii) in the spec, JSON is the one canonical
/// in-memory representation; CBOR is only ever produced/consumed at the
/// broker wire edge (see [`cbor_to_json`]/[`json_to_cbor`]).
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
