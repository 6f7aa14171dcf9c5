//! Thin wrapper around the `base64` crate (standard alphabet, `=` padding),
//! grounded in the `moreWax-cap` capture pipeline's use of the same crate for
//! framing image bytes over JSON.

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid base64 input: {0}")]
pub struct Base64DecodeError(#[from] base64::DecodeError);

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode(data: &str) -> Result<Vec<u8>, Base64DecodeError> {
    Ok(STANDARD.decode(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        for sample in [
            &b""[..],
            b"hello world",
            &[0u8, 1, 2, 255, 254, 10, 13][..],
        ] {
            assert_eq!(sample, decode(&encode(sample)).unwrap().as_slice());
        }
    }

    #[test]
    fn chunk_reassembly_sample_from_spec() {
        // S1: "hel" + "lo " + "world" base64-encoded and concatenated.
        assert_eq!(b"hel".to_vec(), decode("aGVs").unwrap());
        assert_eq!(b"lo ".to_vec(), decode("bG8g").unwrap());
        assert_eq!(b"world".to_vec(), decode("d29ybGQ=").unwrap());
    }

    #[test]
    fn invalid_input_is_an_error() {
        assert!(decode("not valid base64!!").is_err());
    }
}
