//! Codec contract and the built-in wire codecs.
//!
//! A codec binds domain values to their remote-tier wire form and owns the
//! reserved tombstone sentinel used for negative caching. The sentinel is a
//! fixed token that no legal encoding can produce: both built-in codecs wrap
//! or length-prefix string payloads, so the raw bytes `@@NULL@@` never appear
//! as a complete encoded value.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CacheError, Result};

/// The reserved wire form for "known absent" entries.
pub const TOMBSTONE_SENTINEL: &[u8] = b"@@NULL@@";

/// Encodes and decodes domain values to and from the remote-tier wire form.
///
/// Implementations must be pure: encoding the same value twice yields the
/// same bytes, and `decode(encode(v)) == v` for every encodable `v`. Failures
/// surface as [`CacheError::Serialization`].
pub trait Codec: Send + Sync + 'static {
    /// Encodes a value into its wire form.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decodes a wire value.
    fn decode<T: DeserializeOwned>(&self, wire: &[u8]) -> Result<T>;

    /// The reserved tombstone wire form.
    fn tombstone(&self) -> &[u8] {
        TOMBSTONE_SENTINEL
    }

    /// Returns `true` if the wire value is the tombstone sentinel.
    fn is_tombstone(&self, wire: &[u8]) -> bool {
        wire == self.tombstone()
    }
}

/// JSON wire codec backed by `serde_json`. The default.
///
/// Human-readable on the wire, which makes remote-tier entries inspectable
/// with standard tooling at the cost of payload size.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, wire: &[u8]) -> Result<T> {
        serde_json::from_slice(wire).map_err(|e| CacheError::serialization(e.to_string()))
    }
}

/// MessagePack wire codec backed by `rmp-serde`.
///
/// Compact binary form for deployments where remote-tier payload size
/// dominates.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl Codec for MessagePackCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        rmp_serde::to_vec(value).map_err(|e| CacheError::serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, wire: &[u8]) -> Result<T> {
        rmp_serde::from_slice(wire).map_err(|e| CacheError::serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: u64,
        name: String,
    }

    #[test]
    fn test_json_round_trip() {
        let codec = JsonCodec;
        let product = Product {
            id: 42,
            name: "X".to_string(),
        };
        let wire = codec.encode(&product).unwrap();
        let decoded: Product = codec.decode(&wire).unwrap();
        assert_eq!(decoded, product);
    }

    #[test]
    fn test_messagepack_round_trip() {
        let codec = MessagePackCodec;
        let product = Product {
            id: 42,
            name: "X".to_string(),
        };
        let wire = codec.encode(&product).unwrap();
        let decoded: Product = codec.decode(&wire).unwrap();
        assert_eq!(decoded, product);
    }

    #[test]
    fn test_json_decode_failure() {
        let codec = JsonCodec;
        let err = codec.decode::<Product>(b"{ not json }").unwrap_err();
        assert!(err.is_serialization());
    }

    #[test]
    fn test_sentinel_never_collides_with_legal_encoding() {
        // The sentinel text itself, encoded as a value, must not produce the
        // raw sentinel bytes.
        let json = JsonCodec;
        let wire = json.encode(&"@@NULL@@").unwrap();
        assert!(!json.is_tombstone(&wire));
        assert_eq!(wire, b"\"@@NULL@@\"");

        let msgpack = MessagePackCodec;
        let wire = msgpack.encode(&"@@NULL@@").unwrap();
        assert!(!msgpack.is_tombstone(&wire));
    }

    #[test]
    fn test_sentinel_recognized() {
        let codec = JsonCodec;
        assert!(codec.is_tombstone(TOMBSTONE_SENTINEL));
        assert!(codec.is_tombstone(b"@@NULL@@"));
        assert!(!codec.is_tombstone(b"@@null@@"));
    }
}
