//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The server only ever talks JSON to browsers today, but the handler is
//! written against the [`Codec`] trait so the frame format stays a single
//! swap-out point.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to frame bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use typeduel_protocol::{ClientMessage, Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ServerMessage::Countdown { seconds: 2 }).unwrap();
/// assert_eq!(bytes, br#"{"type":"countdown","seconds":2}"#);
///
/// let msg: ClientMessage = codec.decode(br#"{"type":"pong"}"#).unwrap();
/// assert_eq!(msg, ClientMessage::Pong);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientMessage, PlayerId, ServerMessage};

    #[test]
    fn test_json_codec_encodes_outbound_as_tagged_object() {
        let bytes = JsonCodec
            .encode(&ServerMessage::PlayerLeft { user_id: PlayerId(4) })
            .unwrap();
        assert_eq!(bytes, br#"{"type":"player_left","user_id":4}"#);
    }

    #[test]
    fn test_json_codec_decodes_inbound_progress() {
        let msg: ClientMessage = JsonCodec
            .decode(br#"{"type":"progress","chars":12,"wpm":48}"#)
            .unwrap();
        assert_eq!(msg, ClientMessage::Progress { chars: 12, wpm: 48 });
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let result: Result<ClientMessage, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
