//! Payload serializers.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The on-disk payload format of a store.
///
/// The format is chosen when a store is created and recorded with it;
/// every record in one store uses the same serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Serializer {
    /// Binary CBOR payloads.
    #[default]
    Blob,
    /// UTF-8 JSON payloads.
    Json,
}

impl Serializer {
    /// Serializes a value into payload bytes.
    ///
    /// # Errors
    ///
    /// Returns `EncodingFailed` if the value cannot be represented.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        match self {
            Self::Blob => {
                let mut out = Vec::new();
                ciborium::into_writer(value, &mut out)
                    .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
                Ok(out)
            }
            Self::Json => {
                serde_json::to_vec(value).map_err(|e| CodecError::encoding_failed(e.to_string()))
            }
        }
    }

    /// Deserializes payload bytes.
    ///
    /// # Errors
    ///
    /// Returns `DecodingFailed` if the bytes are not a valid payload for `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        match self {
            Self::Blob => ciborium::from_reader(bytes)
                .map_err(|e| CodecError::decoding_failed(e.to_string())),
            Self::Json => serde_json::from_slice(bytes)
                .map_err(|e| CodecError::decoding_failed(e.to_string())),
        }
    }

    /// Returns true if payloads are valid UTF-8 text.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Json)
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Serializer {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blob" | "cbor" => Ok(Self::Blob),
            "json" => Ok(Self::Json),
            other => Err(CodecError::UnknownSerializer {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: i64,
        tags: Vec<String>,
        parent: Option<String>,
    }

    fn sample() -> Sample {
        Sample {
            name: "Garner".into(),
            count: 3,
            tags: vec!["ToDo".into()],
            parent: None,
        }
    }

    #[test]
    fn blob_and_json_decode_what_they_encode() {
        for serializer in [Serializer::Blob, Serializer::Json] {
            let bytes = serializer.encode(&sample()).unwrap();
            let back: Sample = serializer.decode(&bytes).unwrap();
            assert_eq!(back, sample());
        }
    }

    #[test]
    fn json_payload_is_text() {
        let bytes = Serializer::Json.encode(&sample()).unwrap();
        assert!(std::str::from_utf8(&bytes).is_ok());
        assert!(Serializer::Json.is_text());
        assert!(!Serializer::Blob.is_text());
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = Serializer::Blob.encode(&sample()).unwrap();
        let b = Serializer::Blob.encode(&sample()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = Serializer::Json.decode::<Sample>(b"{not json").unwrap_err();
        assert!(matches!(err, CodecError::DecodingFailed { .. }));
        let err = Serializer::Blob.decode::<Sample>(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::DecodingFailed { .. }));
    }

    #[test]
    fn parse_names() {
        assert_eq!("blob".parse::<Serializer>().unwrap(), Serializer::Blob);
        assert_eq!("CBOR".parse::<Serializer>().unwrap(), Serializer::Blob);
        assert_eq!(" json ".parse::<Serializer>().unwrap(), Serializer::Json);
        assert!("xml".parse::<Serializer>().is_err());
        assert_eq!(Serializer::Json.to_string(), "json");
    }

    proptest! {
        #[test]
        fn string_maps_survive_both_formats(map in proptest::collection::btree_map("[a-z]{1,8}", ".{0,16}", 0..8)) {
            for serializer in [Serializer::Blob, Serializer::Json] {
                let bytes = serializer.encode(&map).unwrap();
                let back: BTreeMap<String, String> = serializer.decode(&bytes).unwrap();
                prop_assert_eq!(&back, &map);
            }
        }
    }
}
