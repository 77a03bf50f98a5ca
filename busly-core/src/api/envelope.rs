//! Response wrappers used by the backend.

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// `{ success, data, message }` wrapper most endpoints return.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
}

/// Either an [`Envelope`] or the bare payload.
///
/// Some endpoints wrap their payload in `data` and some don't; which one has
/// changed between backend releases.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaybeEnveloped<T> {
    Wrapped(Envelope<T>),
    Bare(T),
}

impl<T> MaybeEnveloped<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped(envelope) => envelope.data,
            Self::Bare(value) => value,
        }
    }
}

/// Decode `bytes` as `T`, unwrapping a `data` envelope if present.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice::<MaybeEnveloped<T>>(bytes).map(MaybeEnveloped::into_inner)
}

/// Plain `{ message }` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn test_decode_wrapped_and_bare() {
        let wrapped: Item = decode_payload(br#"{"success":true,"data":{"id":7}}"#).unwrap();
        assert_eq!(wrapped, Item { id: 7 });

        let bare: Item = decode_payload(br#"{"id":8}"#).unwrap();
        assert_eq!(bare, Item { id: 8 });
    }

    #[test]
    fn test_decode_wrapped_list() {
        let items: Vec<Item> = decode_payload(br#"{"data":[{"id":1},{"id":2}]}"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_decode_mismatch_is_error() {
        assert!(decode_payload::<Item>(br#"{"data":{"nope":1}}"#).is_err());
    }
}
