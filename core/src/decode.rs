//! Response body decoding.

use serde::de::DeserializeOwned;

/// JSON decoder owned by a [`Client`](crate::client::Client) and lent to
/// decisions for the duration of an attempt.
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    empty_body_as_null: bool,
}

impl JsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an empty body as JSON `null`, so `()` and `Option<_>` responses
    /// accept `204 No Content`.
    pub fn empty_body_as_null(mut self, enabled: bool) -> Self {
        self.empty_body_as_null = enabled;
        self
    }

    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, serde_json::Error> {
        if self.empty_body_as_null && data.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_slice(b"null");
        }
        serde_json::from_slice(data)
    }
}
