//! Wire format of a sync round trip
//!
//! The request body is JSON with fixed field names: `jute` carries the
//! definition buffer and `source` the document buffer. The response body is
//! opaque text written verbatim into the result buffer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Definition buffer contents
    #[serde(rename = "jute")]
    pub definition: String,

    /// Document buffer contents
    #[serde(rename = "source")]
    pub document: String,
}

impl SyncRequest {
    pub fn new(definition: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            document: document.into(),
        }
    }
}

/// Raw response text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub body: String,
}

impl SyncResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let req = SyncRequest::new("x: $ a", "a: 1");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json, serde_json::json!({ "jute": "x: $ a", "source": "a: 1" }));
    }
}
