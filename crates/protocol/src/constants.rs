use serde::{Deserialize, Serialize};

/// Size of one data message in bytes.
///
/// Both peers must agree on this value: the receiver counts chunks to find
/// block boundaries and the end of the file.
pub const CHUNK_SIZE: usize = 16_000;

/// Number of chunks the sender answers with for a single block request.
pub const CHUNKS_PER_BLOCK: usize = 64;

/// Bytes covered by one block request.
pub const BLOCK_SIZE: usize = CHUNK_SIZE * CHUNKS_PER_BLOCK;

/// MIME type used when none is known.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Control message type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "file:start")]
    Start,
    #[serde(rename = "file:request")]
    Request,
    #[serde(rename = "file:cancel")]
    Cancel,
    #[serde(rename = "file:completed")]
    Completed,
}

impl MessageType {
    /// Wire tag as it appears in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "file:start",
            Self::Request => "file:request",
            Self::Cancel => "file:cancel",
            Self::Completed => "file:completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_matches_geometry() {
        assert_eq!(BLOCK_SIZE, 1_024_000);
    }

    #[test]
    fn message_type_serde_matches_as_str() {
        for t in [
            MessageType::Start,
            MessageType::Request,
            MessageType::Cancel,
            MessageType::Completed,
        ] {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }
}
