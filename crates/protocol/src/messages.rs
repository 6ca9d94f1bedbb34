use serde::{Deserialize, Serialize};

use crate::constants::MessageType;
use crate::types::FileMeta;

/// Control vocabulary exchanged between sender and receiver.
///
/// Serialized as a JSON object whose `type` field is the discriminant:
///
/// ```text
/// {"type":"file:start","meta":{"name":"a.txt","size":12,"type":"text/plain"}}
/// {"type":"file:request","index":0}
/// {"type":"file:cancel"}
/// {"type":"file:completed"}
/// ```
///
/// `Request::index` counts blocks, not chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "file:start")]
    Start { meta: FileMeta },
    #[serde(rename = "file:request")]
    Request { index: u64 },
    #[serde(rename = "file:cancel")]
    Cancel,
    #[serde(rename = "file:completed")]
    Completed,
}

impl ControlMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Start { .. } => MessageType::Start,
            Self::Request { .. } => MessageType::Request,
            Self::Cancel => MessageType::Cancel,
            Self::Completed => MessageType::Completed,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
