use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MIME_TYPE;

/// Metadata describing the file being transferred.
///
/// Sent once by the sender in `file:start` and stored by the receiver before
/// any data arrives. The MIME type travels under the `type` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default = "default_mime_type")]
    pub mime_type: String,
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.to_string()
}

impl FileMeta {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

/// Lifecycle state of a sender or receiver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Created, transport not open yet.
    Idle,
    /// Sender: transport open and `file:start` sent.
    Connected,
    /// Receiver: transport open, waiting for `file:start`.
    AwaitingMeta,
    /// Blocks are being requested and delivered.
    Transferring,
    Completed,
    Cancelled,
    Failed,
}

impl TransferState {
    /// Returns `true` for the sticky end states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}
