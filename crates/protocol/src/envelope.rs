//! Framing rule separating raw file data from control messages.
//!
//! A message-oriented transport carries [`Frame`]s: data always travels as a
//! binary frame, control always as a text frame holding JSON. Transports that
//! only move byte buffers use the tagged form from [`WireMessage::encode_tagged`]:
//!
//! ```text
//! [0x00][raw chunk bytes]        data
//! [0x01][UTF-8 JSON control]     control
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::messages::ControlMessage;

/// Leading byte of a tagged data buffer.
pub const TAG_DATA: u8 = 0x00;

/// Leading byte of a tagged control buffer.
pub const TAG_CONTROL: u8 = 0x01;

/// Errors produced while decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid control message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 in control frame: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("empty frame")]
    Empty,

    #[error("unknown frame tag: {0:#04x}")]
    UnknownTag(u8),
}

/// One message as carried by a message-oriented transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Binary(Bytes),
    Text(String),
}

impl Frame {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(b) => b.len(),
            Self::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded protocol message: either a slice of file data or a control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Data(Bytes),
    Control(ControlMessage),
}

impl WireMessage {
    /// Encodes the message into a transport frame.
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        match self {
            Self::Data(bytes) => Ok(Frame::Binary(bytes.clone())),
            Self::Control(msg) => Ok(Frame::Text(msg.to_json()?)),
        }
    }

    /// Decodes a transport frame. Binary frames are always data, even when
    /// their content happens to look like JSON.
    pub fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        match frame {
            Frame::Binary(bytes) => Ok(Self::Data(bytes)),
            Frame::Text(text) => Ok(Self::Control(ControlMessage::from_json(&text)?)),
        }
    }

    /// Encodes into a single buffer with a leading tag byte.
    pub fn encode_tagged(&self) -> Result<Bytes, ProtocolError> {
        match self {
            Self::Data(bytes) => {
                let mut buf = BytesMut::with_capacity(1 + bytes.len());
                buf.put_u8(TAG_DATA);
                buf.put_slice(bytes);
                Ok(buf.freeze())
            }
            Self::Control(msg) => {
                let json = msg.to_json()?;
                let mut buf = BytesMut::with_capacity(1 + json.len());
                buf.put_u8(TAG_CONTROL);
                buf.put_slice(json.as_bytes());
                Ok(buf.freeze())
            }
        }
    }

    /// Decodes a buffer produced by [`encode_tagged`](Self::encode_tagged).
    pub fn decode_tagged(buf: Bytes) -> Result<Self, ProtocolError> {
        let Some(&tag) = buf.first() else {
            return Err(ProtocolError::Empty);
        };
        let body = buf.slice(1..);
        match tag {
            TAG_DATA => Ok(Self::Data(body)),
            TAG_CONTROL => {
                let text = std::str::from_utf8(&body)?;
                Ok(Self::Control(ControlMessage::from_json(text)?))
            }
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

impl From<ControlMessage> for WireMessage {
    fn from(msg: ControlMessage) -> Self {
        Self::Control(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileMeta;

    #[test]
    fn data_becomes_binary_frame() {
        let msg = WireMessage::Data(Bytes::from_static(b"abc"));
        assert_eq!(msg.to_frame().unwrap(), Frame::Binary(Bytes::from_static(b"abc")));
    }

    #[test]
    fn control_becomes_text_frame() {
        let msg = WireMessage::Control(ControlMessage::Request { index: 2 });
        let Frame::Text(text) = msg.to_frame().unwrap() else {
            panic!("expected text frame");
        };
        assert_eq!(text, r#"{"type":"file:request","index":2}"#);
    }

    #[test]
    fn json_looking_binary_stays_data() {
        let payload = Bytes::from_static(br#"{"type":"file:cancel"}"#);
        let msg = WireMessage::from_frame(Frame::Binary(payload.clone())).unwrap();
        assert_eq!(msg, WireMessage::Data(payload));
    }

    #[test]
    fn malformed_text_frame_is_error() {
        let err = WireMessage::from_frame(Frame::Text("not json".into())).unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
    }

    #[test]
    fn tagged_control_roundtrip() {
        let msg = WireMessage::Control(ControlMessage::Start {
            meta: FileMeta::new("a.bin", 10, "application/octet-stream"),
        });
        let buf = msg.encode_tagged().unwrap();
        assert_eq!(buf[0], TAG_CONTROL);
        assert_eq!(WireMessage::decode_tagged(buf).unwrap(), msg);
    }

    #[test]
    fn tagged_data_keeps_payload() {
        let msg = WireMessage::Data(Bytes::from_static(&[0x01, 0x02]));
        let buf = msg.encode_tagged().unwrap();
        assert_eq!(&buf[..], &[TAG_DATA, 0x01, 0x02]);
        assert_eq!(WireMessage::decode_tagged(buf).unwrap(), msg);
    }

    #[test]
    fn tagged_empty_data_is_valid() {
        let buf = Bytes::from_static(&[TAG_DATA]);
        assert_eq!(
            WireMessage::decode_tagged(buf).unwrap(),
            WireMessage::Data(Bytes::new())
        );
    }

    #[test]
    fn tagged_errors() {
        assert!(matches!(
            WireMessage::decode_tagged(Bytes::new()),
            Err(ProtocolError::Empty)
        ));
        assert!(matches!(
            WireMessage::decode_tagged(Bytes::from_static(&[0x7f, 0x00])),
            Err(ProtocolError::UnknownTag(0x7f))
        ));
        assert!(matches!(
            WireMessage::decode_tagged(Bytes::from_static(&[TAG_CONTROL, 0xff])),
            Err(ProtocolError::Utf8(_))
        ));
    }

    #[test]
    fn frame_len() {
        assert_eq!(Frame::Binary(Bytes::from_static(b"12345")).len(), 5);
        assert!(Frame::Text(String::new()).is_empty());
    }
}
