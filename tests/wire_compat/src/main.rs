fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use peerdrop_protocol::{
        ControlMessage, FileMeta, Frame, MessageType, TransferState, WireMessage,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  peer: {fixture}\n  ours: {reserialized}"
        );
        parsed
    }

    // --- Control messages ---

    #[test]
    fn fixture_start() {
        let msg: ControlMessage = roundtrip_test("start.json");
        assert_eq!(
            msg,
            ControlMessage::Start {
                meta: FileMeta::new("holiday photos.zip", 48_213_760, "application/zip"),
            }
        );
        assert_eq!(msg.message_type(), MessageType::Start);
    }

    #[test]
    fn fixture_start_empty_file() {
        let msg: ControlMessage = roundtrip_test("start_empty_file.json");
        match msg {
            ControlMessage::Start { meta } => assert_eq!(meta.size, 0),
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn fixture_request() {
        let msg: ControlMessage = roundtrip_test("request.json");
        assert_eq!(msg, ControlMessage::Request { index: 47 });
    }

    #[test]
    fn fixture_cancel() {
        let msg: ControlMessage = roundtrip_test("cancel.json");
        assert_eq!(msg, ControlMessage::Cancel);
    }

    #[test]
    fn fixture_completed() {
        let msg: ControlMessage = roundtrip_test("completed.json");
        assert_eq!(msg, ControlMessage::Completed);
    }

    #[test]
    fn every_control_fixture_travels_as_text() {
        for name in ["start.json", "request.json", "cancel.json", "completed.json"] {
            let text = read_fixture(name);
            let decoded = WireMessage::from_frame(Frame::Text(text))
                .unwrap_or_else(|e| panic!("failed to decode {name}: {e}"));
            let WireMessage::Control(msg) = decoded else {
                panic!("{name} decoded as data");
            };
            let frame = WireMessage::Control(msg).to_frame().unwrap();
            assert!(matches!(frame, Frame::Text(_)), "{name}");
        }
    }

    #[test]
    fn control_json_in_binary_frame_is_data() {
        let text = read_fixture("cancel.json");
        let decoded = WireMessage::from_frame(Frame::Binary(text.clone().into_bytes().into())).unwrap();
        assert_eq!(decoded, WireMessage::Data(text.into_bytes().into()));
    }

    // --- Shared types ---

    #[test]
    fn fixture_file_meta() {
        let meta: FileMeta = roundtrip_test("file_meta.json");
        assert_eq!(meta.mime_type, "text/markdown");
    }

    #[test]
    fn fixture_file_meta_without_type() {
        let meta: FileMeta = serde_json::from_value(load_fixture("file_meta_untyped.json")).unwrap();
        assert_eq!(meta, FileMeta::new("blob", 7, "application/octet-stream"));
    }

    #[test]
    fn fixture_transfer_states() {
        let states: Vec<TransferState> = roundtrip_test("transfer_states.json");
        assert_eq!(
            states,
            vec![
                TransferState::Idle,
                TransferState::Connected,
                TransferState::AwaitingMeta,
                TransferState::Transferring,
                TransferState::Completed,
                TransferState::Cancelled,
                TransferState::Failed,
            ]
        );
        let terminal: Vec<_> = states.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal.len(), 3);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = ControlMessage::from_json(r#"{"type":"file:resume","index":3}"#);
        assert!(err.is_err());
    }

    #[test]
    fn request_index_must_be_non_negative() {
        assert!(ControlMessage::from_json(r#"{"type":"file:request","index":-1}"#).is_err());
    }
}
