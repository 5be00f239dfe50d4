//! Property-based tests for the realtime frame codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never panics `decode` (errors are returned instead).
//! 2. Any outbound chat frame encodes to JSON carrying its content and target.
//! 3. Unknown `type` discriminators always decode to `Ignored`.
//! 4. Message status only ever moves forward, whatever order receipts arrive in.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use ripple_proto::codec::{self, InboundFrame, OutboundFrame};
use ripple_proto::message::{ChatKind, ConversationId, MessageStatus};

fn arb_kind() -> impl Strategy<Value = ChatKind> {
    prop_oneof![Just(ChatKind::Private), Just(ChatKind::Group)]
}

fn arb_status() -> impl Strategy<Value = MessageStatus> {
    prop_oneof![
        Just(MessageStatus::Sending),
        Just(MessageStatus::Delivered),
        Just(MessageStatus::Read),
    ]
}

proptest! {
    #[test]
    fn decode_never_panics_on_arbitrary_text(text in ".{0,256}") {
        let _ = codec::decode(&text);
    }

    #[test]
    fn decode_never_panics_on_arbitrary_json_objects(
        kind in "[a-z_]{1,20}",
        field in "[a-zA-Z_]{1,12}",
        value in any::<i64>(),
    ) {
        let text = format!(r#"{{"type":"{kind}","{field}":{value},"data":{{"{field}":"{value}"}}}}"#);
        let _ = codec::decode(&text);
    }

    #[test]
    fn chat_frames_carry_content_and_target(
        kind in arb_kind(),
        content in "[^\x00]{0,512}",
        to in any::<u64>(),
        millis in 0i64..4_102_444_800_000,
    ) {
        let ts = Utc.timestamp_millis_opt(millis).single().unwrap();
        let frame = OutboundFrame::chat(kind, content.clone(), ConversationId::new(to), ts);
        let json: serde_json::Value =
            serde_json::from_str(&codec::encode(&frame).unwrap()).unwrap();
        prop_assert_eq!(json["type"].as_str(), Some(kind.frame_type()));
        prop_assert_eq!(json["content"].as_str(), Some(content.as_str()));
        prop_assert_eq!(json["to"].as_u64(), Some(to));
        prop_assert!(json["timestamp"].as_str().is_some_and(|s| s.ends_with('Z')));
    }

    #[test]
    fn unknown_types_decode_to_ignored(kind in "x_[a-z]{1,16}") {
        let frame = codec::decode(&format!(r#"{{"type":"{kind}"}}"#)).unwrap();
        prop_assert_eq!(frame, InboundFrame::Ignored(kind));
    }

    #[test]
    fn status_never_regresses(updates in prop::collection::vec(arb_status(), 0..32)) {
        let mut status = MessageStatus::Sending;
        let mut high_water = status;
        for next in updates {
            status.advance(next);
            high_water = high_water.max(next);
            prop_assert_eq!(status, high_water);
        }
    }
}
