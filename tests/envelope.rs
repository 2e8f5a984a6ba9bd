//! Frame classification across the envelope shapes endpoints send.

use serde_json::json;
use tasklink::envelope::parse_value;
use tasklink::single_shot::extract_text;
use tasklink::{ResponseEnvelope, parse_frame};

fn chunk(text: &str) -> ResponseEnvelope {
    ResponseEnvelope::Chunk { text: text.into() }
}

fn terminal(text: &str) -> ResponseEnvelope {
    ResponseEnvelope::Terminal { text: text.into() }
}

mod precedence {
    use super::*;

    #[test]
    fn heartbeat_beats_content() {
        assert_eq!(
            parse_frame(r#"{"type":"heartbeat","text":"ignored"}"#),
            ResponseEnvelope::Heartbeat
        );
        assert_eq!(
            parse_frame(r#"{"heartbeat":true,"done":true}"#),
            ResponseEnvelope::Heartbeat
        );
        assert_eq!(parse_frame(r#"{"event":"PING"}"#), ResponseEnvelope::Heartbeat);
    }

    #[test]
    fn content_without_terminal_marker_is_a_chunk() {
        assert_eq!(parse_frame(r#"{"chunk":"a"}"#), chunk("a"));
        assert_eq!(parse_frame(r#"{"delta":"b","done":false}"#), chunk("b"));
        assert_eq!(
            parse_frame(r#"{"text":"c","result":{"text":"nested"}}"#),
            chunk("c")
        );
    }

    #[test]
    fn terminal_marker_keeps_trailing_content() {
        assert_eq!(parse_frame(r#"{"done":true,"text":"end"}"#), terminal("end"));
        assert_eq!(parse_frame(r#"{"type":"complete"}"#), terminal(""));
        assert_eq!(parse_frame(r#"{"final":true}"#), terminal(""));
        assert_eq!(parse_frame("[DONE]"), terminal(""));
    }

    #[test]
    fn terminal_marker_beats_result_wrapper() {
        assert_eq!(
            parse_frame(r#"{"type":"done","result":{"text":"x"}}"#),
            terminal("x")
        );
        assert_eq!(
            parse_frame(r#"{"type":"complete","result":{"text":"answer"}}"#),
            terminal("answer")
        );
        assert_eq!(
            parse_frame(r#"{"done":true,"result":{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]}}"#),
            terminal("a\nb")
        );
    }

    #[test]
    fn flat_terminal_content_wins_over_result() {
        assert_eq!(
            parse_frame(r#"{"done":true,"text":"flat","result":{"text":"nested"}}"#),
            terminal("flat")
        );
    }

    #[test]
    fn result_wrapper_extracts_nested_text() {
        let cases = [
            (r#"{"result":{"text":"a"}}"#, "a"),
            (r#"{"result":"b"}"#, "b"),
            (r#"{"result":{"body":"c"}}"#, "c"),
            (r#"{"result":{"body":{"text":"d"}}}"#, "d"),
            (r#"{"result":{"content":"e"}}"#, "e"),
            (
                r#"{"result":{"content":[{"type":"text","text":"f"},{"type":"image"},{"type":"text","text":"g"}]}}"#,
                "f\ng",
            ),
            (r#"{"result":null}"#, ""),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                parse_frame(raw),
                ResponseEnvelope::CallResult {
                    text: expected.into()
                },
                "{raw}"
            );
        }
    }

    #[test]
    fn opaque_result_falls_back_to_serialized_form() {
        let envelope = parse_frame(r#"{"result":{"rows":[1,2]}}"#);
        assert_eq!(
            envelope,
            ResponseEnvelope::CallResult {
                text: r#"{"rows":[1,2]}"#.into()
            }
        );
    }
}

mod fallbacks {
    use super::*;

    #[test]
    fn non_json_is_a_raw_chunk() {
        assert_eq!(parse_frame("plain text "), chunk("plain text "));
        assert_eq!(parse_frame("{broken"), chunk("{broken"));
    }

    #[test]
    fn blank_frames_are_heartbeats() {
        assert_eq!(parse_frame(""), ResponseEnvelope::Heartbeat);
        assert_eq!(parse_frame("  \n"), ResponseEnvelope::Heartbeat);
    }

    #[test]
    fn non_object_json() {
        assert_eq!(parse_frame(r#""quoted""#), chunk("quoted"));
        assert_eq!(
            parse_frame("42"),
            ResponseEnvelope::Unrecognized { raw: "42".into() }
        );
        assert_eq!(
            parse_frame("[1,2]"),
            ResponseEnvelope::Unrecognized {
                raw: "[1,2]".into()
            }
        );
    }

    #[test]
    fn unmatched_object_is_unrecognized_and_keeps_raw_text() {
        let raw = r#"{"status":"queued","position":3}"#;
        let envelope = parse_frame(raw);
        assert_eq!(envelope, ResponseEnvelope::Unrecognized { raw: raw.into() });
        assert_eq!(envelope.content(), Some(raw));
        assert!(!envelope.is_terminal());
    }
}

mod properties {
    use super::*;

    const FRAMES: &[&str] = &[
        "",
        "[DONE]",
        "text",
        r#"{"type":"ping"}"#,
        r#"{"text":"a"}"#,
        r#"{"done":true,"data":"b"}"#,
        r#"{"result":{"text":"c"}}"#,
        r#"{"other":1}"#,
        "7",
    ];

    #[test]
    fn parsing_is_deterministic() {
        for raw in FRAMES {
            assert_eq!(parse_frame(raw), parse_frame(raw), "{raw}");
        }
    }

    #[test]
    fn only_terminal_and_call_result_end_a_stream() {
        for raw in FRAMES {
            let envelope = parse_frame(raw);
            let expected = matches!(
                envelope,
                ResponseEnvelope::Terminal { .. } | ResponseEnvelope::CallResult { .. }
            );
            assert_eq!(envelope.is_terminal(), expected, "{raw}");
        }
    }

    #[test]
    fn decoded_values_classify_like_raw_frames() {
        let value = json!({"done": true, "text": "z"});
        assert_eq!(parse_value(&value), parse_frame(&value.to_string()));
    }

    #[test]
    fn single_shot_extraction_matches_classification() {
        assert_eq!(extract_text(&json!({"result": {"text": "r"}})), "r");
        assert_eq!(extract_text(&json!({"chunk": "partial"})), "partial");
        assert_eq!(extract_text(&json!({"type": "heartbeat"})), "");
        assert_eq!(extract_text(&json!({"unrelated": true})), "");
    }
}
