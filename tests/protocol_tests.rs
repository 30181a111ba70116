// Unit tests for the control channel envelopes.

use voicelink::{ClientMessage, ConnectTarget, Role, ServerMessage};

#[test]
fn test_transcript_envelope_parses() {
    let json = r#"{"type":"transcript","role":"assistant","content":"hi there","is_final":false}"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();

    assert_eq!(
        msg,
        ServerMessage::Transcript {
            role: Role::Assistant,
            content: "hi there".to_string(),
            is_final: false,
        }
    );
}

#[test]
fn test_error_envelope_parses() {
    let json = r#"{"type":"error","message":"tts quota exceeded"}"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();

    assert_eq!(
        msg,
        ServerMessage::Error {
            message: "tts quota exceeded".to_string()
        }
    );
}

#[test]
fn test_session_started_carries_agent_metadata() {
    let json = r#"{"type":"session_started","agent":{"id":"a1","name":"support"}}"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();

    match msg {
        ServerMessage::SessionStarted { agent } => {
            let agent = agent.unwrap();
            assert_eq!(agent["name"], "support");
        }
        other => panic!("Expected session_started, got {other:?}"),
    }
}

#[test]
fn test_session_started_metadata_is_optional() {
    let msg: ServerMessage = serde_json::from_str(r#"{"type":"session_started"}"#).unwrap();

    assert_eq!(msg, ServerMessage::SessionStarted { agent: None });
}

#[test]
fn test_session_ended_reason_is_optional() {
    let with: ServerMessage =
        serde_json::from_str(r#"{"type":"session_ended","reason":"agent_hangup"}"#).unwrap();
    let without: ServerMessage = serde_json::from_str(r#"{"type":"session_ended"}"#).unwrap();

    assert_eq!(
        with,
        ServerMessage::SessionEnded {
            reason: Some("agent_hangup".to_string())
        }
    );
    assert_eq!(without, ServerMessage::SessionEnded { reason: None });
}

#[test]
fn test_unknown_type_is_tolerated() {
    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"keepalive","interval":30}"#).unwrap();

    assert_eq!(msg, ServerMessage::Unknown);
}

#[test]
fn test_malformed_envelope_is_an_error_not_a_panic() {
    assert!(serde_json::from_str::<ServerMessage>("{not json").is_err());
    assert!(serde_json::from_str::<ServerMessage>(r#"{"no_type":1}"#).is_err());
}

#[test]
fn test_end_message_serializes() {
    let json = serde_json::to_string(&ClientMessage::End).unwrap();

    assert_eq!(json, r#"{"type":"end"}"#);
}

#[test]
fn test_audio_fallback_envelope_serializes() {
    let json = serde_json::to_string(&ClientMessage::Audio {
        data: "AAAA".to_string(),
    })
    .unwrap();

    assert_eq!(json, r#"{"type":"audio","data":"AAAA"}"#);
}

#[test]
fn test_realtime_url_with_and_without_agent() {
    let plain = ConnectTarget {
        url: "ws://localhost:8000".to_string(),
        agent_id: None,
    };
    let routed = ConnectTarget {
        url: "ws://localhost:8000/".to_string(),
        agent_id: Some("agent-7".to_string()),
    };

    assert_eq!(plain.realtime_url(), "ws://localhost:8000/ws/voice-browser");
    assert_eq!(
        routed.realtime_url(),
        "ws://localhost:8000/ws/voice-browser?agent_id=agent-7"
    );
}
