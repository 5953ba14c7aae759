//! Wire-contract lock for the stdio protocol.
//!
//! The extension shell is versioned separately from the engine, so the
//! envelope shapes and the command/event name sets asserted here must not
//! drift. Renaming a variant or changing a field is a breaking protocol
//! change and should fail loudly in this file first.

use automator::error::AutomatorError;
use automator::host::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use automator::host::contract::{
    EVENT_CHAT_COMPLETED, EVENT_CHAT_DELTA, EVENT_CLIPBOARD_WRITE, EVENT_NOTIFICATION_SHOW,
    EVENT_TASKS_CHANGED, PROTOCOL_VERSION,
};

/// Every wire-format command name, exactly as the shell sends it.
const WIRE_COMMANDS: &[&str] = &[
    "host.ping",
    "host.version",
    "host.stop",
    "tasks.list",
    "tasks.save",
    "tasks.delete",
    "notes.list",
    "notes.save",
    "notes.delete",
    "snippets.list",
    "snippets.save",
    "snippets.delete",
    "formatters.list",
    "formatters.save",
    "formatters.delete",
    "formatter.run",
    "chats.list",
    "chats.save",
    "chats.delete",
    "chat.send",
    "assist.complete",
    "assist.translate",
    "assist.grammar_fix",
    "menu.action",
    "notification.clicked",
    "alarms.list",
    "config.get",
    "config.patch",
];

#[test]
fn command_name_set_is_locked() {
    assert_eq!(CommandName::all().len(), WIRE_COMMANDS.len());
    for (name, wire) in CommandName::all().iter().zip(WIRE_COMMANDS) {
        assert_eq!(name.as_str(), *wire);
        assert_eq!(CommandName::parse(wire), Some(*name));

        // Serde uses the same spelling as as_str/parse.
        let json = serde_json::to_value(name).expect("serialize command name");
        assert_eq!(json, *wire);
        let deserialized: CommandName =
            serde_json::from_value(json).expect("deserialize command name");
        assert_eq!(deserialized, *name);
    }
}

#[test]
fn command_name_parse_rejects_unknown_names() {
    assert_eq!(CommandName::parse("tasks.explode"), None);
    assert_eq!(CommandName::parse("host.pings"), None);
    assert_eq!(CommandName::parse(""), None);
    assert_eq!(CommandName::parse("TASKS.LIST"), None);
}

#[test]
fn event_names_are_locked() {
    assert_eq!(EVENT_NOTIFICATION_SHOW, "notification.show");
    assert_eq!(EVENT_CLIPBOARD_WRITE, "clipboard.write");
    assert_eq!(EVENT_CHAT_DELTA, "chat.delta");
    assert_eq!(EVENT_CHAT_COMPLETED, "chat.completed");
    assert_eq!(EVENT_TASKS_CHANGED, "tasks.changed");
}

#[test]
fn command_envelope_json_shape_matches_contract() {
    let envelope = CommandEnvelope::new(
        "req-123",
        CommandName::TasksSave,
        serde_json::json!({"task": {"id": "t1", "title": "Write report"}}),
    );

    let json = serde_json::to_value(&envelope).expect("serialize command envelope");
    assert_eq!(json["v"], PROTOCOL_VERSION);
    assert_eq!(json["request_id"], "req-123");
    assert_eq!(json["command"], "tasks.save");
    assert_eq!(json["payload"]["task"]["id"], "t1");
}

#[test]
fn command_envelope_parses_shell_json() {
    let raw = r#"{"v":1,"request_id":"req-9","command":"alarms.list","payload":{}}"#;
    let envelope: CommandEnvelope = serde_json::from_str(raw).expect("parse command envelope");
    assert_eq!(envelope.v, PROTOCOL_VERSION);
    assert_eq!(envelope.request_id, "req-9");
    assert_eq!(envelope.command, CommandName::AlarmsList);
    envelope.validate().expect("well-formed envelope validates");
}

#[test]
fn command_envelope_with_unknown_command_fails_parsing() {
    let raw = r#"{"v":1,"request_id":"req-9","command":"tasks.explode","payload":{}}"#;
    assert!(serde_json::from_str::<CommandEnvelope>(raw).is_err());
}

#[test]
fn command_envelope_rejects_wrong_version() {
    let mut envelope = CommandEnvelope::new("req-1", CommandName::HostPing, serde_json::json!({}));
    envelope.v = PROTOCOL_VERSION + 1;

    let err = envelope.validate().expect_err("version should be rejected");
    assert!(matches!(err, AutomatorError::Protocol(_)));
}

#[test]
fn command_envelope_rejects_blank_request_id() {
    let envelope = CommandEnvelope::new("   ", CommandName::HostPing, serde_json::json!({}));
    let err = envelope.validate().expect_err("blank id should be rejected");
    assert!(matches!(err, AutomatorError::Protocol(_)));
}

#[test]
fn response_envelope_json_shape_matches_contract() {
    let ok = ResponseEnvelope::ok("req-1", serde_json::json!({"pong": true}));
    let ok_json = serde_json::to_value(&ok).expect("serialize ok response");
    assert_eq!(ok_json["v"], PROTOCOL_VERSION);
    assert_eq!(ok_json["request_id"], "req-1");
    assert_eq!(ok_json["ok"], true);
    assert_eq!(ok_json["payload"]["pong"], true);
    assert!(ok_json["error"].is_null());

    let err = ResponseEnvelope::error("req-2", "task not found: t9");
    let err_json = serde_json::to_value(&err).expect("serialize error response");
    assert_eq!(err_json["v"], PROTOCOL_VERSION);
    assert_eq!(err_json["request_id"], "req-2");
    assert_eq!(err_json["ok"], false);
    assert_eq!(err_json["payload"], serde_json::Value::Null);
    assert_eq!(err_json["error"], "task not found: t9");
}

#[test]
fn event_envelope_json_shape_matches_contract() {
    let envelope = EventEnvelope::new(
        "evt-777",
        EVENT_NOTIFICATION_SHOW,
        serde_json::json!({"title": "Automator", "message": "hello"}),
    );

    let json = serde_json::to_value(&envelope).expect("serialize event envelope");
    assert_eq!(json["v"], PROTOCOL_VERSION);
    assert_eq!(json["event_id"], "evt-777");
    assert_eq!(json["event"], "notification.show");
    assert_eq!(json["payload"]["title"], "Automator");
}
