use crate::{RoomId, SenderId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full code state of a room: named source fragments, replaced wholesale on
/// every edit.
///
/// Fragments are kept exactly as the client sent them, including names and
/// value types this crate does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeSnapshot(Map<String, Value>);

impl CodeSnapshot {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        let mut fragments = Map::new();
        fragments.insert("html".into(), Value::String(html.into()));
        fragments.insert("css".into(), Value::String(css.into()));
        fragments.insert("js".into(), Value::String(js.into()));
        Self(fragments)
    }

    pub fn fragment(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn fragments(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Blank room: empty markup, style and logic.
impl Default for CodeSnapshot {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

impl From<Map<String, Value>> for CodeSnapshot {
    fn from(fragments: Map<String, Value>) -> Self {
        Self(fragments)
    }
}

/// Opaque fields riding along an edit. Forwarded without interpretation.
pub type ExtraFields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "CONNECTED_TO_ROOM")]
    JoinRoom(JoinRoom),
    #[serde(rename = "CODE_CHANGED")]
    ChangeCode(ChangeCode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: RoomId,
    #[serde(default, alias = "roomUserId")]
    pub joiner_id: SenderId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeCode {
    pub room_id: RoomId,
    #[serde(default)]
    pub sender_id: SenderId,
    pub code: CodeSnapshot,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom(join) => &join.room_id,
            Self::ChangeCode(change) => &change.room_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Current snapshot of a room, sent to every member when someone joins.
    #[serde(rename = "START_CODE")]
    StartCode(StartCode),
    /// An edit made by another member.
    #[serde(rename = "CODE_CHANGED")]
    CodeChanged(CodeChanged),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCode {
    pub sender_id: SenderId,
    pub code: CodeSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChanged {
    pub sender_id: SenderId,
    pub code: CodeSnapshot,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_reads_join_with_either_joiner_field() {
        let a = ClientMessage::from_json(
            r#"{"type":"CONNECTED_TO_ROOM","roomId":"abc123xyz789","joinerId":"alice"}"#,
        )
        .expect("valid");
        let b = ClientMessage::from_json(
            r#"{"type":"CONNECTED_TO_ROOM","roomId":"abc123xyz789","roomUserId":"alice"}"#,
        )
        .expect("valid");
        assert_eq!(a, b);
        assert_eq!(
            a,
            ClientMessage::JoinRoom(JoinRoom {
                room_id: "abc123xyz789".into(),
                joiner_id: "alice".into(),
            })
        );
    }

    #[test]
    fn it_rejects_events_without_room_id() {
        assert!(ClientMessage::from_json(r#"{"type":"CONNECTED_TO_ROOM","joinerId":"a"}"#).is_err());
        assert!(ClientMessage::from_json(
            r#"{"type":"CODE_CHANGED","senderId":"a","code":{"html":"","css":"","js":""}}"#
        )
        .is_err());
        assert!(ClientMessage::from_json(r#"{"type":"SOMETHING_ELSE","roomId":"r"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn it_collects_unknown_edit_fields_as_extras() {
        let message = ClientMessage::from_json(
            r#"{"type":"CODE_CHANGED","roomId":"r","senderId":"a",
                "code":{"html":"<div>"},"cursor":{"line":3},"tab":"html"}"#,
        )
        .expect("valid");
        let change = match message {
            ClientMessage::ChangeCode(change) => change,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(change.code.fragment("html"), Some(&json!("<div>")));
        assert_eq!(change.code.fragments().len(), 1);
        assert_eq!(change.extra.len(), 2);
        assert_eq!(change.extra["cursor"], json!({"line": 3}));
        assert_eq!(change.extra["tab"], json!("html"));
    }

    #[test]
    fn it_writes_server_messages_in_the_wire_shape() {
        let start = ServerMessage::StartCode(StartCode {
            sender_id: "b".into(),
            code: CodeSnapshot::default(),
        });
        let value: Value = serde_json::from_str(&start.to_json().expect("encode")).expect("json");
        assert_eq!(
            value,
            json!({"type": "START_CODE", "senderId": "b", "code": {"html": "", "css": "", "js": ""}})
        );

        let mut extra = ExtraFields::new();
        extra.insert("tab".into(), json!("css"));
        let changed = ServerMessage::CodeChanged(CodeChanged {
            sender_id: "a".into(),
            code: CodeSnapshot::new("<div>", "", ""),
            extra,
        });
        let value: Value =
            serde_json::from_str(&changed.to_json().expect("encode")).expect("json");
        assert_eq!(
            value,
            json!({
                "type": "CODE_CHANGED",
                "senderId": "a",
                "code": {"html": "<div>", "css": "", "js": ""},
                "tab": "css"
            })
        );
    }

    #[test]
    fn code_fragments_pass_through_untouched() {
        let message = ClientMessage::from_json(
            r#"{"type":"CODE_CHANGED","roomId":"r","senderId":"a",
                "code":{"html":null,"css":"","js":"","ts":"let x: number = 1","lines":[1,2]}}"#,
        )
        .expect("valid");
        let change = match message {
            ClientMessage::ChangeCode(change) => change,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            Value::Object(change.code.fragments().clone()),
            json!({"html": null, "css": "", "js": "", "ts": "let x: number = 1", "lines": [1, 2]})
        );
    }

    #[test]
    fn blank_snapshot_has_empty_known_fragments() {
        let value = serde_json::to_value(CodeSnapshot::default()).expect("encode");
        assert_eq!(value, json!({"html": "", "css": "", "js": ""}));
    }
}
