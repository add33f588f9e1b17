use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Data,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Data => "data",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "data" => Some(Role::Data),
            _ => None,
        }
    }
}

/// Access tier on a membership row. Only gates future admin surfaces;
/// every member may read and post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Member,
    Admin,
    Owner,
}

impl AccessLevel {
    pub fn as_i64(self) -> i64 {
        match self {
            AccessLevel::Member => 0,
            AccessLevel::Admin => 1,
            AccessLevel::Owner => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub url: String,
}

/// A persisted message. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub role: Role,
    pub content: String,
    /// Unix milliseconds, assigned by the store at insert time.
    pub created_at: i64,
    pub annotations: Vec<Value>,
    pub attachments: Vec<Attachment>,
}

/// A message about to be persisted. The content is the already-flattened
/// display string, see [`MessageContent::flatten`].
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub annotations: Vec<Value>,
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            annotations: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Inbound message content: either a plain string or a sequence of typed
/// segments, which the store flattens to one display string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Segments(Vec<ContentSegment>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSegment {
    Text {
        text: String,
    },
    Image {
        #[serde(default)]
        image: Option<String>,
    },
    File {
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl MessageContent {
    /// Collapse structured content to a single display string: segment text
    /// verbatim, `[Image]` for images, `[File: <name>]` (or `[File]` when
    /// unnamed) for files, `[Unknown content]` for anything else, joined by
    /// single spaces in segment order. Lossy by design; the part tables hold
    /// the structured form.
    pub fn flatten(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Segments(segments) => segments
                .iter()
                .map(ContentSegment::display_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl ContentSegment {
    fn display_text(&self) -> String {
        match self {
            ContentSegment::Text { text } => text.clone(),
            ContentSegment::Image { .. } => "[Image]".to_owned(),
            ContentSegment::File { name: Some(name) } => format!("[File: {name}]"),
            ContentSegment::File { name: None } => "[File]".to_owned(),
            ContentSegment::Unknown => "[Unknown content]".to_owned(),
        }
    }
}

/// Lifecycle of a tool invocation part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallState {
    PartialCall,
    Call,
    Result,
}

impl ToolCallState {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolCallState::PartialCall => "partial-call",
            ToolCallState::Call => "call",
            ToolCallState::Result => "result",
        }
    }

    pub fn parse(raw: &str) -> Option<ToolCallState> {
        match raw {
            "partial-call" => Some(ToolCallState::PartialCall),
            "call" => Some(ToolCallState::Call),
            "result" => Some(ToolCallState::Result),
            _ => None,
        }
    }
}

/// Typed payload of a message part. Each variant maps to its own payload
/// table; `StepStart` is a bare marker row with no payload table.
#[derive(Debug, Clone, PartialEq)]
pub enum PartPayload {
    Text {
        text: String,
    },
    Reasoning {
        reasoning: String,
    },
    ToolInvocation {
        tool_call_id: String,
        tool_name: String,
        state: ToolCallState,
        args: Value,
        result: Option<Value>,
    },
    Source {
        source_id: String,
        url: String,
        title: Option<String>,
    },
    StepStart,
}

impl PartPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            PartPayload::Text { .. } => "text",
            PartPayload::Reasoning { .. } => "reasoning",
            PartPayload::ToolInvocation { .. } => "tool_invocation",
            PartPayload::Source { .. } => "source",
            PartPayload::StepStart => "step_start",
        }
    }
}

/// An ordered sub-unit of a message's structured content.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub id: Uuid,
    pub message_id: Uuid,
    pub order: i64,
    pub payload: PartPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Data] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("moderator"), None);
    }

    #[test]
    fn access_levels_keep_their_ordinals() {
        assert_eq!(AccessLevel::Member.as_i64(), 0);
        assert_eq!(AccessLevel::Admin.as_i64(), 1);
        assert_eq!(AccessLevel::Owner.as_i64(), 2);
        assert!(AccessLevel::Member < AccessLevel::Owner);
    }

    #[test]
    fn plain_string_content_flattens_verbatim() {
        let content: MessageContent = serde_json::from_str(r#""hello there""#).unwrap();
        assert_eq!(content.flatten(), "hello there");
    }

    #[test]
    fn segment_content_collapses_with_placeholders() {
        let content: MessageContent = serde_json::from_str(
            r#"[{"type":"text","text":"a"},{"type":"image"},{"type":"text","text":"b"}]"#,
        )
        .unwrap();
        assert_eq!(content.flatten(), "a [Image] b");
    }

    #[test]
    fn file_segments_name_the_file() {
        let content: MessageContent = serde_json::from_str(
            r#"[{"type":"file","name":"notes.pdf"},{"type":"file"}]"#,
        )
        .unwrap();
        assert_eq!(content.flatten(), "[File: notes.pdf] [File]");
    }

    #[test]
    fn unrecognized_segment_kinds_become_placeholders() {
        let content: MessageContent =
            serde_json::from_str(r#"[{"type":"text","text":"x"},{"type":"video"}]"#).unwrap();
        assert_eq!(content.flatten(), "x [Unknown content]");
    }

    #[test]
    fn tool_call_state_round_trips() {
        for state in [
            ToolCallState::PartialCall,
            ToolCallState::Call,
            ToolCallState::Result,
        ] {
            assert_eq!(ToolCallState::parse(state.as_str()), Some(state));
        }
    }
}
