//! Message envelope for agent-to-agent communication
//!
//! A [`Message`] is an immutable value: it is built by its sender, delivered to
//! exactly one recipient queue, and afterwards only read (by the recipient and
//! by the mailbox history).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key/value payload carried by a message
pub type Content = serde_json::Map<String, serde_json::Value>;

/// Unique message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new message ID
    pub fn new() -> Self {
        Self(format!(
            "msg-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            unique_suffix()
        ))
    }

    /// Create from an existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// High-resolution clock plus a process-wide counter
fn unique_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}{:04x}", nanos, counter)
}

/// How the recipient should interpret the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
    Query,
    Conflict,
    Acknowledgment,
    Error,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Query => "query",
            Self::Conflict => "conflict",
            Self::Acknowledgment => "acknowledgment",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority, ordered low to high
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Urgent = 4,
    Critical = 5,
}

impl Priority {
    /// Numeric value (1 = low, 5 = critical)
    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    #[serde(rename = "message_id")]
    pub id: MessageId,

    /// Sending agent (or external caller identity)
    pub sender: String,

    /// Receiving agent
    pub recipient: String,

    /// Message kind
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Business payload
    pub content: Content,

    /// Delivery priority
    #[serde(default)]
    pub priority: Priority,

    /// Creation time
    pub timestamp: DateTime<Utc>,

    /// Whether the processing agent must reply to `sender`
    #[serde(default)]
    pub requires_response: bool,
}

impl Message {
    /// Create a new message at medium priority
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        kind: MessageKind,
        content: Content,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender: sender.into(),
            recipient: recipient.into(),
            kind,
            content,
            priority: Priority::default(),
            timestamp: Utc::now(),
            requires_response: false,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Ask the recipient to mail its result back
    pub fn requiring_response(mut self) -> Self {
        self.requires_response = true;
        self
    }

    /// Copy addressed to another recipient, with its own id and timestamp
    pub fn readdressed(&self, recipient: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sender: self.sender.clone(),
            recipient: recipient.into(),
            kind: self.kind,
            content: self.content.clone(),
            priority: self.priority,
            timestamp: Utc::now(),
            requires_response: self.requires_response,
        }
    }

    /// JSON-safe form: string tags for kind/priority, ISO-8601 timestamp
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Rebuild a message from [`Message::to_dict`] output
    pub fn from_dict(value: serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Read a string field from the content
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(|v| v.as_str())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message({}: {} -> {}, priority={})",
            self.kind, self.sender, self.recipient, self.priority
        )
    }
}

/// Build a [`Content`] map from a `serde_json::json!({...})` object literal
///
/// Non-object values are wrapped as `{"value": v}`.
pub fn content(value: serde_json::Value) -> Content {
    match value {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = Content::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let msg = Message::new(
            "agent1",
            "agent2",
            MessageKind::Request,
            content(json!({"data": "test"})),
        );

        assert_eq!(msg.sender, "agent1");
        assert_eq!(msg.recipient, "agent2");
        assert_eq!(msg.kind, MessageKind::Request);
        assert_eq!(msg.priority, Priority::Medium);
        assert!(!msg.requires_response);
        assert!(msg.id.as_str().starts_with("msg-"));
    }

    #[test]
    fn test_message_id_generation() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| MessageId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Urgent);
        assert!(Priority::Urgent < Priority::Critical);
        assert_eq!(Priority::Low.value(), 1);
        assert_eq!(Priority::Critical.value(), 5);
    }

    #[test]
    fn test_to_dict_uses_string_tags() {
        let msg = Message::new(
            "test",
            "receiver",
            MessageKind::Response,
            content(json!({"result": 42})),
        )
        .with_priority(Priority::Urgent);

        let dict = msg.to_dict();
        assert_eq!(dict["sender"], "test");
        assert_eq!(dict["recipient"], "receiver");
        assert_eq!(dict["type"], "response");
        assert_eq!(dict["priority"], "urgent");
        assert_eq!(dict["content"]["result"], 42);
        assert_eq!(dict["message_id"], msg.id.as_str());
        assert!(dict["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_dict_round_trip() {
        let msg = Message::new(
            "analyst",
            "user",
            MessageKind::Conflict,
            content(json!({"nested": {"scores": [1, 2, 3]}, "flag": true})),
        )
        .with_priority(Priority::Critical)
        .requiring_response();

        let parsed = Message::from_dict(msg.to_dict()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_from_dict_rejects_unknown_kind() {
        let mut dict = Message::new("a", "b", MessageKind::Query, Content::new()).to_dict();
        dict["type"] = json!("telegram");
        assert!(Message::from_dict(dict).is_err());
    }

    #[test]
    fn test_readdressed_gets_new_identity() {
        let msg = Message::new("s", "r", MessageKind::Request, content(json!({"k": 1})))
            .with_priority(Priority::High);
        let copy = msg.readdressed("other");

        assert_ne!(copy.id, msg.id);
        assert_eq!(copy.recipient, "other");
        assert_eq!(copy.sender, "s");
        assert_eq!(copy.priority, Priority::High);
        assert_eq!(copy.content, msg.content);
    }

    #[test]
    fn test_display() {
        let msg = Message::new("a", "b", MessageKind::Query, Content::new());
        assert_eq!(msg.to_string(), "Message(query: a -> b, priority=medium)");
    }

    #[test]
    fn test_content_helper_wraps_scalars() {
        let map = content(json!(7));
        assert_eq!(map.get("value"), Some(&json!(7)));
    }
}
