//! Agent contract and lifecycle states
//!
//! Defines the [`Agent`] trait every worker implements, the advisory
//! [`AgentState`] machine, and the records used to observe a running agent.

use crate::mail::{Content, Message, MessageId, MessageKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named worker that turns one message into one result payload
///
/// Implementations are shared with their worker thread, so they must be
/// `Send + Sync`; any mutable state lives behind interior locks.
pub trait Agent: Send + Sync + 'static {
    /// Unique name, used as the mailbox key and registry key
    fn name(&self) -> &str;

    /// Human-readable description, not used for dispatch
    fn role(&self) -> &str;

    /// Handle one message
    ///
    /// An `Err` (or a panic) takes the worker's failure path: the sender
    /// receives an ERROR message and the worker keeps running.
    fn process(&self, message: &Message) -> crate::Result<Content>;
}

/// Agent state indicator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Waiting for the next message
    #[default]
    Idle,

    /// Running `process` on a dequeued message
    Processing,

    /// Blocked on an external dependency
    Waiting,

    /// The last `process` call failed
    Error,

    /// Worker loop exited after a stop request
    Stopped,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Waiting => "waiting",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an agent's processing history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub timestamp: DateTime<Utc>,
    pub message_id: MessageId,
    pub sender: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub success: bool,
    pub result_summary: String,
}

impl ProcessingRecord {
    pub(crate) fn new(message: &Message, success: bool, result_summary: String) -> Self {
        Self {
            timestamp: Utc::now(),
            message_id: message.id.clone(),
            sender: message.sender.clone(),
            kind: message.kind,
            success,
            result_summary,
        }
    }
}

/// Point-in-time snapshot of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub name: String,
    pub role: String,
    pub state: AgentState,
    pub messages_processed: u64,
    pub error_count: u64,
    pub is_alive: bool,
    pub pending_messages: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Truncate to at most `max_chars` characters, respecting char boundaries
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
