//! Agent mail
//!
//! Typed message envelopes and the shared priority mailbox every agent pulls from.
//!
//! # Overview
//!
//! - **Message** - immutable envelope with sender, recipient, kind, priority and a JSON payload
//! - **Mailbox** - one priority queue per agent name plus an append-only history log
//!
//! # Message Kinds
//!
//! - `request` - ask an agent to perform an action
//! - `response` - result of a request that set `requires_response`
//! - `query` - informational question
//! - `conflict` - disagreement between agent outputs, reported to the supervisor
//! - `acknowledgment` - receipt
//! - `error` - failure while processing a message

mod mailbox;
mod message;

pub use mailbox::Mailbox;
pub use message::{content, Content, Message, MessageId, MessageKind, Priority};
