//! Request/response over the mailbox
//!
//! A [`Caller`] sends a request that requires a response and then polls its
//! own inbox until the recipient answers. The identity must not have more
//! than one request outstanding at a time.

use crate::config::PipelineConfig;
use crate::mail::{content, Content, Mailbox, Message, MessageKind, Priority};
use crate::{GrantFlowError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Synchronous client of the agents' mailbox
#[derive(Debug, Clone)]
pub struct Caller {
    identity: String,
    mailbox: Arc<Mailbox>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl Caller {
    pub fn new(identity: impl Into<String>, mailbox: Arc<Mailbox>) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            identity: identity.into(),
            mailbox,
            poll_interval: defaults.poll_interval(),
            max_attempts: defaults.max_attempts,
        }
    }

    pub fn from_config(mailbox: Arc<Mailbox>, config: &PipelineConfig) -> Self {
        Self::new(config.caller.as_str(), mailbox)
            .with_poll_interval(config.poll_interval())
            .with_max_attempts(config.max_attempts)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Ask `recipient` and wait up to the configured number of polls
    pub fn ask(&self, recipient: &str, request: Content) -> Content {
        self.ask_with_attempts(recipient, request, self.max_attempts)
    }

    /// Ask `recipient` and wait up to `attempts` polls
    ///
    /// Yields the recipient's `response` payload, `{"error": ...}` when the
    /// recipient reports an error, or `{"error": "<Recipient> timeout"}`.
    pub fn ask_with_attempts(&self, recipient: &str, request: Content, attempts: u32) -> Content {
        match self.request(recipient, request, attempts) {
            Ok(response) => response,
            Err(GrantFlowError::Timeout { agent, .. }) => {
                content(json!({ "error": format!("{} timeout", capitalize(&agent)) }))
            }
            Err(GrantFlowError::Agent(error)) => content(json!({ "error": error })),
            Err(other) => content(json!({ "error": other.to_string() })),
        }
    }

    /// Ask `recipient` and wait up to `attempts` polls for its answer
    ///
    /// An ERROR reply becomes [`GrantFlowError::Agent`] carrying the reported
    /// error; running out of polls is [`GrantFlowError::Timeout`].
    pub fn request(&self, recipient: &str, request: Content, attempts: u32) -> Result<Content> {
        let message = Message::new(
            self.identity.as_str(),
            recipient,
            MessageKind::Request,
            request,
        )
        .with_priority(Priority::High)
        .requiring_response();
        let request_id = self.mailbox.send(message);
        debug!(caller = %self.identity, recipient, request_id = %request_id, "Request sent");

        for _ in 0..attempts {
            let Some(reply) = self.mailbox.receive(&self.identity, self.poll_interval) else {
                continue;
            };

            if reply.sender != recipient {
                warn!(caller = %self.identity, from = %reply.sender, kind = %reply.kind, "Discarding unrelated message");
                continue;
            }
            if let Some(original) = reply.content_str("original_message_id") {
                if original != request_id.as_str() {
                    warn!(caller = %self.identity, from = %reply.sender, original, "Discarding stale reply");
                    continue;
                }
            }

            match reply.kind {
                MessageKind::Response => {
                    return Ok(match reply.content.get("response") {
                        Some(Value::Object(response)) => response.clone(),
                        Some(other) => content(other.clone()),
                        None => Content::new(),
                    });
                }
                MessageKind::Error => {
                    let error = match reply.content.get("error") {
                        Some(Value::String(error)) => error.clone(),
                        Some(other) => other.to_string(),
                        None => format!("{recipient} reported an error"),
                    };
                    return Err(GrantFlowError::Agent(error));
                }
                other => {
                    warn!(caller = %self.identity, from = %reply.sender, kind = %other, "Discarding unexpected message kind");
                }
            }
        }

        warn!(caller = %self.identity, recipient, attempts, "Timed out waiting for response");
        Err(GrantFlowError::Timeout {
            agent: recipient.to_string(),
            attempts,
        })
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn caller(mailbox: &Arc<Mailbox>) -> Caller {
        Caller::new("user", Arc::clone(mailbox))
            .with_poll_interval(Duration::from_millis(20))
            .with_max_attempts(100)
    }

    /// Answer the next request addressed to `agent` with `reply`
    fn answer(mailbox: &Arc<Mailbox>, agent: &'static str, kind: MessageKind, reply: Value) -> thread::JoinHandle<()> {
        let mailbox = Arc::clone(mailbox);
        thread::spawn(move || {
            let request = mailbox
                .receive(agent, Duration::from_secs(5))
                .expect("request");
            assert!(request.requires_response);
            assert_eq!(request.priority, Priority::High);

            let mut body = content(reply);
            body.insert("original_message_id".into(), json!(request.id.as_str()));
            mailbox.send(Message::new(agent, request.sender.as_str(), kind, body));
        })
    }

    #[test]
    fn test_response_payload_returned() {
        let mailbox = Arc::new(Mailbox::new());
        let worker = answer(
            &mailbox,
            "analyst",
            MessageKind::Response,
            json!({"response": {"title": "Attention"}}),
        );

        let result = caller(&mailbox).ask("analyst", content(json!({"action": "analyze"})));
        worker.join().unwrap();
        assert_eq!(result["title"], "Attention");
    }

    #[test]
    fn test_error_reply() {
        let mailbox = Arc::new(Mailbox::new());
        let worker = answer(
            &mailbox,
            "evaluator",
            MessageKind::Error,
            json!({"error": "Agent error: boom"}),
        );

        let result = caller(&mailbox).ask("evaluator", Content::new());
        worker.join().unwrap();
        assert_eq!(result["error"], "Agent error: boom");
    }

    #[test]
    fn test_timeout() {
        let mailbox = Arc::new(Mailbox::new());
        let result = caller(&mailbox).ask_with_attempts("writer", Content::new(), 3);
        assert_eq!(result["error"], "Writer timeout");
        // The unanswered request is still queued for the writer
        assert_eq!(mailbox.queue_len("writer"), 1);
    }

    #[test]
    fn test_request_reports_timeout() {
        let mailbox = Arc::new(Mailbox::new());
        let err = caller(&mailbox)
            .request("innovator", Content::new(), 2)
            .unwrap_err();
        assert!(matches!(
            err,
            GrantFlowError::Timeout { ref agent, attempts: 2 } if agent == "innovator"
        ));
    }

    #[test]
    fn test_stale_error_discarded() {
        let mailbox = Arc::new(Mailbox::new());
        mailbox.send(Message::new(
            "evaluator",
            "user",
            MessageKind::Error,
            content(json!({"original_message_id": "msg-earlier", "error": "late failure"})),
        ));
        let worker = answer(
            &mailbox,
            "evaluator",
            MessageKind::Response,
            json!({"response": {"scores": {"overall": 7}}}),
        );

        let result = caller(&mailbox).ask("evaluator", Content::new());
        worker.join().unwrap();
        assert_eq!(result["scores"]["overall"], 7);
    }

    #[test]
    fn test_unrelated_messages_discarded() {
        let mailbox = Arc::new(Mailbox::new());
        mailbox.send(Message::new(
            "supervisor",
            "user",
            MessageKind::Response,
            content(json!({"response": {"status": "acknowledged"}})),
        ));
        mailbox.send(Message::new(
            "innovator",
            "user",
            MessageKind::Response,
            content(json!({"original_message_id": "stale", "response": {"old": true}})),
        ));
        let worker = answer(
            &mailbox,
            "innovator",
            MessageKind::Response,
            json!({"response": {"commercial_potential": "HIGH"}}),
        );

        let result = caller(&mailbox).ask("innovator", Content::new());
        worker.join().unwrap();
        assert_eq!(result["commercial_potential"], "HIGH");
        assert_eq!(mailbox.queue_len("user"), 0);
    }

    #[test]
    fn test_from_config() {
        let config = PipelineConfig {
            caller: "pipeline".to_string(),
            poll_interval_ms: 5,
            max_attempts: 2,
            ..PipelineConfig::default()
        };
        let caller = Caller::from_config(Arc::new(Mailbox::new()), &config);
        assert_eq!(caller.identity(), "pipeline");
        assert_eq!(caller.poll_interval, Duration::from_millis(5));
        assert_eq!(caller.max_attempts(), 2);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("analyst"), "Analyst");
        assert_eq!(capitalize(""), "");
    }
}
