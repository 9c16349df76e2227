//! Mailbox - per-agent priority queues plus a shared history log
//!
//! Every agent name owns one priority queue. Higher priorities drain first and
//! messages of equal priority drain in the order they were sent: each push is
//! stamped with a monotonic sequence number that breaks ties.
//!
//! # Example
//!
//! ```
//! use grantflow::mail::{content, Mailbox, Message, MessageKind, Priority};
//! use std::time::Duration;
//!
//! let mailbox = Mailbox::new();
//! mailbox.send(Message::new("s", "r", MessageKind::Request, content(serde_json::json!({"n": 1}))));
//! mailbox.send(
//!     Message::new("s", "r", MessageKind::Request, content(serde_json::json!({"n": 2})))
//!         .with_priority(Priority::Critical),
//! );
//!
//! let first = mailbox.receive("r", Duration::from_millis(10)).unwrap();
//! assert_eq!(first.content["n"], 2);
//! ```

use super::{Message, MessageId};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Queue entry ordered by priority, then by send order
#[derive(Debug)]
struct Queued {
    seq: u64,
    message: Message,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // BinaryHeap pops the greatest element: highest priority, then lowest seq.
    fn cmp(&self, other: &Self) -> Ordering {
        self.message
            .priority
            .cmp(&other.message.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct MailboxInner {
    queues: HashMap<String, BinaryHeap<Queued>>,
    history: VecDeque<Message>,
    next_seq: u64,
}

/// Shared message broker for every agent in a system
#[derive(Debug)]
pub struct Mailbox {
    inner: Mutex<MailboxInner>,
    arrivals: Condvar,
    history_capacity: Option<usize>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Create a mailbox with an unbounded history
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MailboxInner::default()),
            arrivals: Condvar::new(),
            history_capacity: None,
        }
    }

    /// Create a mailbox whose history keeps only the newest `capacity` messages
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            history_capacity: Some(capacity.max(1)),
            ..Self::new()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MailboxInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Enqueue a message for its recipient and record it in the history
    pub fn send(&self, message: Message) -> MessageId {
        let id = message.id.clone();
        {
            let mut inner = self.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;

            debug!(
                message_id = %id,
                sender = %message.sender,
                recipient = %message.recipient,
                kind = %message.kind,
                priority = %message.priority,
                "Message sent"
            );

            inner.history.push_back(message.clone());
            if let Some(capacity) = self.history_capacity {
                while inner.history.len() > capacity {
                    inner.history.pop_front();
                }
            }

            inner
                .queues
                .entry(message.recipient.clone())
                .or_default()
                .push(Queued { seq, message });
        }
        self.arrivals.notify_all();
        id
    }

    /// Pop the next message for `agent_name`, waiting at most `timeout`
    ///
    /// Returns `None` when nothing arrived in time. A timeout too large to
    /// express as a deadline waits until a message arrives.
    pub fn receive(&self, agent_name: &str, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.lock();

        loop {
            if let Some(queued) = inner
                .queues
                .get_mut(agent_name)
                .and_then(|queue| queue.pop())
            {
                return Some(queued.message);
            }

            inner = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.arrivals
                        .wait_timeout(inner, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0)
                }
                None => self
                    .arrivals
                    .wait(inner)
                    .unwrap_or_else(std::sync::PoisonError::into_inner),
            };
        }
    }

    /// Send an independent copy of `message` to every recipient
    pub fn broadcast<S: AsRef<str>>(&self, message: &Message, recipients: &[S]) -> Vec<MessageId> {
        recipients
            .iter()
            .map(|recipient| self.send(message.readdressed(recipient.as_ref())))
            .collect()
    }

    /// The most recent `limit` messages, oldest first
    pub fn get_history(&self, limit: usize) -> Vec<Message> {
        let inner = self.lock();
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).cloned().collect()
    }

    /// Number of messages currently retained in the history
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Discard everything pending for one agent; history is untouched
    pub fn clear_queue(&self, agent_name: &str) -> usize {
        let mut inner = self.lock();
        inner
            .queues
            .get_mut(agent_name)
            .map(|queue| {
                let dropped = queue.len();
                queue.clear();
                dropped
            })
            .unwrap_or(0)
    }

    /// Pending messages for one agent
    pub fn queue_len(&self, agent_name: &str) -> usize {
        self.lock()
            .queues
            .get(agent_name)
            .map(|queue| queue.len())
            .unwrap_or(0)
    }

    /// Pending messages across all agents
    pub fn total_pending(&self) -> usize {
        self.lock().queues.values().map(|queue| queue.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{content, MessageKind, Priority};
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    const WAIT: Duration = Duration::from_millis(50);

    fn request(recipient: &str, body: serde_json::Value) -> Message {
        Message::new("sender", recipient, MessageKind::Request, content(body))
    }

    #[test]
    fn test_send_and_receive() {
        let mailbox = Mailbox::new();
        mailbox.send(request("receiver", json!({"test": "data"})));

        let received = mailbox.receive("receiver", WAIT).unwrap();
        assert_eq!(received.sender, "sender");
        assert_eq!(received.content["test"], "data");
    }

    #[test]
    fn test_receive_times_out_on_empty_queue() {
        let mailbox = Mailbox::new();
        let started = Instant::now();
        assert!(mailbox.receive("nobody", Duration::from_millis(30)).is_none());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_zero_timeout_is_a_poll() {
        let mailbox = Mailbox::new();
        assert!(mailbox.receive("r", Duration::ZERO).is_none());
        mailbox.send(request("r", json!({})));
        assert!(mailbox.receive("r", Duration::ZERO).is_some());
    }

    #[test]
    fn test_priority_precedence() {
        let mailbox = Mailbox::new();
        mailbox.send(request("r", json!({"priority": "low"})).with_priority(Priority::Low));
        mailbox.send(request("r", json!({"priority": "critical"})).with_priority(Priority::Critical));

        let first = mailbox.receive("r", WAIT).unwrap();
        assert_eq!(first.content["priority"], "critical");
        let second = mailbox.receive("r", WAIT).unwrap();
        assert_eq!(second.content["priority"], "low");
    }

    #[test]
    fn test_fifo_within_priority() {
        let mailbox = Mailbox::new();
        for i in 0..50 {
            mailbox.send(request("r", json!({"index": i})).with_priority(Priority::High));
        }
        for i in 0..50 {
            let msg = mailbox.receive("r", WAIT).unwrap();
            assert_eq!(msg.content["index"], i);
        }
    }

    #[test]
    fn test_mixed_priorities_drain_band_by_band() {
        let mailbox = Mailbox::new();
        let plan = [
            (Priority::Low, 0),
            (Priority::High, 1),
            (Priority::Low, 2),
            (Priority::Urgent, 3),
            (Priority::High, 4),
        ];
        for (priority, index) in plan {
            mailbox.send(request("r", json!({"index": index})).with_priority(priority));
        }

        let order: Vec<i64> = (0..plan.len())
            .map(|_| mailbox.receive("r", WAIT).unwrap().content["index"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![3, 1, 4, 0, 2]);
    }

    #[test]
    fn test_each_message_delivered_once() {
        let mailbox = Mailbox::new();
        let sent: Vec<MessageId> = (0..20).map(|i| mailbox.send(request("r", json!({"i": i})))).collect();

        let mut received = Vec::new();
        while let Some(msg) = mailbox.receive("r", Duration::ZERO) {
            received.push(msg.id);
        }
        assert_eq!(received, sent);
        assert!(mailbox.receive("r", Duration::ZERO).is_none());
    }

    #[test]
    fn test_broadcast_copies_are_independent() {
        let mailbox = Mailbox::new();
        let original = request("ignored", json!({"broadcast": "message"}));
        let ids = mailbox.broadcast(&original, &["agent1", "agent2", "agent3"]);
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&original.id));

        let mut first = mailbox.receive("agent1", WAIT).unwrap();
        first.content.insert("broadcast".into(), json!("mutated"));

        for agent in ["agent2", "agent3"] {
            let received = mailbox.receive(agent, WAIT).unwrap();
            assert_eq!(received.recipient, agent);
            assert_eq!(received.content["broadcast"], "message");
        }
        assert!(mailbox.receive("ignored", Duration::ZERO).is_none());
    }

    #[test]
    fn test_history_keeps_send_order() {
        let mailbox = Mailbox::new();
        for i in 0..1000 {
            mailbox.send(request("receiver", json!({"index": i})));
        }

        let history = mailbox.get_history(1000);
        assert_eq!(history.len(), 1000);
        for (i, msg) in history.iter().enumerate() {
            assert_eq!(msg.content["index"], i);
        }

        let recent = mailbox.get_history(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content["index"], 997);
    }

    #[test]
    fn test_history_capacity_is_a_ring() {
        let mailbox = Mailbox::with_history_capacity(5);
        for i in 0..12 {
            mailbox.send(request("r", json!({"index": i})));
        }
        let history = mailbox.get_history(100);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].content["index"], 7);
        assert_eq!(mailbox.queue_len("r"), 12);
    }

    #[test]
    fn test_clear_queue_keeps_history() {
        let mailbox = Mailbox::new();
        mailbox.send(request("a", json!({})));
        mailbox.send(request("a", json!({})));
        mailbox.send(request("b", json!({})));

        assert_eq!(mailbox.total_pending(), 3);
        assert_eq!(mailbox.clear_queue("a"), 2);
        assert_eq!(mailbox.clear_queue("missing"), 0);
        assert_eq!(mailbox.queue_len("a"), 0);
        assert_eq!(mailbox.queue_len("b"), 1);
        assert_eq!(mailbox.history_len(), 3);
    }

    #[test]
    fn test_receive_wakes_on_send_from_other_thread() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                mailbox.send(request("waiting", json!({"late": true})));
            })
        };

        let msg = mailbox.receive("waiting", Duration::from_secs(5)).unwrap();
        assert_eq!(msg.content["late"], true);
        producer.join().unwrap();
    }

    #[test]
    fn test_receive_with_unbounded_timeout() {
        let mailbox = Arc::new(Mailbox::new());
        mailbox.send(request("r", json!({"n": 1})));
        let msg = mailbox.receive("r", Duration::MAX).unwrap();
        assert_eq!(msg.content["n"], 1);

        let producer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                mailbox.send(request("r", json!({"n": 2})));
            })
        };
        let msg = mailbox.receive("r", Duration::MAX).unwrap();
        assert_eq!(msg.content["n"], 2);
        producer.join().unwrap();
    }

    #[test]
    fn test_concurrent_senders_lose_nothing() {
        let mailbox = Arc::new(Mailbox::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let mailbox = Arc::clone(&mailbox);
                thread::spawn(move || {
                    for i in 0..100 {
                        mailbox.send(request("sink", json!({"thread": t, "i": i})));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(mailbox.queue_len("sink"), 400);
        let mut per_thread = [0i64; 4];
        while let Some(msg) = mailbox.receive("sink", Duration::ZERO) {
            let t = msg.content["thread"].as_u64().unwrap() as usize;
            // FIFO holds per sender because each sender's pushes are ordered
            assert_eq!(msg.content["i"].as_i64().unwrap(), per_thread[t]);
            per_thread[t] += 1;
        }
        assert_eq!(per_thread, [100; 4]);
    }
}
