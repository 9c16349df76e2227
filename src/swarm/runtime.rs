//! Agent runtime - one worker thread per agent
//!
//! [`AgentRuntime`] owns the worker thread for one [`Agent`]. The worker pulls
//! from the agent's inbox with a bounded wait, runs `process`, and mails the
//! outcome back to the sender when asked to. Failures (including panics) are
//! turned into ERROR messages; the worker never dies because of a message.

use super::agent::{truncate_chars, Agent, AgentState, AgentStatus, ProcessingRecord};
use crate::config::RuntimeConfig;
use crate::mail::{content, Content, Mailbox, Message, MessageId, MessageKind, Priority};
use crate::GrantFlowError;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const RESULT_SUMMARY_CHARS: usize = 100;
const ERROR_SUMMARY_CHARS: usize = 200;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Agent-scoped sender
///
/// Stamps every message with the owning agent's name.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: String,
    mailbox: Arc<Mailbox>,
}

impl Outbox {
    pub fn new(sender: impl Into<String>, mailbox: Arc<Mailbox>) -> Self {
        Self {
            sender: sender.into(),
            mailbox,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    /// Send a message from this agent
    pub fn send_message(
        &self,
        recipient: &str,
        kind: MessageKind,
        content: Content,
        priority: Priority,
        requires_response: bool,
    ) -> MessageId {
        let mut message =
            Message::new(self.sender.as_str(), recipient, kind, content).with_priority(priority);
        message.requires_response = requires_response;
        self.mailbox.send(message)
    }

    /// Reply to `original` with a RESPONSE at the original's priority
    pub fn send_response(&self, original: &Message, result: Content) -> MessageId {
        self.send_message(
            &original.sender,
            MessageKind::Response,
            content(json!({
                "original_message_id": original.id,
                "response": result,
            })),
            original.priority,
            false,
        )
    }

    /// Report a failure on `original` back to its sender at HIGH priority
    pub fn send_error(&self, original: &Message, description: &str) -> MessageId {
        self.send_message(
            &original.sender,
            MessageKind::Error,
            content(json!({
                "original_message_id": original.id,
                "error": description,
            })),
            Priority::High,
            false,
        )
    }
}

/// Observable state shared between the runtime handle and its worker
#[derive(Debug)]
struct Ledger {
    state: AgentState,
    history: VecDeque<ProcessingRecord>,
    history_limit: usize,
    messages_processed: u64,
    error_count: u64,
    last_activity: Option<DateTime<Utc>>,
    /// Bumped on every start so a late-exiting old worker cannot mark a new one stopped
    generation: u64,
}

impl Ledger {
    fn new(history_limit: usize) -> Self {
        Self {
            state: AgentState::Idle,
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
            messages_processed: 0,
            error_count: 0,
            last_activity: None,
            generation: 0,
        }
    }

    fn record(&mut self, record: ProcessingRecord) {
        self.messages_processed += 1;
        self.history.push_back(record);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
}

/// Runs one agent on a dedicated thread
pub struct AgentRuntime {
    agent: Arc<dyn Agent>,
    outbox: Outbox,
    ledger: Arc<Mutex<Ledger>>,
    poll_interval: Duration,
    join_timeout: Duration,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("name", &self.agent.name())
            .field("role", &self.agent.role())
            .field("state", &self.state())
            .finish()
    }
}

impl AgentRuntime {
    pub fn new(agent: Arc<dyn Agent>, mailbox: Arc<Mailbox>, config: &RuntimeConfig) -> Self {
        let outbox = Outbox::new(agent.name(), mailbox);
        Self {
            agent,
            outbox,
            ledger: Arc::new(Mutex::new(Ledger::new(config.processing_history_limit))),
            poll_interval: config.poll_interval(),
            join_timeout: config.join_timeout(),
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    pub fn role(&self) -> &str {
        self.agent.role()
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Spawn the worker thread
    ///
    /// A no-op while a worker is already running. After `stop()` this spawns a
    /// fresh thread that continues with the same counters and history. If the
    /// previous worker missed its stop deadline, this first waits for it to
    /// finish its current message so the inbox never has two consumers.
    pub fn start(&self) -> crate::Result<()> {
        let mut slot = lock(&self.worker);

        if let Some(worker) = slot.take() {
            if !worker.handle.is_finished() && !worker.stop.load(Ordering::SeqCst) {
                debug!(agent = %self.name(), "Agent already running");
                *slot = Some(worker);
                return Ok(());
            }
            if !worker.handle.is_finished() {
                info!(agent = %self.name(), "Waiting for the previous worker to exit");
            }
            if worker.handle.join().is_err() {
                warn!(agent = %self.name(), "Agent worker thread panicked");
            }
        }

        let generation = {
            let mut ledger = lock(&self.ledger);
            ledger.generation += 1;
            ledger.state = AgentState::Idle;
            ledger.generation
        };

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();
        let worker_loop = WorkerLoop {
            agent: Arc::clone(&self.agent),
            outbox: self.outbox.clone(),
            ledger: Arc::clone(&self.ledger),
            stop: Arc::clone(&stop),
            poll_interval: self.poll_interval,
            generation,
        };

        let handle = thread::Builder::new()
            .name(format!("agent-{}", self.name()))
            .spawn(move || {
                worker_loop.run();
                let _ = done_tx.send(());
            })?;

        *slot = Some(Worker {
            handle,
            stop,
            done: done_rx,
        });

        info!(agent = %self.name(), role = %self.role(), "Agent started");
        Ok(())
    }

    /// Ask the worker to exit and wait up to the join timeout
    ///
    /// Returns `false` if the worker was still busy when the timeout expired.
    /// It then stays registered (and `is_alive`) until it finishes its current
    /// message and exits on its own; calling `stop` again waits once more.
    pub fn stop(&self) -> bool {
        let mut slot = lock(&self.worker);
        let Some(worker) = slot.as_ref() else {
            return true;
        };

        debug!(agent = %self.name(), "Stopping agent");
        worker.stop.store(true, Ordering::SeqCst);

        match worker.done.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(worker) = slot.take() {
                    if worker.handle.join().is_err() {
                        warn!(agent = %self.name(), "Agent worker thread panicked");
                    }
                }
                info!(agent = %self.name(), "Agent stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    agent = %self.name(),
                    timeout_ms = self.join_timeout.as_millis() as u64,
                    "Agent did not stop within the join timeout"
                );
                false
            }
        }
    }

    /// Whether a worker thread is currently running
    pub fn is_alive(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .map(|worker| !worker.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn state(&self) -> AgentState {
        lock(&self.ledger).state
    }

    pub fn error_count(&self) -> u64 {
        lock(&self.ledger).error_count
    }

    pub fn messages_processed(&self) -> u64 {
        lock(&self.ledger).messages_processed
    }

    /// Most recent processing records, oldest first
    pub fn processing_history(&self) -> Vec<ProcessingRecord> {
        lock(&self.ledger).history.iter().cloned().collect()
    }

    pub fn status(&self) -> AgentStatus {
        let is_alive = self.is_alive();
        let ledger = lock(&self.ledger);
        AgentStatus {
            name: self.name().to_string(),
            role: self.role().to_string(),
            state: ledger.state,
            messages_processed: ledger.messages_processed,
            error_count: ledger.error_count,
            is_alive,
            pending_messages: self.outbox.mailbox().queue_len(self.name()),
            last_activity: ledger.last_activity,
        }
    }
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.worker).as_ref() {
            worker.stop.store(true, Ordering::SeqCst);
        }
    }
}

struct WorkerLoop {
    agent: Arc<dyn Agent>,
    outbox: Outbox,
    ledger: Arc<Mutex<Ledger>>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    generation: u64,
}

impl WorkerLoop {
    fn run(self) {
        let name = self.agent.name().to_string();
        debug!(agent = %name, "Worker loop running");

        while !self.stop.load(Ordering::SeqCst) {
            if let Some(message) = self.outbox.mailbox().receive(&name, self.poll_interval) {
                self.handle(message);
            }
        }

        let mut ledger = lock(&self.ledger);
        if ledger.generation == self.generation {
            ledger.state = AgentState::Stopped;
        }
        debug!(agent = %name, "Worker loop exited");
    }

    fn handle(&self, message: Message) {
        {
            let mut ledger = lock(&self.ledger);
            ledger.state = AgentState::Processing;
            ledger.last_activity = Some(Utc::now());
        }

        debug!(
            agent = %self.agent.name(),
            message_id = %message.id,
            sender = %message.sender,
            kind = %message.kind,
            "Processing message"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.agent.process(&message)))
            .unwrap_or_else(|payload| {
                let reason = panic_reason(payload.as_ref());
                error!(
                    agent = %self.agent.name(),
                    message_id = %message.id,
                    reason = %reason,
                    "Agent panicked while processing message"
                );
                Err(GrantFlowError::Agent(format!(
                    "panic while processing message: {}",
                    reason
                )))
            });

        match outcome {
            Ok(result) => {
                let summary = serde_json::to_string(&result).unwrap_or_default();
                lock(&self.ledger).record(ProcessingRecord::new(
                    &message,
                    true,
                    truncate_chars(&summary, RESULT_SUMMARY_CHARS),
                ));
                if message.requires_response {
                    self.outbox.send_response(&message, result);
                }
            }
            Err(err) => {
                let description = err.to_string();
                warn!(
                    agent = %self.agent.name(),
                    message_id = %message.id,
                    error = %description,
                    "Failed to process message"
                );
                {
                    let mut ledger = lock(&self.ledger);
                    ledger.error_count += 1;
                    ledger.state = AgentState::Error;
                    ledger.record(ProcessingRecord::new(
                        &message,
                        false,
                        truncate_chars(&description, ERROR_SUMMARY_CHARS),
                    ));
                }
                self.outbox.send_error(&message, &description);
            }
        }

        lock(&self.ledger).state = AgentState::Idle;
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
