//! Supervisor agent
//!
//! Tracks tasks, the agent registry, and conflict reports. It runs on its own
//! worker like any other agent; its `process` dispatches on the message kind.

use super::agent::Agent;
use super::runtime::Outbox;
use crate::mail::{content, Content, Mailbox, Message, MessageId, MessageKind, Priority};
use crate::{GrantFlowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Mailbox name of the supervisor
pub const SUPERVISOR_NAME: &str = "supervisor";

const SUPERVISOR_ROLE: &str = "Orchestrator & Workflow Manager";

/// How RESPONSE messages are attached to tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCorrelation {
    /// Every active task records the response under the sender's name
    #[default]
    AllActive,

    /// Only the task whose routed request matches `original_message_id`
    ByRequest,
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Completed,
}

/// A supervisor-tracked unit of multi-agent work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub task_type: Option<String>,
    pub requester: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_agents: Vec<String>,
    pub responses_received: HashMap<String, Value>,
    pub data: Value,
}

/// A disagreement reported by some agent, awaiting resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub reported_by: String,
    pub conflict_type: Option<String>,
    pub content: Content,
    pub status: String,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SupervisorState {
    registered_agents: HashMap<String, String>,
    active_tasks: HashMap<String, TaskRecord>,
    completed_tasks: Vec<TaskRecord>,
    conflicts: Vec<ConflictReport>,
    /// Request id -> task id for routed requests still awaiting an answer
    /// (only tracked under `ByRequest`)
    routed: HashMap<MessageId, String>,
    next_task: u64,
}

/// Task-tracking agent
///
/// Cloning yields another handle onto the same state, so the façade can keep
/// one handle while the worker thread owns another.
#[derive(Debug, Clone)]
pub struct Supervisor {
    outbox: Outbox,
    correlation: ResponseCorrelation,
    state: Arc<Mutex<SupervisorState>>,
}

impl Supervisor {
    pub fn new(mailbox: Arc<Mailbox>, correlation: ResponseCorrelation) -> Self {
        Self {
            outbox: Outbox::new(SUPERVISOR_NAME, mailbox),
            correlation,
            state: Arc::new(Mutex::new(SupervisorState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn correlation(&self) -> ResponseCorrelation {
        self.correlation
    }

    /// Add or update a routing target
    pub fn register_agent(&self, name: impl Into<String>, role: impl Into<String>) {
        let name = name.into();
        let role = role.into();
        info!(agent = %name, role = %role, "Supervisor registered agent");
        self.lock().registered_agents.insert(name, role);
    }

    /// Registered agent names mapped to their roles
    pub fn registered_agents(&self) -> HashMap<String, String> {
        self.lock().registered_agents.clone()
    }

    /// Create an active task and return its id
    pub fn open_task(&self, task_type: Option<&str>, requester: &str, data: Value) -> String {
        let mut state = self.lock();
        state.next_task += 1;
        let task_id = format!(
            "task-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            state.next_task
        );

        info!(
            task_id = %task_id,
            task_type = task_type.unwrap_or("<none>"),
            requester = %requester,
            "Task created"
        );

        state.active_tasks.insert(
            task_id.clone(),
            TaskRecord {
                task_id: task_id.clone(),
                task_type: task_type.map(String::from),
                requester: requester.to_string(),
                status: TaskStatus::Active,
                started_at: Utc::now(),
                completed_at: None,
                assigned_agents: Vec::new(),
                responses_received: HashMap::new(),
                data,
            },
        );
        task_id
    }

    /// Send `action` to every registered agent in `agent_names`
    ///
    /// Unregistered names are skipped with a warning. Returns the names that
    /// were actually sent a request.
    pub fn route_task_to_agents<S: AsRef<str>>(
        &self,
        task_id: &str,
        agent_names: &[S],
        action: &str,
        data: Value,
    ) -> Result<Vec<String>> {
        let mut state = self.lock();
        if !state.active_tasks.contains_key(task_id) {
            return Err(GrantFlowError::TaskNotFound(task_id.to_string()));
        }

        let mut routed = Vec::new();
        for name in agent_names {
            let name = name.as_ref();
            if !state.registered_agents.contains_key(name) {
                warn!(task_id = %task_id, agent = %name, "Agent not registered, skipping");
                continue;
            }

            let request_id = self.outbox.send_message(
                name,
                MessageKind::Request,
                content(json!({
                    "task_id": task_id,
                    "action": action,
                    "data": data,
                })),
                Priority::High,
                true,
            );
            if self.correlation == ResponseCorrelation::ByRequest {
                state.routed.insert(request_id, task_id.to_string());
            }
            routed.push(name.to_string());
        }

        if let Some(task) = state.active_tasks.get_mut(task_id) {
            task.assigned_agents.extend(routed.iter().cloned());
        }

        info!(task_id = %task_id, agents = routed.len(), action = %action, "Task routed");
        Ok(routed)
    }

    /// Move a task from the active set to the completed list
    pub fn complete_task(&self, task_id: &str) -> Result<TaskRecord> {
        let mut state = self.lock();
        let mut task = state
            .active_tasks
            .remove(task_id)
            .ok_or_else(|| GrantFlowError::TaskNotFound(task_id.to_string()))?;

        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        state.routed.retain(|_, routed_task| routed_task.as_str() != task_id);
        state.completed_tasks.push(task.clone());

        info!(task_id = %task_id, "Task completed");
        Ok(task)
    }

    pub fn active_task(&self, task_id: &str) -> Option<TaskRecord> {
        self.lock().active_tasks.get(task_id).cloned()
    }

    pub fn active_tasks(&self) -> HashMap<String, TaskRecord> {
        self.lock().active_tasks.clone()
    }

    pub fn completed_tasks(&self) -> Vec<TaskRecord> {
        self.lock().completed_tasks.clone()
    }

    pub fn active_task_count(&self) -> usize {
        self.lock().active_tasks.len()
    }

    pub fn completed_task_count(&self) -> usize {
        self.lock().completed_tasks.len()
    }

    pub fn conflicts(&self) -> Vec<ConflictReport> {
        self.lock().conflicts.clone()
    }

    fn handle_request(&self, message: &Message) -> Content {
        let data = message.content.get("data").cloned().unwrap_or_else(|| json!({}));
        let task_id = self.open_task(message.content_str("task_type"), &message.sender, data);

        content(json!({
            "status": "acknowledged",
            "task_id": task_id,
            "message": "Task queued for processing",
        }))
    }

    fn handle_response(&self, message: &Message) -> Content {
        let response = message.content.get("response").cloned().unwrap_or(Value::Null);
        let mut state = self.lock();

        let updated = match self.correlation {
            ResponseCorrelation::AllActive => {
                for task in state.active_tasks.values_mut() {
                    task.responses_received
                        .insert(message.sender.clone(), response.clone());
                }
                state.active_tasks.len()
            }
            ResponseCorrelation::ByRequest => {
                let task_id = message
                    .content_str("original_message_id")
                    .and_then(|id| state.routed.remove(&MessageId::from_string(id)));

                let task = match task_id {
                    Some(id) => state.active_tasks.get_mut(&id),
                    None => None,
                };
                match task {
                    Some(task) => {
                        task.responses_received
                            .insert(message.sender.clone(), response);
                        1
                    }
                    None => {
                        warn!(
                            sender = %message.sender,
                            message_id = %message.id,
                            "Response does not match any active routed request"
                        );
                        0
                    }
                }
            }
        };

        debug!(sender = %message.sender, tasks = updated, "Supervisor logged response");
        content(json!({ "status": "response_logged", "tasks_updated": updated }))
    }

    fn handle_conflict(&self, message: &Message) -> Content {
        let conflict_type = message.content_str("conflict_type").map(String::from);
        warn!(
            reported_by = %message.sender,
            conflict_type = conflict_type.as_deref().unwrap_or("<unspecified>"),
            "Conflict reported"
        );

        self.lock().conflicts.push(ConflictReport {
            reported_by: message.sender.clone(),
            conflict_type: conflict_type.clone(),
            content: message.content.clone(),
            status: "pending".to_string(),
            reported_at: Utc::now(),
        });

        content(json!({
            "status": "conflict_acknowledged",
            "resolution": "pending",
            "conflict_type": conflict_type,
        }))
    }

    fn handle_error(&self, message: &Message) -> Content {
        let error = message.content.get("error").cloned().unwrap_or(Value::Null);
        warn!(agent = %message.sender, error = %error, "Error reported to supervisor");

        // A failed routed request will never get a response
        if let Some(original) = message.content_str("original_message_id") {
            self.lock().routed.remove(&MessageId::from_string(original));
        }

        content(json!({
            "status": "error_logged",
            "agent": message.sender,
            "error": error,
        }))
    }
}

impl Agent for Supervisor {
    fn name(&self) -> &str {
        SUPERVISOR_NAME
    }

    fn role(&self) -> &str {
        SUPERVISOR_ROLE
    }

    fn process(&self, message: &Message) -> Result<Content> {
        Ok(match message.kind {
            MessageKind::Request => self.handle_request(message),
            MessageKind::Response => self.handle_response(message),
            MessageKind::Conflict => self.handle_conflict(message),
            MessageKind::Error => self.handle_error(message),
            MessageKind::Query | MessageKind::Acknowledgment => {
                content(json!({ "status": "unknown_message_type" }))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn supervisor(correlation: ResponseCorrelation) -> (Arc<Mailbox>, Supervisor) {
        let mailbox = Arc::new(Mailbox::new());
        let supervisor = Supervisor::new(Arc::clone(&mailbox), correlation);
        (mailbox, supervisor)
    }

    fn request(task_type: &str) -> Message {
        Message::new(
            "user",
            SUPERVISOR_NAME,
            MessageKind::Request,
            content(json!({"task_type": task_type, "data": {}})),
        )
    }

    fn response_to(request_id: &MessageId, sender: &str, body: Value) -> Message {
        Message::new(
            sender,
            SUPERVISOR_NAME,
            MessageKind::Response,
            content(json!({"original_message_id": request_id, "response": body})),
        )
    }

    #[test]
    fn test_request_creates_active_task() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        let result = supervisor.process(&request("analyze_paper")).unwrap();

        assert_eq!(result["status"], "acknowledged");
        let task_id = result["task_id"].as_str().unwrap();
        let task = supervisor.active_task(task_id).unwrap();
        assert_eq!(task.task_type.as_deref(), Some("analyze_paper"));
        assert_eq!(task.requester, "user");
        assert_eq!(task.status, TaskStatus::Active);
        assert!(task.assigned_agents.is_empty());
        assert!(task.responses_received.is_empty());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_task_ids_are_unique() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        let a = supervisor.open_task(None, "user", json!({}));
        let b = supervisor.open_task(None, "user", json!({}));
        assert_ne!(a, b);
        assert!(a.starts_with("task-"));
        assert_eq!(supervisor.active_task_count(), 2);
    }

    #[test]
    fn test_route_skips_unregistered_agents() {
        let (mailbox, supervisor) = supervisor(ResponseCorrelation::AllActive);
        supervisor.register_agent("analyst", "Paper Analyst");
        let task_id = supervisor.open_task(Some("analyze_paper"), "user", json!({}));

        let routed = supervisor
            .route_task_to_agents(&task_id, &["analyst", "ghost"], "analyze", json!({"p": 1}))
            .unwrap();
        assert_eq!(routed, vec!["analyst"]);
        assert_eq!(
            supervisor.active_task(&task_id).unwrap().assigned_agents,
            vec!["analyst"]
        );

        let sent = mailbox.receive("analyst", Duration::ZERO).unwrap();
        assert_eq!(sent.sender, SUPERVISOR_NAME);
        assert_eq!(sent.kind, MessageKind::Request);
        assert_eq!(sent.priority, Priority::High);
        assert!(sent.requires_response);
        assert_eq!(sent.content["task_id"], task_id.as_str());
        assert_eq!(sent.content["action"], "analyze");
        assert_eq!(sent.content["data"], json!({"p": 1}));
        assert_eq!(mailbox.queue_len("ghost"), 0);
    }

    #[test]
    fn test_route_unknown_task_fails() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        let result = supervisor.route_task_to_agents("task-missing", &["a"], "x", json!({}));
        assert!(matches!(result, Err(GrantFlowError::TaskNotFound(_))));
    }

    #[test]
    fn test_all_active_correlation_attaches_to_every_task() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        let first = supervisor.open_task(None, "user", json!({}));
        let second = supervisor.open_task(None, "user", json!({}));

        let unrelated = MessageId::new();
        let result = supervisor
            .process(&response_to(&unrelated, "analyst", json!({"score": 7})))
            .unwrap();
        assert_eq!(result["status"], "response_logged");

        for task_id in [&first, &second] {
            let task = supervisor.active_task(task_id).unwrap();
            assert_eq!(task.responses_received["analyst"], json!({"score": 7}));
        }
    }

    #[test]
    fn test_by_request_correlation_targets_one_task() {
        let (mailbox, supervisor) = supervisor(ResponseCorrelation::ByRequest);
        supervisor.register_agent("analyst", "Paper Analyst");
        let first = supervisor.open_task(None, "user", json!({}));
        let second = supervisor.open_task(None, "user", json!({}));

        supervisor
            .route_task_to_agents(&second, &["analyst"], "analyze", json!({}))
            .unwrap();
        let routed = mailbox.receive("analyst", Duration::ZERO).unwrap();

        supervisor
            .process(&response_to(&routed.id, "analyst", json!("done")))
            .unwrap();
        supervisor
            .process(&response_to(&MessageId::new(), "analyst", json!("stray")))
            .unwrap();

        assert!(supervisor.active_task(&first).unwrap().responses_received.is_empty());
        assert_eq!(
            supervisor.active_task(&second).unwrap().responses_received["analyst"],
            json!("done")
        );
    }

    #[test]
    fn test_routed_requests_are_forgotten_once_settled() {
        let (mailbox, supervisor) = supervisor(ResponseCorrelation::ByRequest);
        supervisor.register_agent("analyst", "Paper Analyst");
        supervisor.register_agent("evaluator", "Quality Evaluator");

        let answered = supervisor.open_task(None, "user", json!({}));
        supervisor
            .route_task_to_agents(&answered, &["analyst", "evaluator"], "analyze", json!({}))
            .unwrap();
        assert_eq!(supervisor.lock().routed.len(), 2);

        let to_analyst = mailbox.receive("analyst", Duration::ZERO).unwrap();
        supervisor
            .process(&response_to(&to_analyst.id, "analyst", json!("done")))
            .unwrap();
        let to_evaluator = mailbox.receive("evaluator", Duration::ZERO).unwrap();
        supervisor
            .process(&Message::new(
                "evaluator",
                SUPERVISOR_NAME,
                MessageKind::Error,
                content(json!({"error": "boom", "original_message_id": to_evaluator.id})),
            ))
            .unwrap();
        assert!(supervisor.lock().routed.is_empty());

        let abandoned = supervisor.open_task(None, "user", json!({}));
        supervisor
            .route_task_to_agents(&abandoned, &["analyst"], "analyze", json!({}))
            .unwrap();
        assert_eq!(supervisor.lock().routed.len(), 1);
        supervisor.complete_task(&abandoned).unwrap();
        assert!(supervisor.lock().routed.is_empty());
    }

    #[test]
    fn test_all_active_does_not_track_routes() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        supervisor.register_agent("analyst", "Paper Analyst");
        let task_id = supervisor.open_task(None, "user", json!({}));
        supervisor
            .route_task_to_agents(&task_id, &["analyst"], "analyze", json!({}))
            .unwrap();
        assert!(supervisor.lock().routed.is_empty());
    }

    #[test]
    fn test_complete_task() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        let task_id = supervisor.open_task(None, "user", json!({}));

        let done = supervisor.complete_task(&task_id).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(supervisor.active_task_count(), 0);
        assert_eq!(supervisor.completed_tasks(), vec![done]);

        assert!(matches!(
            supervisor.complete_task(&task_id),
            Err(GrantFlowError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_conflict_is_recorded_as_pending() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        let msg = Message::new(
            "pipeline",
            SUPERVISOR_NAME,
            MessageKind::Conflict,
            content(json!({"conflict_type": "novelty_disagreement", "severity": "HIGH"})),
        );

        let result = supervisor.process(&msg).unwrap();
        assert_eq!(result["status"], "conflict_acknowledged");
        assert_eq!(result["resolution"], "pending");
        assert_eq!(result["conflict_type"], "novelty_disagreement");

        let conflicts = supervisor.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].reported_by, "pipeline");
        assert_eq!(conflicts[0].status, "pending");
        assert_eq!(conflicts[0].content["severity"], "HIGH");
    }

    #[test]
    fn test_error_and_unknown_kinds() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        let err = Message::new(
            "writer",
            SUPERVISOR_NAME,
            MessageKind::Error,
            content(json!({"error": "boom"})),
        );
        let result = supervisor.process(&err).unwrap();
        assert_eq!(result["status"], "error_logged");
        assert_eq!(result["agent"], "writer");
        assert_eq!(result["error"], "boom");

        let query = Message::new("x", SUPERVISOR_NAME, MessageKind::Query, Content::new());
        let result = supervisor.process(&query).unwrap();
        assert_eq!(result["status"], "unknown_message_type");
    }

    #[test]
    fn test_register_agent_is_upsert() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        supervisor.register_agent("analyst", "old role");
        supervisor.register_agent("analyst", "new role");
        let agents = supervisor.registered_agents();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents["analyst"], "new role");
    }

    #[test]
    fn test_clones_share_state() {
        let (_, supervisor) = supervisor(ResponseCorrelation::AllActive);
        let handle = supervisor.clone();
        handle.process(&request("generate_proposal")).unwrap();
        assert_eq!(supervisor.active_task_count(), 1);
    }
}
