//! Agent system façade
//!
//! Owns the mailbox and the supervisor, registers agents, and starts or stops
//! every worker together.

use super::agent::{Agent, AgentStatus};
use super::runtime::AgentRuntime;
use super::supervisor::{ResponseCorrelation, Supervisor, SUPERVISOR_NAME};
use crate::config::{GrantFlowConfig, RuntimeConfig};
use crate::mail::{content, Mailbox, Message, MessageId, MessageKind, Priority};
use crate::{GrantFlowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use tracing::info;

/// Sender identity used by [`AgentSystem::submit_task`]
pub const SUBMITTER: &str = "user";

/// Aggregate view of a running system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub agents: BTreeMap<String, AgentStatus>,
    pub message_queue_size: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub history_size: usize,
}

/// A mailbox, a supervisor, and the agents registered around them
#[derive(Debug)]
pub struct AgentSystem {
    config: RuntimeConfig,
    mailbox: Arc<Mailbox>,
    supervisor: Supervisor,
    agents: HashMap<String, Arc<AgentRuntime>>,
    /// Registration order, used for staggered starts
    order: Vec<String>,
}

impl AgentSystem {
    /// Create a system with its supervisor already registered
    pub fn new(config: RuntimeConfig, correlation: ResponseCorrelation) -> Self {
        let mailbox = Arc::new(match config.history_capacity {
            Some(capacity) => Mailbox::with_history_capacity(capacity),
            None => Mailbox::new(),
        });
        let supervisor = Supervisor::new(Arc::clone(&mailbox), correlation);

        let mut system = Self {
            config,
            mailbox,
            supervisor: supervisor.clone(),
            agents: HashMap::new(),
            order: Vec::new(),
        };
        system.insert(Arc::new(supervisor));

        info!(correlation = ?correlation, "Agent system initialized");
        system
    }

    /// Create a system from the runtime and supervisor sections of a config file
    pub fn from_config(config: &GrantFlowConfig) -> Self {
        Self::new(
            config.runtime.clone(),
            config.supervisor.response_correlation,
        )
    }

    fn insert(&mut self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        let runtime = AgentRuntime::new(agent, Arc::clone(&self.mailbox), &self.config);
        self.agents.insert(name.clone(), Arc::new(runtime));
        self.order.push(name);
    }

    /// Register an agent and mirror it into the supervisor's registry
    ///
    /// Names must be unique; a second agent with the same name is rejected.
    pub fn register_agent(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        let name = agent.name().to_string();
        if self.agents.contains_key(&name) {
            return Err(GrantFlowError::Agent(format!(
                "Agent '{}' is already registered",
                name
            )));
        }

        self.supervisor.register_agent(name.as_str(), agent.role());
        self.insert(agent);
        info!(agent = %name, "Agent registered");
        Ok(())
    }

    /// Start every worker in registration order, pausing briefly between them
    pub fn start_all_agents(&self) -> Result<()> {
        info!(agents = self.order.len(), "Starting all agents");
        let stagger = self.config.start_stagger();

        for (index, runtime) in self.runtimes().enumerate() {
            if index > 0 && !stagger.is_zero() {
                thread::sleep(stagger);
            }
            runtime.start()?;
        }
        Ok(())
    }

    /// Stop every worker; `false` if any missed its join timeout
    pub fn stop_all_agents(&self) -> bool {
        info!(agents = self.order.len(), "Stopping all agents");
        self.runtimes()
            .map(|runtime| runtime.stop())
            .fold(true, |all, stopped| all && stopped)
    }

    /// Send a task request to the supervisor
    pub fn submit_task(&self, task_type: &str, data: Value) -> MessageId {
        let message = Message::new(
            SUBMITTER,
            SUPERVISOR_NAME,
            MessageKind::Request,
            content(json!({ "task_type": task_type, "data": data })),
        )
        .with_priority(Priority::High);

        info!(task_type = %task_type, "Task submitted");
        self.mailbox.send(message)
    }

    pub fn get_system_status(&self) -> SystemStatus {
        SystemStatus {
            agents: self
                .runtimes()
                .map(|runtime| (runtime.name().to_string(), runtime.status()))
                .collect(),
            message_queue_size: self.mailbox.total_pending(),
            active_tasks: self.supervisor.active_task_count(),
            completed_tasks: self.supervisor.completed_task_count(),
            history_size: self.mailbox.history_len(),
        }
    }

    /// The most recent `limit` messages in their serialized form
    pub fn get_message_history(&self, limit: usize) -> Vec<Value> {
        self.mailbox
            .get_history(limit)
            .iter()
            .map(Message::to_dict)
            .collect()
    }

    pub fn agent(&self, name: &str) -> Result<&Arc<AgentRuntime>> {
        self.agents
            .get(name)
            .ok_or_else(|| GrantFlowError::AgentNotFound(name.to_string()))
    }

    /// Agent names in registration order, supervisor first
    pub fn agent_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    fn runtimes(&self) -> impl Iterator<Item = &Arc<AgentRuntime>> {
        self.order.iter().filter_map(|name| self.agents.get(name))
    }
}

impl Drop for AgentSystem {
    fn drop(&mut self) {
        self.stop_all_agents();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::Content;
    use crate::swarm::AgentState;
    use std::time::{Duration, Instant};

    struct Named(&'static str);

    impl Agent for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn role(&self) -> &str {
            "Test agent"
        }

        fn process(&self, _message: &Message) -> Result<Content> {
            Ok(content(json!({"handled_by": self.0})))
        }
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            poll_interval_ms: 10,
            start_stagger_ms: 0,
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn test_supervisor_is_preregistered() {
        let system = AgentSystem::new(config(), ResponseCorrelation::AllActive);
        assert_eq!(system.agent_names(), vec![SUPERVISOR_NAME]);
        assert!(system.agent(SUPERVISOR_NAME).is_ok());
        assert!(matches!(
            system.agent("ghost"),
            Err(GrantFlowError::AgentNotFound(name)) if name == "ghost"
        ));
        assert!(system.supervisor().registered_agents().is_empty());
    }

    #[test]
    fn test_register_mirrors_into_supervisor() {
        let mut system = AgentSystem::new(config(), ResponseCorrelation::AllActive);
        system.register_agent(Arc::new(Named("analyst"))).unwrap();

        assert_eq!(system.agent_names(), vec![SUPERVISOR_NAME, "analyst"]);
        assert_eq!(
            system.supervisor().registered_agents()["analyst"],
            "Test agent"
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut system = AgentSystem::new(config(), ResponseCorrelation::AllActive);
        system.register_agent(Arc::new(Named("analyst"))).unwrap();
        let err = system.register_agent(Arc::new(Named("analyst"))).unwrap_err();
        assert!(matches!(err, GrantFlowError::Agent(_)));

        let err = system
            .register_agent(Arc::new(Named(SUPERVISOR_NAME)))
            .unwrap_err();
        assert!(matches!(err, GrantFlowError::Agent(_)));
    }

    #[test]
    fn test_submit_task_reaches_supervisor() {
        let system = AgentSystem::new(config(), ResponseCorrelation::AllActive);
        system.start_all_agents().unwrap();
        system.submit_task("analyze_paper", json!({"paper_title": "Attention"}));

        let deadline = Instant::now() + Duration::from_secs(5);
        while system.supervisor().active_task_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        let tasks = system.supervisor().active_tasks();
        assert_eq!(tasks.len(), 1);
        let task = tasks.values().next().unwrap();
        assert_eq!(task.requester, SUBMITTER);
        assert_eq!(task.data["paper_title"], "Attention");
        assert!(system.stop_all_agents());
    }

    #[test]
    fn test_status_and_history() {
        let mut system = AgentSystem::new(config(), ResponseCorrelation::AllActive);
        system.register_agent(Arc::new(Named("writer"))).unwrap();
        system.submit_task("generate_proposal", json!({}));

        let status = system.get_system_status();
        assert_eq!(status.agents.len(), 2);
        assert_eq!(status.message_queue_size, 1);
        assert_eq!(status.history_size, 1);
        assert_eq!(status.active_tasks, 0);
        assert!(!status.agents["writer"].is_alive);

        let history = system.get_message_history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["recipient"], SUPERVISOR_NAME);
        assert_eq!(history[0]["type"], "request");
        assert_eq!(history[0]["priority"], "high");

        let json = serde_json::to_value(&status).unwrap();
        assert!(json["agents"]["supervisor"].is_object());
    }

    #[test]
    fn test_start_and_stop_all() {
        let mut system = AgentSystem::new(config(), ResponseCorrelation::AllActive);
        system.register_agent(Arc::new(Named("a"))).unwrap();
        system.register_agent(Arc::new(Named("b"))).unwrap();

        system.start_all_agents().unwrap();
        assert!(system.get_system_status().agents.values().all(|a| a.is_alive));

        assert!(system.stop_all_agents());
        for name in system.agent_names() {
            let runtime = system.agent(&name).unwrap();
            assert!(!runtime.is_alive());
            assert_eq!(runtime.state(), AgentState::Stopped);
        }
    }

    #[test]
    fn test_history_capacity_from_config() {
        let system = AgentSystem::new(
            RuntimeConfig {
                history_capacity: Some(2),
                ..config()
            },
            ResponseCorrelation::AllActive,
        );
        for _ in 0..5 {
            system.submit_task("t", json!({}));
        }
        assert_eq!(system.get_message_history(10).len(), 2);
    }
}
