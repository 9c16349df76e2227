//! Multi-agent runtime
//!
//! Thread-per-agent workers pulling from a shared priority mailbox, with a
//! supervisor that tracks tasks and a façade that owns the whole assembly.
//!
//! # Overview
//!
//! - **Agent**: the `process(message) -> content` contract each role implements
//! - **AgentRuntime**: dedicated worker thread, state machine, processing history
//! - **Supervisor**: task records, agent registry, conflict reports
//! - **AgentSystem**: registers, starts and stops agents; submits tasks
//!
//! # Example
//!
//! ```no_run
//! use grantflow::config::RuntimeConfig;
//! use grantflow::swarm::{AgentSystem, ResponseCorrelation};
//!
//! let system = AgentSystem::new(RuntimeConfig::default(), ResponseCorrelation::AllActive);
//! system.start_all_agents()?;
//!
//! system.submit_task("analyze_paper", serde_json::json!({"paper_title": "Attention"}));
//!
//! let status = system.get_system_status();
//! println!("{} active tasks", status.active_tasks);
//!
//! system.stop_all_agents();
//! # Ok::<(), grantflow::GrantFlowError>(())
//! ```

mod agent;
mod runtime;
mod supervisor;
mod system;

pub use agent::{Agent, AgentState, AgentStatus, ProcessingRecord};
pub use runtime::{AgentRuntime, Outbox};
pub use supervisor::{
    ConflictReport, ResponseCorrelation, Supervisor, TaskRecord, TaskStatus, SUPERVISOR_NAME,
};
pub use system::{AgentSystem, SystemStatus, SUBMITTER};
