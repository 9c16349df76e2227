//! End-to-end grant proposal generation
//!
//! [`ProposalPipeline`] plays the submitter's side of the conversation: it
//! asks each role agent in turn through the shared mailbox, reconciles their
//! assessments with [`detect_conflicts`], reports disagreements to the
//! supervisor, and hands everything to the writer.
//!
//! ```no_run
//! use grantflow::config::GrantFlowConfig;
//! use grantflow::document::PlainTextReader;
//! use grantflow::llm::GroqModel;
//! use grantflow::pipeline::{build_system, ProposalPipeline};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = GrantFlowConfig::load_default()?;
//! let llm = Arc::new(GroqModel::from_config(&config.llm)?);
//! let system = build_system(&config, llm, Arc::new(PlainTextReader::new()))?;
//! system.start_all_agents()?;
//!
//! let pipeline = ProposalPipeline::from_config(system.mailbox().clone(), &config.pipeline);
//! let outcome = pipeline.generate(Path::new("paper.txt"));
//! println!("{} words", outcome.word_count());
//! # Ok::<(), grantflow::GrantFlowError>(())
//! ```

mod caller;
mod conflicts;
mod proposal;

pub use caller::Caller;
pub use conflicts::{detect_conflicts, Conflict, ConflictType, Severity};
pub use proposal::{ProposalOutcome, ProposalPipeline, Stage};

use crate::config::GrantFlowConfig;
use crate::document::DocumentReader;
use crate::llm::{LanguageModel, OfflineModel};
use crate::roles::RoleAgent;
use crate::swarm::{AgentSystem, SystemStatus};
use crate::Result;
use std::sync::Arc;

/// Agent system with the supervisor and the four role agents registered
pub fn build_system(
    config: &GrantFlowConfig,
    llm: Arc<dyn LanguageModel>,
    reader: Arc<dyn DocumentReader>,
) -> Result<AgentSystem> {
    let mut system = AgentSystem::from_config(config);

    system.register_agent(Arc::new(
        RoleAgent::analyst(Arc::clone(&llm), reader)
            .with_max_text_chars(config.pipeline.max_text_chars),
    ))?;
    system.register_agent(Arc::new(RoleAgent::evaluator(Arc::clone(&llm))))?;
    system.register_agent(Arc::new(RoleAgent::innovator(Arc::clone(&llm))))?;
    system.register_agent(Arc::new(RoleAgent::writer(llm)))?;

    Ok(system)
}

/// Start a fully registered system, snapshot its status, and stop it
///
/// Agents are built on [`OfflineModel`], so no model credentials are needed.
pub fn system_status(
    config: &GrantFlowConfig,
    reader: Arc<dyn DocumentReader>,
) -> Result<SystemStatus> {
    let system = build_system(config, Arc::new(OfflineModel), reader)?;
    system.start_all_agents()?;
    let status = system.get_system_status();
    system.stop_all_agents();
    Ok(status)
}
