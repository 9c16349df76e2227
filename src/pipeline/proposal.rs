//! Paper-to-proposal workflow

use super::caller::Caller;
use super::conflicts::{detect_conflicts, Conflict, Severity};
use crate::config::PipelineConfig;
use crate::mail::{content, Content, Mailbox, Message, MessageKind, Priority};
use crate::roles::Role;
use crate::swarm::SUPERVISOR_NAME;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Workflow step, each served by one role agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysis,
    Evaluation,
    Innovation,
    Proposal,
}

impl Stage {
    pub fn role(&self) -> Role {
        match self {
            Stage::Analysis => Role::Analyst,
            Stage::Evaluation => Role::Evaluator,
            Stage::Innovation => Role::Innovator,
            Stage::Proposal => Role::Writer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analysis => "Analysis",
            Stage::Evaluation => "Evaluation",
            Stage::Innovation => "Innovation",
            Stage::Proposal => "Proposal",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the workflow produced, up to the first failed stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalOutcome {
    pub paper_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub innovations: Option<Content>,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payload of the failed stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Content>,
    pub success: bool,
}

impl ProposalOutcome {
    pub fn word_count(&self) -> u64 {
        self.proposal
            .as_ref()
            .and_then(|p| p.get("word_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn full_text(&self) -> Option<&str> {
        self.proposal
            .as_ref()
            .and_then(|p| p.get("full_text"))
            .and_then(Value::as_str)
    }
}

/// Drives the four role agents through the mailbox
#[derive(Debug, Clone)]
pub struct ProposalPipeline {
    caller: Caller,
    writer_max_attempts: u32,
}

impl ProposalPipeline {
    pub fn new(caller: Caller, writer_max_attempts: u32) -> Self {
        Self {
            caller,
            writer_max_attempts,
        }
    }

    pub fn from_config(mailbox: Arc<Mailbox>, config: &PipelineConfig) -> Self {
        Self::new(
            Caller::from_config(mailbox, config),
            config.writer_max_attempts,
        )
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Analyse, evaluate, innovate, reconcile, write
    ///
    /// The first stage whose result carries an `error` field stops the run.
    pub fn generate(&self, paper_path: &Path) -> ProposalOutcome {
        let mut outcome = ProposalOutcome {
            paper_path: paper_path.to_path_buf(),
            ..ProposalOutcome::default()
        };
        info!(paper = %paper_path.display(), "Generating grant proposal");

        let Some(analysis) = self.run_stage(
            &mut outcome,
            Stage::Analysis,
            json!({ "paper_path": paper_path.display().to_string() }),
        ) else {
            return outcome;
        };
        let title = analysis
            .get("title")
            .and_then(|title| title.as_str())
            .unwrap_or("N/A");
        info!(title, "Analysis complete");
        outcome.analysis = Some(analysis.clone());

        let Some(evaluation) = self.run_stage(
            &mut outcome,
            Stage::Evaluation,
            json!({ "analysis": analysis }),
        ) else {
            return outcome;
        };
        outcome.evaluation = Some(evaluation.clone());

        let Some(innovations) = self.run_stage(
            &mut outcome,
            Stage::Innovation,
            json!({ "analysis": analysis, "evaluation": evaluation }),
        ) else {
            return outcome;
        };
        outcome.innovations = Some(innovations.clone());

        let conflicts = detect_conflicts(
            &Value::Object(analysis.clone()),
            &Value::Object(evaluation.clone()),
            &Value::Object(innovations.clone()),
        );
        for conflict in &conflicts {
            warn!(kind = %conflict.conflict_type, description = %conflict.description, "Agents disagree");
            self.report_conflict(conflict);
        }
        outcome.conflicts = conflicts;

        let inputs = json!({
            "analysis": analysis,
            "evaluation": evaluation,
            "innovations": innovations,
            "conflicts": outcome.conflicts,
        });
        let Some(proposal) = self.run_stage(&mut outcome, Stage::Proposal, inputs) else {
            return outcome;
        };
        outcome.proposal = Some(proposal);
        outcome.success = true;

        info!(words = outcome.word_count(), conflicts = outcome.conflicts.len(), "Proposal complete");
        outcome
    }

    fn run_stage(&self, outcome: &mut ProposalOutcome, stage: Stage, inputs: Value) -> Option<Content> {
        let role = stage.role();
        let mut request = content(inputs);
        request.insert("action".into(), json!(role.action()));

        let attempts = match stage {
            Stage::Proposal => self.writer_max_attempts,
            _ => self.caller.max_attempts(),
        };
        let result = self
            .caller
            .ask_with_attempts(role.agent_name(), request, attempts);

        if let Some(error) = result.get("error") {
            warn!(stage = %stage, error = %error, "Stage failed");
            outcome.failed_stage = Some(stage);
            outcome.error = Some(format!("{stage} failed"));
            outcome.details = Some(result);
            return None;
        }
        Some(result)
    }

    fn report_conflict(&self, conflict: &Conflict) {
        let priority = match conflict.severity {
            Severity::Low => Priority::Low,
            Severity::Medium => Priority::Medium,
            Severity::High => Priority::High,
        };
        let report = Message::new(
            self.caller.identity(),
            SUPERVISOR_NAME,
            MessageKind::Conflict,
            content(json!({
                "conflict_type": conflict.conflict_type,
                "description": conflict.description,
                "agents": conflict.agents,
                "severity": conflict.severity,
                "resolution": conflict.resolution,
            })),
        )
        .with_priority(priority);
        self.caller.mailbox().send(report);
    }
}
