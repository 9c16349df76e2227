//! Role agents for the grant-proposal workflow
//!
//! The four roles share one [`RoleAgent`] implementation and differ only in
//! the row they read from the role table:
//!
//! | Role | Agent | Action | Inputs |
//! |------|-------|--------|--------|
//! | Analyst | `analyst` | `analyze` | `paper_path` |
//! | Evaluator | `evaluator` | `evaluate` | `analysis` |
//! | Innovator | `innovator` | `innovate` | `analysis`, optional `evaluation` |
//! | Writer | `writer` | `write_proposal` | `analysis`, `evaluation`, `innovations`, optional `conflicts` |
//!
//! Every outcome is reported as content: an unknown action or missing input
//! yields `{"error": ...}`, and a model failure yields the role's fallback
//! payload with an `error` field.

mod fallback;
mod prompts;
mod writer;

use crate::document::DocumentReader;
use crate::llm::LanguageModel;
use crate::mail::{content, Content, Message};
use crate::swarm::Agent;
use crate::{GrantFlowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Default cap on paper text sent to the analyst prompt
pub const DEFAULT_MAX_TEXT_CHARS: usize = 10_000;

/// Sampling parameters for a role's single structured generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// One row of the role table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleSpec {
    pub agent_name: &'static str,
    pub description: &'static str,
    pub action: &'static str,
    /// `None` for the writer, which samples per section
    pub sampling: Option<Sampling>,
}

static ROLE_TABLE: [RoleSpec; 4] = [
    RoleSpec {
        agent_name: "analyst",
        description: "Paper Analysis & Information Extraction",
        action: "analyze",
        sampling: Some(Sampling {
            max_tokens: 2000,
            temperature: 0.3,
        }),
    },
    RoleSpec {
        agent_name: "evaluator",
        description: "Paper Quality Assessment & Review",
        action: "evaluate",
        sampling: Some(Sampling {
            max_tokens: 2000,
            temperature: 0.4,
        }),
    },
    RoleSpec {
        agent_name: "innovator",
        description: "Creative Research Extension & Future Directions",
        action: "innovate",
        sampling: Some(Sampling {
            max_tokens: 3000,
            temperature: 0.8,
        }),
    },
    RoleSpec {
        agent_name: "writer",
        description: "Grant Proposal Synthesis & Document Generation",
        action: "write_proposal",
        sampling: None,
    },
];

/// Workflow role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Analyst,
    Evaluator,
    Innovator,
    Writer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Analyst, Role::Evaluator, Role::Innovator, Role::Writer];

    pub fn spec(&self) -> &'static RoleSpec {
        &ROLE_TABLE[*self as usize]
    }

    pub fn agent_name(&self) -> &'static str {
        self.spec().agent_name
    }

    pub fn action(&self) -> &'static str {
        self.spec().action
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

fn error_content(message: impl fmt::Display) -> Content {
    content(json!({ "error": message.to_string() }))
}

/// Field of the message content, treating null and empty values as absent
fn input<'a>(message: &'a Message, key: &str) -> Option<&'a Value> {
    message.content.get(key).filter(|value| match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn into_content(value: Value) -> Result<Content> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(GrantFlowError::LlmOutput(format!(
            "expected a JSON object, got {}",
            prompts::pretty(&other).chars().take(200).collect::<String>()
        ))),
    }
}

/// Agent that performs one workflow role
pub struct RoleAgent {
    role: Role,
    llm: Arc<dyn LanguageModel>,
    reader: Option<Arc<dyn DocumentReader>>,
    max_text_chars: usize,
}

impl RoleAgent {
    pub fn new(role: Role, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            role,
            llm,
            reader: None,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
        }
    }

    pub fn analyst(llm: Arc<dyn LanguageModel>, reader: Arc<dyn DocumentReader>) -> Self {
        Self::new(Role::Analyst, llm).with_reader(reader)
    }

    pub fn evaluator(llm: Arc<dyn LanguageModel>) -> Self {
        Self::new(Role::Evaluator, llm)
    }

    pub fn innovator(llm: Arc<dyn LanguageModel>) -> Self {
        Self::new(Role::Innovator, llm)
    }

    pub fn writer(llm: Arc<dyn LanguageModel>) -> Self {
        Self::new(Role::Writer, llm)
    }

    pub fn with_reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_max_text_chars(mut self, max_text_chars: usize) -> Self {
        self.max_text_chars = max_text_chars;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    fn structured(&self, prompt: &str, schema: &Value) -> Result<Content> {
        let sampling = self.role.spec().sampling.unwrap_or(Sampling {
            max_tokens: 2000,
            temperature: 0.5,
        });
        self.llm
            .generate_structured(prompt, schema, sampling.max_tokens, sampling.temperature)
            .and_then(into_content)
    }

    fn analyze(&self, message: &Message) -> Content {
        let Some(path) = message.content_str("paper_path").filter(|p| !p.is_empty()) else {
            return error_content("No paper_path provided");
        };
        let Some(reader) = &self.reader else {
            return error_content("No document reader configured");
        };

        let path = Path::new(path);
        let extracted = reader
            .get_paper_info(path)
            .and_then(|info| reader.extract_text(path, None).map(|text| (info, text)));
        let (info, text) = match extracted {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Paper extraction failed");
                return error_content(e);
            }
        };

        let excerpt: String = text.chars().take(self.max_text_chars).collect();
        info!(path = %path.display(), pages = info.num_pages, chars = excerpt.len(), "Analyzing paper");

        match self.structured(
            &prompts::analysis_prompt(&info, &excerpt),
            &prompts::analysis_schema(),
        ) {
            Ok(mut analysis) => {
                analysis.insert(
                    "extraction_metadata".into(),
                    json!({
                        "source": info.metadata.title.as_deref().unwrap_or("Unknown"),
                        "pages": info.num_pages,
                        "text_length": excerpt.chars().count(),
                        "abstract_available": !info.abstract_text.is_empty(),
                    }),
                );
                analysis
            }
            Err(e) => {
                warn!(error = %e, "Analysis generation failed");
                fallback::analysis(&info, &e.to_string())
            }
        }
    }

    fn evaluate(&self, message: &Message) -> Content {
        let Some(analysis) = input(message, "analysis") else {
            return error_content("No analysis provided");
        };

        match self.structured(
            &prompts::evaluation_prompt(analysis),
            &prompts::evaluation_schema(),
        ) {
            Ok(mut evaluation) => {
                clamp_scores(&mut evaluation);
                evaluation
            }
            Err(e) => {
                warn!(error = %e, "Evaluation generation failed");
                fallback::evaluation(&e.to_string())
            }
        }
    }

    fn innovate(&self, message: &Message) -> Content {
        let Some(analysis) = input(message, "analysis") else {
            return error_content("No analysis provided");
        };
        let evaluation = input(message, "evaluation");

        match self.structured(
            &prompts::innovation_prompt(analysis, evaluation),
            &prompts::innovation_schema(),
        ) {
            Ok(innovations) => innovations,
            Err(e) => {
                warn!(error = %e, "Innovation generation failed");
                fallback::innovations(&e.to_string())
            }
        }
    }

    fn write_proposal(&self, message: &Message) -> Content {
        let (Some(analysis), Some(evaluation), Some(innovations)) = (
            input(message, "analysis"),
            input(message, "evaluation"),
            input(message, "innovations"),
        ) else {
            return error_content("Missing required inputs (analysis, evaluation, or innovations)");
        };
        let conflicts = message
            .content
            .get("conflicts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        writer::ProposalWriter::new(self.llm.as_ref()).write(
            analysis,
            evaluation,
            innovations,
            conflicts,
        )
    }
}

/// Clamp every numeric score into 0..=10
fn clamp_scores(evaluation: &mut Content) {
    let Some(Value::Object(scores)) = evaluation.get_mut("scores") else {
        return;
    };
    for (name, score) in scores.iter_mut() {
        let Some(value) = score.as_f64() else {
            continue;
        };
        if !(0.0..=10.0).contains(&value) {
            warn!(score = %name, value, "Score out of range, clamping");
            *score = if score.is_i64() || score.is_u64() {
                json!(value.clamp(0.0, 10.0) as i64)
            } else {
                json!(value.clamp(0.0, 10.0))
            };
        }
    }
}

impl Agent for RoleAgent {
    fn name(&self) -> &str {
        self.role.agent_name()
    }

    fn role(&self) -> &str {
        self.role.spec().description
    }

    fn process(&self, message: &Message) -> Result<Content> {
        let expected = self.role.action();
        match message.content_str("action") {
            Some(action) if action == expected => {}
            other => {
                return Ok(error_content(format!(
                    "Unknown action: {}",
                    other.unwrap_or("none")
                )))
            }
        }

        Ok(match self.role {
            Role::Analyst => self.analyze(message),
            Role::Evaluator => self.evaluate(message),
            Role::Innovator => self.innovate(message),
            Role::Writer => self.write_proposal(message),
        })
    }
}
