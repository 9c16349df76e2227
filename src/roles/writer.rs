//! Grant proposal assembly

use super::prompts::{self, field, text_or};
use crate::llm::{GenerateOptions, LanguageModel};
use crate::mail::Content;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

const RULE_WIDTH: usize = 70;

const BUDGET_JUSTIFICATION: &str = "BUDGET JUSTIFICATION (3-Year Project, $500,000 Total)

Year 1: $180,000
- Personnel: $120,000 (PI 1 month summer, 1 Postdoc, 1 PhD student)
- Equipment: $30,000 (GPU cluster, software licenses)
- Travel: $15,000 (Conference presentations, collaborations)
- Other: $15,000 (Cloud computing, datasets, publication fees)

Year 2: $160,000
- Personnel: $125,000 (Same team, cost-of-living adjustment)
- Equipment: $10,000 (Additional computing resources)
- Travel: $15,000 (Conferences, workshops)
- Other: $10,000 (Materials, services)

Year 3: $160,000
- Personnel: $130,000 (Same team structure)
- Travel: $20,000 (Final dissemination, collaborations)
- Other: $10,000 (Publication, open-source release)

Justification:
This budget supports a lean, focused team to achieve the proposed aims. The postdoc
will lead implementation, the PhD student will conduct experiments, and the PI will
provide strategic direction. Equipment costs are essential for computational research.
Travel enables dissemination and collaboration with key partners.";

const TIMELINE: [(&str, [&str; 4]); 3] = [
    (
        "Year 1",
        [
            "Q1: Literature review and baseline implementation",
            "Q2: Aim 1 - Initial experiments and data collection",
            "Q3: Aim 1 - Analysis and refinement",
            "Q4: Aim 2 - Begin second direction",
        ],
    ),
    (
        "Year 2",
        [
            "Q1: Aim 2 - Core development",
            "Q2: Aim 2 - Testing and validation",
            "Q3: Aim 3 - Begin third direction",
            "Q4: Integration and cross-validation",
        ],
    ),
    (
        "Year 3",
        [
            "Q1: Comprehensive evaluation",
            "Q2: Real-world deployment and testing",
            "Q3: Paper writing and submission",
            "Q4: Open-source release and dissemination",
        ],
    ),
];

/// A free-text section generated by the model
struct Section {
    key: &'static str,
    heading: &'static str,
    max_tokens: u32,
    temperature: f32,
}

const EXECUTIVE_SUMMARY: Section = Section {
    key: "executive_summary",
    heading: "Executive Summary",
    max_tokens: 500,
    temperature: 0.7,
};
const PROJECT_DESCRIPTION: Section = Section {
    key: "project_description",
    heading: "Project Description",
    max_tokens: 800,
    temperature: 0.6,
};
const RESEARCH_PLAN: Section = Section {
    key: "research_plan",
    heading: "Research Plan",
    max_tokens: 1200,
    temperature: 0.6,
};
const BROADER_IMPACTS: Section = Section {
    key: "broader_impacts",
    heading: "Broader Impacts",
    max_tokens: 600,
    temperature: 0.7,
};
const CONFLICT_RESOLUTION: Section = Section {
    key: "conflict_resolution",
    heading: "Conflict Resolution",
    max_tokens: 300,
    temperature: 0.6,
};

pub(crate) struct ProposalWriter<'a> {
    llm: &'a dyn LanguageModel,
}

impl<'a> ProposalWriter<'a> {
    pub(crate) fn new(llm: &'a dyn LanguageModel) -> Self {
        Self { llm }
    }

    pub(crate) fn write(
        &self,
        analysis: &Value,
        evaluation: &Value,
        innovations: &Value,
        conflicts: &[Value],
    ) -> Content {
        let mut sections = Content::new();

        self.generate(
            &mut sections,
            &EXECUTIVE_SUMMARY,
            prompts::executive_summary_prompt(analysis, evaluation, innovations),
        );
        self.generate(
            &mut sections,
            &PROJECT_DESCRIPTION,
            prompts::project_description_prompt(analysis, evaluation),
        );
        self.generate(
            &mut sections,
            &RESEARCH_PLAN,
            prompts::research_plan_prompt(analysis, innovations),
        );
        self.generate(
            &mut sections,
            &BROADER_IMPACTS,
            prompts::broader_impacts_prompt(innovations),
        );
        sections.insert("budget_justification".into(), json!(BUDGET_JUSTIFICATION));
        sections.insert("timeline".into(), timeline());
        sections.insert("references".into(), json!(references(analysis)));
        if !conflicts.is_empty() {
            self.generate(
                &mut sections,
                &CONFLICT_RESOLUTION,
                prompts::conflict_resolution_prompt(conflicts),
            );
        }

        let full_text = assemble(&sections, analysis);
        let word_count = full_text.split_whitespace().count();

        let mut proposal = Content::new();
        proposal.insert("proposal".into(), Value::Object(sections));
        proposal.insert("full_text".into(), json!(full_text));
        proposal.insert("word_count".into(), json!(word_count));
        proposal.insert(
            "metadata".into(),
            json!({
                "generated_at": Utc::now().to_rfc3339(),
                "paper_title": text_or(analysis, "title", "Unknown"),
                "quality_score": field(evaluation, "scores").get("overall").cloned().unwrap_or(json!(0)),
                "funding_potential": text_or(evaluation, "funding_potential", "UNKNOWN"),
                "conflicts_resolved": conflicts.len(),
            }),
        );
        proposal
    }

    fn generate(&self, sections: &mut Content, section: &Section, prompt: String) {
        let options = GenerateOptions::new(section.max_tokens, section.temperature);
        let text = match self.llm.generate(&prompt, &options) {
            Ok(text) => {
                debug!(section = section.key, chars = text.len(), "Section written");
                text.trim().to_string()
            }
            Err(e) => {
                warn!(section = section.key, error = %e, "Section generation failed");
                format!("[{} - Generation Error: {}]", section.heading, e)
            }
        };
        sections.insert(section.key.into(), json!(text));
    }
}

fn timeline() -> Value {
    Value::Object(
        TIMELINE
            .iter()
            .map(|(year, quarters)| (year.to_string(), json!(quarters)))
            .collect(),
    )
}

fn references(analysis: &Value) -> String {
    let authors = analysis
        .get("authors")
        .and_then(Value::as_array)
        .map(|authors| {
            authors
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|authors| !authors.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let year = match field(analysis, "year") {
        Value::Null => "Year".to_string(),
        Value::String(year) => year.clone(),
        other => other.to_string(),
    };

    format!(
        "REFERENCES\n\n\
         [1] {authors}. \"{title}\".\n    {venue}, {year}.\n\n\
         [2-10] Additional references would be extracted from the paper and added here...",
        title = text_or(analysis, "title", "Unknown"),
        venue = text_or(analysis, "venue", "Conference/Journal"),
    )
}

fn section_text<'a>(sections: &'a Content, key: &str) -> &'a str {
    sections
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("[Missing]")
}

fn assemble(sections: &Content, analysis: &Value) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    let mut text = format!(
        "\n{heavy}\nGRANT PROPOSAL\n{heavy}\n\n\
         Title: Extension and Application of \"{title}\"\n\
         Principal Investigator: [PI Name]\n\
         Institution: [Institution]\n\
         Duration: 3 years\n\
         Requested Amount: $500,000\n\n{heavy}\n",
        title = text_or(analysis, "title", "Unknown"),
    );

    let mut body = vec![
        ("EXECUTIVE SUMMARY", EXECUTIVE_SUMMARY.key),
        ("PROJECT DESCRIPTION", PROJECT_DESCRIPTION.key),
        ("RESEARCH PLAN", RESEARCH_PLAN.key),
        ("BROADER IMPACTS", BROADER_IMPACTS.key),
        ("BUDGET JUSTIFICATION", "budget_justification"),
    ];
    if sections.contains_key(CONFLICT_RESOLUTION.key) {
        body.push(("CONFLICT RESOLUTION", CONFLICT_RESOLUTION.key));
    }
    for (heading, key) in body {
        text.push_str(&format!(
            "\n{heading}\n{light}\n{}\n\n{heavy}\n",
            section_text(sections, key)
        ));
    }

    text.push_str(&format!("\nPROJECT TIMELINE\n{light}\n"));
    if let Some(Value::Object(timeline)) = sections.get("timeline") {
        for (year, quarters) in timeline {
            text.push_str(&format!("\n{year}:\n"));
            for quarter in quarters.as_array().into_iter().flatten() {
                text.push_str(&format!("  • {}\n", quarter.as_str().unwrap_or_default()));
            }
        }
    }

    text.push_str(&format!(
        "\n{heavy}\n\nREFERENCES\n{light}\n{}\n\n{heavy}\nEND OF PROPOSAL\n{heavy}\n",
        section_text(sections, "references")
    ));
    text
}
