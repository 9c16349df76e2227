//! Disagreements between agent assessments

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Score gap that counts as a novelty disagreement
const NOVELTY_GAP: f64 = 3.0;
const NOVELTY_GAP_HIGH: f64 = 5.0;
const POTENTIAL_RANK_GAP: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    NoveltyAssessment,
    FundingPotential,
    QualityInnovationMismatch,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::NoveltyAssessment => "novelty_assessment",
            ConflictType::FundingPotential => "funding_potential",
            ConflictType::QualityInnovationMismatch => "quality_innovation_mismatch",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A disagreement between two agents' assessments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub description: String,
    pub agents: Vec<String>,
    pub severity: Severity,
    pub resolution: String,
}

fn score(value: &Value, section: &str, key: &str) -> f64 {
    value
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn label<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("UNKNOWN")
}

/// LOW < MEDIUM < HIGH; anything else ranks with UNKNOWN
fn potential_rank(label: &str) -> u8 {
    match label {
        "LOW" => 1,
        "MEDIUM" => 2,
        "HIGH" => 3,
        _ => 0,
    }
}

/// Compare the analyst, evaluator and innovator results
pub fn detect_conflicts(analysis: &Value, evaluation: &Value, innovations: &Value) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    let novelty = score(analysis, "novelty_assessment", "score");
    let originality = score(evaluation, "scores", "originality");
    let gap = (novelty - originality).abs();
    if gap >= NOVELTY_GAP {
        conflicts.push(Conflict {
            conflict_type: ConflictType::NoveltyAssessment,
            description: format!(
                "Analyst rated novelty {novelty}/10, Evaluator rated originality {originality}/10"
            ),
            agents: vec!["analyst".to_string(), "evaluator".to_string()],
            severity: if gap >= NOVELTY_GAP_HIGH {
                Severity::High
            } else {
                Severity::Medium
            },
            resolution: format!("Weighted average: {:.1}/10", (novelty + originality) / 2.0),
        });
    }

    let funding = label(evaluation, "funding_potential");
    let commercial = label(innovations, "commercial_potential");
    if potential_rank(funding).abs_diff(potential_rank(commercial)) >= POTENTIAL_RANK_GAP {
        conflicts.push(Conflict {
            conflict_type: ConflictType::FundingPotential,
            description: format!("Evaluator: {funding}, Innovator: {commercial}"),
            agents: vec!["evaluator".to_string(), "innovator".to_string()],
            severity: Severity::Medium,
            resolution: "Consider evaluator assessment (quality-focused) with innovator vision (application-focused)"
                .to_string(),
        });
    }

    let quality = score(evaluation, "scores", "overall");
    let breakthrough = score(innovations, "breakthrough_potential", "score");
    if quality >= 8.0 && breakthrough <= 3.0 {
        conflicts.push(Conflict {
            conflict_type: ConflictType::QualityInnovationMismatch,
            description: format!(
                "High quality ({quality}/10) but low breakthrough potential ({breakthrough}/10)"
            ),
            agents: vec!["evaluator".to_string(), "innovator".to_string()],
            severity: Severity::Low,
            resolution: "High-quality incremental work - valuable but not transformative".to_string(),
        });
    }

    conflicts
}
