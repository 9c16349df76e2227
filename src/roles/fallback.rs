//! Placeholder results returned when the language model fails
//!
//! Each payload has the same shape as a successful result so downstream
//! stages can still read it, plus an `error` field describing the failure.

use crate::document::PaperInfo;
use crate::mail::{content, Content};
use serde_json::json;

pub(crate) fn analysis(info: &PaperInfo, error: &str) -> Content {
    content(json!({
        "title": info.metadata.title.as_deref().unwrap_or("Unknown"),
        "authors": [info.metadata.author.as_deref().unwrap_or("Unknown")],
        "year": null,
        "venue": null,
        "key_contributions": ["Could not extract - LLM error"],
        "methodology": {
            "approach": "Could not extract",
            "datasets": [],
            "evaluation_metrics": []
        },
        "main_results": {
            "summary": "Could not extract",
            "performance_improvements": []
        },
        "limitations": [],
        "novelty_assessment": {
            "score": 0,
            "reasoning": format!("Analysis failed: {error}")
        },
        "gaps_identified": [format!("LLM analysis error: {error}")],
        "error": error
    }))
}

pub(crate) fn evaluation(error: &str) -> Content {
    content(json!({
        "scores": {
            "originality": 0,
            "methodology": 0,
            "impact": 0,
            "clarity": 0,
            "overall": 0
        },
        "funding_potential": "UNKNOWN",
        "strengths": [],
        "weaknesses": [format!("Evaluation failed: {error}")],
        "reviewer_feedback": [format!("Could not complete evaluation: {error}")],
        "recommendations": {
            "for_publication": [],
            "for_funding": [],
            "future_work": []
        },
        "decision_reasoning": format!("Evaluation error: {error}"),
        "error": error
    }))
}

pub(crate) fn innovations(error: &str) -> Content {
    content(json!({
        "future_directions": [{
            "direction": "Could not generate",
            "description": format!("Ideation failed: {error}"),
            "feasibility": "UNKNOWN",
            "timeframe": "Unknown"
        }],
        "industry_applications": [],
        "extensions": [],
        "cross_disciplinary": [],
        "commercial_potential": "UNKNOWN",
        "commercial_reasoning": format!("Error: {error}"),
        "ten_year_vision": "Could not generate vision",
        "breakthrough_potential": {
            "score": 0,
            "reasoning": format!("Generation failed: {error}"),
            "paradigm_shift": false
        },
        "error": error
    }))
}
