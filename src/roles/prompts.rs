//! Prompt builders and response schemas for the role agents

use crate::document::PaperInfo;
use serde_json::{json, Value};

pub(crate) fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub(crate) fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

pub(crate) fn text_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Project `key` out of every object in the array at `list`
fn pluck(value: &Value, list: &str, keys: &[&str], take: usize) -> Value {
    let items = value
        .get(list)
        .and_then(Value::as_array)
        .map(|items| items.iter().take(take).collect::<Vec<_>>())
        .unwrap_or_default();

    Value::Array(
        items
            .into_iter()
            .map(|item| match keys {
                [single] => field(item, single).clone(),
                _ => Value::Object(
                    keys.iter()
                        .map(|k| (k.to_string(), field(item, k).clone()))
                        .collect(),
                ),
            })
            .collect(),
    )
}

pub(crate) fn analysis_prompt(info: &PaperInfo, text: &str) -> String {
    let title = info.metadata.title.as_deref().unwrap_or("Not found");
    let author = info.metadata.author.as_deref().unwrap_or("Not found");
    let abstract_text = if info.abstract_text.is_empty() {
        "Abstract not extracted"
    } else {
        info.abstract_text.as_str()
    };

    format!(
        "Analyze this research paper and extract key information.

Paper Metadata:
- Title: {title}
- Author: {author}
- Pages: {pages}

Abstract:
{abstract_text}

Paper Text (first part):
{text}

Extract the following information:
1. Title: the paper's title (from the text if metadata lacks it)
2. Authors: list of author names
3. Year: publication year if mentioned
4. Venue: conference or journal name if mentioned
5. Key Contributions: 3-5 main contributions
6. Methodology: the approach, datasets used and evaluation metrics
7. Main Results: key findings or performance improvements
8. Limitations: limitations mentioned by the authors
9. Novelty Score: novelty from 0-10 with brief reasoning
10. Gaps: unclear sections or missing information

Be precise and extract only information clearly stated in the paper.",
        pages = info.num_pages,
    )
}

pub(crate) fn analysis_schema() -> Value {
    json!({
        "title": "string",
        "authors": ["string"],
        "year": "number or null",
        "venue": "string or null",
        "key_contributions": ["string"],
        "methodology": {
            "approach": "string",
            "datasets": ["string"],
            "evaluation_metrics": ["string"]
        },
        "main_results": {
            "summary": "string",
            "performance_improvements": ["string"]
        },
        "limitations": ["string"],
        "novelty_assessment": {
            "score": "number (0-10)",
            "reasoning": "string"
        },
        "gaps_identified": ["string"]
    })
}

pub(crate) fn evaluation_prompt(analysis: &Value) -> String {
    format!(
        "You are a peer reviewer evaluating this research paper. Provide a thorough assessment.

PAPER ANALYSIS:
{analysis}

Score the paper from 0 to 10 on:
1. Originality: are the ideas new, is the work incremental or groundbreaking?
2. Methodology: is the method well designed, are experiments rigorous and comparisons fair?
3. Impact: will it influence future research or enable practical applications?
4. Clarity: is it clearly written and reproducible?
5. Overall quality

Additionally provide:
- Funding Potential: HIGH / MEDIUM / LOW
- Strengths: 3-5 key strengths
- Weaknesses: 3-5 key weaknesses or concerns
- Reviewer Feedback: 3-5 critical comments in peer-review style
- Recommendations for publication, for funding and for future work

Be critical but constructive. Think like a senior researcher reviewing for a top conference.",
        analysis = pretty(analysis),
    )
}

pub(crate) fn evaluation_schema() -> Value {
    json!({
        "scores": {
            "originality": "number (0-10)",
            "methodology": "number (0-10)",
            "impact": "number (0-10)",
            "clarity": "number (0-10)",
            "overall": "number (0-10)"
        },
        "funding_potential": "HIGH | MEDIUM | LOW",
        "strengths": ["string"],
        "weaknesses": ["string"],
        "reviewer_feedback": ["string"],
        "recommendations": {
            "for_publication": ["string"],
            "for_funding": ["string"],
            "future_work": ["string"]
        },
        "decision_reasoning": "string"
    })
}

pub(crate) fn innovation_prompt(analysis: &Value, evaluation: Option<&Value>) -> String {
    let review = evaluation
        .map(|evaluation| {
            format!(
                "\nREVIEW:\nOverall Score: {}/10\nFunding Potential: {}\nWeaknesses: {}\n",
                field(field(evaluation, "scores"), "overall"),
                text_or(evaluation, "funding_potential", "UNKNOWN"),
                field(evaluation, "weaknesses"),
            )
        })
        .unwrap_or_default();

    format!(
        "You are a visionary research innovator. Based on this paper analysis, generate creative future directions.

PAPER ANALYSIS:
Title: {title}
Key Contributions: {contributions}
Methodology: {methodology}
Results: {results}
Limitations: {limitations}
Gaps: {gaps}
{review}
Generate:
1. Future Research Directions (3-5): promising unexplored areas and open fundamental questions
2. Industry Applications (3-5): specific use cases with clear value, near-term and long-term
3. Novel Extensions (3-5): algorithmic improvements, new architectures, new domains
4. Cross-Disciplinary Connections (2-4): links to biology, physics, social science and beyond
5. Commercial Potential: HIGH / MEDIUM / LOW with reasoning
6. 10-Year Vision: where this research could lead in a decade
7. Breakthrough Potential: score 0-10 and whether it could shift a paradigm

Be bold and creative while staying grounded in the paper.",
        title = text_or(analysis, "title", "Unknown"),
        contributions = pretty(field(analysis, "key_contributions")),
        methodology = pretty(field(analysis, "methodology")),
        results = pretty(field(analysis, "main_results")),
        limitations = pretty(field(analysis, "limitations")),
        gaps = pretty(field(analysis, "gaps_identified")),
    )
}

pub(crate) fn innovation_schema() -> Value {
    json!({
        "future_directions": [{
            "direction": "string (title)",
            "description": "string (2-3 sentences)",
            "feasibility": "HIGH | MEDIUM | LOW",
            "timeframe": "string (1-2 years, 3-5 years, 5-10 years)"
        }],
        "industry_applications": [{
            "domain": "string (industry/field)",
            "application": "string (specific use case)",
            "value_proposition": "string",
            "readiness": "string (ready now, 1-2 years, 3-5 years)"
        }],
        "extensions": [{
            "extension": "string (title)",
            "description": "string",
            "technical_challenge": "string"
        }],
        "cross_disciplinary": [{
            "field": "string",
            "connection": "string",
            "potential": "string"
        }],
        "commercial_potential": "HIGH | MEDIUM | LOW",
        "commercial_reasoning": "string",
        "ten_year_vision": "string (paragraph)",
        "breakthrough_potential": {
            "score": "number (0-10)",
            "reasoning": "string",
            "paradigm_shift": "boolean"
        }
    })
}

pub(crate) fn executive_summary_prompt(
    analysis: &Value,
    evaluation: &Value,
    innovations: &Value,
) -> String {
    format!(
        "Write a compelling 1-page executive summary for a grant proposal based on:

PAPER: {title}

KEY FINDINGS:
{findings}

QUALITY ASSESSMENT:
Overall Score: {overall}/10
Funding Potential: {funding}

FUTURE DIRECTIONS:
{directions}

Write an executive summary (250-300 words) that opens with the problem, summarizes the key \
innovation, highlights intellectual merit and broader impacts, states the funding request \
($500K over 3 years) and ends with the transformative potential.

Use a persuasive, professional grant-writing style.",
        title = text_or(analysis, "title", "Unknown"),
        findings = pretty(field(analysis, "key_contributions")),
        overall = field(evaluation, "scores")
            .get("overall")
            .cloned()
            .unwrap_or(json!(0)),
        funding = text_or(evaluation, "funding_potential", "UNKNOWN"),
        directions = pretty(&pluck(innovations, "future_directions", &["direction"], usize::MAX)),
    )
}

pub(crate) fn project_description_prompt(analysis: &Value, evaluation: &Value) -> String {
    format!(
        "Write a detailed project description for a grant proposal:

PAPER ANALYSIS:
Title: {title}
Contributions: {contributions}
Methodology: {methodology}
Results: {results}

EVALUATION:
Strengths: {strengths}
Weaknesses: {weaknesses}

Write 3-4 paragraphs covering background and motivation, the current state of the work \
(cite the paper), the gap and opportunity, and the proposed work.

Use clear academic writing and be specific about technical details.",
        title = text_or(analysis, "title", "Unknown"),
        contributions = field(analysis, "key_contributions"),
        methodology = field(analysis, "methodology"),
        results = field(analysis, "main_results"),
        strengths = field(evaluation, "strengths"),
        weaknesses = field(evaluation, "weaknesses"),
    )
}

pub(crate) fn research_plan_prompt(analysis: &Value, innovations: &Value) -> String {
    format!(
        "Write a detailed research plan with specific aims:

CURRENT WORK:
{contributions}

FUTURE DIRECTIONS:
{directions}

EXTENSIONS:
{extensions}

Structure the plan as Aim 1, Aim 2 and Aim 3, one per direction. For each aim give the \
rationale, the approach, expected outcomes, and potential challenges with mitigation.

Write 2-3 paragraphs per aim. Be specific and technical.",
        contributions = field(analysis, "key_contributions"),
        directions = pretty(&pluck(
            innovations,
            "future_directions",
            &["direction", "description", "feasibility"],
            3
        )),
        extensions = pretty(&pluck(innovations, "extensions", &["extension"], usize::MAX)),
    )
}

pub(crate) fn broader_impacts_prompt(innovations: &Value) -> String {
    format!(
        "Write a compelling broader impacts statement:

APPLICATIONS:
{applications}

COMMERCIAL POTENTIAL: {commercial}

VISION:
{vision}

Write 2-3 paragraphs covering societal, educational, economic and global impact.

Be aspirational but realistic.",
        applications = pretty(&pluck(
            innovations,
            "industry_applications",
            &["domain", "application", "value_proposition"],
            usize::MAX
        )),
        commercial = text_or(innovations, "commercial_potential", "UNKNOWN"),
        vision = text_or(innovations, "ten_year_vision", ""),
    )
}

pub(crate) fn conflict_resolution_prompt(conflicts: &[Value]) -> String {
    format!(
        "These agents disagreed during analysis:

{conflicts}

Write a brief paragraph explaining what the disagreement was, how it was resolved \
(weighted expert opinions, additional analysis) and why the final decision is sound.

Be diplomatic and show that diverse perspectives strengthen the proposal.",
        conflicts = pretty(&Value::Array(conflicts.to_vec())),
    )
}
