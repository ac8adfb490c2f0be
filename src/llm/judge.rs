//! Judge - evaluates the collected responses and merges them into one answer

use crate::error::{QueryError, Result};
use crate::llm::dispatch::EndpointResponse;
use crate::llm::provider::LlmProvider;

const EVALUATION_HEADING: &str = "Evaluation";
const FINAL_HEADING: &str = "Final Response";
const REASONING_HEADING: &str = "Reasoning";

/// The judge's answer split into its three sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedResult {
    pub evaluation: String,
    pub final_response: String,
    pub reasoning: String,
}

/// What the judge produced, parsed when possible
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeOutput {
    Merged(MergedResult),
    /// The judge answered but not in the expected layout; the text is kept whole
    Raw(String),
}

impl JudgeOutput {
    /// Split the judge text, keeping it unparsed if any section is missing
    pub fn parse(raw: &str) -> Self {
        match split_sections(raw) {
            Ok(merged) => JudgeOutput::Merged(merged),
            Err(e) => {
                tracing::warn!("{}; showing judge output unparsed", e);
                JudgeOutput::Raw(raw.trim().to_string())
            }
        }
    }

    /// Text to present as the answer
    pub fn answer(&self) -> &str {
        match self {
            JudgeOutput::Merged(merged) => &merged.final_response,
            JudgeOutput::Raw(raw) => raw,
        }
    }
}

pub struct Judge {
    provider: Box<dyn LlmProvider>,
}

impl Judge {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    /// Ask the judge model to critique and merge the successful responses
    pub async fn merge(&self, query: &str, responses: &[&EndpointResponse]) -> Result<JudgeOutput> {
        let prompt = build_evaluation_prompt(query, responses);
        tracing::info!(judge = self.name(), responses = responses.len(), "judging");

        let judged = tokio::time::timeout(self.provider.timeout(), self.provider.generate(&prompt))
            .await
            .map_err(|_| QueryError::JudgeRequest {
                judge: self.name().to_string(),
                reason: format!("timed out after {} seconds", self.provider.timeout().as_secs()),
            })?;

        match judged {
            Ok(raw) => Ok(JudgeOutput::parse(&raw)),
            Err(e) => Err(QueryError::JudgeRequest {
                judge: self.name().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Build the judge prompt; only successful responses are listed, in the given order
pub fn build_evaluation_prompt(query: &str, responses: &[&EndpointResponse]) -> String {
    let listed = responses
        .iter()
        .filter_map(|r| r.text().map(|text| (r.endpoint.as_str(), text)))
        .enumerate()
        .map(|(i, (name, text))| format!("{}. {}:\n{}\n", i + 1, name, text.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert AI evaluator. I will provide you with a user query and multiple \
        responses from different AI models. Your job is to:\n\n\
        1. Analyze each response for accuracy, completeness, clarity, and helpfulness\n\
        2. Identify the best elements from each response\n\
        3. Create a comprehensive merged response that combines the best aspects\n\
        4. Provide reasoning for your choices\n\n\
        User Query: {query}\n\n\
        Responses:\n\n{listed}\n\
        Please provide:\n\
        1. A brief evaluation of each response (2-3 sentences each)\n\
        2. A final merged response that incorporates the best elements\n\
        3. Your reasoning for the final response\n\n\
        Format your response as:\n\
        ## {EVALUATION_HEADING}\n[Your evaluation of each response]\n\n\
        ## {FINAL_HEADING}\n[Your merged and improved response]\n\n\
        ## {REASONING_HEADING}\n[Your reasoning for the final response]\n"
    )
}

/// Which section a `## ` heading line opens, if any; other levels are body text
fn heading_of(line: &str) -> Option<&'static str> {
    let title = line.trim().strip_prefix("##")?;
    if title.starts_with('#') {
        return None;
    }
    let title = title.trim().trim_end_matches(':').trim();

    [EVALUATION_HEADING, FINAL_HEADING, REASONING_HEADING]
        .into_iter()
        .find(|heading| heading.eq_ignore_ascii_case(title))
}

/// Split on the `## Evaluation`, `## Final Response` and `## Reasoning` headings.
///
/// The first Evaluation heading, the first Final Response heading after it and
/// the last Reasoning heading after that delimit the sections, so a merged
/// answer may reuse those titles itself. Text before the Evaluation heading is
/// kept at the top of `evaluation`.
pub fn split_sections(raw: &str) -> Result<MergedResult> {
    let lines: Vec<&str> = raw.lines().collect();
    let headings: Vec<(usize, &'static str)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| heading_of(line).map(|h| (i, h)))
        .collect();

    let evaluation_at = headings
        .iter()
        .find(|(_, h)| *h == EVALUATION_HEADING)
        .map(|(i, _)| *i)
        .ok_or(QueryError::MalformedJudgeOutput(EVALUATION_HEADING))?;
    let final_at = headings
        .iter()
        .find(|(i, h)| *i > evaluation_at && *h == FINAL_HEADING)
        .map(|(i, _)| *i)
        .ok_or(QueryError::MalformedJudgeOutput(FINAL_HEADING))?;
    let reasoning_at = headings
        .iter()
        .rev()
        .find(|(i, h)| *i > final_at && *h == REASONING_HEADING)
        .map(|(i, _)| *i)
        .ok_or(QueryError::MalformedJudgeOutput(REASONING_HEADING))?;

    let body = |from: usize, to: usize, heading: &'static str| -> Result<String> {
        let text = lines[from..to].join("\n").trim().to_string();
        if text.is_empty() {
            return Err(QueryError::MalformedJudgeOutput(heading));
        }
        Ok(text)
    };

    let mut evaluation = body(evaluation_at + 1, final_at, EVALUATION_HEADING)?;
    let preamble = lines[..evaluation_at].join("\n").trim().to_string();
    if !preamble.is_empty() {
        evaluation = format!("{}\n\n{}", preamble, evaluation);
    }

    Ok(MergedResult {
        evaluation,
        final_response: body(final_at + 1, reasoning_at, FINAL_HEADING)?,
        reasoning: body(reasoning_at + 1, lines.len(), REASONING_HEADING)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::dispatch::{FailureKind, ResponseOutcome};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn success(endpoint: &str, text: &str) -> EndpointResponse {
        EndpointResponse {
            endpoint: endpoint.to_string(),
            latency: Duration::from_millis(5),
            outcome: ResponseOutcome::Success(text.to_string()),
        }
    }

    #[test]
    fn test_split_recovers_all_sections() {
        let raw = "## Evaluation\nA is terse. B is thorough.\n\n\
                   ## Final Response\nQubits hold superposed states.\n\nThey can be entangled.\n\n\
                   ## Reasoning\nKept B's depth and A's clarity.\n";

        let merged = split_sections(raw).unwrap();
        assert_eq!(merged.evaluation, "A is terse. B is thorough.");
        assert_eq!(
            merged.final_response,
            "Qubits hold superposed states.\n\nThey can be entangled."
        );
        assert_eq!(merged.reasoning, "Kept B's depth and A's clarity.");
    }

    #[test]
    fn test_split_tolerates_heading_variants() {
        let raw = "## evaluation:\nfine\n##FINAL RESPONSE\nanswer\n  ## Reasoning:\nbecause";

        let merged = split_sections(raw).unwrap();
        assert_eq!(merged.evaluation, "fine");
        assert_eq!(merged.final_response, "answer");
        assert_eq!(merged.reasoning, "because");
    }

    #[test]
    fn test_other_heading_levels_stay_in_section_body() {
        let raw = "## Evaluation\nok\n## Final Response\n# Evaluation\n### Step 1\ndo it\n#### Reasoning\nnested\n## Reasoning\nr";

        let merged = split_sections(raw).unwrap();
        assert_eq!(
            merged.final_response,
            "# Evaluation\n### Step 1\ndo it\n#### Reasoning\nnested"
        );
        assert_eq!(merged.reasoning, "r");
    }

    #[test]
    fn test_answer_with_own_reasoning_heading_is_kept_whole() {
        let raw = "## Evaluation\nboth fine\n\n## Final Response\nThe answer is 42.\n\n\
                   ### Reasoning\nStep 1: multiply 6 by 7.\n\n\
                   ## Reasoning\nMerged A's steps with B's result.";

        let merged = split_sections(raw).unwrap();
        assert_eq!(
            merged.final_response,
            "The answer is 42.\n\n### Reasoning\nStep 1: multiply 6 by 7."
        );
        assert_eq!(merged.reasoning, "Merged A's steps with B's result.");
    }

    #[test]
    fn test_last_reasoning_heading_closes_the_answer() {
        let raw = "## Evaluation\nok\n## Final Response\nPart one.\n## Reasoning\nwhy part one\n\
                   ## Reasoning\nthe judge's reasoning";

        let merged = split_sections(raw).unwrap();
        assert_eq!(merged.final_response, "Part one.\n## Reasoning\nwhy part one");
        assert_eq!(merged.reasoning, "the judge's reasoning");
    }

    #[test]
    fn test_preamble_is_kept_in_evaluation() {
        let raw = "Here is my assessment.\n\n## Evaluation\nfine\n## Final Response\nanswer\n## Reasoning\nwhy";

        let merged = split_sections(raw).unwrap();
        assert_eq!(merged.evaluation, "Here is my assessment.\n\nfine");
    }

    #[test]
    fn test_sections_out_of_order_are_malformed() {
        let raw = "## Final Response\nanswer\n## Evaluation\nfine\n## Reasoning\nwhy";
        assert!(matches!(
            split_sections(raw),
            Err(QueryError::MalformedJudgeOutput("Final Response"))
        ));
    }

    #[test]
    fn test_missing_section_is_malformed() {
        let raw = "## Evaluation\nfine\n## Final Response\nanswer\n";
        assert!(matches!(
            split_sections(raw),
            Err(QueryError::MalformedJudgeOutput("Reasoning"))
        ));
    }

    #[test]
    fn test_empty_section_is_malformed() {
        let raw = "## Evaluation\nfine\n## Final Response\n\n## Reasoning\nwhy";
        assert!(matches!(
            split_sections(raw),
            Err(QueryError::MalformedJudgeOutput("Final Response"))
        ));
    }

    #[test]
    fn test_parse_falls_back_to_raw_text() {
        let raw = "  Just one blob of merged advice without headings.\n";
        let output = JudgeOutput::parse(raw);

        assert_eq!(
            output,
            JudgeOutput::Raw("Just one blob of merged advice without headings.".to_string())
        );
        assert_eq!(output.answer(), "Just one blob of merged advice without headings.");
    }

    #[test]
    fn test_prompt_lists_only_successes_in_order() {
        let a = success("OpenAI GPT-4", "answer from gpt");
        let b = EndpointResponse {
            endpoint: "Google Gemini".to_string(),
            latency: Duration::from_millis(5),
            outcome: ResponseOutcome::Failed {
                kind: FailureKind::Request,
                detail: "HTTP 500".to_string(),
            },
        };
        let c = success("xAI Grok", "answer from grok");

        let prompt = build_evaluation_prompt("What is Rust?", &[&a, &b, &c]);

        assert!(prompt.contains("User Query: What is Rust?"));
        assert!(prompt.contains("1. OpenAI GPT-4:\nanswer from gpt"));
        assert!(prompt.contains("2. xAI Grok:\nanswer from grok"));
        assert!(!prompt.contains("Google Gemini"));
        assert!(prompt.contains("## Final Response"));
        assert!(prompt.find("OpenAI GPT-4").unwrap() < prompt.find("xAI Grok").unwrap());
    }
}
