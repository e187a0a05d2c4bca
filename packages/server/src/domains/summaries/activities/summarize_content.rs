//! Summarize stage.
//!
//! The time budget grows with transcript length and platform, up to a
//! ceiling; transcripts whose budget would pass the ceiling are truncated.
//! An unparseable model reply degrades to a fallback summary instead of
//! failing the job.

use chrono::Utc;
use openai_client::{strip_code_blocks, truncate_chars};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::common::Platform;
use crate::config::SummaryBudgetConfig;
use crate::domains::summaries::Summary;
use crate::kernel::jobs::{ContentMetadata, Job, StageError, StageOutcome, SummarizePayload};
use crate::kernel::ServerDeps;

const NEUTRAL: &str = "neutral";

const SYSTEM_PROMPT: &str = "You summarize short-form social video transcripts. \
Reply with a single JSON object with the keys: \
\"summary\" (2-4 sentences), \
\"key_points\" (array of short strings), \
\"topics\" (array of lowercase topic tags), \
\"sentiment\" (one of positive, neutral, negative), \
\"content_type\" (e.g. tutorial, review, vlog, news, entertainment) and \
\"key_information\" (object of concrete facts such as products, prices, places; may be empty).";

/// Time allowed for one summary call and the transcript length to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryBudget {
    pub timeout: Duration,
    pub truncate_to: Option<usize>,
}

impl SummaryBudget {
    pub fn for_transcript(chars: usize, platform: Option<Platform>, config: &SummaryBudgetConfig) -> Self {
        let thousands = chars.div_ceil(1000) as u32;
        let mut wanted = config.base + config.per_thousand_chars * thousands;
        if platform == Some(Platform::Youtube) {
            wanted += config.long_form_bonus;
        }

        if wanted > config.ceiling {
            Self {
                timeout: config.ceiling,
                truncate_to: (chars > config.max_transcript_chars).then_some(config.max_transcript_chars),
            }
        } else {
            Self {
                timeout: wanted,
                truncate_to: None,
            }
        }
    }
}

/// Structured fields of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub topics: Vec<String>,
    pub sentiment: String,
    pub content_type: Option<String>,
    pub key_information: Option<serde_json::Value>,
    pub is_fallback: bool,
}

#[derive(Deserialize)]
struct SummaryReply {
    summary: String,
    #[serde(default, alias = "keyPoints")]
    key_points: Vec<String>,
    #[serde(default)]
    topics: Vec<String>,
    sentiment: Option<String>,
    #[serde(alias = "contentType")]
    content_type: Option<String>,
    #[serde(alias = "keyInformation")]
    key_information: Option<serde_json::Value>,
}

/// Parses a model reply, tolerating markdown code fences. Returns `None`
/// when the reply is not a JSON object with a non-empty summary.
pub fn parse_summary_reply(raw: &str) -> Option<ParsedSummary> {
    let reply: SummaryReply = serde_json::from_str(strip_code_blocks(raw)).ok()?;
    if reply.summary.trim().is_empty() {
        return None;
    }
    Some(ParsedSummary {
        summary: reply.summary.trim().to_string(),
        key_points: reply.key_points,
        topics: reply.topics,
        sentiment: reply
            .sentiment
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NEUTRAL.to_string()),
        content_type: reply.content_type,
        key_information: reply.key_information.filter(|v| !v.is_null()),
        is_fallback: false,
    })
}

/// Degraded result built from the first `chars` characters of the raw reply.
pub fn fallback_summary(raw: &str, chars: usize) -> ParsedSummary {
    ParsedSummary {
        summary: truncate_chars(raw, chars).to_string(),
        key_points: Vec::new(),
        topics: Vec::new(),
        sentiment: NEUTRAL.to_string(),
        content_type: None,
        key_information: None,
        is_fallback: true,
    }
}

fn user_prompt(metadata: &ContentMetadata, transcript: &str) -> String {
    let mut prompt = String::new();
    if let Some(platform) = metadata.platform {
        prompt.push_str(&format!("Platform: {}\n", platform));
    }
    if let Some(handle) = &metadata.creator_handle {
        prompt.push_str(&format!("Creator: @{}\n", handle));
    }
    if let Some(title) = &metadata.title {
        prompt.push_str(&format!("Title: {}\n", title));
    }
    if let Some(caption) = &metadata.caption {
        prompt.push_str(&format!("Caption: {}\n", caption));
    }
    if !metadata.hashtags.is_empty() {
        prompt.push_str(&format!("Hashtags: {}\n", metadata.hashtags.join(", ")));
    }
    prompt.push_str("\nTranscript:\n");
    prompt.push_str(transcript);
    prompt
}

pub async fn summarize_content(
    _job: &Job,
    payload: &SummarizePayload,
    deps: &ServerDeps,
) -> Result<StageOutcome, StageError> {
    let config = &deps.config.summary;
    let chars = payload.transcript_text.chars().count();
    let budget = SummaryBudget::for_transcript(chars, payload.metadata.platform, config);

    let transcript = match budget.truncate_to {
        Some(limit) => truncate_chars(&payload.transcript_text, limit),
        None => payload.transcript_text.as_str(),
    };
    let prompt = user_prompt(&payload.metadata, transcript);

    let raw = tokio::time::timeout(budget.timeout, deps.ai.complete_json(SYSTEM_PROMPT, &prompt))
        .await
        .map_err(|_| StageError::Timeout(budget.timeout))??;

    let parsed = match parse_summary_reply(&raw) {
        Some(parsed) => parsed,
        None => {
            warn!(
                content_id = %payload.content_id,
                reply_chars = raw.chars().count(),
                "Unparseable summary reply, storing fallback"
            );
            fallback_summary(&raw, config.fallback_chars)
        }
    };

    let now = Utc::now();
    deps.store
        .upsert_summary(Summary {
            content_id: payload.content_id,
            summary: parsed.summary,
            key_points: parsed.key_points,
            topics: parsed.topics,
            sentiment: parsed.sentiment,
            content_type: parsed.content_type,
            key_information: parsed.key_information,
            model: deps.ai.model().to_string(),
            is_fallback: parsed.is_fallback,
            created_at: now,
            updated_at: now,
        })
        .await?;

    info!(
        content_id = %payload.content_id,
        transcript_chars = chars,
        truncated = budget.truncate_to.is_some(),
        fallback = parsed.is_fallback,
        "Summary stored"
    );

    let outcome = StageOutcome::new(1, 0);
    Ok(if parsed.is_fallback {
        outcome.with_note("fallback summary")
    } else {
        outcome
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_grows_with_length_and_platform() {
        let config = SummaryBudgetConfig::default();
        let short = SummaryBudget::for_transcript(800, Some(Platform::Tiktok), &config);
        assert_eq!(short.timeout, Duration::from_secs(11));
        assert_eq!(short.truncate_to, None);

        let youtube = SummaryBudget::for_transcript(800, Some(Platform::Youtube), &config);
        assert_eq!(youtube.timeout, Duration::from_secs(16));
    }

    #[test]
    fn long_transcripts_hit_ceiling_and_truncate() {
        let config = SummaryBudgetConfig::default();
        let budget = SummaryBudget::for_transcript(50_000, Some(Platform::Youtube), &config);
        assert_eq!(budget.timeout, config.ceiling);
        assert_eq!(budget.truncate_to, Some(config.max_transcript_chars));
    }

    #[test]
    fn parses_fenced_json_with_camel_case() {
        let raw = "```json\n{\"summary\": \"Bread tips.\", \"keyPoints\": [\"hydration\"], \
                   \"topics\": [\"baking\"], \"contentType\": \"tutorial\"}\n```";
        let parsed = parse_summary_reply(raw).unwrap();
        assert_eq!(parsed.summary, "Bread tips.");
        assert_eq!(parsed.key_points, vec!["hydration"]);
        assert_eq!(parsed.sentiment, "neutral");
        assert_eq!(parsed.content_type.as_deref(), Some("tutorial"));
        assert!(!parsed.is_fallback);
    }

    #[test]
    fn non_json_reply_falls_back_to_prefix() {
        let raw = format!("Sorry, I cannot {}", "x".repeat(584));
        assert_eq!(raw.chars().count(), 600);
        assert!(parse_summary_reply(&raw).is_none());

        let fallback = fallback_summary(&raw, 500);
        assert_eq!(fallback.summary, raw.chars().take(500).collect::<String>());
        assert!(fallback.key_points.is_empty());
        assert!(fallback.topics.is_empty());
        assert_eq!(fallback.sentiment, "neutral");
    }
}
