//! Fetch stage: pull a creator's recent items, upsert them, and fan out one
//! transcribe job per item.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::domains::content::{Content, ContentInput};
use crate::domains::creators::UserPreferences;
use crate::kernel::jobs::{
    FetchPayload, Job, JobPayload, StageError, StageOutcome, TranscribePayload,
};
use crate::kernel::{ServerDeps, SourceItem};

/// Priority for a transcribe job, from how much text surrounds the item.
///
/// Short titles and captions tend to go with short clips, which transcribe
/// quickly, so they go first. Lower runs first.
pub fn transcribe_priority(content: &Content) -> i32 {
    match content.text_length() {
        0..=50 => 1,
        51..=150 => 5,
        _ => 10,
    }
}

/// Keeps items published after `cutoff`. Items without a publish date are kept.
pub fn filter_recent(items: Vec<SourceItem>, cutoff: DateTime<Utc>) -> Vec<SourceItem> {
    items
        .into_iter()
        .filter(|item| item.published_at.map_or(true, |published| published >= cutoff))
        .collect()
}

pub async fn fetch_creator_content(
    job: &Job,
    payload: &FetchPayload,
    deps: &ServerDeps,
) -> Result<StageOutcome, StageError> {
    let creator = deps
        .store
        .find_creator(payload.creator.creator_id)
        .await?
        .ok_or_else(|| {
            StageError::permanent(format!("creator {} not found", payload.creator.creator_id))
        })?;

    let prefs = deps
        .store
        .user_preferences(job.user_id)
        .await?
        .unwrap_or_else(|| {
            UserPreferences::defaults(
                job.user_id,
                deps.config.default_recency_days,
                deps.config.default_max_items,
            )
        });

    let max_items = prefs.max_items_per_creator.max(1) as usize;
    let items = deps.content_source.fetch(&creator.descriptor(), max_items).await?;
    let fetched = items.len();

    let cutoff = Utc::now() - Duration::days(i64::from(prefs.recency_days.max(1)));
    let recent = filter_recent(items, cutoff);

    let mut enqueued = 0;
    for item in recent.iter().cloned() {
        let (content, _inserted) = deps
            .store
            .upsert_content(ContentInput {
                platform: creator.platform,
                creator_id: creator.id,
                creator_handle: creator.handle.clone(),
                item,
            })
            .await?;

        let result = deps
            .queue
            .enqueue_idempotent(
                job.user_id,
                job.session_id,
                JobPayload::Transcribe(TranscribePayload {
                    content_id: content.id,
                    source_url: content.source_url.clone(),
                    platform: content.platform,
                }),
                transcribe_priority(&content),
            )
            .await?;
        if result.is_created() {
            enqueued += 1;
        }
    }

    deps.store.mark_creator_fetched(creator.id).await?;

    info!(
        creator_id = %creator.id,
        handle = %creator.handle,
        platform = %creator.platform,
        fetched,
        recent = recent.len(),
        enqueued,
        "Fetched creator content"
    );

    Ok(StageOutcome::new(recent.len(), enqueued))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CreatorId, Platform};
    use crate::kernel::ContentStats;

    fn item(id: &str, published_at: Option<DateTime<Utc>>) -> SourceItem {
        SourceItem {
            external_id: id.into(),
            title: None,
            caption: None,
            hashtags: vec![],
            media_url: None,
            source_url: format!("https://example.com/{}", id),
            stats: ContentStats::default(),
            published_at,
        }
    }

    fn content(title: Option<&str>, caption: Option<&str>) -> Content {
        let mut item = item("x", None);
        item.title = title.map(String::from);
        item.caption = caption.map(String::from);
        Content::from_input(ContentInput {
            platform: Platform::Youtube,
            creator_id: CreatorId::new(),
            creator_handle: "chef".into(),
            item,
        })
    }

    #[test]
    fn recency_filter_keeps_undated_items() {
        let now = Utc::now();
        let items = vec![
            item("new", Some(now - Duration::days(1))),
            item("old", Some(now - Duration::days(30))),
            item("undated", None),
        ];
        let kept: Vec<String> = filter_recent(items, now - Duration::days(7))
            .into_iter()
            .map(|i| i.external_id)
            .collect();
        assert_eq!(kept, vec!["new", "undated"]);
    }

    #[test]
    fn shorter_text_gets_higher_priority() {
        let short = content(Some("Quick tip"), None);
        let medium = content(Some(&"a".repeat(100)), None);
        let long = content(Some("Full episode"), Some(&"b".repeat(400)));
        assert_eq!(transcribe_priority(&short), 1);
        assert_eq!(transcribe_priority(&medium), 5);
        assert_eq!(transcribe_priority(&long), 10);
    }
}
