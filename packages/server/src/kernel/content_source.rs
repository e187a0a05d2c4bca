//! Apify-backed content source.

use apify_client::{ApifyClient, ApifyError, InstagramPost, TikTokVideo, YouTubeVideo};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::credentials::CredentialPool;
use super::traits::{BaseContentSource, ContentStats, ProviderError, SourceItem};
use crate::common::Platform;
use crate::kernel::jobs::CreatorDescriptor;

pub struct ApifyContentSource {
    pool: CredentialPool<Arc<ApifyClient>>,
    /// Per credential.
    timeout: Duration,
    /// Across the whole rotation.
    total_timeout: Duration,
}

impl ApifyContentSource {
    pub fn new(tokens: &[String], timeout: Duration, total_timeout: Duration) -> anyhow::Result<Self> {
        let clients = tokens
            .iter()
            .map(|token| Arc::new(ApifyClient::new(token.clone())))
            .collect();
        Ok(Self {
            pool: CredentialPool::new(clients)?,
            timeout,
            total_timeout,
        })
    }
}

#[async_trait]
impl BaseContentSource for ApifyContentSource {
    async fn fetch(
        &self,
        creator: &CreatorDescriptor,
        max_items: usize,
    ) -> Result<Vec<SourceItem>, ProviderError> {
        let limit = max_items as u32;
        let deadline = Instant::now() + self.total_timeout;
        self.pool
            .with_rotation_until(
                deadline,
                |client, remaining| {
                    let creator = creator.clone();
                    let timeout = self.timeout.min(remaining);
                    async move {
                        let scrape = scrape(&client, &creator, limit);
                        match tokio::time::timeout(timeout, scrape).await {
                            Ok(result) => result.map_err(provider_error),
                            Err(_) => Err(ProviderError::Transient(format!(
                                "content source timed out after {:?}",
                                timeout
                            ))),
                        }
                    }
                },
                ProviderError::is_transient,
            )
            .await
    }
}

async fn scrape(
    client: &ApifyClient,
    creator: &CreatorDescriptor,
    limit: u32,
) -> apify_client::Result<Vec<SourceItem>> {
    let items = match creator.platform {
        Platform::Tiktok => client
            .scrape_tiktok_videos(&creator.handle, limit)
            .await?
            .into_iter()
            .filter_map(|v| from_tiktok(v, &creator.handle))
            .collect(),
        Platform::Instagram => client
            .scrape_instagram_posts(&creator.handle, limit)
            .await?
            .into_iter()
            .filter_map(from_instagram)
            .collect(),
        Platform::Youtube => client
            .scrape_youtube_videos(&creator.handle, limit)
            .await?
            .into_iter()
            .map(from_youtube)
            .collect(),
    };
    Ok(items)
}

fn provider_error(err: ApifyError) -> ProviderError {
    match &err {
        ApifyError::Api { status: 429, .. } => ProviderError::RateLimited(err.to_string()),
        _ if err.is_transient() => ProviderError::Transient(err.to_string()),
        _ => ProviderError::Permanent(err.to_string()),
    }
}

fn from_tiktok(video: TikTokVideo, handle: &str) -> Option<SourceItem> {
    let source_url = video.web_video_url.clone().unwrap_or_else(|| {
        format!(
            "https://www.tiktok.com/@{}/video/{}",
            handle.trim_start_matches('@'),
            video.id
        )
    });
    if video.id.is_empty() {
        return None;
    }
    Some(SourceItem {
        external_id: video.id,
        title: None,
        caption: video.text,
        hashtags: video.hashtags.into_iter().filter_map(|h| h.name).collect(),
        media_url: video.web_video_url,
        source_url,
        stats: ContentStats {
            views: video.play_count,
            likes: video.digg_count,
            comments: video.comment_count,
            shares: video.share_count,
        },
        published_at: video.create_time,
    })
}

fn from_instagram(post: InstagramPost) -> Option<SourceItem> {
    let external_id = post.id.or(post.short_code)?;
    Some(SourceItem {
        external_id,
        title: None,
        caption: post.caption,
        hashtags: post.hashtags,
        media_url: post.video_url,
        source_url: post.url,
        stats: ContentStats {
            views: post.video_view_count,
            likes: post.likes_count,
            comments: post.comments_count,
            shares: None,
        },
        published_at: post.timestamp,
    })
}

fn from_youtube(video: YouTubeVideo) -> SourceItem {
    SourceItem {
        external_id: video.id,
        title: video.title,
        caption: video.text,
        hashtags: video.hashtags,
        media_url: None,
        source_url: video.url,
        stats: ContentStats {
            views: video.view_count,
            likes: video.likes,
            comments: video.comments_count,
            shares: None,
        },
        published_at: video.date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_maps_to_rate_limited() {
        let err = provider_error(ApifyError::Api {
            status: 429,
            message: "slow down".into(),
        });
        assert!(err.is_rate_limited());
        assert!(err.is_transient());
    }

    #[test]
    fn bad_request_is_permanent() {
        let err = provider_error(ApifyError::Api {
            status: 400,
            message: "unknown profile".into(),
        });
        assert!(!err.is_transient());
    }

    #[test]
    fn instagram_post_without_id_uses_short_code() {
        let post: InstagramPost = serde_json::from_value(serde_json::json!({
            "shortCode": "Cx1",
            "url": "https://www.instagram.com/p/Cx1/",
            "caption": "Sourdough #bread",
            "hashtags": ["bread"]
        }))
        .unwrap();
        let item = from_instagram(post).unwrap();
        assert_eq!(item.external_id, "Cx1");
        assert_eq!(item.hashtags, vec!["bread".to_string()]);
    }
}
