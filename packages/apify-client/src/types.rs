use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input for the clockworks/tiktok-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct TikTokScraperInput {
    pub profiles: Vec<String>,
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: u32,
    #[serde(rename = "shouldDownloadVideos")]
    pub should_download_videos: bool,
}

/// Input for the apify/instagram-post-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct InstagramScraperInput {
    pub username: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
}

/// Input for the streamers/youtube-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct YouTubeScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    #[serde(rename = "maxResults")]
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// A single TikTok video from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct TikTokVideo {
    pub id: String,
    pub text: Option<String>,
    #[serde(rename = "webVideoUrl")]
    pub web_video_url: Option<String>,
    #[serde(rename = "createTimeISO")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(rename = "playCount")]
    pub play_count: Option<i64>,
    #[serde(rename = "diggCount")]
    pub digg_count: Option<i64>,
    #[serde(rename = "commentCount")]
    pub comment_count: Option<i64>,
    #[serde(rename = "shareCount")]
    pub share_count: Option<i64>,
    #[serde(default)]
    pub hashtags: Vec<TikTokHashtag>,
    #[serde(rename = "videoMeta")]
    pub video_meta: Option<TikTokVideoMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TikTokHashtag {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TikTokVideoMeta {
    pub duration: Option<i64>,
}

/// A single Instagram post from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct InstagramPost {
    pub id: Option<String>,
    pub caption: Option<String>,
    pub url: String,
    #[serde(rename = "shortCode")]
    pub short_code: Option<String>,
    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
    #[serde(rename = "likesCount")]
    pub likes_count: Option<i64>,
    #[serde(rename = "commentsCount")]
    pub comments_count: Option<i64>,
    #[serde(rename = "videoViewCount")]
    pub video_view_count: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// A single YouTube video from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeVideo {
    pub id: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub url: String,
    #[serde(rename = "viewCount")]
    pub view_count: Option<i64>,
    pub likes: Option<i64>,
    #[serde(rename = "commentsCount")]
    pub comments_count: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiktok_video_deserializes_dataset_item() {
        let raw = r##"{
            "id": "7301",
            "text": "quick pasta #cooking",
            "webVideoUrl": "https://www.tiktok.com/@chef/video/7301",
            "createTimeISO": "2024-05-01T12:00:00.000Z",
            "playCount": 1200,
            "diggCount": 90,
            "hashtags": [{"name": "cooking"}],
            "videoMeta": {"duration": 31}
        }"##;
        let video: TikTokVideo = serde_json::from_str(raw).unwrap();
        assert_eq!(video.id, "7301");
        assert_eq!(video.play_count, Some(1200));
        assert_eq!(video.hashtags[0].name.as_deref(), Some("cooking"));
        assert_eq!(video.video_meta.and_then(|m| m.duration), Some(31));
    }

    #[test]
    fn instagram_post_tolerates_missing_hashtags() {
        let raw = r#"{"url": "https://www.instagram.com/p/abc/", "caption": "hello"}"#;
        let post: InstagramPost = serde_json::from_str(raw).unwrap();
        assert!(post.hashtags.is_empty());
        assert_eq!(post.caption.as_deref(), Some("hello"));
    }
}
