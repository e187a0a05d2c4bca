//! Pure Apify REST API client.
//!
//! A minimal client for the Apify platform API. Supports starting actor runs,
//! polling for completion, and fetching dataset results for the TikTok,
//! Instagram and YouTube scraper actors.
//!
//! # Example
//!
//! ```rust,ignore
//! use apify_client::ApifyClient;
//!
//! let client = ApifyClient::new("your-api-token".into());
//!
//! let videos = client.scrape_tiktok_videos("natgeo", 10).await?;
//! for video in &videos {
//!     println!("{}", video.text.as_deref().unwrap_or("(no caption)"));
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    InstagramPost, InstagramScraperInput, RunData, StartUrl, TikTokScraperInput, TikTokVideo,
    YouTubeScraperInput, YouTubeVideo,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for clockworks/tiktok-scraper.
const TIKTOK_SCRAPER: &str = "clockworks~tiktok-scraper";

/// Actor ID for apify/instagram-post-scraper.
const INSTAGRAM_POST_SCRAPER: &str = "nH2AHrwxeTRJoN5hX";

/// Actor ID for streamers/youtube-scraper.
const YOUTUBE_SCRAPER: &str = "streamers~youtube-scraper";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize + ?Sized>(&self, actor_id: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    ///
    /// Callers bound the total wait with their own timeout.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let resp = check_status(resp).await?;
            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    continue;
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json&clean=true", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Run an actor end-to-end: start run, poll, fetch results.
    pub async fn run_actor<I, T>(&self, actor_id: &str, input: &I) -> Result<Vec<T>>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let run = self.start_run(actor_id, input).await?;
        tracing::info!(actor_id, run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        self.get_dataset_items(&completed.default_dataset_id).await
    }

    /// Scrape the latest videos of a TikTok profile.
    pub async fn scrape_tiktok_videos(&self, handle: &str, limit: u32) -> Result<Vec<TikTokVideo>> {
        let input = TikTokScraperInput {
            profiles: vec![handle.trim_start_matches('@').to_string()],
            results_per_page: limit,
            should_download_videos: false,
        };
        let videos: Vec<TikTokVideo> = self.run_actor(TIKTOK_SCRAPER, &input).await?;
        tracing::info!(handle, count = videos.len(), "Fetched TikTok videos");
        Ok(videos)
    }

    /// Scrape the latest posts of an Instagram profile.
    pub async fn scrape_instagram_posts(&self, username: &str, limit: u32) -> Result<Vec<InstagramPost>> {
        let input = InstagramScraperInput {
            username: vec![username.to_string()],
            results_limit: limit,
        };
        let posts: Vec<InstagramPost> = self.run_actor(INSTAGRAM_POST_SCRAPER, &input).await?;
        tracing::info!(username, count = posts.len(), "Fetched Instagram posts");
        Ok(posts)
    }

    /// Scrape the latest uploads of a YouTube channel.
    pub async fn scrape_youtube_videos(&self, handle: &str, limit: u32) -> Result<Vec<YouTubeVideo>> {
        let input = YouTubeScraperInput {
            start_urls: vec![StartUrl {
                url: youtube_channel_url(handle),
            }],
            max_results: limit,
        };
        let videos: Vec<YouTubeVideo> = self.run_actor(YOUTUBE_SCRAPER, &input).await?;
        tracing::info!(handle, count = videos.len(), "Fetched YouTube videos");
        Ok(videos)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApifyError::Api {
        status: status.as_u16(),
        message: body,
    })
}

fn youtube_channel_url(handle: &str) -> String {
    if handle.starts_with("http") {
        handle.to_string()
    } else {
        format!("https://www.youtube.com/@{}/videos", handle.trim_start_matches('@'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_handles_become_channel_urls() {
        assert_eq!(
            youtube_channel_url("@veritasium"),
            "https://www.youtube.com/@veritasium/videos"
        );
        assert_eq!(
            youtube_channel_url("https://www.youtube.com/c/x"),
            "https://www.youtube.com/c/x"
        );
    }
}
