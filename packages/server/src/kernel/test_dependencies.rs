// TestDependencies - mock implementations for testing
//
// Provides mock providers and an in-memory content store that can be
// injected into ServerDeps, so whole drain cycles run without a database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{
    AsyncTranscriptState, BaseAI, BaseContentSource, BaseTranscriptionService, ContentStats,
    ContentStore, ProviderError, ServerDeps, SourceItem, TranscriptionReply,
};
use crate::common::{ContentId, CreatorId, Platform, UserId};
use crate::config::PipelineConfig;
use crate::domains::content::{Content, ContentInput};
use crate::domains::creators::{Creator, UserPreferences};
use crate::domains::summaries::Summary;
use crate::domains::transcripts::{Transcript, TranscriptStatus};
use crate::kernel::jobs::testing::InMemoryJobStore;
use crate::kernel::jobs::{CreatorDescriptor, QueueManager};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A source item with a recent publish date and the given caption.
pub fn source_item(external_id: &str, caption: &str) -> SourceItem {
    SourceItem {
        external_id: external_id.to_string(),
        title: None,
        caption: Some(caption.to_string()),
        hashtags: Vec::new(),
        media_url: None,
        source_url: format!("https://example.com/v/{}", external_id),
        stats: ContentStats::default(),
        published_at: Some(Utc::now() - ChronoDuration::hours(1)),
    }
}

// =============================================================================
// Mock Content Source
// =============================================================================

pub struct MockContentSource {
    items: Arc<Mutex<HashMap<String, Vec<SourceItem>>>>,
    errors: Arc<Mutex<HashMap<String, ProviderError>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockContentSource {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(HashMap::new())),
            errors: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Items returned for a creator handle (on every call)
    pub fn with_items(self, handle: &str, items: Vec<SourceItem>) -> Self {
        lock(&self.items).insert(handle.to_string(), items);
        self
    }

    /// Make every fetch for a handle fail
    pub fn with_error(self, handle: &str, error: ProviderError) -> Self {
        lock(&self.errors).insert(handle.to_string(), error);
        self
    }

    /// Let previously failing handles succeed from now on
    pub fn clear_errors(&self) {
        lock(&self.errors).clear();
    }

    /// Handles that were fetched, in call order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl Default for MockContentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseContentSource for MockContentSource {
    async fn fetch(
        &self,
        creator: &CreatorDescriptor,
        max_items: usize,
    ) -> Result<Vec<SourceItem>, ProviderError> {
        lock(&self.calls).push(creator.handle.clone());

        if let Some(error) = lock(&self.errors).get(&creator.handle) {
            return Err(error.clone());
        }
        let items = lock(&self.items)
            .get(&creator.handle)
            .cloned()
            .unwrap_or_default();
        Ok(items.into_iter().take(max_items).collect())
    }
}

// =============================================================================
// Mock Transcriber
// =============================================================================

pub struct MockTranscriber {
    replies: Arc<Mutex<HashMap<String, Result<TranscriptionReply, ProviderError>>>>,
    poll_states: Arc<Mutex<HashMap<String, Vec<AsyncTranscriptState>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    polls: Arc<Mutex<Vec<String>>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(HashMap::new())),
            poll_states: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            polls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply for a source URL. URLs without one get a short ready transcript.
    pub fn with_reply(self, source_url: &str, reply: TranscriptionReply) -> Self {
        lock(&self.replies).insert(source_url.to_string(), Ok(reply));
        self
    }

    pub fn with_text(self, source_url: &str, text: &str) -> Self {
        self.with_reply(
            source_url,
            TranscriptionReply::Ready {
                text: text.to_string(),
                aux_format: None,
                language: Some("en".to_string()),
            },
        )
    }

    pub fn with_error(self, source_url: &str, error: ProviderError) -> Self {
        lock(&self.replies).insert(source_url.to_string(), Err(error));
        self
    }

    /// States returned by successive polls of `handle`; the last one repeats.
    pub fn with_poll_states(self, handle: &str, states: Vec<AsyncTranscriptState>) -> Self {
        lock(&self.poll_states).insert(handle.to_string(), states);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn polls(&self) -> Vec<String> {
        lock(&self.polls).clone()
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseTranscriptionService for MockTranscriber {
    async fn transcribe(&self, source_url: &str) -> Result<TranscriptionReply, ProviderError> {
        lock(&self.calls).push(source_url.to_string());

        match lock(&self.replies).get(source_url) {
            Some(reply) => reply.clone(),
            None => Ok(TranscriptionReply::Ready {
                text: format!("Mock transcript for {}", source_url),
                aux_format: None,
                language: Some("en".to_string()),
            }),
        }
    }

    async fn poll(&self, handle: &str) -> Result<AsyncTranscriptState, ProviderError> {
        lock(&self.polls).push(handle.to_string());

        let mut states = lock(&self.poll_states);
        match states.get_mut(handle) {
            Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
            Some(queue) => Ok(queue
                .first()
                .cloned()
                .unwrap_or(AsyncTranscriptState::InProgress)),
            None => Err(ProviderError::Permanent(format!("unknown handle {}", handle))),
        }
    }
}

// =============================================================================
// Mock AI (Generic LLM capabilities)
// =============================================================================

pub const MOCK_SUMMARY_JSON: &str = r#"{"summary":"A short mock summary.","key_points":["first point"],"topics":["testing"],"sentiment":"neutral","content_type":"tutorial"}"#;

pub struct MockAI {
    responses: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delays: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delays: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a text response to the queue
    pub fn with_response(self, response: impl Into<String>) -> Self {
        lock(&self.responses).push(response.into());
        self
    }

    /// Sleep before replying when the prompt contains `pattern`
    pub fn with_delay_for(self, pattern: &str, delay: Duration) -> Self {
        lock(&self.delays).push((pattern.to_string(), delay));
        self
    }

    /// Get all user prompts that were sent to the AI
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Get the number of times the AI was called
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete_json(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
        lock(&self.calls).push(user.to_string());

        let delay = lock(&self.delays)
            .iter()
            .find(|(pattern, _)| user.contains(pattern.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = lock(&self.responses);
        if !responses.is_empty() {
            Ok(responses.remove(0))
        } else {
            Ok(MOCK_SUMMARY_JSON.to_string())
        }
    }
}

// =============================================================================
// In-memory content store
// =============================================================================

#[derive(Default)]
struct ContentState {
    creators: HashMap<CreatorId, Creator>,
    follows: HashMap<UserId, Vec<CreatorId>>,
    preferences: HashMap<UserId, UserPreferences>,
    content: HashMap<ContentId, Content>,
    content_keys: HashMap<(Platform, String), ContentId>,
    transcripts: HashMap<ContentId, Transcript>,
    summaries: HashMap<ContentId, Summary>,
}

/// Content store with the same uniqueness rules as the Postgres schema.
#[derive(Default)]
pub struct InMemoryContentStore {
    state: Mutex<ContentState>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a creator and has `user_id` follow it.
    pub fn add_followed_creator(&self, user_id: UserId, platform: Platform, handle: &str) -> Creator {
        let creator = Creator::new(platform, handle);
        let mut state = lock(&self.state);
        state.creators.insert(creator.id, creator.clone());
        state.follows.entry(user_id).or_default().push(creator.id);
        creator
    }

    pub fn set_preferences(&self, prefs: UserPreferences) {
        lock(&self.state).preferences.insert(prefs.user_id, prefs);
    }

    pub fn content(&self) -> Vec<Content> {
        lock(&self.state).content.values().cloned().collect()
    }

    pub fn transcript(&self, content_id: ContentId) -> Option<Transcript> {
        lock(&self.state).transcripts.get(&content_id).cloned()
    }

    pub fn summary(&self, content_id: ContentId) -> Option<Summary> {
        lock(&self.state).summaries.get(&content_id).cloned()
    }

    pub fn summaries(&self) -> Vec<Summary> {
        lock(&self.state).summaries.values().cloned().collect()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn find_creator(&self, id: CreatorId) -> Result<Option<Creator>> {
        Ok(lock(&self.state).creators.get(&id).cloned())
    }

    async fn find_creators(&self, ids: &[CreatorId]) -> Result<Vec<Creator>> {
        let state = lock(&self.state);
        Ok(ids
            .iter()
            .filter_map(|id| state.creators.get(id).cloned())
            .collect())
    }

    async fn followed_creators(&self, user_id: UserId) -> Result<Vec<Creator>> {
        let state = lock(&self.state);
        let ids = state.follows.get(&user_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| state.creators.get(id).cloned())
            .collect())
    }

    async fn user_preferences(&self, user_id: UserId) -> Result<Option<UserPreferences>> {
        Ok(lock(&self.state).preferences.get(&user_id).cloned())
    }

    async fn mark_creator_fetched(&self, id: CreatorId) -> Result<()> {
        if let Some(creator) = lock(&self.state).creators.get_mut(&id) {
            creator.last_fetched_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn upsert_content(&self, input: ContentInput) -> Result<(Content, bool)> {
        let mut state = lock(&self.state);
        let key = (input.platform, input.item.external_id.clone());

        if let Some(id) = state.content_keys.get(&key).copied() {
            if let Some(existing) = state.content.get_mut(&id) {
                existing.refresh_stats(&input.item.stats);
                return Ok((existing.clone(), false));
            }
        }

        let content = Content::from_input(input);
        state.content_keys.insert(key, content.id);
        state.content.insert(content.id, content.clone());
        Ok((content, true))
    }

    async fn find_content(&self, id: ContentId) -> Result<Option<Content>> {
        Ok(lock(&self.state).content.get(&id).cloned())
    }

    async fn upsert_transcript(&self, mut transcript: Transcript) -> Result<Transcript> {
        let mut state = lock(&self.state);
        if let Some(existing) = state.transcripts.get(&transcript.content_id) {
            transcript.created_at = existing.created_at;
        }
        transcript.updated_at = Utc::now();
        state
            .transcripts
            .insert(transcript.content_id, transcript.clone());
        Ok(transcript)
    }

    async fn find_transcript(&self, content_id: ContentId) -> Result<Option<Transcript>> {
        Ok(lock(&self.state).transcripts.get(&content_id).cloned())
    }

    async fn pending_async_transcripts(&self, limit: i64) -> Result<Vec<Transcript>> {
        let state = lock(&self.state);
        let mut pending: Vec<Transcript> = state
            .transcripts
            .values()
            .filter(|t| t.status == TranscriptStatus::PendingAsync)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.updated_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn mark_transcript_polled(&self, content_id: ContentId) -> Result<()> {
        let mut state = lock(&self.state);
        // Strictly after every other row, even when the clock has not moved.
        let latest = state.transcripts.values().map(|t| t.updated_at).max();
        let now = latest.map_or_else(Utc::now, |latest| {
            Utc::now().max(latest + ChronoDuration::microseconds(1))
        });
        if let Some(transcript) = state.transcripts.get_mut(&content_id) {
            if transcript.status == TranscriptStatus::PendingAsync {
                transcript.updated_at = now;
            }
        }
        Ok(())
    }

    async fn upsert_summary(&self, mut summary: Summary) -> Result<Summary> {
        let mut state = lock(&self.state);
        if let Some(existing) = state.summaries.get(&summary.content_id) {
            summary.created_at = existing.created_at;
        }
        summary.updated_at = Utc::now();
        state.summaries.insert(summary.content_id, summary.clone());
        Ok(summary)
    }

    async fn find_summary(&self, content_id: ContentId) -> Result<Option<Summary>> {
        Ok(lock(&self.state).summaries.get(&content_id).cloned())
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub content_source: Arc<MockContentSource>,
    pub transcriber: Arc<MockTranscriber>,
    pub ai: Arc<MockAI>,
    pub store: Arc<InMemoryContentStore>,
    pub jobs: Arc<InMemoryJobStore>,
    pub config: PipelineConfig,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            content_source: Arc::new(MockContentSource::new()),
            transcriber: Arc::new(MockTranscriber::new()),
            ai: Arc::new(MockAI::new()),
            store: Arc::new(InMemoryContentStore::new()),
            jobs: Arc::new(InMemoryJobStore::new()),
            config: PipelineConfig::default(),
        }
    }

    /// Set a mock content source
    pub fn mock_content_source(mut self, source: MockContentSource) -> Self {
        self.content_source = Arc::new(source);
        self
    }

    /// Set a mock transcriber
    pub fn mock_transcriber(mut self, transcriber: MockTranscriber) -> Self {
        self.transcriber = Arc::new(transcriber);
        self
    }

    /// Set a mock AI
    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    /// Override pipeline tunables
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Convert into ServerDeps backed by the in-memory stores
    pub fn into_deps(self) -> ServerDeps {
        let config = Arc::new(self.config);
        let queue = QueueManager::new(self.jobs).with_max_retries(config.default_max_retries);
        ServerDeps::new(
            queue,
            self.store,
            self.content_source,
            self.transcriber,
            self.ai,
            config,
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
