//! Pipeline fixtures over the in-memory stores.

use std::sync::Arc;

use digest_core::common::{Platform, UserId};
use digest_core::domains::creators::Creator;
use digest_core::kernel::jobs::{DrainScheduler, RecordingContinuation};
use digest_core::kernel::test_dependencies::source_item;
use digest_core::kernel::{ServerDeps, SourceItem, TestDependencies};

/// A wired pipeline: mocks, in-memory stores, and a scheduler whose
/// continuations are recorded instead of run.
pub struct Pipeline {
    pub mocks: TestDependencies,
    pub deps: ServerDeps,
    pub scheduler: DrainScheduler,
    pub continuation: Arc<RecordingContinuation>,
}

impl Pipeline {
    pub fn new(mocks: TestDependencies) -> Self {
        let deps = mocks.clone().into_deps();
        let continuation = Arc::new(RecordingContinuation::new());
        let scheduler = deps.drain_scheduler(continuation.clone());
        Self {
            mocks,
            deps,
            scheduler,
            continuation,
        }
    }

    pub fn follow(&self, user_id: UserId, handle: &str) -> Creator {
        self.mocks
            .store
            .add_followed_creator(user_id, Platform::Tiktok, handle)
    }
}

/// `count` recent items named `{prefix}-{n}` with short captions.
pub fn items(prefix: &str, count: usize) -> Vec<SourceItem> {
    (0..count)
        .map(|n| source_item(&format!("{}-{}", prefix, n), "quick clip"))
        .collect()
}
