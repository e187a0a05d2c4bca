//! Postgres harness for the store tests.
//!
//! A single Postgres 16 container backs every test in a binary; the first
//! test to ask for it starts it and applies the migrations.

use std::sync::Arc;

use anyhow::{Context, Result};
use digest_core::common::Platform;
use digest_core::domains::creators::Creator;
use digest_core::kernel::jobs::{PostgresJobStore, QueueManager};
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct SharedDatabase {
    db_url: String,
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_DB: OnceCell<SharedDatabase> = OnceCell::const_new();

impl SharedDatabase {
    async fn init() -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Postgres container did not start")?;

        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            postgres.get_host().await?,
            postgres.get_host_port_ipv4(5432).await?
        );

        let pool = PgPool::connect(&db_url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("pipeline migrations failed")?;
        pool.close().await;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_DB
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("shared test database unavailable")
            })
            .await
    }
}

/// Pool on the shared database. Tests share rows, so each one should work on
/// its own users and creators.
pub struct TestHarness {
    pub db_pool: PgPool,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let db = SharedDatabase::get().await;
        let db_pool = PgPool::connect(&db.db_url).await?;
        Ok(Self { db_pool })
    }

    /// Queue over the Postgres job store.
    pub fn queue(&self) -> QueueManager {
        QueueManager::new(Arc::new(PostgresJobStore::new(self.db_pool.clone())))
    }

    /// A TikTok creator with a handle no other test uses.
    pub async fn creator(&self) -> Creator {
        let handle = format!("creator-{}", uuid::Uuid::new_v4().simple());
        Creator::find_or_create(Platform::Tiktok, &handle, None, &self.db_pool)
            .await
            .expect("Failed to create creator")
    }
}
