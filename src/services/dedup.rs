use crate::db::Database;
use async_trait::async_trait;

/// Persistent record of which conversations have already been answered.
///
/// Keys are stringified conversation ids.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Records `key` unless it is already present. Returns `true` only when
    /// this call created the record.
    async fn insert(&self, key: &str, mention_id: &str) -> anyhow::Result<bool>;

    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

pub struct ReplyLedger {
    db: Database,
}

impl ReplyLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn count(&self) -> anyhow::Result<usize> {
        self.db.run_blocking(|db| db.count_replied()).await
    }
}

#[async_trait]
impl DedupStore for ReplyLedger {
    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let key = key.to_string();
        self.db.run_blocking(move |db| db.has_replied(&key)).await
    }

    async fn insert(&self, key: &str, mention_id: &str) -> anyhow::Result<bool> {
        let key = key.to_string();
        let mention_id = mention_id.to_string();
        self.db
            .run_blocking(move |db| db.claim_conversation(&key, &mention_id))
            .await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let key = key.to_string();
        self.db
            .run_blocking(move |db| db.release_conversation(&key))
            .await?;
        Ok(())
    }
}
