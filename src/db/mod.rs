use crate::config::Config;
use rusqlite::{Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

mod schema;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRecord {
    pub conversation_id: String,
    pub mention_id: String,
    pub replied_at: String,
}

impl Database {
    pub fn new(config: &Config) -> rusqlite::Result<Self> {
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.lock()?;
        conn.execute_batch(schema::SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs a synchronous database call on the blocking pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))
    }

    pub fn has_replied(&self, conversation_id: &str) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let exists = conn
            .prepare_cached("SELECT 1 FROM replied_conversations WHERE conversation_id = ?1")?
            .exists([conversation_id])?;
        Ok(exists)
    }

    /// Inserts a reply record unless one already exists for the conversation.
    /// Returns whether this call created the row.
    pub fn claim_conversation(&self, conversation_id: &str, mention_id: &str) -> anyhow::Result<bool> {
        debug!(
            "Database: Claiming conversation {} for mention {}",
            conversation_id, mention_id
        );
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO replied_conversations (conversation_id, mention_id, replied_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)",
            (conversation_id, mention_id),
        )?;
        Ok(inserted == 1)
    }

    pub fn release_conversation(&self, conversation_id: &str) -> anyhow::Result<usize> {
        let conn = self.lock()?;
        let count = conn.execute(
            "DELETE FROM replied_conversations WHERE conversation_id = ?1",
            (conversation_id,),
        )?;
        Ok(count)
    }

    pub fn get_reply_record(&self, conversation_id: &str) -> anyhow::Result<Option<ReplyRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT conversation_id, mention_id, replied_at
                 FROM replied_conversations WHERE conversation_id = ?1",
                [conversation_id],
                |row| {
                    Ok(ReplyRecord {
                        conversation_id: row.get(0)?,
                        mention_id: row.get(1)?,
                        replied_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn count_replied(&self) -> anyhow::Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM replied_conversations", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
