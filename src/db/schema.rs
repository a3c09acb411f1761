/// One row per conversation the bot has answered.
///
/// The UNIQUE constraint backs both the point lookup and the
/// claim-before-reply conditional insert.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS replied_conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id TEXT NOT NULL UNIQUE,
        mention_id TEXT NOT NULL,
        replied_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
";
