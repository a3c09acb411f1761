use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod client;
pub mod oauth;

pub use client::TwitterClient;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TweetId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl TweetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TweetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tweet that mentions the authenticated account.
#[derive(Debug, Clone, Deserialize)]
pub struct Mention {
    pub id: TweetId,
    #[serde(default)]
    pub text: String,
    pub conversation_id: Option<TweetId>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A tweet fetched by id, used as the root of a mention's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Post {
    pub id: TweetId,
    #[serde(default)]
    pub text: String,
}

impl From<&Mention> for Post {
    fn from(mention: &Mention) -> Self {
        Post {
            id: mention.id.clone(),
            text: mention.text.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twitter API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("Unexpected Twitter response: {0}")]
    Response(String),

    #[error("Rate limit still exhausted after {0} retries")]
    RateLimited(u32),

    #[error("Failed to sign request: {0}")]
    Signing(String),
}

/// The slice of the Twitter API the mention processor depends on.
#[async_trait]
pub trait SocialApi: Send + Sync {
    async fn resolve_self(&self) -> Result<UserId, TwitterError>;

    /// Returns at most one page of mentions created after `since`.
    async fn fetch_mentions(
        &self,
        account: &UserId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Mention>, TwitterError>;

    /// `Ok(None)` when the API reports the tweet as missing or deleted.
    async fn fetch_post(&self, id: &TweetId) -> Result<Option<Post>, TwitterError>;

    async fn post_reply(&self, text: &str, in_reply_to: &TweetId) -> Result<TweetId, TwitterError>;
}
