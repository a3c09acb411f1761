//! In-memory doubles for the processor's collaborators.

use crate::services::dedup::DedupStore;
use crate::throttle::ReplyThrottle;
use crate::twitter::{Mention, Post, SocialApi, TweetId, TwitterError, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn mention(id: &str, conversation_id: Option<&str>) -> Mention {
    Mention {
        id: TweetId::new(id),
        text: format!("@replybot mention {}", id),
        conversation_id: conversation_id.map(TweetId::new),
        created_at: Some(Utc::now()),
    }
}

#[derive(Default)]
pub struct FakeApi {
    me: String,
    mentions: Mutex<Vec<Mention>>,
    posts: Mutex<HashMap<String, Post>>,
    broken_posts: Mutex<HashSet<String>>,
    failing_replies: Mutex<HashSet<String>>,
    pub fail_fetch: AtomicBool,
    pub hang_fetch: AtomicBool,
    pub hang_reply: AtomicBool,
    pub resolve_calls: AtomicUsize,
    pub mention_requests: Mutex<Vec<(UserId, usize)>>,
    pub fetched_posts: Mutex<Vec<TweetId>>,
    pub replies: Mutex<Vec<(String, TweetId)>>,
}

impl FakeApi {
    pub fn new(me: &str) -> Self {
        Self {
            me: me.to_string(),
            ..Default::default()
        }
    }

    pub fn with_mentions(self, mentions: Vec<Mention>) -> Self {
        *self.mentions.lock().unwrap() = mentions;
        self
    }

    pub fn with_post(self, id: &str, text: &str) -> Self {
        self.posts.lock().unwrap().insert(
            id.to_string(),
            Post {
                id: TweetId::new(id),
                text: text.to_string(),
            },
        );
        self
    }

    /// Fetching this post fails with a server error.
    pub fn with_broken_post(self, id: &str) -> Self {
        self.broken_posts.lock().unwrap().insert(id.to_string());
        self
    }

    /// Replying to this mention id fails.
    pub fn failing_reply_to(self, mention_id: &str) -> Self {
        self.failing_replies
            .lock()
            .unwrap()
            .insert(mention_id.to_string());
        self
    }

    pub fn reply_targets(&self) -> Vec<String> {
        self.replies
            .lock()
            .unwrap()
            .iter()
            .map(|(_, id)| id.to_string())
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.mention_requests.lock().unwrap().len()
    }
}

fn api_error(status: StatusCode, message: &str) -> TwitterError {
    TwitterError::Api {
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl SocialApi for FakeApi {
    async fn resolve_self(&self) -> Result<UserId, TwitterError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(UserId::new(self.me.clone()))
    }

    async fn fetch_mentions(
        &self,
        account: &UserId,
        _since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Mention>, TwitterError> {
        self.mention_requests
            .lock()
            .unwrap()
            .push((account.clone(), limit));
        if self.hang_fetch.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, "mentions unavailable"));
        }
        // Ignores `limit` so truncation is left to the caller.
        Ok(self.mentions.lock().unwrap().clone())
    }

    async fn fetch_post(&self, id: &TweetId) -> Result<Option<Post>, TwitterError> {
        self.fetched_posts.lock().unwrap().push(id.clone());
        if self.broken_posts.lock().unwrap().contains(id.as_str()) {
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "tweet lookup failed"));
        }
        Ok(self.posts.lock().unwrap().get(id.as_str()).cloned())
    }

    async fn post_reply(&self, text: &str, in_reply_to: &TweetId) -> Result<TweetId, TwitterError> {
        if self.hang_reply.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self
            .failing_replies
            .lock()
            .unwrap()
            .contains(in_reply_to.as_str())
        {
            return Err(api_error(StatusCode::FORBIDDEN, "reply rejected"));
        }
        let mut replies = self.replies.lock().unwrap();
        replies.push((text.to_string(), in_reply_to.clone()));
        Ok(TweetId::new(format!("9000{}", replies.len())))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    keys: Mutex<HashSet<String>>,
    pub lookups: AtomicUsize,
    pub unreachable: AtomicBool,
}

impl MemoryStore {
    pub fn with_keys(keys: &[&str]) -> Self {
        let store = Self::default();
        store
            .keys
            .lock()
            .unwrap()
            .extend(keys.iter().map(|k| k.to_string()));
        store
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().unwrap().contains(key)
    }

    fn check_reachable(&self) -> anyhow::Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            anyhow::bail!("store unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl DedupStore for MemoryStore {
    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        self.check_reachable()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.contains(key))
    }

    async fn insert(&self, key: &str, _mention_id: &str) -> anyhow::Result<bool> {
        self.check_reachable()?;
        Ok(self.keys.lock().unwrap().insert(key.to_string()))
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.check_reachable()?;
        self.keys.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Counts pauses instead of sleeping.
#[derive(Default)]
pub struct CountingThrottle {
    pub pauses: AtomicUsize,
}

#[async_trait]
impl ReplyThrottle for CountingThrottle {
    async fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }
}
