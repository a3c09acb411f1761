use crate::config::Config;
use crate::reply::ReplyComposer;
use crate::services::dedup::DedupStore;
use crate::throttle::ReplyThrottle;
use crate::twitter::{Mention, Post, SocialApi, TweetId, TwitterError, UserId};
use anyhow::Context as AnyhowContext;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// How many mentions are considered per cycle.
    pub response_limit: usize,
    /// How far back each cycle looks for mentions.
    pub lookback: Duration,
}

impl From<&Config> for ProcessorSettings {
    fn from(config: &Config) -> Self {
        Self {
            response_limit: config.tweet_response_limit,
            lookback: config.mention_lookback,
        }
    }
}

/// Counters for a single cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub mentions_found: usize,
    pub mentions_considered: usize,
    pub replies_sent: usize,
    pub reply_errors: usize,
    pub skipped_no_root: usize,
    pub skipped_self: usize,
    pub skipped_already_handled: usize,
    pub root_errors: usize,
}

pub struct MentionProcessor {
    api: Arc<dyn SocialApi>,
    store: Arc<dyn DedupStore>,
    composer: Arc<dyn ReplyComposer>,
    throttle: Arc<dyn ReplyThrottle>,
    settings: ProcessorSettings,
    account_id: UserId,
}

impl MentionProcessor {
    /// Resolves the authenticated account once; mentions are always fetched for it.
    pub async fn new(
        api: Arc<dyn SocialApi>,
        store: Arc<dyn DedupStore>,
        composer: Arc<dyn ReplyComposer>,
        throttle: Arc<dyn ReplyThrottle>,
        settings: ProcessorSettings,
    ) -> anyhow::Result<Self> {
        let account_id = api
            .resolve_self()
            .await
            .context("Failed to resolve the authenticated account")?;
        info!("Mention processor: running as account {}", account_id);

        Ok(Self {
            api,
            store,
            composer,
            throttle,
            settings,
            account_id,
        })
    }

    pub fn account_id(&self) -> &UserId {
        &self.account_id
    }

    /// Runs one fetch-filter-reply pass.
    ///
    /// Reply failures are counted, not returned. Errors come only from the
    /// mention fetch or the dedup store, both of which end the cycle.
    pub async fn execute_cycle(&self) -> anyhow::Result<CycleStats> {
        let mut stats = CycleStats::default();

        let mentions = self.fetch_mentions(self.settings.lookback).await?;
        stats.mentions_found = mentions.len();
        if mentions.is_empty() {
            info!("No mentions found");
            return Ok(stats);
        }

        self.filter_and_reply(mentions, &mut stats).await?;
        Ok(stats)
    }

    pub async fn fetch_mentions(&self, window: Duration) -> anyhow::Result<Vec<Mention>> {
        let window = chrono::Duration::from_std(window).context("Mention lookback is too large")?;
        let since = Utc::now() - window;

        let mentions = self
            .api
            .fetch_mentions(&self.account_id, since, self.settings.response_limit)
            .await
            .context("Failed to fetch mentions")?;
        debug!(
            "Fetched {} mentions since {}",
            mentions.len(),
            since.format("%Y-%m-%dT%H:%M:%SZ")
        );
        Ok(mentions)
    }

    /// `Ok(None)` when the mention has no conversation or the root is gone.
    pub async fn resolve_conversation_root(
        &self,
        mention: &Mention,
    ) -> Result<Option<Post>, TwitterError> {
        let Some(conversation_id) = &mention.conversation_id else {
            return Ok(None);
        };
        if conversation_id == &mention.id {
            return Ok(Some(Post::from(mention)));
        }
        self.api.fetch_post(conversation_id).await
    }

    pub async fn already_handled(&self, conversation_id: &TweetId) -> anyhow::Result<bool> {
        self.store
            .exists(conversation_id.as_str())
            .await
            .with_context(|| format!("Dedup lookup failed for conversation {}", conversation_id))
    }

    pub async fn filter_and_reply(
        &self,
        mentions: Vec<Mention>,
        stats: &mut CycleStats,
    ) -> anyhow::Result<()> {
        for mention in mentions.into_iter().take(self.settings.response_limit) {
            stats.mentions_considered += 1;

            let root = match self.resolve_conversation_root(&mention).await {
                Ok(Some(root)) => root,
                Ok(None) => {
                    debug!("Mention {}: no conversation root, skipping", mention.id);
                    stats.skipped_no_root += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        "Mention {}: failed to fetch conversation root: {}",
                        mention.id, e
                    );
                    stats.root_errors += 1;
                    continue;
                }
            };

            // A mention that starts its own conversation has nothing to reply about.
            if root.id == mention.id {
                debug!("Mention {} is its own conversation root, skipping", mention.id);
                stats.skipped_self += 1;
                continue;
            }

            if self.already_handled(&root.id).await? {
                debug!(
                    "Mention {}: conversation {} already handled, skipping",
                    mention.id, root.id
                );
                stats.skipped_already_handled += 1;
                continue;
            }

            self.reply(&mention, &root, stats).await?;
        }
        Ok(())
    }

    /// Claims the conversation, posts the reply, and releases the claim if posting
    /// fails or never completes.
    pub async fn reply(
        &self,
        mention: &Mention,
        root: &Post,
        stats: &mut CycleStats,
    ) -> anyhow::Result<()> {
        let claimed = self
            .store
            .insert(root.id.as_str(), mention.id.as_str())
            .await
            .with_context(|| format!("Failed to record conversation {}", root.id))?;
        if !claimed {
            debug!(
                "Mention {}: conversation {} claimed elsewhere, skipping",
                mention.id, root.id
            );
            stats.skipped_already_handled += 1;
            return Ok(());
        }

        let claim = ClaimGuard::new(self.store.clone(), root.id.as_str());

        debug!("Conversation root {}: {}", root.id, root.text);
        let text = self.composer.compose(mention, root);

        match self.api.post_reply(&text, &mention.id).await {
            Ok(reply_id) => {
                claim.keep();
                info!(
                    "Replied to mention {} (conversation {}) with tweet {}",
                    mention.id, root.id, reply_id
                );
                stats.replies_sent += 1;
            }
            Err(e) => {
                error!("Failed to reply to mention {}: {}", mention.id, e);
                stats.reply_errors += 1;
                claim
                    .release()
                    .await
                    .with_context(|| format!("Failed to release conversation {}", root.id))?;
                return Ok(());
            }
        }

        self.throttle.pause().await;
        Ok(())
    }
}

/// A claimed conversation that has not been answered yet.
///
/// Dropped without `keep` (including when the cycle is cancelled mid-post),
/// the claim is released in the background so a later cycle can retry.
struct ClaimGuard {
    store: Arc<dyn DedupStore>,
    key: Option<String>,
}

impl ClaimGuard {
    fn new(store: Arc<dyn DedupStore>, key: &str) -> Self {
        Self {
            store,
            key: Some(key.to_string()),
        }
    }

    fn keep(mut self) {
        self.key = None;
    }

    async fn release(mut self) -> anyhow::Result<()> {
        let Some(key) = self.key.clone() else {
            return Ok(());
        };
        let result = self.store.remove(&key).await;
        self.key = None;
        result
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        warn!("Reply for conversation {} abandoned, releasing claim", key);

        let store = self.store.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.remove(&key).await {
                        error!("Failed to release conversation {}: {:#}", key, e);
                    }
                });
            }
            Err(_) => error!("Conversation {} left claimed: no runtime to release it", key),
        }
    }
}
