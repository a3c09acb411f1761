use async_trait::async_trait;
use std::time::Duration;

/// Pause taken after each posted reply to stay under burst limits.
#[async_trait]
pub trait ReplyThrottle: Send + Sync {
    async fn pause(&self);
}

pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ReplyThrottle for FixedDelay {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
