use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub twitter_api_key: String,
    pub twitter_api_secret: String,
    pub twitter_access_token: String,
    pub twitter_access_token_secret: String,
    pub twitter_bearer_token: String,
    pub twitter_api_base: String,
    pub database_url: String,

    // Cycle settings
    pub poll_interval: Duration,
    pub mention_lookback: Duration,
    pub tweet_response_limit: usize,
    pub reply_text: String,
    pub reply_delay: Duration,
    pub cycle_deadline: Duration,

    // HTTP & rate limit settings
    pub http_timeout_secs: u64,
    pub wait_on_rate_limit: bool,
    pub max_rate_limit_wait: Duration,
}

const DEFAULT_API_BASE: &str = "https://api.x.com/2";
const DEFAULT_REPLY_TEXT: &str = "Hello world!";

/// Tweets are capped at 280 characters
pub const TWEET_CHAR_LIMIT: usize = 280;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let config = Config {
            twitter_api_key: required("TWITTER_API_KEY")?,
            twitter_api_secret: required("TWITTER_API_SECRET")?,
            twitter_access_token: required("TWITTER_ACCESS_TOKEN")?,
            twitter_access_token_secret: required("TWITTER_ACCESS_TOKEN_SECRET")?,
            twitter_bearer_token: required("TWITTER_BEARER_TOKEN")?,
            twitter_api_base: env::var("TWITTER_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            database_url: required("DATABASE_URL")?,

            poll_interval: duration_var("POLL_INTERVAL", "6m")?,
            mention_lookback: duration_var("MENTION_LOOKBACK", "20m")?,
            tweet_response_limit: parsed_var("TWEET_RESPONSE_LIMIT", 35)?,
            reply_text: env::var("REPLY_TEXT").unwrap_or_else(|_| DEFAULT_REPLY_TEXT.to_string()),
            reply_delay: duration_var("REPLY_DELAY", "1s")?,
            cycle_deadline: duration_var("CYCLE_DEADLINE", "5m")?,

            http_timeout_secs: parsed_var("HTTP_TIMEOUT_SECS", 30)?,
            wait_on_rate_limit: parsed_var("WAIT_ON_RATE_LIMIT", true)?,
            max_rate_limit_wait: duration_var("MAX_RATE_LIMIT_WAIT", "2m")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.reply_text.trim().is_empty() {
            anyhow::bail!("REPLY_TEXT must not be empty");
        }
        if self.reply_text.chars().count() > TWEET_CHAR_LIMIT {
            anyhow::bail!("REPLY_TEXT must be at most {} characters", TWEET_CHAR_LIMIT);
        }
        if self.tweet_response_limit == 0 {
            anyhow::bail!("TWEET_RESPONSE_LIMIT must be greater than zero");
        }
        if self.poll_interval.is_zero() {
            anyhow::bail!("POLL_INTERVAL must be greater than zero");
        }
        if self.cycle_deadline.is_zero() {
            anyhow::bail!("CYCLE_DEADLINE must be greater than zero");
        }
        // Mentions older than the lookback are never fetched again, so the window
        // must cover the cadence plus the longest a cycle may run.
        if self.mention_lookback <= self.poll_interval + self.cycle_deadline {
            anyhow::bail!(
                "MENTION_LOOKBACK ({}) must exceed POLL_INTERVAL ({}) plus CYCLE_DEADLINE ({})",
                humantime::format_duration(self.mention_lookback),
                humantime::format_duration(self.poll_interval),
                humantime::format_duration(self.cycle_deadline)
            );
        }
        if self.wait_on_rate_limit && self.max_rate_limit_wait >= self.cycle_deadline {
            anyhow::bail!(
                "MAX_RATE_LIMIT_WAIT ({}) must be shorter than CYCLE_DEADLINE ({})",
                humantime::format_duration(self.max_rate_limit_wait),
                humantime::format_duration(self.cycle_deadline)
            );
        }
        Ok(())
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("{} must be set", key))
}

fn parsed_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn duration_var(key: &str, default: &str) -> anyhow::Result<Duration> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    humantime::parse_duration(raw.trim())
        .map_err(|e| anyhow::anyhow!("{} must be a duration like 6m or 30s: {}", key, e))
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("twitter_api_key", &"[REDACTED]")
            .field("twitter_api_secret", &"[REDACTED]")
            .field("twitter_access_token", &"[REDACTED]")
            .field("twitter_access_token_secret", &"[REDACTED]")
            .field("twitter_bearer_token", &"[REDACTED]")
            .field("twitter_api_base", &self.twitter_api_base)
            .field("database_url", &self.database_url)
            .field("poll_interval", &humantime::format_duration(self.poll_interval).to_string())
            .field("mention_lookback", &humantime::format_duration(self.mention_lookback).to_string())
            .field("tweet_response_limit", &self.tweet_response_limit)
            .field("reply_text", &self.reply_text)
            .field("reply_delay", &humantime::format_duration(self.reply_delay).to_string())
            .field("cycle_deadline", &humantime::format_duration(self.cycle_deadline).to_string())
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("wait_on_rate_limit", &self.wait_on_rate_limit)
            .field(
                "max_rate_limit_wait",
                &humantime::format_duration(self.max_rate_limit_wait).to_string(),
            )
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        twitter_api_key: "key".to_string(),
        twitter_api_secret: "secret".to_string(),
        twitter_access_token: "token".to_string(),
        twitter_access_token_secret: "token_secret".to_string(),
        twitter_bearer_token: "bearer".to_string(),
        twitter_api_base: DEFAULT_API_BASE.to_string(),
        database_url: ":memory:".to_string(),
        poll_interval: Duration::from_secs(6 * 60),
        mention_lookback: Duration::from_secs(20 * 60),
        tweet_response_limit: 35,
        reply_text: DEFAULT_REPLY_TEXT.to_string(),
        reply_delay: Duration::from_secs(1),
        cycle_deadline: Duration::from_secs(5 * 60),
        http_timeout_secs: 30,
        wait_on_rate_limit: true,
        max_rate_limit_wait: Duration::from_secs(2 * 60),
    }
}
