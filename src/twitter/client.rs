use super::oauth::OAuthCredentials;
use super::{Mention, Post, SocialApi, TweetId, TwitterError, UserId};
use crate::config::Config;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const RATE_LIMIT_RETRIES: u32 = 3;
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// The mentions endpoint accepts `max_results` between 5 and 100.
const MENTIONS_PAGE_MIN: usize = 5;
const MENTIONS_PAGE_MAX: usize = 100;

#[derive(Clone, Copy, Debug)]
enum Auth {
    /// App-only bearer token, enough for read endpoints.
    App,
    /// OAuth 1.0a user context, required for `users/me` and posting.
    User,
}

#[derive(Clone)]
pub struct TwitterClient {
    http: Client,
    api_base: String,
    bearer_token: String,
    credentials: OAuthCredentials,
    wait_on_rate_limit: bool,
    max_rate_limit_wait: Duration,
}

impl TwitterClient {
    pub fn new(config: &Config) -> Result<Self, TwitterError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("replybot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http(config, http))
    }

    fn with_http(config: &Config, http: Client) -> Self {
        Self {
            http,
            api_base: config.twitter_api_base.trim_end_matches('/').to_string(),
            bearer_token: config.twitter_bearer_token.clone(),
            credentials: OAuthCredentials::new(
                &config.twitter_api_key,
                &config.twitter_api_secret,
                &config.twitter_access_token,
                &config.twitter_access_token_secret,
            ),
            wait_on_rate_limit: config.wait_on_rate_limit,
            max_rate_limit_wait: config.max_rate_limit_wait,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        auth: Auth,
    ) -> Result<Response, TwitterError> {
        let url = format!("{}{}", self.api_base, path);
        let mut retries = 0;

        loop {
            let mut request = self.http.request(method.clone(), &url).query(query);
            request = match auth {
                Auth::App => request.bearer_auth(&self.bearer_token),
                Auth::User => request.header(
                    AUTHORIZATION,
                    self.credentials
                        .authorization_header(method.as_str(), &url, query)?,
                ),
            };
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!("Twitter: {} {} ({:?} auth)", method, path, auth);
            let resp = request.send().await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && self.wait_on_rate_limit {
                if retries >= RATE_LIMIT_RETRIES {
                    return Err(TwitterError::RateLimited(retries));
                }
                retries += 1;
                let wait = rate_limit_wait(resp.headers(), Utc::now()).min(self.max_rate_limit_wait);
                warn!(
                    "Twitter rate limit hit on {} {}, waiting {} (retry {}/{})",
                    method,
                    path,
                    humantime::format_duration(wait),
                    retries,
                    RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let message = resp
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
                return Err(TwitterError::Api { status, message });
            }

            return Ok(resp);
        }
    }
}

#[async_trait]
impl SocialApi for TwitterClient {
    async fn resolve_self(&self) -> Result<UserId, TwitterError> {
        let resp = self.send(Method::GET, "/users/me", &[], None, Auth::User).await?;
        let envelope: DataEnvelope<AccountUser> = resp.json().await?;
        let user = envelope
            .data
            .ok_or_else(|| TwitterError::Response(describe_problems(&envelope.errors)))?;
        debug!("Twitter: authenticated as @{} ({})", user.username, user.id);
        Ok(user.id)
    }

    async fn fetch_mentions(
        &self,
        account: &UserId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Mention>, TwitterError> {
        let query = [
            ("start_time", since.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ("max_results", page_size(limit).to_string()),
            ("tweet.fields", "created_at,conversation_id".to_string()),
            ("expansions", "referenced_tweets.id".to_string()),
        ];
        let path = format!("/users/{}/mentions", account);
        let resp = self.send(Method::GET, &path, &query, None, Auth::App).await?;
        let page: PageEnvelope<Mention> = resp.json().await?;

        if let Some(meta) = &page.meta {
            if meta.next_token.is_some() {
                debug!(
                    "Twitter: more mentions available beyond first page ({} returned), not paging",
                    meta.result_count
                );
            }
        }
        Ok(page.data)
    }

    async fn fetch_post(&self, id: &TweetId) -> Result<Option<Post>, TwitterError> {
        let query = [("tweet.fields", "conversation_id,created_at".to_string())];
        let path = format!("/tweets/{}", id);
        let resp = self.send(Method::GET, &path, &query, None, Auth::App).await?;
        let envelope: DataEnvelope<Post> = resp.json().await?;

        if envelope.data.is_none() {
            debug!(
                "Twitter: tweet {} unavailable: {}",
                id,
                describe_problems(&envelope.errors)
            );
        }
        Ok(envelope.data)
    }

    async fn post_reply(&self, text: &str, in_reply_to: &TweetId) -> Result<TweetId, TwitterError> {
        let body = serde_json::json!({
            "text": text,
            "reply": {
                "in_reply_to_tweet_id": in_reply_to
            }
        });
        let resp = self
            .send(Method::POST, "/tweets", &[], Some(&body), Auth::User)
            .await?;
        let envelope: DataEnvelope<CreatedTweet> = resp.json().await?;
        envelope
            .data
            .map(|tweet| tweet.id)
            .ok_or_else(|| TwitterError::Response(describe_problems(&envelope.errors)))
    }
}

fn page_size(limit: usize) -> usize {
    limit.clamp(MENTIONS_PAGE_MIN, MENTIONS_PAGE_MAX)
}

/// Time until the window in `x-rate-limit-reset` (epoch seconds) reopens, plus a second of slack.
fn rate_limit_wait(headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
    headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|reset| Duration::from_secs(((reset - now.timestamp()).max(0) + 1) as u64))
        .unwrap_or(DEFAULT_RATE_LIMIT_WAIT)
}

fn describe_problems(problems: &[ApiProblem]) -> String {
    if problems.is_empty() {
        return "response carried no data".to_string();
    }
    problems
        .iter()
        .map(|p| {
            p.detail
                .clone()
                .or_else(|| p.title.clone())
                .unwrap_or_else(|| "unknown error".to_string())
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
struct PageEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    result_count: usize,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountUser {
    id: UserId,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: TweetId,
}
