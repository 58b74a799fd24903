//! X API v2 Adapter
//!
//! Concrete `PlatformClient` speaking the X (Twitter) v2 REST API with
//! bearer-token auth. Rate-limit responses (429) are surfaced as
//! `PlatformError::RateLimited` so callers can back off; this adapter
//! never sleeps or retries on its own.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{
    EngagementMetrics, PlatformClient, PlatformError, ReplyRef, TimelineItem, UserProfile,
};

const TWEET_FIELDS: &str = "created_at,author_id";

/// X API client
#[derive(Clone)]
pub struct XApiClient {
    client: Client,
    base_url: String,
    bearer_token: String,
    account_id: String,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    retweet_count: i64,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    username: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Deserialize)]
struct UserMetrics {
    #[serde(default)]
    followers_count: i64,
    #[serde(default)]
    following_count: i64,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ItemEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct PostedTweet {
    id: String,
}

impl XApiClient {
    pub fn new(
        base_url: &str,
        bearer_token: &str,
        account_id: &str,
        call_timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
            account_id: account_id.to_string(),
        })
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self, PlatformError> {
        let token = config
            .bearer_token
            .as_deref()
            .ok_or_else(|| PlatformError::Api {
                status: 401,
                message: "X_BEARER_TOKEN not set".into(),
            })?;
        Self::new(
            &config.platform.base_url,
            token,
            &config.platform.account_id,
            config.call_timeout(),
        )
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("x-rate-limit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok())
                .map(|reset| (reset - chrono::Utc::now().timestamp()).max(1) as u64)
                .unwrap_or(60);
            return Err(PlatformError::RateLimited { retry_after });
        }
        let message = response.text().await.unwrap_or_default();
        Err(PlatformError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.bearer_token)
            .query(params)
            .send()
            .await?;
        let response = self.check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Malformed(e.to_string()))
    }

    async fn post_tweet_body(&self, body: serde_json::Value) -> Result<String, PlatformError> {
        let response = self
            .client
            .post(format!("{}/tweets", self.base_url))
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;
        let response = self.check(response).await?;
        let posted: ItemEnvelope<PostedTweet> = response
            .json()
            .await
            .map_err(|e| PlatformError::Malformed(e.to_string()))?;
        Ok(posted.data.id)
    }

    fn parse_item(tweet: TweetData) -> Result<TimelineItem, PlatformError> {
        let id = tweet
            .id
            .parse::<i64>()
            .map_err(|_| PlatformError::Malformed(format!("non-numeric tweet id {}", tweet.id)))?;
        Ok(TimelineItem {
            id,
            author_id: tweet.author_id.unwrap_or_default(),
            text: tweet.text,
            created_at: tweet.created_at.unwrap_or_default(),
        })
    }

    fn parse_reply(tweet: TweetData) -> ReplyRef {
        ReplyRef {
            id: tweet.id,
            author_id: tweet.author_id.unwrap_or_default(),
            text: tweet.text,
        }
    }
}

#[async_trait]
impl PlatformClient for XApiClient {
    async fn get_timeline(
        &self,
        account_id: &str,
        since: Option<i64>,
        limit: usize,
    ) -> Result<Vec<TimelineItem>, PlatformError> {
        let mut params = vec![
            ("max_results", limit.min(100).to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        if let Some(since_id) = since {
            params.push(("since_id", since_id.to_string()));
        }

        let path = format!("/users/{}/timelines/reverse_chronological", account_id);
        let envelope: ListEnvelope<TweetData> = self.get_json(&path, &params).await?;

        debug!("timeline fetch returned {} items", envelope.data.len());
        envelope.data.into_iter().map(Self::parse_item).collect()
    }

    async fn publish(&self, text: &str) -> Result<String, PlatformError> {
        self.post_tweet_body(json!({ "text": text })).await
    }

    async fn reply(&self, parent_id: i64, text: &str) -> Result<String, PlatformError> {
        self.post_tweet_body(json!({
            "text": text,
            "reply": { "in_reply_to_tweet_id": parent_id.to_string() },
        }))
        .await
    }

    async fn quote(&self, parent_id: i64, text: &str) -> Result<String, PlatformError> {
        // v2 has no dedicated quote endpoint; the status URL in the text
        // renders as a quote card
        let url = format!("https://x.com/i/web/status/{}", parent_id);
        self.post_tweet_body(json!({ "text": format!("{} {}", text, url) }))
            .await
    }

    async fn get_metrics(&self, post_id: &str) -> Result<EngagementMetrics, PlatformError> {
        let params = vec![
            ("ids", post_id.to_string()),
            ("tweet.fields", "public_metrics".to_string()),
        ];
        let envelope: ListEnvelope<TweetData> = self.get_json("/tweets", &params).await?;
        let tweet = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::Malformed(format!("no metrics for post {}", post_id)))?;
        let metrics = tweet.public_metrics.unwrap_or(PublicMetrics {
            like_count: 0,
            retweet_count: 0,
        });

        let quote_params = vec![("max_results", "100".to_string())];
        let quotes: ListEnvelope<TweetData> = self
            .get_json(&format!("/tweets/{}/quote_tweets", post_id), &quote_params)
            .await?;

        let comment_params = vec![
            ("query", format!("conversation_id:{}", post_id)),
            ("max_results", "100".to_string()),
        ];
        let comments: ListEnvelope<TweetData> = self
            .get_json("/tweets/search/recent", &comment_params)
            .await?;

        Ok(EngagementMetrics {
            likes: metrics.like_count,
            retweets: metrics.retweet_count,
            quotes: quotes.data.into_iter().map(Self::parse_reply).collect(),
            comments: comments.data.into_iter().map(Self::parse_reply).collect(),
        })
    }

    async fn follow(&self, user_id: &str) -> Result<bool, PlatformError> {
        let response = self
            .client
            .post(format!(
                "{}/users/{}/following",
                self.base_url, self.account_id
            ))
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "target_user_id": user_id }))
            .send()
            .await?;
        let response = self.check(response).await?;

        #[derive(Deserialize)]
        struct FollowData {
            #[serde(default)]
            following: bool,
        }
        let result: ItemEnvelope<FollowData> = response
            .json()
            .await
            .map_err(|e| PlatformError::Malformed(e.to_string()))?;
        Ok(result.data.following)
    }

    async fn get_user_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<UserProfile>, PlatformError> {
        let handle = handle.trim_start_matches('@');
        let params = vec![
            ("usernames", handle.to_string()),
            (
                "user.fields",
                "id,name,username,description,location,public_metrics".to_string(),
            ),
        ];
        let envelope: ListEnvelope<UserData> = self.get_json("/users/by", &params).await?;

        Ok(envelope.data.into_iter().next().map(|user| {
            let metrics = user.public_metrics.unwrap_or(UserMetrics {
                followers_count: 0,
                following_count: 0,
            });
            UserProfile {
                user_id: user.id,
                handle: user.username,
                followers: metrics.followers_count,
                following: metrics.following_count,
                bio: user.description,
                location: user.location,
            }
        }))
    }

    async fn get_user_posts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TimelineItem>, PlatformError> {
        let params = vec![
            ("max_results", limit.min(100).to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        let envelope: ListEnvelope<TweetData> = self
            .get_json(&format!("/users/{}/tweets", user_id), &params)
            .await?;
        envelope.data.into_iter().map(Self::parse_item).collect()
    }
}
