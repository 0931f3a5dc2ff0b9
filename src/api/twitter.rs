use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::models::BotError;

use super::Publisher;

const BASE_URL: &str = "https://api.twitter.com";

pub struct TwitterClient {
    client: Client,
    bearer_token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

impl TwitterClient {
    pub fn new(bearer_token: &str, base_url: Option<&str>, client: Client) -> Self {
        Self {
            client,
            bearer_token: bearer_token.to_string(),
            base_url: base_url
                .unwrap_or(BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[async_trait]
impl Publisher for TwitterClient {
    async fn post(&self, text: &str) -> Result<String, BotError> {
        let url = format!("{}/2/tweets", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| BotError::PublishRejected(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 201 {
            let created: CreateTweetResponse = response
                .json()
                .await
                .map_err(|e| BotError::PublishRejected(format!("undecodable response: {}", e)))?;
            info!("🐦 Posted tweet {}", created.data.id);
            return Ok(created.data.id);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BotError::PublishRejected(format!(
            "platform returned {}: {}",
            status, body
        )))
    }
}
