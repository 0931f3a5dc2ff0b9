use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::models::{BotError, ScoredCandidate};
use crate::personality::{market_mood, Mood, PersonaState};

use super::templates::{format_price, movement_icon};
use super::{clamp_to_limit, ContentGenerator};

/// Chat-completion backed generator. Any failure maps to
/// `GenerationFailed` so the scheduler can fall back to templates.
#[derive(Clone)]
pub struct LlmGenerator {
    base_url: String,
    access_token: String,
    model: String,
    http_client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

impl LlmGenerator {
    pub fn new(base_url: &str, access_token: &str, model: &str, http_client: HttpClient) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            model: model.to_string(),
            http_client,
        }
    }

    fn user_prompt(candidates: &[ScoredCandidate], variation: u32) -> String {
        let mood = match market_mood(candidates) {
            Mood::Bullish => "bullish",
            Mood::Bearish => "bearish",
            Mood::Neutral => "mixed",
        };
        let mut prompt = format!(
            "Write one tweet (max 280 characters) about these tokens. Market feels {}. \
             Mention symbols as $SYMBOL cashtags. No hashtag spam, no financial advice.\n",
            mood
        );
        for c in candidates.iter().take(3) {
            prompt.push_str(&format!(
                "- {} ${}: price {}, 24h change {:+.1}%, volume/mcap {:.2}\n",
                movement_icon(c.price_change_percent),
                c.snapshot.symbol.to_uppercase(),
                format_price(c.snapshot.price),
                c.price_change_percent,
                c.volume_to_mcap_ratio,
            ));
        }
        if variation > 0 {
            prompt.push_str("Use a different angle and wording than your usual take.\n");
        }
        prompt
    }

    fn clean_response(raw: &str) -> String {
        let cleaned = raw.replace('*', "");
        let cleaned = cleaned
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        clamp_to_limit(cleaned.trim_matches('"').trim())
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate(
        &self,
        candidates: &[ScoredCandidate],
        persona: &PersonaState,
        variation: u32,
    ) -> Result<String, BotError> {
        if candidates.is_empty() {
            return Err(BotError::GenerationFailed(
                "no candidates to write about".to_string(),
            ));
        }

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": persona.current().preamble() },
                { "role": "user", "content": Self::user_prompt(candidates, variation) },
            ],
            "temperature": if variation > 0 { 0.9 } else { 0.7 },
        });

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, "requesting completion");
        let resp = self
            .http_client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::GenerationFailed(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BotError::GenerationFailed(format!(
                "completion API returned {}: {}",
                status, text
            )));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| BotError::GenerationFailed(format!("undecodable response: {}", e)))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| BotError::GenerationFailed("no completion choices returned".to_string()))?;

        let cleaned = Self::clean_response(content);
        if cleaned.is_empty() {
            return Err(BotError::GenerationFailed("empty completion".to_string()));
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_response_strips_markdown_and_blank_lines() {
        let raw = "  **$SOL looking strong**\n\n\n  ready for the next leg  ";
        assert_eq!(
            LlmGenerator::clean_response(raw),
            "$SOL looking strong\nready for the next leg"
        );
    }

    #[test]
    fn clean_response_caps_length() {
        let raw = "x".repeat(500);
        assert!(LlmGenerator::clean_response(&raw).chars().count() <= 280);
    }

    #[test]
    fn prompt_mentions_every_candidate_symbol() {
        use crate::models::MarketSnapshot;
        let candidate = ScoredCandidate {
            snapshot: MarketSnapshot {
                id: "wif".to_string(),
                symbol: "WIF".to_string(),
                name: "dogwifhat".to_string(),
                rank: None,
                price: 1.84,
                high_24h: Some(2.1),
                low_24h: Some(1.6),
                volume_24h: Some(4_000_000.0),
                market_cap: Some(45_000_000.0),
                listed_at: None,
            },
            price_change_percent: -12.4,
            price_change_known: true,
            volume_to_mcap_ratio: 0.09,
            criteria_met: 4,
            criteria_total: 4,
        };
        let prompt = LlmGenerator::user_prompt(std::slice::from_ref(&candidate), 0);
        assert!(prompt.contains("$WIF"));
        assert!(prompt.contains("-12.4"));
        assert!(!prompt.contains("different angle"));
        assert!(LlmGenerator::user_prompt(&[candidate], 1).contains("different angle"));
    }
}
