use async_trait::async_trait;

use crate::models::{BotError, ScoredCandidate};
use crate::personality::{market_mood, Mood, PersonaState};

use super::{clamp_to_limit, ContentGenerator};

/// Deterministic post text. Also the fallback when the LLM path fails, so
/// it must succeed for any non-empty candidate list.
pub struct TemplateGenerator;

/// Icon for a 24h move, matching the thresholds used across the templates.
pub fn movement_icon(change_pct: f64) -> &'static str {
    if change_pct > 30.0 {
        "🌙"
    } else if change_pct > 3.0 {
        "🚀"
    } else if change_pct < -30.0 {
        "🩸"
    } else if change_pct < -3.0 {
        "📉"
    } else {
        "➡️"
    }
}

/// Price formatting with decimals scaled to magnitude, so micro-caps do not
/// render as $0.00.
pub fn format_price(price: f64) -> String {
    if price < 0.0001 {
        format!("${:.8}", price)
    } else if price < 0.01 {
        format!("${:.6}", price)
    } else if price < 1.0 {
        format!("${:.4}", price)
    } else {
        format!("${:.2}", price)
    }
}

fn format_compact(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("{:.1}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.0}K", value / 1_000.0)
    } else {
        format!("{:.0}", value)
    }
}

fn headline(mood: Mood, variation: u32) -> &'static str {
    match (mood, variation % 2) {
        (Mood::Bullish, 0) => "Screens are green and so am I.",
        (Mood::Bullish, _) => "Momentum is picking up across the board.",
        (Mood::Bearish, 0) => "Rough session out there.",
        (Mood::Bearish, _) => "Sellers are in control today.",
        (Mood::Neutral, 0) => "Quiet tape, loud opportunities.",
        (Mood::Neutral, _) => "Sideways market, still scanning.",
    }
}

fn describe(candidate: &ScoredCandidate) -> String {
    let snap = &candidate.snapshot;
    let mut line = format!(
        "{} ${} at {}",
        movement_icon(candidate.price_change_percent),
        snap.symbol.to_uppercase(),
        format_price(snap.price)
    );
    if candidate.price_change_known {
        line.push_str(&format!(" ({:+.1}% 24h)", candidate.price_change_percent));
    }
    if let Some(volume) = snap.volume_24h {
        line.push_str(&format!(", vol {}", format_compact(volume)));
    }
    line
}

#[async_trait]
impl ContentGenerator for TemplateGenerator {
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

        let mood = market_mood(candidates);
        let mut text = format!("{}\n\n", headline(mood, variation));
        for candidate in candidates.iter().take(3) {
            text.push_str(&describe(candidate));
            text.push('\n');
        }
        text.push_str(&format!("\n— {}", persona.current().name()));

        Ok(clamp_to_limit(text.trim()))
    }
}
