pub mod llm;
pub mod templates;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{BotError, ScoredCandidate};
use crate::personality::PersonaState;

pub use llm::LlmGenerator;
pub use templates::TemplateGenerator;

pub const MAX_POST_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Template,
    Llm,
}

/// Turns ranked candidates into post text. `variation > 0` must change the
/// wording so a duplicate hit can be retried once.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(
        &self,
        candidates: &[ScoredCandidate],
        persona: &PersonaState,
        variation: u32,
    ) -> Result<String, BotError>;
}

/// Canonical form of a post used for duplicate detection: lowercase, keep
/// only alphanumerics, `$`, `#` and spaces, collapse runs of whitespace.
pub fn fingerprint(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '$' || c == '#' {
            out.push(c);
            last_was_space = false;
        } else if c.is_whitespace() && !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Trim to the platform limit without splitting a word when avoidable.
pub fn clamp_to_limit(text: &str) -> String {
    if text.chars().count() <= MAX_POST_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_POST_CHARS - 1).collect();
    let trimmed = match cut.rfind(' ') {
        Some(idx) if idx > MAX_POST_CHARS / 2 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_canonical() {
        assert_eq!(
            fingerprint("  $PEPE  pumping!!!   30% up 🚀 "),
            "$pepe pumping 30 up"
        );
    }

    #[test]
    fn fingerprint_ignores_punctuation_and_case() {
        assert_eq!(fingerprint("Hello, World!"), fingerprint("hello world"));
        assert_ne!(fingerprint("$sol up"), fingerprint("$eth up"));
    }

    #[test]
    fn clamp_respects_limit() {
        let long = "word ".repeat(100);
        let clamped = clamp_to_limit(&long);
        assert!(clamped.chars().count() <= MAX_POST_CHARS);
        assert!(clamped.ends_with('…'));

        let short = "fits fine";
        assert_eq!(clamp_to_limit(short), short);
    }
}
