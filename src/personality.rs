use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::models::ScoredCandidate;

/// The voices the bot rotates through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    AlphaHunter,
    DegenTrader,
    TechAnalyst,
    MetaCommentary,
    InsiderAi,
}

impl Persona {
    pub const ALL: [Persona; 5] = [
        Persona::AlphaHunter,
        Persona::DegenTrader,
        Persona::TechAnalyst,
        Persona::MetaCommentary,
        Persona::InsiderAi,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Persona::AlphaHunter => "alpha_hunter",
            Persona::DegenTrader => "degen_trader",
            Persona::TechAnalyst => "tech_analyst",
            Persona::MetaCommentary => "meta_commentary",
            Persona::InsiderAi => "insider_ai",
        }
    }

    /// System-prompt framing for the LLM generator.
    pub fn preamble(&self) -> &'static str {
        match self {
            Persona::AlphaHunter => {
                "You are an AI that hunts early crypto opportunities. Confident, specific, no financial advice disclaimers."
            }
            Persona::DegenTrader => {
                "You are a degen trader AI. High energy, slang-heavy, always watching volume."
            }
            Persona::TechAnalyst => {
                "You are a technical analyst AI. Measured tone, numbers first, short sentences."
            }
            Persona::MetaCommentary => {
                "You are an AI commenting on the crypto market itself. Wry, observational, slightly detached."
            }
            Persona::InsiderAi => {
                "You are an AI that talks like it sees the order flow before everyone else. Cryptic but concrete."
            }
        }
    }
}

/// Overall read of the scanned batch, used to pick template tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Bullish,
    Bearish,
    Neutral,
}

/// Mood from the sign balance of the candidates' known price changes.
pub fn market_mood(candidates: &[ScoredCandidate]) -> Mood {
    let mut up = 0i32;
    let mut down = 0i32;
    for c in candidates.iter().filter(|c| c.price_change_known) {
        if c.price_change_percent > 0.0 {
            up += 1;
        } else if c.price_change_percent < 0.0 {
            down += 1;
        }
    }
    if up > down {
        Mood::Bullish
    } else if down > up {
        Mood::Bearish
    } else {
        Mood::Neutral
    }
}

/// Persona rotation state. Immutable: `after_post` returns the advanced
/// state so the scheduler only commits it once a post actually lands.
#[derive(Debug, Clone)]
pub struct PersonaState {
    current: Persona,
    usage: HashMap<Persona, u32>,
}

impl Default for PersonaState {
    fn default() -> Self {
        Self {
            current: Persona::AlphaHunter,
            usage: HashMap::new(),
        }
    }
}

impl PersonaState {
    pub fn current(&self) -> Persona {
        self.current
    }

    /// Advance past a published post: bump the current persona's count and
    /// hand the mic to the least-used persona (random among ties).
    pub fn after_post(&self) -> Self {
        let mut usage = self.usage.clone();
        *usage.entry(self.current).or_insert(0) += 1;

        let min_count = Persona::ALL
            .iter()
            .map(|p| usage.get(p).copied().unwrap_or(0))
            .min()
            .unwrap_or(0);
        let least_used: Vec<Persona> = Persona::ALL
            .iter()
            .copied()
            .filter(|p| usage.get(p).copied().unwrap_or(0) == min_count)
            .collect();
        let next = least_used
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(self.current);

        Self {
            current: next,
            usage,
        }
    }
}
