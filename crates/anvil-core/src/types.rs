use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Cost and token metadata reported by a capability call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Cost in USD
    pub cost_usd: f64,
    /// Tokens consumed (input + output)
    pub tokens: u64,
}

impl Usage {
    /// Creates a usage record.
    #[must_use]
    pub const fn new(cost_usd: f64, tokens: u64) -> Self {
        Self { cost_usd, tokens }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.cost_usd += other.cost_usd;
        self.tokens += other.tokens;
    }
}

/// A capability result together with what it cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metered<T> {
    /// The structured result
    pub value: T,
    /// Cost and tokens spent producing it
    pub usage: Usage,
}

impl<T> Metered<T> {
    /// Wraps a value with its usage.
    pub const fn new(value: T, usage: Usage) -> Self {
        Self { value, usage }
    }

    /// Wraps a value that cost nothing.
    pub fn free(value: T) -> Self {
        Self {
            value,
            usage: Usage::default(),
        }
    }
}

/// Rough token estimate used throughout the engine: one token per four characters.
#[must_use]
pub fn estimate_tokens(chars: usize) -> usize {
    chars.div_ceil(4)
}

/// Character-safe truncation: keeps at most `limit` characters, replacing the tail
/// with `...` when the input is longer.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_owned();
    }
    let keep = limit.saturating_sub(3);
    let head: String = text.chars().take(keep).collect();
    format!("{head}...")
}
