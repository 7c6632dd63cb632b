//! TTL normalization
//!
//! Cache lifetimes arrive as bare integers (seconds) or as unit-suffixed
//! tokens such as `"5m"` or `"2h"`. Everything is reduced to whole seconds,
//! clamped to `[MIN_TTL_SECONDS, MAX_TTL_SECONDS]`, before it reaches the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Shortest expiry ever sent to the store
pub const MIN_TTL_SECONDS: u64 = 1;

/// Longest expiry ever sent to the store (100 years)
///
/// Redis rejects `SETEX` values whose millisecond deadline overflows.
pub const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 3600;

/// A requested cache lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ttl {
    /// Plain seconds
    Seconds(i64),
    /// Numeric prefix with an optional `s`, `m` or `h` suffix
    Token(String),
}

impl Ttl {
    /// Normalize to whole seconds within [`MIN_TTL_SECONDS`]..=[`MAX_TTL_SECONDS`]
    pub fn to_seconds(&self) -> u64 {
        let seconds = match self {
            Self::Seconds(seconds) => *seconds,
            Self::Token(token) => token_seconds(token),
        };
        u64::try_from(seconds)
            .unwrap_or(0)
            .clamp(MIN_TTL_SECONDS, MAX_TTL_SECONDS)
    }
}

/// Normalize any accepted TTL input to whole seconds
pub fn to_seconds(ttl: impl Into<Ttl>) -> u64 {
    ttl.into().to_seconds()
}

/// The unit is the last character, case-insensitive; unknown units mean seconds
fn token_seconds(token: &str) -> i64 {
    let amount = leading_integer(token);
    match token.chars().last().map(|unit| unit.to_ascii_lowercase()) {
        Some('m') => amount.saturating_mul(60),
        Some('h') => amount.saturating_mul(3600),
        _ => amount,
    }
}

/// Optionally signed digits after leading whitespace; no digits reads as 0
fn leading_integer(token: &str) -> i64 {
    let trimmed = token.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let magnitude = digits
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
        });

    if negative { -magnitude } else { magnitude }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(seconds) => write!(f, "{}s", seconds),
            Self::Token(token) => f.write_str(token),
        }
    }
}

impl From<i64> for Ttl {
    fn from(seconds: i64) -> Self {
        Self::Seconds(seconds)
    }
}

impl From<i32> for Ttl {
    fn from(seconds: i32) -> Self {
        Self::Seconds(i64::from(seconds))
    }
}

impl From<u32> for Ttl {
    fn from(seconds: u32) -> Self {
        Self::Seconds(i64::from(seconds))
    }
}

impl From<u64> for Ttl {
    fn from(seconds: u64) -> Self {
        Self::Seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        duration.as_secs().into()
    }
}

impl From<&str> for Ttl {
    fn from(token: &str) -> Self {
        Self::Token(token.to_string())
    }
}

impl From<String> for Ttl {
    fn from(token: String) -> Self {
        Self::Token(token)
    }
}

impl From<&Ttl> for Ttl {
    fn from(ttl: &Ttl) -> Self {
        ttl.clone()
    }
}
