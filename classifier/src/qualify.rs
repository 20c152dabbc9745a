use crate::Dictionary;
use std::collections::HashSet;
use std::fmt;

pub const BOT_DISCLAIMER: &str = "i am a bot";
pub const ALPHA_MARKER: &str = "alpha";

/// Fewest distinct tokens a comment may have.
pub const MIN_UNIQUE_TOKENS: usize = 6;
/// Lowest allowed distinct / total token ratio.
pub const MIN_UNIQUE_RATIO: f64 = 0.5;
/// Lowest allowed share of distinct tokens found in the dictionary.
pub const MIN_RECOGNIZED_RATIO: f64 = 0.6;
/// The concatenated tokens must be strictly shorter than this.
pub const MAX_TOKEN_CHARS: usize = 450;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_unique_tokens: usize,
    pub min_unique_ratio: f64,
    pub min_recognized_ratio: f64,
    pub max_token_chars: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_unique_tokens: MIN_UNIQUE_TOKENS,
            min_unique_ratio: MIN_UNIQUE_RATIO,
            min_recognized_ratio: MIN_RECOGNIZED_RATIO,
            max_token_chars: MAX_TOKEN_CHARS,
        }
    }
}

/// Why a comment was not considered for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disqualification {
    BotDisclaimer,
    MentionsAlpha,
    TooFewUniqueWords,
    TooRepetitive,
    TooFewRecognizedWords,
    TooLong,
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Disqualification::BotDisclaimer => "probably a bot comment",
            Disqualification::MentionsAlpha => "probably trying to be alphabetical",
            Disqualification::TooFewUniqueWords => "not enough unique words",
            Disqualification::TooRepetitive => "too many repeated words",
            Disqualification::TooFewRecognizedWords => "not enough recognized words",
            Disqualification::TooLong => "too long",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Qualification<'a> {
    /// Carries the distinct tokens found in the dictionary.
    Qualified(HashSet<&'a str>),
    Disqualified(Disqualification),
}

/// Runs the disqualifying checks in order and stops at the first failure.
pub fn qualify<'a>(
    body: &str,
    tokens: &'a [String],
    dictionary: &Dictionary,
    thresholds: &Thresholds,
) -> Qualification<'a> {
    use Disqualification::*;

    if body.contains(BOT_DISCLAIMER) {
        return Qualification::Disqualified(BotDisclaimer);
    }
    if body.contains(ALPHA_MARKER) {
        return Qualification::Disqualified(MentionsAlpha);
    }

    let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    if unique.len() < thresholds.min_unique_tokens {
        return Qualification::Disqualified(TooFewUniqueWords);
    }
    if (unique.len() as f64 / tokens.len() as f64) < thresholds.min_unique_ratio {
        return Qualification::Disqualified(TooRepetitive);
    }

    let recognized: HashSet<&str> = unique
        .iter()
        .copied()
        .filter(|token| dictionary.recognized(token))
        .collect();
    if (recognized.len() as f64 / unique.len() as f64) < thresholds.min_recognized_ratio {
        return Qualification::Disqualified(TooFewRecognizedWords);
    }

    let total_chars: usize = tokens.iter().map(String::len).sum();
    if total_chars >= thresholds.max_token_chars {
        return Qualification::Disqualified(TooLong);
    }

    Qualification::Qualified(recognized)
}
