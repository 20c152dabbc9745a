pub mod dictionary;
pub mod matcher;
pub mod qualify;
pub mod tokenizer;

pub use dictionary::Dictionary;
pub use matcher::{alphabet_used, match_comment, words_in_alphabetical, WordOrder};
pub use qualify::{
    qualify, Disqualification, Qualification, Thresholds, MAX_TOKEN_CHARS, MIN_RECOGNIZED_RATIO,
    MIN_UNIQUE_RATIO, MIN_UNIQUE_TOKENS,
};
pub use tokenizer::{normalize_body, tokenize};

use alphabot_core::MatchType;

/// Outcome of running one comment body through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    Disqualified(Disqualification),
    NoMatch,
    Matched(MatchType),
}

/// Normalize, tokenize, qualify and match, with the dictionary held as
/// immutable context.
#[derive(Debug, Clone)]
pub struct Classifier {
    dictionary: Dictionary,
    thresholds: Thresholds,
}

impl Classifier {
    pub fn new(dictionary: Dictionary) -> Self {
        Self::with_thresholds(dictionary, Thresholds::default())
    }

    pub fn with_thresholds(dictionary: Dictionary, thresholds: Thresholds) -> Self {
        Self {
            dictionary,
            thresholds,
        }
    }

    pub fn classify(&self, raw_body: &str) -> Classification {
        let body = normalize_body(raw_body);
        let tokens = tokenize(&body);

        match qualify(&body, &tokens, &self.dictionary, &self.thresholds) {
            Qualification::Disqualified(reason) => Classification::Disqualified(reason),
            Qualification::Qualified(recognized) => match match_comment(&tokens, &recognized) {
                Some(match_type) => Classification::Matched(match_type),
                None => Classification::NoMatch,
            },
        }
    }
}
