use alphabot_core::MatchType;
use std::collections::{BTreeSet, HashSet};

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Substrings of well-known "look, the whole alphabet" posts. Kept verbatim.
const ALPHABET_POST_MARKERS: [&str; 3] = ["abcdef", "brownfox", "blackquartz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    Forward,
    Reverse,
}

/// True when the recognized words between them use every letter and the
/// comment is not one of the stock pangram or alphabet posts.
pub fn alphabet_used(tokens: &[String], recognized: &HashSet<&str>) -> bool {
    let text = tokens.concat();
    if ALPHABET_POST_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
    {
        return false;
    }

    let sorted_chars: String = recognized
        .iter()
        .flat_map(|word| word.chars())
        .collect::<BTreeSet<char>>()
        .into_iter()
        .collect();
    sorted_chars.contains(ALPHABET)
}

/// Ascending order is checked before descending, so a sequence that is
/// both (all tokens equal) reads as forward.
pub fn words_in_alphabetical(tokens: &[String]) -> Option<WordOrder> {
    if tokens.windows(2).all(|pair| pair[0] <= pair[1]) {
        Some(WordOrder::Forward)
    } else if tokens.windows(2).all(|pair| pair[0] >= pair[1]) {
        Some(WordOrder::Reverse)
    } else {
        None
    }
}

/// Alphabet usage is evaluated first and word order overrides it.
pub fn match_comment(tokens: &[String], recognized: &HashSet<&str>) -> Option<MatchType> {
    let mut matched = None;

    if alphabet_used(tokens, recognized) {
        matched = Some(MatchType::AlphabetUsed);
    }

    match words_in_alphabetical(tokens) {
        Some(WordOrder::Forward) => matched = Some(MatchType::AlphabeticalWords),
        Some(WordOrder::Reverse) => matched = Some(MatchType::AlphabeticalWordsReverse),
        None => {}
    }

    matched
}
