use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https*|ftps*):\S*").expect("valid url pattern"));

static DISALLOWED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z \n0-9-]").expect("valid charset pattern"));

/// Transliterates to the closest ASCII and lowercases.
///
/// Tokenizing expects its input to have gone through this first.
pub fn normalize_body(body: &str) -> String {
    deunicode::deunicode(body).to_lowercase()
}

/// Splits a normalized comment body into word tokens.
///
/// Links are dropped, any run of two or more identical non-word characters
/// becomes a token boundary, and everything outside `[a-z0-9-]` is removed.
pub fn tokenize(body: &str) -> Vec<String> {
    let without_links = URL_RE.replace_all(body, "");
    let separated = collapse_repeated_symbols(&without_links);
    DISALLOWED_RE
        .replace_all(&separated, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// regex has no backreferences, so `([^\w])\1+` is done by hand.
fn collapse_repeated_symbols(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if is_word_char(c) || chars.peek() != Some(&c) {
            out.push(c);
            continue;
        }
        while chars.peek() == Some(&c) {
            chars.next();
        }
        out.push(' ');
    }

    out
}
