//! Lowercase word tokenizer shared by topic inference, related-post
//! lookup and severity scoring.

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

/// Maximal runs of ASCII letters, digits and apostrophes
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9']+").expect("token regex is valid"));

/// Split `text` into ordered, non-deduplicated lowercase tokens.
///
/// Lowercasing happens before matching, so `[a-z]` covers the
/// `[a-zA-Z]` class of the original pattern.
pub fn tokenize(text: &str) -> Vec<String>
{
    let lowered = text.to_lowercase();

    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| {
            m.as_str()
                .to_string()
        })
        .collect()
}

/// Distinct tokens of `text`
pub fn token_set(text: &str) -> HashSet<String>
{
    tokenize(text)
        .into_iter()
        .collect()
}
