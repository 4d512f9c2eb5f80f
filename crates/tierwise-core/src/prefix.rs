//! Explicit tier override prefixes

use serde::{Deserialize, Serialize};
use tierwise_vector::Tier;

/// Override prefixes per tier, matched case-insensitively at the start of a query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefixConfig {
    pub flagship: Vec<String>,
    pub lightweight: Vec<String>,
}

impl PrefixConfig {
    pub fn new() -> Self {
        Self {
            flagship: vec![
                "flagship:".to_string(),
                "/flagship".to_string(),
                "@flagship".to_string(),
                "/deep".to_string(),
            ],
            lightweight: vec![
                "lightweight:".to_string(),
                "/lightweight".to_string(),
                "@lightweight".to_string(),
                "/quick".to_string(),
            ],
        }
    }

    fn candidates(&self) -> impl Iterator<Item = (&str, Tier)> {
        let flagship = self.flagship.iter().map(|p| (p.as_str(), Tier::Flagship));
        let lightweight = self.lightweight.iter().map(|p| (p.as_str(), Tier::Lightweight));
        flagship.chain(lightweight)
    }
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Remainder of `text` after `prefix`, compared char by char ignoring case
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = text.char_indices();
    let mut end = 0;
    for expected in prefix.chars() {
        let (i, actual) = chars.next()?;
        if !chars_eq_ignore_case(actual, expected) {
            return None;
        }
        end = i + actual.len_utf8();
    }
    Some(&text[end..])
}

/// A prefix ending in a word character must be followed by whitespace or the
/// end of input, so `/deep` does not fire on `/deeper`. Prefixes ending in
/// punctuation such as `flagship:` may run straight into the text.
fn ends_at_boundary(prefix: &str, rest: &str) -> bool {
    let word_end = prefix.chars().last().is_some_and(char::is_alphanumeric);
    !word_end || rest.chars().next().map_or(true, char::is_whitespace)
}

/// Detect an explicit override. Returns the forced tier (if any) and the
/// query with the prefix removed. The longest matching prefix wins; equal
/// lengths prefer flagship.
pub fn detect_prefix<'a>(text: &'a str, prefixes: &PrefixConfig) -> (Option<Tier>, &'a str) {
    let trimmed = text.trim_start();
    let mut best: Option<(usize, Tier, &'a str)> = None;

    for (prefix, tier) in prefixes.candidates() {
        let len = prefix.chars().count();
        if len == 0 {
            continue;
        }
        if let Some(rest) = strip_prefix_ignore_case(trimmed, prefix) {
            if !ends_at_boundary(prefix, rest) {
                continue;
            }
            if best.map_or(true, |(best_len, _, _)| len > best_len) {
                best = Some((len, tier, rest));
            }
        }
    }

    match best {
        Some((_, tier, rest)) => (Some(tier), rest.trim_start()),
        None => (None, text),
    }
}
