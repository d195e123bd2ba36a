//! Cloze prompts: a context sentence with its target word blanked out.

use regex::RegexBuilder;

pub const PLACEHOLDER: &str = "_______";

/// Characters that continue a token. A hyphen joins compounds, so the `acid`
/// inside `acid-sensitive` is not a whole word; apostrophes and other
/// punctuation end a token.
fn joins_token(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '-'
}

/// Replaces every case-insensitive whole-word occurrence of `word` in
/// `sentence` with [`PLACEHOLDER`]. Returns the masked text and the number of
/// occurrences replaced.
pub fn mask_count(sentence: &str, word: &str) -> (String, usize) {
    let word = word.trim();
    if word.is_empty() {
        return (sentence.to_string(), 0);
    }
    let Ok(pattern) = RegexBuilder::new(&regex::escape(word))
        .case_insensitive(true)
        .build()
    else {
        return (sentence.to_string(), 0);
    };

    let mut masked = String::with_capacity(sentence.len());
    let mut last = 0;
    let mut count = 0;
    for found in pattern.find_iter(sentence) {
        let before = sentence[..found.start()].chars().next_back();
        let after = sentence[found.end()..].chars().next();
        if before.is_some_and(joins_token) || after.is_some_and(joins_token) {
            continue;
        }
        masked.push_str(&sentence[last..found.start()]);
        masked.push_str(PLACEHOLDER);
        last = found.end();
        count += 1;
    }
    masked.push_str(&sentence[last..]);
    (masked, count)
}

pub fn mask(sentence: &str, word: &str) -> String {
    mask_count(sentence, word).0
}
