//! Word tokenizer shared by the lexical index and its queries.
//!
//! Text is lowercased and split on Unicode word boundaries (UAX #29).
//! Each word is then cut into runs of word characters (alphanumerics and
//! `_`), so contractions and dotted numbers split the same way a `\w+`
//! scan would: `"don't"` yields `don`, `t`. No stemming, no stop words.

use unicode_segmentation::UnicodeSegmentation;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenize `text` into lowercase word tokens.
///
/// ```rust
/// use chat_wrapped_core::tokenize::tokenize;
///
/// assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
/// assert!(tokenize("  ...  ").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .unicode_words()
        .flat_map(|word| word.split(|c: char| !is_word_char(c)))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
