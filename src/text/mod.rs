// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Deterministic text normalization
//!
//! Lowercase, split into word and punctuation units, keep purely alphanumeric
//! tokens that are not stop-words, stem them and join with single spaces.
//! The stemmer and stop-word set are pluggable so other languages can be
//! swapped in without touching the pipeline.

pub mod porter;
pub mod stopwords;

pub use porter::PorterStemmer;
pub use stopwords::EnglishStopWords;

/// Reduce a token to its stem
pub trait Stemmer: Send + Sync {
    fn stem(&self, token: &str) -> String;
}

/// Stop-word membership for a language
pub trait StopWords: Send + Sync {
    fn is_stopword(&self, token: &str) -> bool;
}

/// ASCII punctuation characters, the set that counts as "single punctuation"
pub const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

/// Combining diacritical marks, which lowercasing can emit (`İ` becomes `i̇`)
fn is_combining_mark(ch: char) -> bool {
    matches!(
        ch,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}'
    )
}

/// Letters, digits and the combining marks attached to them
fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || is_combining_mark(ch)
}

/// Split lowercase text into word units.
///
/// Runs of word characters (alphanumerics plus combining marks) form one token;
/// every other non-whitespace character is a token on its own; whitespace only
/// separates.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if is_word_char(ch) {
            current.push(ch);
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if !ch.is_whitespace() {
            tokens.push(ch.to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn is_single_punctuation(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if PUNCTUATION.contains(c))
}

/// Pure text normalizer over a stemmer and a stop-word set
#[derive(Debug, Clone)]
pub struct TextNormalizer<S = PorterStemmer, W = EnglishStopWords> {
    stemmer: S,
    stopwords: W,
}

impl TextNormalizer {
    /// Porter stemming with the English stop-word list
    pub fn english() -> Self {
        Self::new(PorterStemmer::new(), EnglishStopWords::new())
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::english()
    }
}

impl<S: Stemmer, W: StopWords> TextNormalizer<S, W> {
    pub fn new(stemmer: S, stopwords: W) -> Self {
        Self { stemmer, stopwords }
    }

    /// Stem until the stemmer leaves the token alone. Every pass either
    /// shortens the token or turns a `y` into an `i`, so this terminates.
    fn settled_stem(&self, token: &str) -> String {
        let mut current = token.to_string();
        loop {
            let next = self.stemmer.stem(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn keep(&self, token: &str) -> bool {
        token.chars().all(is_word_char)
            && !self.stopwords.is_stopword(token)
            && !is_single_punctuation(token)
    }

    /// Normalize one text value.
    ///
    /// A token whose stem is itself a stop-word is dropped as well, so a second
    /// pass over the output changes nothing.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let mut out = String::with_capacity(lowered.len());

        for token in tokenize(&lowered) {
            if !self.keep(&token) {
                continue;
            }
            let stem = self.settled_stem(&token);
            if stem.is_empty() || self.stopwords.is_stopword(&stem) {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&stem);
        }
        out
    }
}
