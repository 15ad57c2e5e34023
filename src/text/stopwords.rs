// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! English stop-word list

use super::StopWords;
use std::collections::HashSet;

/// The common English stop-word list (lowercase, 179 entries)
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// Set-backed English stop words
#[derive(Debug, Clone)]
pub struct EnglishStopWords {
    words: HashSet<&'static str>,
}

impl EnglishStopWords {
    pub fn new() -> Self {
        Self {
            words: ENGLISH_STOP_WORDS.iter().copied().collect(),
        }
    }
}

impl Default for EnglishStopWords {
    fn default() -> Self {
        Self::new()
    }
}

impl StopWords for EnglishStopWords {
    fn is_stopword(&self, token: &str) -> bool {
        self.words.contains(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_is_lowercase_and_unique() {
        let set: HashSet<_> = ENGLISH_STOP_WORDS.iter().collect();
        assert_eq!(set.len(), ENGLISH_STOP_WORDS.len());
        assert_eq!(ENGLISH_STOP_WORDS.len(), 179);
        assert!(ENGLISH_STOP_WORDS.iter().all(|w| w.to_lowercase() == *w));
    }

    #[test]
    fn test_membership() {
        let words = EnglishStopWords::new();
        assert!(words.is_stopword("the"));
        assert!(words.is_stopword("and"));
        assert!(!words.is_stopword("The"));
        assert!(!words.is_stopword("free"));
    }
}
