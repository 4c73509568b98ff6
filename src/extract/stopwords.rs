//! English stopword set for the keyword extractor.

use std::collections::HashSet;
use std::sync::OnceLock;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old",
    "see", "two", "way", "who", "its", "did", "yes", "your", "from", "they", "know", "want",
    "been", "good", "much", "some", "time", "very", "when", "come", "here", "just", "like",
    "long", "make", "many", "more", "only", "over", "such", "take", "than", "them", "well",
    "were", "will", "with", "have", "this", "that", "what", "their", "there", "which", "would",
    "about", "could", "other", "into", "after", "first", "never", "these", "thing", "think",
    "where", "being", "every", "great", "might", "shall", "still", "those", "under", "while",
    "should", "because", "through", "between", "another", "also", "most", "each", "then",
    "even", "both", "before", "does", "doing", "during", "until", "again", "further", "once",
    "down", "off", "above", "below", "same", "too", "own", "able", "may", "must", "ours",
    "yours", "itself", "himself", "herself", "themselves", "myself", "yourself", "ourselves",
    "why", "whom", "whose", "against", "among", "within", "without", "toward", "upon", "since",
    "per", "via", "etc", "including", "include", "includes",
];

pub fn is_stopword(token: &str) -> bool {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
        .contains(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_function_words_are_stopped() {
        for word in ["the", "and", "with", "about", "through"] {
            assert!(is_stopword(word), "{word} should be a stopword");
        }
    }

    #[test]
    fn content_words_pass() {
        for word in ["pizza", "software", "consulting", "wine"] {
            assert!(!is_stopword(word));
        }
    }
}
