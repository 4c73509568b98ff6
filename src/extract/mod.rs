pub mod stopwords;

use crate::core::types::{ExtractedKeywords, KeywordSource, ScrapedContent, WeightedKeyword};
use crate::repo::Repository;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maximum keywords returned.
const DEFAULT_TOP_N: usize = 40;

/// N-gram score multipliers.
const BIGRAM_WEIGHT: f64 = 1.2;
const TRIGRAM_WEIGHT: f64 = 1.5;

/// Emphasis boosts for placement.
const TITLE_BOOST: f64 = 2.0;
const HEADING_BOOST: f64 = 1.5;
const ABOUT_BOOST: f64 = 1.3;

/// Character-bigram entropy floor (bits) for the gibberish filter.
const ENTROPY_THRESHOLD: f64 = 2.2;
/// The entropy check only means something once a term has enough bigrams.
const ENTROPY_MIN_CHARS: usize = 7;

const VOWEL_RATIO_MIN: f64 = 0.1;
const VOWEL_RATIO_MAX: f64 = 0.7;

/// Domain noise dropped unless the term scores in the global top 5.
const NOISE_BLOCKLIST: &[&str] = &["home", "contact", "privacy", "cookies", "terms", "login"];
const NOISE_TOP_EXEMPTION: usize = 5;

/// Weighted keyword extractor: canonicalize → tokenize → n-grams → TF·IDF →
/// emphasis boosts → gibberish and noise filters → top-N.
pub struct KeywordExtractor {
    repo: Arc<dyn Repository>,
    top_n: usize,
}

impl KeywordExtractor {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Deterministic given identical input; empty only if both inputs are
    /// empty.
    pub async fn extract(
        &self,
        content: Option<&ScrapedContent>,
        description: Option<&str>,
    ) -> ExtractedKeywords {
        let mut corpus = String::new();
        if let Some(c) = content {
            corpus.push_str(&c.plain_text);
            corpus.push('\n');
        }
        if let Some(d) = description {
            corpus.push_str(d);
        }
        let canonical = canonicalize(&corpus);
        if canonical.is_empty() {
            return ExtractedKeywords::default();
        }

        let source = match content {
            Some(c) if c.merged => KeywordSource::Merged,
            _ => KeywordSource::Homepage,
        };

        // Term frequencies over sentence-bounded n-grams.
        let mut tf: HashMap<String, (f64, f64)> = HashMap::new(); // term → (count, ngram weight)
        for sentence in sentences(&canonical) {
            let tokens = tokenize(&sentence);
            add_ngrams(&tokens, 1, 1.0, &mut tf);
            add_ngrams(&tokens, 2, BIGRAM_WEIGHT, &mut tf);
            add_ngrams(&tokens, 3, TRIGRAM_WEIGHT, &mut tf);
        }
        if tf.is_empty() {
            return ExtractedKeywords::default();
        }

        let title = content.map(|c| canonicalize(&c.title)).unwrap_or_default();
        let headings = content
            .map(|c| canonicalize(&c.headings.join(" . ")))
            .unwrap_or_default();
        let about = content
            .map(|c| canonicalize(&c.about_text))
            .unwrap_or_default();

        let mut scored: Vec<(String, f64)> = Vec::with_capacity(tf.len());
        for (term, (count, ngram_weight)) in tf {
            if !passes_gibberish_filter(&term) {
                continue;
            }
            let idf = self
                .repo
                .get_idf(&term)
                .await
                .ok()
                .flatten()
                .unwrap_or(1.0);
            let mut score = count * idf * ngram_weight;
            if contains_term(&title, &term) {
                score *= TITLE_BOOST;
            }
            if contains_term(&headings, &term) {
                score *= HEADING_BOOST;
            }
            if contains_term(&about, &term) {
                score *= ABOUT_BOOST;
            }
            scored.push((term, score));
        }
        if scored.is_empty() {
            return ExtractedKeywords::default();
        }

        // Stable order: score descending, then alphabetical.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        // Domain-noise filter, exempting the global top 5.
        let filtered: Vec<(String, f64)> = scored
            .into_iter()
            .enumerate()
            .filter(|(rank, (term, _))| {
                *rank < NOISE_TOP_EXEMPTION || !NOISE_BLOCKLIST.contains(&term.as_str())
            })
            .map(|(_, pair)| pair)
            .collect();

        let max_score = filtered.first().map(|(_, s)| *s).unwrap_or(1.0).max(f64::MIN_POSITIVE);
        let keywords: Vec<WeightedKeyword> = filtered
            .into_iter()
            .take(self.top_n)
            .map(|(term, score)| WeightedKeyword {
                term,
                weight: (score / max_score).clamp(0.0, 1.0),
                source,
            })
            .collect();

        debug!(count = keywords.len(), "extracted keywords");
        ExtractedKeywords { keywords }
    }
}

/// Lowercase, decode common HTML entities, collapse whitespace, strip
/// non-printable characters.
pub fn canonicalize(text: &str) -> String {
    let decoded = decode_entities(text);
    decoded
        .to_lowercase()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    // Parsed DOM text arrives already decoded; this covers raw descriptions.
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}

fn sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', '\n', ';'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn tokenize(sentence: &str) -> Vec<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !stopwords::is_stopword(t))
        .map(|t| t.to_string())
        .collect()
}

fn add_ngrams(tokens: &[String], n: usize, weight: f64, tf: &mut HashMap<String, (f64, f64)>) {
    if tokens.len() < n {
        return;
    }
    for window in tokens.windows(n) {
        let term = window.join(" ");
        let entry = tf.entry(term).or_insert((0.0, weight));
        entry.0 += 1.0;
    }
}

fn contains_term(field: &str, term: &str) -> bool {
    if field.is_empty() {
        return false;
    }
    format!(" {field} ").contains(&format!(" {term} "))
}

/// Scraping-artifact filter: drop terms with degenerate character-bigram
/// entropy or an implausible vowel ratio.
fn passes_gibberish_filter(term: &str) -> bool {
    let letters: Vec<char> = term.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    let vowels = letters
        .iter()
        .filter(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
        .count();
    let ratio = vowels as f64 / letters.len() as f64;
    if !(VOWEL_RATIO_MIN..=VOWEL_RATIO_MAX).contains(&ratio) {
        return false;
    }
    if letters.len() >= ENTROPY_MIN_CHARS && bigram_entropy(&letters) < ENTROPY_THRESHOLD {
        return false;
    }
    true
}

fn bigram_entropy(letters: &[char]) -> f64 {
    if letters.len() < 2 {
        return 0.0;
    }
    let mut counts: HashMap<(char, char), usize> = HashMap::new();
    for pair in letters.windows(2) {
        *counts.entry((pair[0], pair[1])).or_default() += 1;
    }
    let total = (letters.len() - 1) as f64;
    counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}
