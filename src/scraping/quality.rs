use crate::core::config::ScrapeConfig;
use crate::core::types::ScrapedContent;

/// Below this many words a page carries no usable signal and scores zero.
pub const MIN_WORDS_FOR_SCORE: usize = 10;

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Deterministic 0..1 usefulness measure of scraped content.
///
/// `0.4·min(1, words/300) + 0.2·[title] + 0.2·min(1, |headings|/3)
///  + 0.1·[about] + 0.1·min(1, |navigation|/5)`,
/// forced to exactly 0 when the text is empty or below the minimal-word
/// threshold.
pub fn quality_score(
    words: usize,
    title_present: bool,
    heading_count: usize,
    about_present: bool,
    navigation_count: usize,
) -> f64 {
    if words < MIN_WORDS_FOR_SCORE {
        return 0.0;
    }
    let mut score = 0.4 * (words as f64 / 300.0).min(1.0);
    if title_present {
        score += 0.2;
    }
    score += 0.2 * (heading_count as f64 / 3.0).min(1.0);
    if about_present {
        score += 0.1;
    }
    score += 0.1 * (navigation_count as f64 / 5.0).min(1.0);
    score.min(1.0)
}

pub fn score_content(content: &ScrapedContent) -> f64 {
    quality_score(
        content.word_count,
        !content.title.trim().is_empty(),
        content.headings.len(),
        !content.about_text.trim().is_empty(),
        content.navigation.len(),
    )
}

/// Whether a strategy's output counts as a usable result.
pub fn is_success(content: &ScrapedContent, config: &ScrapeConfig) -> bool {
    if content.word_count < config.min_word_count {
        return false;
    }
    if content.quality_score >= 0.3 {
        return true;
    }
    let has_structure = !content.title.trim().is_empty()
        && !content.headings.is_empty()
        && (!content.about_text.trim().is_empty()
            || !content.products.is_empty()
            || !content.navigation.is_empty());
    has_structure
}

/// Whether the output is good enough to skip all later strategies.
pub fn is_early_success(content: &ScrapedContent, config: &ScrapeConfig) -> bool {
    content.quality_score >= config.min_quality_for_early_success
        && content.word_count >= config.early_success_word_count
}

/// Whether the homepage warrants a single-depth subpage crawl.
pub fn wants_subpages(content: &ScrapedContent) -> bool {
    (0.3..0.7).contains(&content.quality_score) && content.word_count < 300
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn content(words: usize, quality: f64) -> ScrapedContent {
        ScrapedContent {
            url: "https://example.com/".to_string(),
            title: "T".to_string(),
            plain_text: vec!["word"; words].join(" "),
            headings: vec!["H".to_string()],
            navigation: vec![],
            products: vec![],
            about_text: String::new(),
            contact_text: String::new(),
            language: "en".to_string(),
            quality_score: quality,
            word_count: words,
            strategy_used: crate::core::types::ScrapeStrategy::FastHttpClient,
            fetched_at: Utc::now(),
            merged: false,
        }
    }

    #[test]
    fn zero_iff_below_word_floor() {
        assert_eq!(quality_score(0, true, 5, true, 5), 0.0);
        assert_eq!(quality_score(9, true, 5, true, 5), 0.0);
        assert!(quality_score(10, false, 0, false, 0) > 0.0);
    }

    #[test]
    fn full_page_scores_near_one() {
        let score = quality_score(300, true, 3, true, 5);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn components_weigh_as_specified() {
        // 150 words, title only: 0.4*0.5 + 0.2 = 0.4
        let score = quality_score(150, true, 0, false, 0);
        assert!((score - 0.4).abs() < 1e-9);
        // headings saturate at 3
        assert_eq!(
            quality_score(300, false, 3, false, 0),
            quality_score(300, false, 9, false, 0)
        );
    }

    #[test]
    fn success_requires_words_and_quality_or_structure() {
        let config = ScrapeConfig::default();
        let mut c = content(40, 0.9);
        assert!(!is_success(&c, &config), "below word floor");
        c = content(80, 0.35);
        assert!(is_success(&c, &config));
        c = content(80, 0.1);
        c.navigation = vec!["Home".to_string()];
        assert!(is_success(&c, &config), "structure path");
        c.headings.clear();
        assert!(!is_success(&c, &config));
    }

    #[test]
    fn early_success_gate() {
        let config = ScrapeConfig::default();
        assert!(is_early_success(&content(200, 0.75), &config));
        assert!(!is_early_success(&content(100, 0.75), &config));
        assert!(!is_early_success(&content(200, 0.6), &config));
    }

    #[test]
    fn subpage_gate_is_half_open_interval() {
        assert!(wants_subpages(&content(200, 0.3)));
        assert!(wants_subpages(&content(200, 0.69)));
        assert!(!wants_subpages(&content(200, 0.7)));
        assert!(!wants_subpages(&content(400, 0.5)));
        assert!(!wants_subpages(&content(200, 0.2)));
    }
}
