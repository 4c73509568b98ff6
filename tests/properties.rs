//! Property invariants over fingerprints, URL normalization, code merging,
//! and quality scoring.

use proptest::prelude::*;
use std::collections::BTreeSet;
use veriscope::codes::merge_pool;
use veriscope::core::types::{CodeCandidate, CodeSourceKind, CodeType};
use veriscope::fingerprint;
use veriscope::normalize_website_url;
use veriscope::scraping::quality::quality_score;

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 '&.-]{1,40}"
}

proptest! {
    // Leading/trailing whitespace and case changes never alter the key.
    #[test]
    fn fingerprint_stable_under_case_and_padding(
        name in name_strategy(),
        desc in proptest::option::of(name_strategy()),
        pad_left in " {0,3}",
        pad_right in "\\s{0,3}",
    ) {
        let base = fingerprint(&name, None, desc.as_deref());
        let padded_name = format!("{pad_left}{}{pad_right}", name.to_uppercase());
        let padded_desc = desc.as_ref().map(|d| format!("{pad_left}{}{pad_right}", d.to_lowercase()));
        let other = fingerprint(&padded_name, None, padded_desc.as_deref());
        prop_assert_eq!(base, other);
    }

    // Distinct normalized URLs produce distinct keys.
    #[test]
    fn fingerprint_distinguishes_urls(a in "[a-z]{3,10}", b in "[a-z]{3,10}") {
        prop_assume!(a != b);
        let fa = fingerprint("Acme", Some(&format!("https://{a}.example/")), None);
        let fb = fingerprint("Acme", Some(&format!("https://{b}.example/")), None);
        prop_assert_ne!(fa, fb);
    }

    // Scheme case, default ports, and fragments normalize away.
    #[test]
    fn url_normalization_is_canonical(
        host in "[a-z][a-z0-9-]{0,10}[a-z0-9]\\.[a-z]{2,5}",
        path_seg in "[a-z0-9]{0,8}",
        fragment in "[a-z0-9]{0,6}",
    ) {
        let plain = normalize_website_url(
            &format!("https://{host}/{path_seg}"), false,
        ).unwrap();
        let shouty = normalize_website_url(
            &format!("HTTPS://{}/{path_seg}#{fragment}", host.to_uppercase()), false,
        ).unwrap();
        let with_port = normalize_website_url(
            &format!("https://{host}:443/{path_seg}"), false,
        ).unwrap();
        prop_assert_eq!(plain.as_str(), shouty.as_str());
        prop_assert_eq!(plain.as_str(), with_port.as_str());
    }

    // Confidence is monotone non-decreasing as sources accumulate.
    #[test]
    fn merged_confidence_monotone_in_sources(
        base_conf in 0.05f64..0.9,
        extra_conf in 0.05f64..0.9,
        third_conf in 0.05f64..0.9,
    ) {
        let candidate = |conf: f64, source: CodeSourceKind| CodeCandidate {
            code: "5812".to_string(),
            code_type: CodeType::Mcc,
            description: "Eating Places".to_string(),
            confidence: conf,
            sources: BTreeSet::from([source]),
            industry_id: Some(1),
            low_confidence: false,
        };
        let small = merge_pool(vec![candidate(base_conf, CodeSourceKind::IndustryMatch)]);
        let medium = merge_pool(vec![
            candidate(base_conf, CodeSourceKind::IndustryMatch),
            candidate(extra_conf, CodeSourceKind::KeywordMatch),
        ]);
        let large = merge_pool(vec![
            candidate(base_conf, CodeSourceKind::IndustryMatch),
            candidate(extra_conf, CodeSourceKind::KeywordMatch),
            candidate(third_conf, CodeSourceKind::MlMatch),
        ]);
        prop_assert!(medium[0].confidence >= small[0].confidence);
        prop_assert!(large[0].confidence >= medium[0].confidence);
        prop_assert!(large[0].confidence <= 0.95);
    }

    // Merging never yields an empty pool from a non-empty input.
    #[test]
    fn merge_pool_never_empties_nonempty_input(confs in proptest::collection::vec(0.0f64..0.39, 1..6)) {
        let pool: Vec<CodeCandidate> = confs
            .iter()
            .enumerate()
            .map(|(i, conf)| CodeCandidate {
                code: format!("{:04}", 1000 + i),
                code_type: CodeType::Sic,
                description: String::new(),
                confidence: *conf,
                // Crosswalk-only, all below the retention floor.
                sources: BTreeSet::from([CodeSourceKind::Crosswalk]),
                industry_id: None,
                low_confidence: false,
            })
            .collect();
        let merged = merge_pool(pool);
        prop_assert!(!merged.is_empty());
        prop_assert!(merged.len() <= 3);
    }

    // Quality is zero iff below the word floor, and always within [0, 1].
    #[test]
    fn quality_score_bounds(
        words in 0usize..2000,
        title in any::<bool>(),
        headings in 0usize..20,
        about in any::<bool>(),
        nav in 0usize..40,
    ) {
        let score = quality_score(words, title, headings, about, nav);
        prop_assert!((0.0..=1.0).contains(&score));
        if words < 10 {
            prop_assert_eq!(score, 0.0);
        } else {
            prop_assert!(score > 0.0);
        }
    }
}

#[test]
fn url_property_examples_from_contract() {
    let a = normalize_website_url("HTTPS://Example.COM/path#x", false).unwrap();
    let b = normalize_website_url("https://example.com/path", false).unwrap();
    let c = normalize_website_url("https://example.com:443/path", false).unwrap();
    let fa = fingerprint("Biz", Some(a.as_str()), None);
    let fb = fingerprint("Biz", Some(b.as_str()), None);
    let fc = fingerprint("Biz", Some(c.as_str()), None);
    assert_eq!(fa, fb);
    assert_eq!(fb, fc);
}
