//! Seed metadata snapshot: a compact industry/keyword/code dataset used by
//! the default wiring and the test suite. Production deployments replace
//! this by implementing [`super::Repository`] against their own store.

use super::{CodeVector, Snapshot};
use crate::core::types::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub const RESTAURANTS: IndustryId = 1;
pub const TECHNOLOGY: IndustryId = 2;
pub const PROFESSIONAL_SERVICES: IndustryId = 3;
pub const GENERAL_BUSINESS: IndustryId = 4;
pub const RETAIL: IndustryId = 5;
pub const LIQUOR_STORES: IndustryId = 6;
pub const CATERING: IndustryId = 7;
pub const HEALTH_WELLNESS: IndustryId = 8;
pub const FINANCIAL_SERVICES: IndustryId = 9;
pub const CONSTRUCTION: IndustryId = 10;
pub const EDUCATION: IndustryId = 11;
pub const AUTOMOTIVE: IndustryId = 12;

fn industry(
    industry_id: IndustryId,
    name: &str,
    aliases: &[&str],
    naics_prefix: Option<&str>,
) -> IndustryRecord {
    IndustryRecord {
        industry_id,
        name: name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        naics_prefix: naics_prefix.map(|p| p.to_string()),
    }
}

fn keywords(pairs: &[(&str, f64)]) -> Vec<IndustryKeyword> {
    pairs
        .iter()
        .map(|(term, relevance)| IndustryKeyword {
            term: term.to_string(),
            relevance: *relevance,
        })
        .collect()
}

fn topics(triples: &[(&str, f64, f64)]) -> Vec<IndustryTopic> {
    triples
        .iter()
        .map(|(topic, relevance, accuracy)| IndustryTopic {
            topic: topic.to_string(),
            relevance: *relevance,
            historical_accuracy: *accuracy,
        })
        .collect()
}

fn patterns(entries: &[(&[&str], f64)]) -> Vec<CooccurrencePattern> {
    entries
        .iter()
        .map(|(terms, weight)| CooccurrencePattern {
            terms: terms.iter().map(|t| t.to_string()).collect(),
            weight: *weight,
        })
        .collect()
}

fn code(
    code: &str,
    code_type: CodeType,
    description: &str,
    industry_id: IndustryId,
    priority: i32,
    kws: &[&str],
) -> CodeMetadata {
    CodeMetadata {
        code: code.to_string(),
        code_type,
        description: description.to_string(),
        industry_id: Some(industry_id),
        keywords: kws.iter().map(|k| k.to_string()).collect(),
        priority,
    }
}

/// Deterministic fixture vector for one code: 384 floats expanded from a
/// SHA-256 chain over `"{code_type}:{code}"`, normalized to unit length.
pub fn fixture_vector(code: &str, code_type: CodeType) -> Vec<f32> {
    let mut out = Vec::with_capacity(384);
    let mut block = Sha256::digest(format!("{}:{}", code_type.as_str(), code).as_bytes());
    while out.len() < 384 {
        for byte in block.iter() {
            if out.len() == 384 {
                break;
            }
            out.push((*byte as f32 - 127.5) / 127.5);
        }
        block = Sha256::digest(&block);
    }
    let norm = out.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in out.iter_mut() {
            *v = (*v as f64 / norm) as f32;
        }
    }
    out
}

pub fn seed_snapshot() -> Snapshot {
    let industries = vec![
        industry(RESTAURANTS, "Restaurants", &["Food Service", "Eating Places"], Some("722")),
        industry(TECHNOLOGY, "Technology", &["Software", "Information Technology"], Some("51")),
        industry(PROFESSIONAL_SERVICES, "Professional Services", &["Consulting"], Some("54")),
        industry(GENERAL_BUSINESS, "General Business", &[], None),
        industry(RETAIL, "Retail", &["Shops"], Some("44")),
        industry(
            LIQUOR_STORES,
            "Beer, Wine & Liquor Stores",
            &["Liquor Stores", "Wine Shops"],
            Some("4453"),
        ),
        industry(CATERING, "Catering", &["Caterers"], Some("7223")),
        industry(HEALTH_WELLNESS, "Health & Wellness", &["Healthcare"], Some("62")),
        industry(FINANCIAL_SERVICES, "Financial Services", &["Finance"], Some("52")),
        industry(CONSTRUCTION, "Construction", &["Contractors"], Some("23")),
        industry(EDUCATION, "Education", &["Schools"], Some("61")),
        industry(AUTOMOTIVE, "Automotive", &["Auto Services"], Some("811")),
    ];

    let mut keywords_by_industry = HashMap::new();
    keywords_by_industry.insert(
        RESTAURANTS,
        keywords(&[
            ("pizza", 0.95),
            ("restaurant", 0.95),
            ("menu", 0.80),
            ("dining", 0.85),
            ("pasta", 0.80),
            ("cafe", 0.80),
            ("cuisine", 0.85),
            ("takeout", 0.70),
            ("chef", 0.70),
            ("italian", 0.50),
            ("delivery", 0.45),
            ("food", 0.55),
            ("eatery", 0.85),
            ("brunch", 0.70),
        ]),
    );
    keywords_by_industry.insert(
        TECHNOLOGY,
        keywords(&[
            ("software", 0.95),
            ("saas", 0.95),
            ("cloud", 0.90),
            ("computing", 0.85),
            ("technology", 0.90),
            ("platform", 0.65),
            ("api", 0.70),
            ("hosting", 0.70),
            ("developer", 0.75),
            ("app", 0.65),
            ("data", 0.55),
            ("digital", 0.55),
            ("cloud computing", 0.95),
            ("saas platform", 0.95),
        ]),
    );
    keywords_by_industry.insert(
        PROFESSIONAL_SERVICES,
        keywords(&[
            ("consulting", 0.90),
            ("advisory", 0.85),
            ("professional", 0.70),
            ("corporation", 0.55),
            ("management", 0.60),
            ("strategy", 0.60),
            ("firm", 0.60),
            ("solutions", 0.50),
            ("services", 0.45),
        ]),
    );
    keywords_by_industry.insert(
        GENERAL_BUSINESS,
        keywords(&[
            ("business", 0.50),
            ("company", 0.45),
            ("corporation", 0.60),
            ("general", 0.40),
            ("services", 0.35),
        ]),
    );
    keywords_by_industry.insert(
        RETAIL,
        keywords(&[
            ("store", 0.75),
            ("shop", 0.70),
            ("retail", 0.90),
            ("boutique", 0.80),
            ("merchandise", 0.70),
            ("shopping", 0.60),
        ]),
    );
    keywords_by_industry.insert(
        LIQUOR_STORES,
        keywords(&[
            ("wine", 0.95),
            ("liquor", 0.95),
            ("beer", 0.80),
            ("spirits", 0.85),
            ("vineyard", 0.70),
            ("tasting", 0.70),
            ("bottle", 0.55),
            ("wine shop", 0.95),
        ]),
    );
    keywords_by_industry.insert(
        CATERING,
        keywords(&[
            ("catering", 0.95),
            ("caterer", 0.95),
            ("banquet", 0.80),
            ("events", 0.55),
            ("wedding", 0.60),
            ("event catering", 0.90),
        ]),
    );
    keywords_by_industry.insert(
        HEALTH_WELLNESS,
        keywords(&[
            ("health", 0.80),
            ("wellness", 0.85),
            ("clinic", 0.80),
            ("fitness", 0.80),
            ("spa", 0.75),
            ("massage", 0.70),
        ]),
    );
    keywords_by_industry.insert(
        FINANCIAL_SERVICES,
        keywords(&[
            ("bank", 0.90),
            ("finance", 0.90),
            ("payments", 0.85),
            ("insurance", 0.80),
            ("lending", 0.80),
            ("investment", 0.85),
        ]),
    );
    keywords_by_industry.insert(
        CONSTRUCTION,
        keywords(&[
            ("construction", 0.90),
            ("contractor", 0.85),
            ("renovation", 0.80),
            ("roofing", 0.80),
            ("plumbing", 0.70),
            ("building", 0.55),
        ]),
    );
    keywords_by_industry.insert(
        EDUCATION,
        keywords(&[
            ("school", 0.85),
            ("education", 0.90),
            ("tutoring", 0.85),
            ("courses", 0.65),
            ("training", 0.55),
            ("learning", 0.55),
        ]),
    );
    keywords_by_industry.insert(
        AUTOMOTIVE,
        keywords(&[
            ("automotive", 0.90),
            ("dealership", 0.85),
            ("auto", 0.80),
            ("car", 0.65),
            ("tires", 0.70),
            ("repair", 0.55),
        ]),
    );

    let mut topic_map = HashMap::new();
    topic_map.insert(
        RESTAURANTS,
        topics(&[
            ("pizza", 0.90, 0.85),
            ("dining", 0.80, 0.80),
            ("menu", 0.70, 0.75),
            ("cuisine", 0.80, 0.80),
        ]),
    );
    topic_map.insert(
        TECHNOLOGY,
        topics(&[
            ("cloud", 0.90, 0.85),
            ("saas", 0.90, 0.85),
            ("software", 0.85, 0.80),
            ("platform", 0.60, 0.70),
        ]),
    );
    topic_map.insert(
        PROFESSIONAL_SERVICES,
        topics(&[("consulting", 0.85, 0.75), ("advisory", 0.80, 0.70)]),
    );
    topic_map.insert(
        LIQUOR_STORES,
        topics(&[("wine", 0.90, 0.85), ("spirits", 0.80, 0.80)]),
    );
    topic_map.insert(
        CATERING,
        topics(&[("catering", 0.90, 0.80), ("banquet", 0.75, 0.75)]),
    );
    topic_map.insert(
        HEALTH_WELLNESS,
        topics(&[("wellness", 0.85, 0.75), ("fitness", 0.80, 0.75)]),
    );
    topic_map.insert(
        FINANCIAL_SERVICES,
        topics(&[("payments", 0.85, 0.80), ("lending", 0.80, 0.75)]),
    );

    let mut cooccurrence = HashMap::new();
    cooccurrence.insert(
        RESTAURANTS,
        patterns(&[
            (&["pizza", "delivery"], 0.80),
            (&["menu", "dining"], 0.70),
            (&["pizza", "pasta", "italian"], 1.00),
            (&["restaurant", "menu"], 0.75),
        ]),
    );
    cooccurrence.insert(
        TECHNOLOGY,
        patterns(&[
            (&["cloud", "computing"], 0.90),
            (&["saas", "platform"], 0.90),
            (&["cloud", "saas", "platform"], 1.00),
            (&["software", "api"], 0.70),
        ]),
    );
    cooccurrence.insert(
        LIQUOR_STORES,
        patterns(&[(&["wine", "tasting"], 0.80), (&["wine", "shop"], 0.90)]),
    );
    cooccurrence.insert(
        CATERING,
        patterns(&[(&["catering", "events"], 0.80), (&["catering", "wedding"], 0.75)]),
    );
    cooccurrence.insert(
        PROFESSIONAL_SERVICES,
        patterns(&[(&["consulting", "strategy"], 0.75)]),
    );

    let entities = vec![
        ("opentable", "product", RESTAURANTS),
        ("doordash", "product", RESTAURANTS),
        ("grubhub", "product", RESTAURANTS),
        ("aws", "product", TECHNOLOGY),
        ("azure", "product", TECHNOLOGY),
        ("kubernetes", "product", TECHNOLOGY),
        ("salesforce", "organization", TECHNOLOGY),
        ("stripe", "product", FINANCIAL_SERVICES),
        ("visa", "organization", FINANCIAL_SERVICES),
        ("deloitte", "organization", PROFESSIONAL_SERVICES),
        ("mindbody", "product", HEALTH_WELLNESS),
        ("autotrader", "product", AUTOMOTIVE),
    ]
    .into_iter()
    .map(|(alias, entity_type, industry_id)| EntityMapping {
        alias: alias.to_string(),
        entity_type: entity_type.to_string(),
        industry_id,
    })
    .collect();

    let codes = vec![
        // MCC
        code("5812", CodeType::Mcc, "Eating Places, Restaurants", RESTAURANTS, 0,
             &["restaurant", "dining", "pizza", "food", "menu"]),
        code("5814", CodeType::Mcc, "Fast Food Restaurants", RESTAURANTS, 1,
             &["takeout", "delivery", "fast"]),
        code("5811", CodeType::Mcc, "Caterers", CATERING, 0,
             &["catering", "caterer", "banquet"]),
        code("5921", CodeType::Mcc, "Package Stores — Beer, Wine, and Liquor", LIQUOR_STORES, 0,
             &["wine", "liquor", "beer", "spirits"]),
        code("7372", CodeType::Mcc, "Computer Programming and Data Processing", TECHNOLOGY, 0,
             &["software", "cloud", "saas", "computing", "platform"]),
        code("5734", CodeType::Mcc, "Computer Software Stores", TECHNOLOGY, 1,
             &["software", "app"]),
        code("8999", CodeType::Mcc, "Professional Services Not Elsewhere Classified", PROFESSIONAL_SERVICES, 0,
             &["consulting", "advisory", "professional"]),
        code("7399", CodeType::Mcc, "Business Services Not Elsewhere Classified", GENERAL_BUSINESS, 0,
             &["business", "services"]),
        code("5999", CodeType::Mcc, "Miscellaneous Retail Stores", RETAIL, 0,
             &["retail", "store", "shop"]),
        code("8099", CodeType::Mcc, "Medical Services Not Elsewhere Classified", HEALTH_WELLNESS, 0,
             &["health", "wellness", "clinic"]),
        code("6012", CodeType::Mcc, "Financial Institutions", FINANCIAL_SERVICES, 0,
             &["bank", "finance", "lending"]),
        code("1520", CodeType::Mcc, "General Contractors", CONSTRUCTION, 0,
             &["construction", "contractor"]),
        code("8299", CodeType::Mcc, "Schools and Educational Services", EDUCATION, 0,
             &["school", "education", "tutoring"]),
        code("7538", CodeType::Mcc, "Automotive Service Shops", AUTOMOTIVE, 0,
             &["auto", "repair", "automotive"]),
        // SIC
        code("5812", CodeType::Sic, "Eating and Drinking Places", RESTAURANTS, 0,
             &["restaurant", "dining", "food"]),
        code("5813", CodeType::Sic, "Drinking Places", RESTAURANTS, 1, &["bar", "tavern"]),
        code("5963", CodeType::Sic, "Direct Selling — Caterers", CATERING, 0,
             &["catering", "caterer"]),
        code("5921", CodeType::Sic, "Liquor Stores", LIQUOR_STORES, 0,
             &["wine", "liquor", "beer"]),
        code("7372", CodeType::Sic, "Prepackaged Software", TECHNOLOGY, 0,
             &["software", "saas"]),
        code("7371", CodeType::Sic, "Computer Programming Services", TECHNOLOGY, 1,
             &["software", "developer", "cloud"]),
        code("8742", CodeType::Sic, "Management Consulting Services", PROFESSIONAL_SERVICES, 0,
             &["consulting", "management", "strategy"]),
        code("7389", CodeType::Sic, "Business Services NEC", GENERAL_BUSINESS, 0,
             &["business", "services"]),
        code("5999", CodeType::Sic, "Retail Stores NEC", RETAIL, 0, &["retail", "store"]),
        code("8049", CodeType::Sic, "Offices of Health Practitioners", HEALTH_WELLNESS, 0,
             &["health", "clinic"]),
        code("6199", CodeType::Sic, "Finance Services", FINANCIAL_SERVICES, 0,
             &["finance", "payments"]),
        code("1521", CodeType::Sic, "General Building Contractors", CONSTRUCTION, 0,
             &["construction", "contractor"]),
        code("8299", CodeType::Sic, "Schools and Educational Services NEC", EDUCATION, 0,
             &["school", "education"]),
        code("7538", CodeType::Sic, "General Automotive Repair Shops", AUTOMOTIVE, 0,
             &["auto", "repair"]),
        // NAICS
        code("722511", CodeType::Naics, "Full-Service Restaurants", RESTAURANTS, 0,
             &["restaurant", "dining"]),
        code("722513", CodeType::Naics, "Limited-Service Restaurants", RESTAURANTS, 1,
             &["takeout", "fast", "pizza"]),
        code("722320", CodeType::Naics, "Caterers", CATERING, 0, &["catering", "caterer"]),
        code("445320", CodeType::Naics, "Beer, Wine, and Liquor Stores", LIQUOR_STORES, 0,
             &["wine", "liquor", "beer"]),
        code("513210", CodeType::Naics, "Software Publishers", TECHNOLOGY, 0,
             &["software", "saas", "platform"]),
        code("541511", CodeType::Naics, "Custom Computer Programming Services", TECHNOLOGY, 1,
             &["software", "developer", "cloud"]),
        code("541611", CodeType::Naics, "Administrative Management Consulting", PROFESSIONAL_SERVICES, 0,
             &["consulting", "management"]),
        code("561499", CodeType::Naics, "All Other Business Support Services", GENERAL_BUSINESS, 0,
             &["business", "services"]),
        code("455219", CodeType::Naics, "All Other General Merchandise Retailers", RETAIL, 0,
             &["retail", "store"]),
        code("621999", CodeType::Naics, "All Other Ambulatory Health Care", HEALTH_WELLNESS, 0,
             &["health", "clinic", "wellness"]),
        code("522320", CodeType::Naics, "Financial Transactions Processing", FINANCIAL_SERVICES, 0,
             &["payments", "finance"]),
        code("236118", CodeType::Naics, "Residential Remodelers", CONSTRUCTION, 0,
             &["renovation", "construction"]),
        code("611691", CodeType::Naics, "Exam Preparation and Tutoring", EDUCATION, 0,
             &["tutoring", "education"]),
        code("811111", CodeType::Naics, "General Automotive Repair", AUTOMOTIVE, 0,
             &["auto", "repair"]),
    ];

    let mut crosswalks = HashMap::new();
    crosswalks.insert(
        "5812".to_string(),
        CrosswalkEntry {
            sic: vec!["5812".to_string()],
            naics: vec!["722511".to_string(), "722513".to_string()],
        },
    );
    crosswalks.insert(
        "5814".to_string(),
        CrosswalkEntry {
            sic: vec!["5812".to_string()],
            naics: vec!["722513".to_string()],
        },
    );
    crosswalks.insert(
        "5811".to_string(),
        CrosswalkEntry {
            sic: vec!["5963".to_string()],
            naics: vec!["722320".to_string()],
        },
    );
    crosswalks.insert(
        "5921".to_string(),
        CrosswalkEntry {
            sic: vec!["5921".to_string()],
            naics: vec!["445320".to_string()],
        },
    );
    crosswalks.insert(
        "7372".to_string(),
        CrosswalkEntry {
            sic: vec!["7372".to_string()],
            naics: vec!["513210".to_string(), "541511".to_string()],
        },
    );
    crosswalks.insert(
        "8999".to_string(),
        CrosswalkEntry {
            sic: vec!["8742".to_string()],
            naics: vec!["541611".to_string()],
        },
    );
    crosswalks.insert(
        "7399".to_string(),
        CrosswalkEntry {
            sic: vec!["7389".to_string()],
            naics: vec!["561499".to_string()],
        },
    );

    let code_vectors = codes
        .iter()
        .map(|c| CodeVector {
            code: c.code.clone(),
            code_type: c.code_type,
            description: c.description.clone(),
            industry_id: c.industry_id,
            vector: fixture_vector(&c.code, c.code_type),
        })
        .collect();

    let idf = [
        ("pizza", 2.2),
        ("restaurant", 1.8),
        ("wine", 2.0),
        ("liquor", 2.3),
        ("saas", 2.4),
        ("cloud", 1.8),
        ("computing", 1.7),
        ("software", 1.6),
        ("consulting", 1.9),
        ("advisory", 2.0),
        ("catering", 2.1),
        ("banquet", 2.2),
        ("tutoring", 2.1),
        ("dealership", 2.2),
        ("wellness", 1.9),
        ("payments", 1.9),
        ("construction", 1.8),
        ("business", 0.4),
        ("company", 0.4),
        ("services", 0.4),
        ("general", 0.5),
        ("corporation", 0.9),
        ("cloud computing", 2.6),
        ("saas platform", 2.6),
        ("wine shop", 2.5),
        ("event catering", 2.5),
    ]
    .into_iter()
    .map(|(term, idf)| (term.to_string(), idf))
    .collect();

    let accuracy = [
        (RESTAURANTS, 0.85),
        (TECHNOLOGY, 0.85),
        (PROFESSIONAL_SERVICES, 0.80),
        (GENERAL_BUSINESS, 0.65),
        (RETAIL, 0.75),
        (LIQUOR_STORES, 0.85),
        (CATERING, 0.80),
        (HEALTH_WELLNESS, 0.75),
        (FINANCIAL_SERVICES, 0.80),
        (CONSTRUCTION, 0.75),
        (EDUCATION, 0.75),
        (AUTOMOTIVE, 0.75),
    ]
    .into_iter()
    .collect();

    Snapshot {
        industries,
        keywords_by_industry,
        idf,
        topics: topic_map,
        cooccurrence,
        entities,
        codes,
        crosswalks,
        code_vectors,
        accuracy,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_vectors_are_deterministic_and_normalized() {
        let a = fixture_vector("5812", CodeType::Mcc);
        let b = fixture_vector("5812", CodeType::Mcc);
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        let norm: f64 = a.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);

        let other = fixture_vector("5812", CodeType::Sic);
        assert_ne!(a, other);
    }

    #[test]
    fn every_code_type_is_seeded_for_core_industries() {
        let snap = seed_snapshot();
        for industry in [RESTAURANTS, TECHNOLOGY, PROFESSIONAL_SERVICES, GENERAL_BUSINESS] {
            for code_type in CodeType::ALL {
                assert!(
                    snap.codes
                        .iter()
                        .any(|c| c.industry_id == Some(industry) && c.code_type == code_type),
                    "missing {code_type:?} for industry {industry}"
                );
            }
        }
    }

    #[test]
    fn crosswalks_reference_seeded_codes() {
        let snap = seed_snapshot();
        for (mcc, entry) in &snap.crosswalks {
            assert!(snap
                .codes
                .iter()
                .any(|c| c.code_type == CodeType::Mcc && &c.code == mcc));
            for sic in &entry.sic {
                assert!(
                    snap.codes
                        .iter()
                        .any(|c| c.code_type == CodeType::Sic && &c.code == sic),
                    "crosswalk SIC {sic} not seeded"
                );
            }
            for naics in &entry.naics {
                assert!(
                    snap.codes
                        .iter()
                        .any(|c| c.code_type == CodeType::Naics && &c.code == naics),
                    "crosswalk NAICS {naics} not seeded"
                );
            }
        }
    }
}
