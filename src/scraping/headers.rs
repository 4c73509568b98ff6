//! Realistic browser identities for the HTTP scraping strategies.

/// Desktop user agents rotated by the fast strategy.
pub const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

pub fn random_desktop_user_agent() -> &'static str {
    use rand::prelude::*;
    let mut rng = rand::thread_rng();
    let index = rng.gen_range(0..DESKTOP_USER_AGENTS.len());
    DESKTOP_USER_AGENTS[index]
}

/// Full browser header set sent by the second-tier strategy. Accept-Encoding
/// is left to the HTTP client so response decompression stays automatic.
pub fn browser_header_set() -> Vec<(&'static str, String)> {
    vec![
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
        ),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
        (
            "Sec-Ch-Ua",
            r#""Chromium";v="131", "Not_A Brand";v="24", "Google Chrome";v="131""#.to_string(),
        ),
        ("Sec-Ch-Ua-Mobile", "?0".to_string()),
        ("Sec-Ch-Ua-Platform", "\"Windows\"".to_string()),
        ("Sec-Fetch-Dest", "document".to_string()),
        ("Sec-Fetch-Mode", "navigate".to_string()),
        ("Sec-Fetch-Site", "none".to_string()),
        ("Sec-Fetch-User", "?1".to_string()),
        ("Upgrade-Insecure-Requests", "1".to_string()),
        ("DNT", "1".to_string()),
        ("Cache-Control", "max-age=0".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agents_are_desktop_profiles() {
        for ua in DESKTOP_USER_AGENTS {
            assert!(ua.starts_with("Mozilla/5.0"));
            assert!(!ua.contains("Mobile"));
        }
    }

    #[test]
    fn header_set_covers_sec_fetch_family() {
        let headers = browser_header_set();
        for required in ["Sec-Fetch-Dest", "Sec-Fetch-Mode", "Sec-Fetch-Site"] {
            assert!(headers.iter().any(|(name, _)| *name == required));
        }
        assert!(!headers.iter().any(|(name, _)| *name == "Accept-Encoding"));
    }
}
