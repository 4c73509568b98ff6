use sha2::{Digest, Sha256};

/// Stable request fingerprint used as cache and dedup key.
///
/// `sha256(lowercase(business_name) ∥ 0x1F ∥ normalized_website_url ∥ 0x1F ∥
/// lowercase(description))` over whitespace-trimmed fields, hex-encoded.
/// Derivation is pure: equal normalized inputs always yield equal keys.
pub fn fingerprint(
    business_name: &str,
    normalized_website_url: Option<&str>,
    description: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(business_name.trim().to_lowercase().as_bytes());
    hasher.update([0x1F]);
    hasher.update(normalized_website_url.unwrap_or("").as_bytes());
    hasher.update([0x1F]);
    hasher.update(description.unwrap_or("").trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_whitespace_insensitive() {
        let a = fingerprint("Joe's Pizza", None, Some("wood fired"));
        let b = fingerprint("  joe's pizza  ", None, Some("WOOD FIRED  "));
        assert_eq!(a, b);
    }

    #[test]
    fn fields_are_separated() {
        // The 0x1F separator prevents ambiguous concatenations.
        let a = fingerprint("ab", None, Some("c"));
        let b = fingerprint("a", None, Some("bc"));
        assert_ne!(a, b);
    }

    #[test]
    fn url_changes_key() {
        let a = fingerprint("Acme", Some("https://acme.example/"), None);
        let b = fingerprint("Acme", Some("https://acme.other/"), None);
        assert_ne!(a, b);
    }
}
