use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;
use url::Url;

/// Ports accepted on merchant websites.
const ALLOWED_PORTS: [u16; 4] = [80, 443, 8080, 8443];

fn host_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*$")
            .unwrap_or_else(|_| Regex::new("^$").unwrap())
    })
}

/// Normalize and validate a merchant website URL.
///
/// Lowercases the host, strips default ports and fragments, and rejects
/// non-http(s) schemes, userinfo, unusual ports, malformed hosts, and
/// private/loopback/link-local targets (RFC 1918/6598/4291).
/// `allow_private` relaxes the private-address and port checks for
/// staging/test targets.
pub fn normalize_website_url(raw: &str, allow_private: bool) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty URL".to_string());
    }

    let mut url = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{trimmed}")).map_err(|e| format!("invalid URL: {e}"))?
        }
        Err(e) => return Err(format!("invalid URL: {e}")),
    };

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme `{other}`")),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err("userinfo not allowed".to_string());
    }
    if let Some(port) = url.port() {
        if !allow_private && !ALLOWED_PORTS.contains(&port) {
            return Err(format!("port {port} not allowed"));
        }
    }
    url.set_fragment(None);

    match url.host() {
        Some(url::Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            if !host_regex().is_match(&domain) {
                return Err(format!("malformed host `{domain}`"));
            }
            if !allow_private && (domain == "localhost" || domain.ends_with(".localhost")) {
                return Err("loopback host rejected".to_string());
            }
        }
        Some(url::Host::Ipv4(ip)) => {
            if !allow_private && is_private_ipv4(ip) {
                return Err("private address rejected".to_string());
            }
        }
        Some(url::Host::Ipv6(ip)) => {
            if !allow_private && is_private_ipv6(ip) {
                return Err("private address rejected".to_string());
            }
            // Deployment network has no IPv6 egress; a literal can never be
            // scraped.
            return Err("IPv6 literal not supported".to_string());
        }
        None => return Err("missing host".to_string()),
    }

    Ok(url)
}

pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // RFC 6598 shared address space 100.64.0.0/10
        || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
}

fn is_private_ipv6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        // fe80::/10 link-local
        || (segments[0] & 0xFFC0) == 0xFE80
        // fc00::/7 unique local
        || (segments[0] & 0xFE00) == 0xFC00
}
