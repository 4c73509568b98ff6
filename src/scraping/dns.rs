use crate::core::config::DnsConfig;
use rand::Rng;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("no A records for `{0}`")]
    NoRecords(String),
    #[error("resolution failed for `{0}`: {1}")]
    Failed(String, String),
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedHost {
    pub addr: Ipv4Addr,
    pub via_fallback: bool,
}

/// Host resolver: system resolver first, then the configured public DNS
/// servers, each bounded by the per-server timeout. Only the IPv4 family is
/// used; AAAA answers are ignored because the deployment network has no
/// IPv6 egress.
pub struct FallbackResolver {
    servers: Vec<Ipv4Addr>,
    timeout: Duration,
}

impl FallbackResolver {
    pub fn new(config: &DnsConfig) -> Self {
        Self {
            servers: config.fallback_servers.clone(),
            timeout: config.timeout(),
        }
    }

    pub async fn resolve(&self, host: &str) -> Result<ResolvedHost, DnsError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return match ip {
                IpAddr::V4(addr) => Ok(ResolvedHost {
                    addr,
                    via_fallback: false,
                }),
                IpAddr::V6(_) => Err(DnsError::NoRecords(host.to_string())),
            };
        }

        match tokio::time::timeout(self.timeout, tokio::net::lookup_host((host, 0u16))).await {
            Ok(Ok(addrs)) => {
                let v4 = addrs.filter_map(|a| match a.ip() {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                });
                for addr in v4 {
                    return Ok(ResolvedHost {
                        addr,
                        via_fallback: false,
                    });
                }
                debug!(host, "system resolver returned no IPv4 records");
            }
            Ok(Err(e)) => debug!(host, error = %e, "system resolver failed"),
            Err(_) => debug!(host, "system resolver timed out"),
        }

        let mut last_error = String::from("no fallback servers configured");
        for server in &self.servers {
            match self.query_a(*server, host).await {
                Ok(addrs) => {
                    if let Some(addr) = addrs.into_iter().next() {
                        debug!(host, server = %server, %addr, "resolved via fallback DNS");
                        return Ok(ResolvedHost {
                            addr,
                            via_fallback: true,
                        });
                    }
                    last_error = format!("{server}: no A records");
                }
                Err(e) => {
                    warn!(host, server = %server, error = %e, "fallback DNS query failed");
                    last_error = format!("{server}: {e}");
                }
            }
        }

        Err(DnsError::Failed(host.to_string(), last_error))
    }

    async fn query_a(&self, server: Ipv4Addr, host: &str) -> anyhow::Result<Vec<Ipv4Addr>> {
        let id: u16 = rand::thread_rng().gen();
        let query = encode_query(id, host)?;

        let op = async {
            let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
            socket
                .connect(SocketAddr::from((server, 53)))
                .await?;
            socket.send(&query).await?;
            let mut buf = [0u8; 1500];
            let n = socket.recv(&mut buf).await?;
            parse_answers(id, &buf[..n]).map_err(|e| anyhow::anyhow!(e))
        };

        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| anyhow::anyhow!("query timed out"))?
    }
}

/// Build a single-question recursive A query (RFC 1035 §4.1).
fn encode_query(id: u16, host: &str) -> anyhow::Result<Vec<u8>> {
    if host.len() > 253 || host.is_empty() {
        anyhow::bail!("invalid hostname length");
    }
    let mut packet = Vec::with_capacity(17 + host.len());
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&0x0100u16.to_be_bytes()); // RD
    packet.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    packet.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // AN/NS/AR
    for label in host.trim_end_matches('.').split('.') {
        if label.is_empty() || label.len() > 63 {
            anyhow::bail!("invalid hostname label");
        }
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);
    packet.extend_from_slice(&1u16.to_be_bytes()); // QTYPE A
    packet.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN
    Ok(packet)
}

/// Extract the A records from a response. Compression pointers are skipped,
/// CNAME chains are not followed across packets (their A records normally
/// ride in the same answer section and are picked up here).
fn parse_answers(expected_id: u16, packet: &[u8]) -> Result<Vec<Ipv4Addr>, &'static str> {
    if packet.len() < 12 {
        return Err("short packet");
    }
    let id = u16::from_be_bytes([packet[0], packet[1]]);
    if id != expected_id {
        return Err("mismatched id");
    }
    let flags = u16::from_be_bytes([packet[2], packet[3]]);
    if flags & 0x8000 == 0 {
        return Err("not a response");
    }
    if flags & 0x000F != 0 {
        return Err("non-zero rcode");
    }
    let qdcount = u16::from_be_bytes([packet[4], packet[5]]) as usize;
    let ancount = u16::from_be_bytes([packet[6], packet[7]]) as usize;

    let mut pos = 12;
    for _ in 0..qdcount {
        pos = skip_name(packet, pos).ok_or("truncated question")?;
        pos = pos.checked_add(4).filter(|p| *p <= packet.len()).ok_or("truncated question")?;
    }

    let mut addrs = Vec::new();
    for _ in 0..ancount {
        pos = skip_name(packet, pos).ok_or("truncated answer")?;
        if pos + 10 > packet.len() {
            return Err("truncated answer");
        }
        let rtype = u16::from_be_bytes([packet[pos], packet[pos + 1]]);
        let rclass = u16::from_be_bytes([packet[pos + 2], packet[pos + 3]]);
        let rdlength = u16::from_be_bytes([packet[pos + 8], packet[pos + 9]]) as usize;
        pos += 10;
        if pos + rdlength > packet.len() {
            return Err("truncated rdata");
        }
        if rtype == 1 && rclass == 1 && rdlength == 4 {
            addrs.push(Ipv4Addr::new(
                packet[pos],
                packet[pos + 1],
                packet[pos + 2],
                packet[pos + 3],
            ));
        }
        pos += rdlength;
    }
    Ok(addrs)
}

/// Advance past one (possibly compressed) domain name.
fn skip_name(packet: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *packet.get(pos)?;
        if len == 0 {
            return Some(pos + 1);
        }
        if len & 0xC0 == 0xC0 {
            // Compression pointer: two bytes, then the name ends.
            return (pos + 2 <= packet.len()).then_some(pos + 2);
        }
        pos = pos.checked_add(1 + len as usize)?;
        if pos > packet.len() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_standard_query() {
        let q = encode_query(0x1234, "example.com").unwrap();
        assert_eq!(&q[..2], &[0x12, 0x34]);
        assert_eq!(&q[2..4], &[0x01, 0x00]);
        // 7"example"3"com"0
        assert_eq!(q[12], 7);
        assert_eq!(&q[13..20], b"example");
        assert_eq!(q[20], 3);
        assert_eq!(&q[21..24], b"com");
        assert_eq!(q[24], 0);
        // QTYPE A, QCLASS IN
        assert_eq!(&q[25..29], &[0, 1, 0, 1]);
    }

    #[test]
    fn rejects_oversized_labels() {
        let long = "a".repeat(64);
        assert!(encode_query(1, &format!("{long}.com")).is_err());
        assert!(encode_query(1, "").is_err());
    }

    fn sample_response(id: u16) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&id.to_be_bytes());
        p.extend_from_slice(&0x8180u16.to_be_bytes()); // QR|RD|RA
        p.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
        p.extend_from_slice(&2u16.to_be_bytes()); // ANCOUNT
        p.extend_from_slice(&[0, 0, 0, 0]);
        // Question: example.com A IN
        p.push(7);
        p.extend_from_slice(b"example");
        p.push(3);
        p.extend_from_slice(b"com");
        p.push(0);
        p.extend_from_slice(&[0, 1, 0, 1]);
        // Answer 1: pointer to offset 12, A record 93.184.216.34
        p.extend_from_slice(&[0xC0, 0x0C]);
        p.extend_from_slice(&[0, 1, 0, 1]);
        p.extend_from_slice(&[0, 0, 0, 60]); // TTL
        p.extend_from_slice(&[0, 4]);
        p.extend_from_slice(&[93, 184, 216, 34]);
        // Answer 2: AAAA record (ignored)
        p.extend_from_slice(&[0xC0, 0x0C]);
        p.extend_from_slice(&[0, 28, 0, 1]);
        p.extend_from_slice(&[0, 0, 0, 60]);
        p.extend_from_slice(&[0, 16]);
        p.extend_from_slice(&[0; 16]);
        p
    }

    #[test]
    fn parses_a_records_and_ignores_aaaa() {
        let packet = sample_response(0x4242);
        let addrs = parse_answers(0x4242, &packet).unwrap();
        assert_eq!(addrs, vec![Ipv4Addr::new(93, 184, 216, 34)]);
    }

    #[test]
    fn rejects_wrong_id_and_error_rcode() {
        let packet = sample_response(0x4242);
        assert!(parse_answers(0x4243, &packet).is_err());

        let mut nx = sample_response(0x4242);
        nx[3] = 0x83; // NXDOMAIN
        assert!(parse_answers(0x4242, &nx).is_err());
    }

    #[test]
    fn truncated_packets_do_not_panic() {
        let packet = sample_response(1);
        for cut in 0..packet.len() {
            let _ = parse_answers(1, &packet[..cut]);
        }
    }

    #[tokio::test]
    async fn ip_literals_bypass_lookup() {
        let resolver = FallbackResolver::new(&DnsConfig::default());
        let resolved = resolver.resolve("8.8.8.8").await.unwrap();
        assert_eq!(resolved.addr, Ipv4Addr::new(8, 8, 8, 8));
        assert!(!resolved.via_fallback);

        assert!(resolver.resolve("::1").await.is_err());
    }
}
