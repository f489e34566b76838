use std::net::IpAddr;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::errors::{EngineError, Result};
use crate::models::{Target, TargetKind};

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$")
        .expect("domain regex")
});

/// Classifies a raw target string as an IP literal, a URL or a domain.
/// Syntax validation only, no network lookups. Tie-break order: IP first,
/// then URL (requires an http/https scheme), then domain — a bare name with
/// dots and no scheme is a domain, not a URL.
pub fn classify(raw: &str) -> Result<Target> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(raw, "target must not be empty"));
    }

    if IpAddr::from_str(trimmed).is_ok() {
        return Ok(Target {
            raw: trimmed.to_string(),
            kind: TargetKind::Ip,
        });
    }

    if trimmed.contains("://") {
        let url = Url::parse(trimmed).map_err(|e| invalid(trimmed, &e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(trimmed, "URL must use http or https"));
        }
        if url.host_str().is_none() {
            return Err(invalid(trimmed, "URL has no host"));
        }
        return Ok(Target {
            raw: trimmed.to_string(),
            kind: TargetKind::Url,
        });
    }

    if trimmed.len() <= 253 && DOMAIN_RE.is_match(trimmed) {
        return Ok(Target {
            raw: trimmed.to_lowercase(),
            kind: TargetKind::Domain,
        });
    }

    Err(invalid(
        trimmed,
        "not an IP literal, http(s) URL or domain name",
    ))
}

fn invalid(input: &str, reason: &str) -> EngineError {
    EngineError::InvalidTarget {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ipv4_and_ipv6() {
        assert_eq!(classify("192.0.2.10").unwrap().kind, TargetKind::Ip);
        assert_eq!(classify("2001:db8::1").unwrap().kind, TargetKind::Ip);
    }

    #[test]
    fn classifies_urls_with_scheme() {
        let t = classify("https://example.com/login").unwrap();
        assert_eq!(t.kind, TargetKind::Url);
        assert_eq!(t.raw, "https://example.com/login");
        assert_eq!(classify("http://10.0.0.1:8080").unwrap().kind, TargetKind::Url);
    }

    #[test]
    fn bare_host_with_dots_is_a_domain_not_a_url() {
        let t = classify("Example.COM").unwrap();
        assert_eq!(t.kind, TargetKind::Domain);
        assert_eq!(t.raw, "example.com");
        assert_eq!(classify("sub.example.co.uk").unwrap().kind, TargetKind::Domain);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(classify("  192.0.2.10 ").unwrap().raw, "192.0.2.10");
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "   ", "not a target", "ftp://example.com", "-x.com", "http://"] {
            assert!(classify(bad).is_err(), "expected rejection for {bad:?}");
        }
    }

    #[test]
    fn partition_is_exhaustive_over_three_kinds() {
        for (input, kind) in [
            ("203.0.113.5", TargetKind::Ip),
            ("https://example.com", TargetKind::Url),
            ("example.com", TargetKind::Domain),
        ] {
            assert_eq!(classify(input).unwrap().kind, kind);
        }
    }
}
