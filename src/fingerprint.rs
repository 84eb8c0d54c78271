// src/fingerprint.rs
//! Canonical-link fingerprinting for the article history.
//!
//! The same normalization runs at insertion and at lookup time; anything
//! asymmetric here silently breaks deduplication, so keep every rule in
//! `normalize_link` and nowhere else.

use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters stripped before hashing. A trailing `*` matches by
/// prefix. Overridable via `AppConfig.tracking_params`.
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_*", "fbclid", "gclid", "igshid", "mc_cid", "mc_eid", "ref", "ref_src", "cmpid", "ocid",
    "smid",
];

pub fn default_tracking_params() -> Vec<String> {
    DEFAULT_TRACKING_PARAMS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn is_tracking_param(name: &str, patterns: &[String]) -> bool {
    let name = name.to_ascii_lowercase();
    patterns.iter().any(|p| {
        if let Some(prefix) = p.strip_suffix('*') {
            name.starts_with(&prefix.to_ascii_lowercase())
        } else {
            name == p.to_ascii_lowercase()
        }
    })
}

/// Canonical form of an article link: lower-cased, fragment dropped,
/// tracking query parameters removed, trailing path slash stripped.
/// Unparsable links fall back to the trimmed lower-cased raw string so the
/// item still gets a stable identity.
pub fn normalize_link(link: &str, tracking_params: &[String]) -> String {
    let trimmed = link.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k, tracking_params))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let stripped = path.trim_end_matches('/').to_string();
        url.set_path(&stripped);
    }

    // Url::parse already lower-cases scheme and host; folding the whole
    // string also covers path and query casing.
    url.to_string().to_lowercase()
}

/// Stable identity hash of a link: SHA-256 hex over the canonical form.
pub fn fingerprint(link: &str, tracking_params: &[String]) -> String {
    hex_digest(normalize_link(link, tracking_params).as_bytes())
}

/// SHA-256 hex of arbitrary bytes. Also used for feed-body digests in the
/// conditional fetch cache.
pub fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
