// src/ingest/parser.rs
//! Feed document parsing: RSS 2.0 and Atom, via quick-xml serde structs.
//! RSS is tried first, Atom as fallback; a body that is neither is a
//! per-source parse error, absorbed by the fetch stage.

use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::error::SourceError;
use crate::ingest::types::Article;

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// RFC 2822 dates in the wild still carry the obsolete zone names; the
/// parser wants a numeric offset.
fn scrub_obsolete_zone(ts: &str) -> String {
    const ZONES: &[(&str, &str)] = &[
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
    ];
    let trimmed = ts.trim();
    for (name, offset) in ZONES {
        if let Some(head) = trimmed.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    trimmed.to_string()
}

fn parse_rfc2822_utc(ts: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    OffsetDateTime::parse(&scrub_obsolete_zone(ts), &Rfc2822)
        .ok()
        .and_then(|dt| chrono::DateTime::from_timestamp(dt.unix_timestamp(), 0))
}

fn parse_rfc3339_utc(ts: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(|dt| chrono::DateTime::from_timestamp(dt.unix_timestamp(), 0))
}

/// Name of the document's root element, or None for non-XML input.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Start(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(quick_xml::events::Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Parse a fetched feed body into normalized articles. The root element
/// decides the dialect; guessing by trial parse would let a broken RSS body
/// pass as an empty Atom feed.
pub fn parse_feed(source_id: &str, body: &str) -> Result<Vec<Article>, SourceError> {
    let xml = scrub_html_entities_for_xml(body);

    match root_element(&xml).as_deref() {
        Some("rss") => from_str::<Rss>(&xml)
            .map(|rss| rss_articles(source_id, rss))
            .map_err(|e| SourceError::Parse(format!("rss: {e}"))),
        Some("feed") => from_str::<AtomFeed>(&xml)
            .map(|feed| atom_articles(source_id, feed))
            .map_err(|e| SourceError::Parse(format!("atom: {e}"))),
        Some(other) => Err(SourceError::Parse(format!(
            "unrecognized feed root element <{other}>"
        ))),
        None => Err(SourceError::Parse("document has no root element".into())),
    }
}

fn rss_articles(source_id: &str, rss: Rss) -> Vec<Article> {
    let mut out = Vec::with_capacity(rss.channel.item.len());
    for item in rss.channel.item {
        let title = normalize_text(item.title.as_deref().unwrap_or_default());
        if title.is_empty() && item.link.is_none() {
            continue;
        }
        out.push(Article {
            title,
            link: clean_link(item.link),
            published_at: item.pub_date.as_deref().and_then(parse_rfc2822_utc),
            summary: item
                .description
                .as_deref()
                .map(normalize_text)
                .filter(|s| !s.is_empty()),
            source_id: source_id.to_string(),
        });
    }
    out
}

fn atom_articles(source_id: &str, feed: AtomFeed) -> Vec<Article> {
    let mut out = Vec::with_capacity(feed.entry.len());
    for entry in feed.entry {
        let title = normalize_text(entry.title.as_deref().unwrap_or_default());
        // Prefer the alternate link; fall back to the first one present.
        let link = entry
            .link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| entry.link.first())
            .and_then(|l| l.href.clone());
        if title.is_empty() && link.is_none() {
            continue;
        }
        let ts = entry
            .published
            .as_deref()
            .or(entry.updated.as_deref())
            .and_then(parse_rfc3339_utc);
        out.push(Article {
            title,
            link: clean_link(link),
            published_at: ts,
            summary: entry
                .summary
                .as_deref()
                .map(normalize_text)
                .filter(|s| !s.is_empty()),
            source_id: source_id.to_string(),
        });
    }
    out
}

fn clean_link(link: Option<String>) -> Option<String> {
    link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())
}

/// Normalize feed text: entity decode, strip markup, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 4) Length cap: 2000 chars
    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }

    out
}

/// Feeds routinely embed HTML entities that are not valid XML; replace the
/// common ones before handing the document to the XML parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tags_and_collapses_ws() {
        let s = "  <b>Hello&nbsp;&nbsp;world</b>  ";
        assert_eq!(normalize_text(s), "Hello world");
    }

    #[test]
    fn rss_items_parse() {
        let xml = r#"<rss version="2.0"><channel><title>T</title>
            <item><title>One</title><link>https://example.com/1</link>
                <pubDate>Tue, 01 Jul 2025 10:00:00 GMT</pubDate>
                <description>First story</description></item>
            <item><title>Two</title><link>https://example.com/2</link></item>
        </channel></rss>"#;
        let items = parse_feed("demo", xml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "One");
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/1"));
        assert!(items[0].published_at.is_some());
        assert!(items[1].published_at.is_none());
    }

    #[test]
    fn atom_entries_parse() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <entry><title>A</title>
                <link rel="alternate" href="https://example.com/a"/>
                <published>2025-07-01T10:00:00Z</published>
                <summary>Entry a</summary></entry>
        </feed>"#;
        let items = parse_feed("demo", xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/a"));
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_feed("demo", "this is not xml at all").is_err());
    }

    #[test]
    fn obsolete_zone_names_parse() {
        assert!(parse_rfc2822_utc("Tue, 01 Jul 2025 10:00:00 GMT").is_some());
        assert!(parse_rfc2822_utc("Tue, 01 Jul 2025 10:00:00 EST").is_some());
        assert!(parse_rfc2822_utc("Tue, 01 Jul 2025 10:00:00 +0200").is_some());
        assert!(parse_rfc2822_utc("not a date").is_none());
    }
}
