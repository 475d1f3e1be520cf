use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use migaswatch_common::retry::{with_backoff, RetryPolicy};
use migaswatch_common::safety;
use regex::Regex;
use tracing::debug;

/// Snippets are capped at this many characters before persistence.
pub const SNIPPET_MAX_CHARS: usize = 500;

const FEED_TIMEOUT: Duration = Duration::from_secs(15);

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// One feed entry, normalized. Emitted only when both title and link are
/// present.
#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub snippet: Option<String>,
    pub photo_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetches and parses RSS 2.0 / Atom feeds.
#[derive(Clone)]
pub struct FeedReader {
    client: reqwest::Client,
}

impl FeedReader {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .user_agent("migaswatch/0.1")
            .build()
            .expect("Failed to build feed HTTP client");
        Self { client }
    }

    /// Fetch a feed URL and return its normalized items. The URL is
    /// re-validated here so a poisoned stored URL can never be fetched.
    pub async fn fetch(&self, url: &str) -> Result<Vec<ParsedItem>> {
        let href = safety::validate_url(url).map_err(|e| anyhow::anyhow!("{e}"))?;

        let bytes = with_backoff(RetryPolicy::default(), "feed.fetch", || async {
            let resp = self.client.get(&href).send().await?;
            let resp = resp.error_for_status()?;
            resp.bytes().await
        })
        .await
        .with_context(|| format!("feed fetch failed: {url}"))?;

        let items = parse_feed(&bytes)?;
        debug!(url, items = items.len(), "feed parsed");
        Ok(items)
    }
}

impl Default for FeedReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse feed bytes into normalized items.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<ParsedItem>> {
    let feed = feed_rs::parser::parse(bytes).context("feed parse failed")?;
    Ok(feed.entries.into_iter().filter_map(parse_entry).collect())
}

fn parse_entry(entry: feed_rs::model::Entry) -> Option<ParsedItem> {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())?;
    let link = entry.links.first().map(|l| l.href.clone())?;

    // Snippet preference: plain summary, then full content, both stripped.
    let snippet = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .map(|raw| clamp_chars(&strip_html(&raw), SNIPPET_MAX_CHARS))
        .filter(|s| !s.is_empty());

    // Photo preference: media content (covers RSS enclosures), then thumbnail.
    let photo_url = entry
        .media
        .iter()
        .find_map(|m| m.content.iter().find_map(|c| c.url.as_ref().map(|u| u.to_string())))
        .or_else(|| {
            entry
                .media
                .iter()
                .find_map(|m| m.thumbnails.first().map(|t| t.image.uri.clone()))
        });

    let published_at = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc));

    Some(ParsedItem {
        title,
        link,
        snippet,
        photo_url,
        published_at,
    })
}

/// Strip markup down to plain text: drop tags, decode the common entities,
/// collapse whitespace.
pub fn strip_html(raw: &str) -> String {
    let no_tags = TAG_RE.replace_all(raw, " ");
    let decoded = no_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

fn clamp_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Aggregator result titles are formatted "Title - Publisher". Split on the
/// last separator; titles without one carry no publisher.
pub fn split_publisher(title: &str) -> (String, Option<String>) {
    match title.rfind(" - ") {
        Some(idx) => {
            let (head, tail) = title.split_at(idx);
            (head.trim().to_string(), Some(tail[3..].trim().to_string()))
        }
        None => (title.trim().to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Berita Energi</title>
    <item>
      <title>SKK Migas catat lifting minyak naik</title>
      <link>https://energi.example/artikel/lifting-naik</link>
      <description>&lt;p&gt;Lifting minyak &amp;amp; gas pada kuartal kedua naik.&lt;/p&gt;</description>
      <pubDate>Tue, 28 Jul 2026 08:30:00 +0700</pubDate>
      <media:thumbnail url="https://energi.example/img/lifting.jpg"/>
    </item>
    <item>
      <title>Tanpa tautan</title>
    </item>
    <item>
      <link>https://energi.example/artikel/tanpa-judul</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_and_drops_incomplete_items() {
        let items = parse_feed(RSS_FIXTURE.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.title, "SKK Migas catat lifting minyak naik");
        assert_eq!(item.link, "https://energi.example/artikel/lifting-naik");
        assert_eq!(item.snippet.as_deref(), Some("Lifting minyak & gas pada kuartal kedua naik."));
        assert_eq!(item.photo_url.as_deref(), Some("https://energi.example/img/lifting.jpg"));
        assert!(item.published_at.is_some());
    }

    const ATOM_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Kabar Hulu</title>
  <id>urn:feed:kabar-hulu</id>
  <updated>2026-07-30T02:00:00Z</updated>
  <entry>
    <title>Eksplorasi laut dalam dimulai</title>
    <id>urn:entry:eksplorasi-1</id>
    <link href="https://hulu.example/eksplorasi-laut-dalam"/>
    <summary>Kegiatan pengeboran perdana di Cekungan Andaman.</summary>
    <updated>2026-07-30T01:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn parses_atom_entries() {
        let items = parse_feed(ATOM_FIXTURE.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Eksplorasi laut dalam dimulai");
        assert_eq!(items[0].link, "https://hulu.example/eksplorasi-laut-dalam");
        assert_eq!(
            items[0].snippet.as_deref(),
            Some("Kegiatan pengeboran perdana di Cekungan Andaman.")
        );
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn snippet_is_capped() {
        let long = format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><item>
               <title>t</title><link>https://x.example/a</link>
               <description>{}</description></item></channel></rss>"#,
            "kata ".repeat(400)
        );
        let items = parse_feed(long.as_bytes()).unwrap();
        let snippet = items[0].snippet.as_ref().unwrap();
        assert!(snippet.chars().count() <= SNIPPET_MAX_CHARS);
    }

    #[test]
    fn strips_markup_and_entities() {
        let raw = "<p>Harga <b>minyak</b> &amp; gas</p>\n  <div>stabil</div>";
        assert_eq!(strip_html(raw), "Harga minyak & gas stabil");
    }

    #[test]
    fn splits_publisher_on_last_separator() {
        let (title, publisher) = split_publisher("Blok Rokan - produksi naik - CNBC Indonesia");
        assert_eq!(title, "Blok Rokan - produksi naik");
        assert_eq!(publisher.as_deref(), Some("CNBC Indonesia"));

        let (title, publisher) = split_publisher("Judul tanpa penerbit");
        assert_eq!(title, "Judul tanpa penerbit");
        assert_eq!(publisher, None);
    }
}
