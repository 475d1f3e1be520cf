use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{GnewsError, Result};
use crate::search::is_aggregator_url;

/// Path segments that are routing, not identifiers.
const RESERVED_SEGMENTS: &[&str] = &["rss", "articles", "read", ""];

/// Protobuf framing of the directly-decodable identifier family.
const DIRECT_PREFIX: &[u8] = &[0x08, 0x13, 0x22];
const DIRECT_SUFFIX: &[u8] = &[0xd2, 0x01, 0x00];

/// Identifiers whose decoded payload starts with this marker cannot be
/// resolved locally and require the signed-batch call.
const BATCH_REQUIRED_MARKER: &str = "AU_yqL";

static SIGNATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-n-a-sg="([^"]+)""#).expect("valid signature regex"));
static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-n-a-ts="([^"]+)""#).expect("valid timestamp regex"));

/// How a resolution was obtained. The decode stream engine sleeps only
/// after [`Resolution::Remote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Decoded locally from the identifier bytes, no network involved.
    Direct(String),
    /// Served from the process-wide cache.
    Cached(String),
    /// Required the page scrape + batchexecute round trips.
    Remote(String),
}

impl Resolution {
    pub fn url(&self) -> &str {
        match self {
            Resolution::Direct(u) | Resolution::Cached(u) | Resolution::Remote(u) => u,
        }
    }

    pub fn was_remote(&self) -> bool {
        matches!(self, Resolution::Remote(_))
    }
}

/// Extract the opaque identifier from an aggregator article URL: the last
/// path segment that is not a reserved routing segment.
pub fn extract_article_id(link: &str) -> Result<String> {
    if !is_aggregator_url(link) {
        return Err(GnewsError::InvalidUrlShape(format!(
            "not an aggregator URL: {link}"
        )));
    }
    let parsed =
        url::Url::parse(link).map_err(|e| GnewsError::InvalidUrlShape(e.to_string()))?;
    let id = parsed
        .path_segments()
        .and_then(|segments| {
            segments
                .filter(|s| !RESERVED_SEGMENTS.contains(s))
                .next_back()
        })
        .map(str::to_string)
        .filter(|s| !s.is_empty());

    id.ok_or_else(|| GnewsError::InvalidUrlShape(format!("no identifier segment in {link}")))
}

/// Attempt the direct base64 path. Returns `None` when the identifier is not
/// of the directly-decodable family (unknown framing, batch-required marker).
pub fn direct_decode(id: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(id)
        .or_else(|_| URL_SAFE.decode(id))
        .ok()?;

    let bytes = bytes.strip_prefix(DIRECT_PREFIX)?;
    let bytes = bytes.strip_suffix(DIRECT_SUFFIX).unwrap_or(bytes);

    let (len, consumed) = read_varint(bytes)?;
    let payload = bytes.get(consumed..consumed + len)?;
    let text = std::str::from_utf8(payload).ok()?;

    if text.starts_with(BATCH_REQUIRED_MARKER) {
        return None;
    }
    if !text.starts_with("http://") && !text.starts_with("https://") {
        return None;
    }
    Some(text.to_string())
}

fn read_varint(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut value = 0usize;
    let mut shift = 0u32;
    for (i, b) in bytes.iter().enumerate() {
        value |= ((b & 0x7f) as usize) << shift;
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
        if shift > 28 {
            return None;
        }
    }
    None
}

/// Pull the signature/timestamp attribute pair out of an article page.
pub fn extract_signature_params(html: &str) -> Option<(String, i64)> {
    let sig = SIGNATURE_RE.captures(html)?.get(1)?.as_str().to_string();
    let ts = TIMESTAMP_RE.captures(html)?.get(1)?.as_str().parse().ok()?;
    Some((sig, ts))
}

/// Parse the batchexecute response envelope: sections split on a blank line,
/// the second section is JSON, the payload at `[0][2]` is a JSON-stringified
/// array whose element `[1]` is the resolved URL. Any structural deviation
/// is an error, never a panic.
pub fn parse_batch_envelope(body: &str) -> Result<String> {
    let section = body
        .split("\n\n")
        .nth(1)
        .ok_or_else(|| GnewsError::DecodeResponseInvalid("missing payload section".into()))?;

    let outer: Value = serde_json::from_str(section)
        .map_err(|e| GnewsError::DecodeResponseInvalid(format!("payload not JSON: {e}")))?;

    let stringified = outer
        .get(0)
        .and_then(|v| v.get(2))
        .and_then(Value::as_str)
        .ok_or_else(|| GnewsError::DecodeResponseInvalid("no payload at [0][2]".into()))?;

    let inner: Value = serde_json::from_str(stringified)
        .map_err(|e| GnewsError::DecodeResponseInvalid(format!("inner payload not JSON: {e}")))?;

    inner
        .get(1)
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GnewsError::DecodeResponseInvalid("no URL at payload [1]".into()))
}

fn batch_request_body(id: &str, ts: i64, sig: &str) -> String {
    let article_req = serde_json::json!([
        "garturlreq",
        [
            ["X", "X", ["id", "ID"], null, null, 1, 1, "ID:id", null, null, null, null, null],
            "id",
            "ID",
            1,
            [2, 4, 8],
            1,
            0,
            "655000234",
            0,
            0,
            null,
            0
        ],
        id,
        ts,
        sig
    ]);
    serde_json::json!([[["Fbv4je", article_req.to_string(), null, "generic"]]]).to_string()
}

/// Resolves aggregator identifiers to publisher URLs. Successful resolutions
/// are cached process-wide by identifier.
pub struct GnewsDecoder {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl GnewsDecoder {
    pub fn new() -> Self {
        Self::with_base_url("https://news.google.com")
    }

    /// Point the decoder at a different base URL (tests, proxies).
    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build gnews HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Pre-seed the process-wide cache, e.g. from a durable cache table.
    pub async fn seed_cache(&self, entries: impl IntoIterator<Item = (String, String)>) {
        let mut cache = self.cache.write().await;
        cache.extend(entries);
    }

    /// Resolve one identifier: cache, then the direct base64 path, then the
    /// signed-batch fallback. Remote resolutions are reported as such so the
    /// caller can pace its requests.
    pub async fn decode_id(&self, id: &str) -> Result<Resolution> {
        {
            let cache = self.cache.read().await;
            if let Some(hit) = cache.get(id) {
                return Ok(Resolution::Cached(hit.clone()));
            }
        }

        if let Some(url) = direct_decode(id) {
            debug!(id, "decoded aggregator id locally");
            self.remember(id, &url).await;
            return Ok(Resolution::Direct(url));
        }

        let url = self.decode_via_batch(id).await?;
        self.remember(id, &url).await;
        Ok(Resolution::Remote(url))
    }

    async fn remember(&self, id: &str, url: &str) {
        let mut cache = self.cache.write().await;
        cache.insert(id.to_string(), url.to_string());
    }

    async fn decode_via_batch(&self, id: &str) -> Result<String> {
        let article_page = format!("{}/rss/articles/{id}", self.base_url);
        let html = self
            .client
            .get(&article_page)
            .send()
            .await
            .map_err(|e| GnewsError::FetchDecodingParams(e.to_string()))?
            .text()
            .await
            .map_err(|e| GnewsError::FetchDecodingParams(e.to_string()))?;

        let (sig, ts) = extract_signature_params(&html).ok_or_else(|| {
            warn!(id, "signature attributes missing from article page");
            GnewsError::FetchDecodingParams("signature/timestamp attributes not found".into())
        })?;

        let endpoint = format!("{}/_/DotsSplashUi/data/batchexecute", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .form(&[("f.req", batch_request_body(id, ts, &sig))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GnewsError::DecodeResponseInvalid(format!(
                "batchexecute returned HTTP {status}"
            )));
        }

        parse_batch_envelope(&response.text().await?)
    }
}

impl Default for GnewsDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_direct(url: &str, with_suffix: bool) -> String {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(DIRECT_PREFIX);
        let mut len = url.len();
        while len >= 0x80 {
            bytes.push((len as u8 & 0x7f) | 0x80);
            len >>= 7;
        }
        bytes.push(len as u8);
        bytes.extend_from_slice(url.as_bytes());
        if with_suffix {
            bytes.extend_from_slice(DIRECT_SUFFIX);
        }
        URL_SAFE_NO_PAD.encode(bytes)
    }

    #[test]
    fn extracts_id_from_both_path_shapes() {
        let id = extract_article_id("https://news.google.com/rss/articles/CBMiAbc123").unwrap();
        assert_eq!(id, "CBMiAbc123");

        let id = extract_article_id("https://news.google.com/articles/CBMiAbc123?hl=id").unwrap();
        assert_eq!(id, "CBMiAbc123");
    }

    #[test]
    fn rejects_non_aggregator_and_empty_paths() {
        assert!(matches!(
            extract_article_id("https://example.com/articles/xyz"),
            Err(GnewsError::InvalidUrlShape(_))
        ));
        assert!(matches!(
            extract_article_id("https://news.google.com/rss/articles/"),
            Err(GnewsError::InvalidUrlShape(_))
        ));
    }

    #[test]
    fn direct_decode_round_trip() {
        let id = encode_direct("https://www.cnbcindonesia.com/news/migas-article", true);
        assert_eq!(
            direct_decode(&id).as_deref(),
            Some("https://www.cnbcindonesia.com/news/migas-article")
        );

        let id = encode_direct("https://katadata.co.id/energi/berita", false);
        assert_eq!(
            direct_decode(&id).as_deref(),
            Some("https://katadata.co.id/energi/berita")
        );
    }

    #[test]
    fn direct_decode_handles_multibyte_length() {
        let long_path = "a".repeat(150);
        let url = format!("https://media.example/berita/{long_path}");
        let id = encode_direct(&url, true);
        assert_eq!(direct_decode(&id).as_deref(), Some(url.as_str()));
    }

    #[test]
    fn direct_decode_defers_batch_required_ids() {
        let id = encode_direct("AU_yqLNopqrstuv", true);
        assert_eq!(direct_decode(&id), None);
    }

    #[test]
    fn direct_decode_rejects_unknown_framing() {
        assert_eq!(direct_decode("not-base64!!!"), None);
        let plain = URL_SAFE_NO_PAD.encode(b"random bytes with no framing");
        assert_eq!(direct_decode(&plain), None);
    }

    #[test]
    fn scrapes_signature_pair() {
        let html = r#"<c-wiz data-n-a-id="X" data-n-a-sg="AQi4dd" data-n-a-ts="1722500000">"#;
        let (sig, ts) = extract_signature_params(html).unwrap();
        assert_eq!(sig, "AQi4dd");
        assert_eq!(ts, 1722500000);

        assert!(extract_signature_params("<div>no attrs</div>").is_none());
    }

    #[test]
    fn parses_batch_envelope() {
        let inner = serde_json::json!(["garturlres", "https://pub.example/artikel", "x"]);
        let outer = serde_json::json!([[null, null, inner.to_string()]]);
        let body = format!(")]}}'\n\n{outer}");
        assert_eq!(parse_batch_envelope(&body).unwrap(), "https://pub.example/artikel");
    }

    #[test]
    fn envelope_deviations_are_errors_not_panics() {
        assert!(matches!(
            parse_batch_envelope("just one section"),
            Err(GnewsError::DecodeResponseInvalid(_))
        ));
        assert!(matches!(
            parse_batch_envelope("x\n\nnot json"),
            Err(GnewsError::DecodeResponseInvalid(_))
        ));
        assert!(matches!(
            parse_batch_envelope("x\n\n[[null,null,\"[]\"]]"),
            Err(GnewsError::DecodeResponseInvalid(_))
        ));
    }
}
