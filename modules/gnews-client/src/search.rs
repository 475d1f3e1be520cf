use url::form_urlencoded;

/// Google News host. Result links on this host carry opaque identifiers
/// that must be decoded before the publisher page can be crawled.
pub const GNEWS_HOST: &str = "news.google.com";

const GNEWS_BASE: &str = "https://news.google.com";

/// Region scope for Indonesian-language results.
const HL: &str = "id";
const GL: &str = "ID";
const CEID: &str = "ID:id";

/// Build a region-scoped search RSS URL for one keyword phrase.
pub fn search_url(query: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
    format!("{GNEWS_BASE}/rss/search?q={encoded}&hl={HL}&gl={GL}&ceid={CEID}")
}

/// Whether a link points at the aggregator (and therefore needs decoding).
pub fn is_aggregator_url(link: &str) -> bool {
    url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(GNEWS_HOST)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_is_region_scoped() {
        let url = search_url("SKK Migas");
        assert!(url.starts_with("https://news.google.com/rss/search?q=SKK+Migas"));
        assert!(url.contains("hl=id"));
        assert!(url.contains("gl=ID"));
        assert!(url.contains("ceid=ID:id"));
    }

    #[test]
    fn aggregator_detection() {
        assert!(is_aggregator_url("https://news.google.com/rss/articles/CBMiXyz"));
        assert!(!is_aggregator_url("https://www.cnbcindonesia.com/news/some-article"));
        assert!(!is_aggregator_url("not a url"));
    }
}
