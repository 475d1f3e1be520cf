use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an article was ingested from. Aggregator links carry an opaque
/// identifier that must be decoded before the article can be crawled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Aggregator,
    Rss,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Aggregator => write!(f, "aggregator"),
            SourceType::Rss => write!(f, "rss"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "aggregator" => Ok(Self::Aggregator),
            "rss" => Ok(Self::Rss),
            other => Err(format!("unknown SourceType: {other}")),
        }
    }
}

impl TryFrom<String> for SourceType {
    type Error = crate::MigaswatchError;
    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse().map_err(crate::MigaswatchError::Validation)
    }
}

/// Ternary sentiment label produced by article analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(format!("unknown Sentiment: {other}")),
        }
    }
}

/// A normalized news item as it leaves a feed parser, before persistence.
/// `matched_topic_ids` is filled by the keyword matcher (RSS path) or set to
/// the originating topic at emission time (aggregator search path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub link: String,
    pub title: String,
    pub snippet: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub photo_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_type: SourceType,
    pub matched_topic_ids: Vec<Uuid>,
}

/// Outcome of one ingestion run. Partial failure is normal: callers treat
/// `inserted + skipped > 0 || errors.is_empty()` as success.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.inserted + self.skipped > 0 || self.errors.is_empty()
    }

    pub fn absorb(&mut self, other: IngestReport) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}

/// Scheduler pipeline status, surfaced to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Idle,
    Fetching,
    Decoding,
    Analyzing,
    Success,
    Error,
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStatus::Idle => write!(f, "idle"),
            FetchStatus::Fetching => write!(f, "fetching"),
            FetchStatus::Decoding => write!(f, "decoding"),
            FetchStatus::Analyzing => write!(f, "analyzing"),
            FetchStatus::Success => write!(f, "success"),
            FetchStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trip() {
        assert_eq!("aggregator".parse::<SourceType>(), Ok(SourceType::Aggregator));
        assert_eq!(SourceType::Rss.to_string(), "rss");
        assert!("atom".parse::<SourceType>().is_err());
    }

    #[test]
    fn sentiment_round_trip() {
        for label in ["positive", "neutral", "negative"] {
            let parsed: Sentiment = label.parse().unwrap();
            assert_eq!(parsed.as_str(), label);
        }
        assert!("mixed".parse::<Sentiment>().is_err());
    }

    #[test]
    fn report_success_rules() {
        let ok = IngestReport { inserted: 3, skipped: 0, errors: vec!["one feed down".into()] };
        assert!(ok.is_success());

        let empty = IngestReport::default();
        assert!(empty.is_success());

        let failed = IngestReport { inserted: 0, skipped: 0, errors: vec!["boom".into()] };
        assert!(!failed.is_success());
    }
}
