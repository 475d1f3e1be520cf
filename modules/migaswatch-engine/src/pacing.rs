use std::time::Duration;

/// The four politeness knobs the system honors. Tests zero them out.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Gap between consecutive aggregator keyword searches.
    pub search_delay: Duration,
    /// Gap after a decode that required a remote call.
    pub decode_delay: Duration,
    /// Gap between articles in the analyzer stream.
    pub analyze_delay: Duration,
    /// Concurrent RSS feed fetches.
    pub rss_concurrency: usize,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            search_delay: Duration::from_millis(500),
            decode_delay: Duration::from_secs(3),
            analyze_delay: Duration::from_millis(500),
            rss_concurrency: 5,
        }
    }
}

impl Pacing {
    /// No delays, sequential fetches. For tests.
    pub fn immediate() -> Self {
        Self {
            search_delay: Duration::ZERO,
            decode_delay: Duration::ZERO,
            analyze_delay: Duration::ZERO,
            rss_concurrency: 1,
        }
    }
}
