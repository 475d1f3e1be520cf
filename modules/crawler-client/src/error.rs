pub type Result<T> = std::result::Result<T, CrawlerError>;

#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("crawler request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("crawler API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("content too short or empty ({len} chars)")]
    TooShort { len: usize },
}

impl CrawlerError {
    /// Transport failures and server-side errors are worth retrying;
    /// extraction failures and short content are not.
    pub fn is_transient(&self) -> bool {
        match self {
            CrawlerError::Http(_) => true,
            CrawlerError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
