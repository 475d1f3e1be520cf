pub type Result<T> = std::result::Result<T, GnewsError>;

#[derive(Debug, thiserror::Error)]
pub enum GnewsError {
    #[error("gnews request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid aggregator URL shape: {0}")]
    InvalidUrlShape(String),

    #[error("failed to fetch decoding parameters: {0}")]
    FetchDecodingParams(String),

    #[error("decode response invalid: {0}")]
    DecodeResponseInvalid(String),
}
