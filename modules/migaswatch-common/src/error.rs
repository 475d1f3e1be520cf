use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigaswatchError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fetch already in progress for this user")]
    FetchInProgress,

    #[error("Analysis already in progress for this user")]
    AnalysisInProgress,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
