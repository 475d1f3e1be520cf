pub mod decode;
pub mod error;
pub mod search;

pub use decode::{extract_article_id, GnewsDecoder, Resolution};
pub use error::{GnewsError, Result};
pub use search::{is_aggregator_url, search_url, GNEWS_HOST};
