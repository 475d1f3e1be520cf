pub mod config;
pub mod error;
pub mod retry;
pub mod safety;
pub mod types;

pub use config::Config;
pub use error::MigaswatchError;
pub use types::*;
