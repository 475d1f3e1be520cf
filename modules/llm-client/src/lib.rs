mod client;
pub mod schema;

pub use client::LlmClient;
pub use schema::StructuredOutput;
