//! Keyword extraction for document metadata.

mod stopwords;
mod yake;

pub use yake::{YakeConfig, YakeExtractor};

/// Produces representative keywords for a span of text, best first.
pub trait KeywordExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}
