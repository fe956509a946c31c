//! OMDb lookups: the source trait, the HTTP client and the caching decorator.

mod cached;
mod client;
mod models;

use async_trait::async_trait;

pub use cached::CachedSource;
pub use client::OmdbClient;
pub use models::{OmdbMovie, SearchResult};

/// Why a lookup produced no record.
///
/// Only [`LookupError::NotFound`] means the remote answered "no such movie";
/// the other variants mean the question could not be asked or understood.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// `message` is the remote's own explanation, when it gave one.
    #[error("no movie found for \"{query}\"")]
    NotFound { query: String, message: Option<String> },

    #[error("request for \"{query}\" failed: {source}")]
    Transport {
        query: String,
        #[source]
        source: wreq::Error,
    },

    #[error("unexpected response for \"{query}\": {reason}")]
    Malformed { query: String, reason: String },
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A remote movie-information service.
///
/// `search_by_title` answers "nothing matched" with an empty list, never with
/// [`LookupError::NotFound`].
#[async_trait]
pub trait MovieSource: Send + Sync {
    async fn get_by_imdb_id(&self, imdb_id: &str) -> Result<OmdbMovie, LookupError>;

    async fn search_by_title(&self, title: &str) -> Result<Vec<SearchResult>, LookupError>;
}
