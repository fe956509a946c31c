use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use tracing::debug;

use super::{LookupError, MovieSource, OmdbMovie, SearchResult};

/// Remembers every successful id lookup for as long as the process runs.
///
/// There is no eviction and no expiry. Failed lookups are not remembered, and
/// title searches always go to the wrapped source. Two concurrent misses on the
/// same id both reach the remote; the lock is never held across a request.
pub struct CachedSource<S> {
    inner: S,
    movies: Mutex<HashMap<String, OmdbMovie>>,
}

impl<S: MovieSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, movies: Mutex::new(HashMap::new()) }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn cached(&self, imdb_id: &str) -> Option<OmdbMovie> {
        self.movies.lock().unwrap_or_else(|e| e.into_inner()).get(imdb_id).cloned()
    }
}

#[async_trait]
impl<S: MovieSource> MovieSource for CachedSource<S> {
    async fn get_by_imdb_id(&self, imdb_id: &str) -> Result<OmdbMovie, LookupError> {
        if let Some(movie) = self.cached(imdb_id) {
            debug!(imdb_id = %imdb_id, "OMDb cache hit");
            return Ok(movie);
        }

        debug!(imdb_id = %imdb_id, "OMDb cache miss");
        let movie = self.inner.get_by_imdb_id(imdb_id).await?;
        self.movies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(imdb_id.to_string(), movie.clone());
        Ok(movie)
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<SearchResult>, LookupError> {
        self.inner.search_by_title(title).await
    }
}
