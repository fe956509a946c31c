use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde_json::Value;
use tracing::debug;

use super::{
    LookupError, MovieSource,
    models::{OmdbMovie, SearchResponse, SearchResult},
};

pub struct OmdbClient {
    client: wreq::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl OmdbClient {
    pub fn new(client: wreq::Client, api_key: String, base_url: String, rps: u32) -> Self {
        if api_key.trim().is_empty() {
            tracing::warn!("no OMDB_API_KEY provided, OMDb requests will be rejected");
        }

        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { client, api_key, base_url, limiter }
    }

    async fn fetch(&self, query: &str, params: &[(&str, &str)]) -> Result<String, LookupError> {
        self.limiter.until_ready().await;

        let transport = |source| LookupError::Transport { query: query.to_string(), source };

        self.client
            .get(self.base_url.as_str())
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?
            .text()
            .await
            .map_err(transport)
    }
}

#[async_trait]
impl MovieSource for OmdbClient {
    async fn get_by_imdb_id(&self, imdb_id: &str) -> Result<OmdbMovie, LookupError> {
        debug!(imdb_id = %imdb_id, "fetching OMDb movie");
        let body = self.fetch(imdb_id, &[("i", imdb_id), ("plot", "full")]).await?;
        let movie = parse_movie(imdb_id, &body)?;
        debug!(imdb_id = %imdb_id, kind = %movie.kind, title = %movie.title, "OMDb movie received");
        Ok(movie)
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<SearchResult>, LookupError> {
        debug!(title = %title, "searching OMDb");
        let body = self.fetch(title, &[("s", title), ("type", "movie")]).await?;
        let results = parse_search(title, &body)?;
        debug!(title = %title, candidates = results.len(), "OMDb search done");
        Ok(results)
    }
}

/// OMDb answers misses with HTTP 200 and `"Response": "False"`.
fn rejection(body: &Value) -> Option<Option<String>> {
    (body.get("Response").and_then(Value::as_str) == Some("False"))
        .then(|| body.get("Error").and_then(Value::as_str).map(str::to_string))
}

fn parse_movie(imdb_id: &str, body: &str) -> Result<OmdbMovie, LookupError> {
    let malformed = |reason: String| LookupError::Malformed { query: imdb_id.to_string(), reason };

    let value: Value = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    if let Some(message) = rejection(&value) {
        return Err(LookupError::NotFound { query: imdb_id.to_string(), message });
    }

    let movie: OmdbMovie = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    if movie.title.trim().is_empty() {
        return Err(malformed("empty title".to_string()));
    }
    Ok(movie)
}

fn parse_search(title: &str, body: &str) -> Result<Vec<SearchResult>, LookupError> {
    let malformed = |reason: String| LookupError::Malformed { query: title.to_string(), reason };

    let value: Value = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    if let Some(message) = rejection(&value) {
        debug!(title = %title, reason = ?message, "OMDb search returned nothing");
        return Ok(Vec::new());
    }

    let resp: SearchResponse = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    Ok(resp.results)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        Router,
        extract::{Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
    };

    use super::*;

    const MATRIX: &str = r#"{
        "Title": "The Matrix", "Year": "1999", "Rated": "R", "Released": "31 Mar 1999",
        "Runtime": "136 min", "Genre": "Action, Sci-Fi", "Director": "Lana Wachowski, Lilly Wachowski",
        "Plot": "When a beautiful stranger leads computer hacker Neo to a forbidding underworld...",
        "Poster": "https://m.media-amazon.com/images/M/matrix.jpg", "imdbID": "tt0133093",
        "Type": "movie", "Response": "True"
    }"#;

    #[test]
    fn parses_a_movie() {
        let movie = parse_movie("tt0133093", MATRIX).unwrap();
        assert_eq!(movie.title, "The Matrix");
        assert_eq!(movie.year, "1999");
        assert_eq!(movie.released, "31 Mar 1999");
        assert_eq!(movie.imdb_id, "tt0133093");
        assert_eq!(movie.kind, "movie");
    }

    #[test]
    fn response_false_is_not_found() {
        let err = parse_movie(
            "the matrix",
            r#"{"Response":"False","Error":"Incorrect IMDb ID."}"#,
        )
        .unwrap_err();
        match err {
            LookupError::NotFound { query, message } => {
                assert_eq!(query, "the matrix");
                assert_eq!(message.as_deref(), Some("Incorrect IMDb ID."));
            },
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_shapes_are_malformed() {
        assert!(matches!(parse_movie("tt1", "<html>"), Err(LookupError::Malformed { .. })));
        assert!(matches!(
            parse_movie("tt1", r#"{"Title":"Only a title"}"#),
            Err(LookupError::Malformed { .. })
        ));
    }

    #[test]
    fn search_without_matches_is_empty() {
        let results =
            parse_search("nonexistent movie xyz", r#"{"Response":"False","Error":"Movie not found!"}"#)
                .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_keeps_remote_order() {
        let body = r#"{"Search":[
            {"Title":"The Matrix","Year":"1999","imdbID":"tt0133093","Type":"movie","Poster":"N/A"},
            {"Title":"The Matrix Reloaded","Year":"2003","imdbID":"tt0234215","Type":"movie","Poster":"N/A"}
        ],"totalResults":"2","Response":"True"}"#;
        let results = parse_search("matrix", body).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.imdb_id.as_str()).collect();
        assert_eq!(ids, ["tt0133093", "tt0234215"]);
        assert_eq!(results[1].label(), "The Matrix Reloaded (2003)");
    }

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// Answers like OMDb for a handful of ids and titles.
    async fn fake_omdb(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        seen.lock().unwrap().push(params.clone());

        if params.get("apikey").map(String::as_str) != Some("secret") {
            return (StatusCode::UNAUTHORIZED, r#"{"Response":"False","Error":"Invalid API key!"}"#)
                .into_response();
        }

        match (params.get("i").map(String::as_str), params.get("s").map(String::as_str)) {
            (Some("tt0133093"), _) => MATRIX.into_response(),
            (Some("tt0000500"), _) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream down").into_response(),
            (Some(_), _) => r#"{"Response":"False","Error":"Incorrect IMDb ID."}"#.into_response(),
            (None, Some("the matrix")) => r#"{"Search":[
                {"Title":"The Matrix","Year":"1999","imdbID":"tt0133093","Type":"movie","Poster":"N/A"}
            ],"totalResults":"1","Response":"True"}"#
                .into_response(),
            (None, Some(_)) => r#"{"Response":"False","Error":"Movie not found!"}"#.into_response(),
            (None, None) => StatusCode::BAD_REQUEST.into_response(),
        }
    }

    async fn local_client(api_key: &str) -> (OmdbClient, Seen) {
        let seen = Seen::default();
        let app = Router::new().route("/", get(fake_omdb)).with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = OmdbClient::new(wreq::Client::new(), api_key.to_string(), format!("http://{addr}/"), 100);
        (client, seen)
    }

    #[tokio::test]
    async fn lookup_sends_id_key_and_full_plot() {
        let (client, seen) = local_client("secret").await;

        let movie = client.get_by_imdb_id("tt0133093").await.unwrap();
        assert_eq!(movie.title, "The Matrix");

        let sent = seen.lock().unwrap()[0].clone();
        assert_eq!(sent["apikey"], "secret");
        assert_eq!(sent["i"], "tt0133093");
        assert_eq!(sent["plot"], "full");
        assert!(!sent.contains_key("s"));
    }

    #[tokio::test]
    async fn search_sends_title_and_movie_type() {
        let (client, seen) = local_client("secret").await;

        let results = client.search_by_title("the matrix").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].imdb_id, "tt0133093");

        let sent = seen.lock().unwrap()[0].clone();
        assert_eq!(sent["apikey"], "secret");
        assert_eq!(sent["s"], "the matrix");
        assert_eq!(sent["type"], "movie");
        assert!(!sent.contains_key("i"));
    }

    #[tokio::test]
    async fn remote_misses_are_not_found_or_empty() {
        let (client, _) = local_client("secret").await;

        let err = client.get_by_imdb_id("tt9999999").await.unwrap_err();
        assert!(err.is_not_found());

        let results = client.search_by_title("nonexistent movie xyz").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn error_statuses_are_transport_failures() {
        let (client, _) = local_client("secret").await;
        let err = client.get_by_imdb_id("tt0000500").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport { .. }), "got {err:?}");

        // A rejected key is an HTTP error too, never a "no such movie".
        let (client, _) = local_client("wrong").await;
        let err = client.get_by_imdb_id("tt0133093").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport { .. }), "got {err:?}");
        let err = client.search_by_title("the matrix").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OmdbClient::new(wreq::Client::new(), "secret".into(), format!("http://{addr}/"), 100);
        let err = client.get_by_imdb_id("tt0133093").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport { .. }), "got {err:?}");
    }
}
