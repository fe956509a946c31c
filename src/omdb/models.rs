use serde::Deserialize;

/// One movie as OMDb describes it. Values are kept exactly as sent.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbMovie {
    pub title: String,
    pub year: String,
    pub rated: String,
    pub released: String,
    pub genre: String,
    pub plot: String,
    /// URL or `"N/A"`.
    pub poster: String,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

/// A candidate from a title search; resolve it by id before importing.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResult {
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    pub title: String,
    pub year: String,
}

impl SearchResult {
    pub fn label(&self) -> String {
        format!("{} ({})", self.title, self.year)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    #[serde(rename = "Search", default)]
    pub results: Vec<SearchResult>,
}
