use std::{collections::BTreeMap, sync::LazyLock};

use jiff::civil;
use regex::Regex;
use sea_orm::{DeriveActiveEnum, EnumIter, Iterable, entity::prelude::StringLen};
use serde::Deserialize;

use crate::{
    entities::{genre, movie},
    omdb::OmdbMovie,
};

/// Route slugs look like `1999-the-matrix`.
pub const SLUG_PATTERN: &str = r"^\d{4}-[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*$";

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(SLUG_PATTERN).expect("valid regex"));
static POSTER_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+\.(?i:jpe?g|png|gif|webp)$").expect("valid regex"));

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(6))")]
pub enum Rating {
    #[default]
    #[sea_orm(string_value = "G")]
    GeneralAudiences,
    #[sea_orm(string_value = "PG")]
    ParentalGuidance,
    #[sea_orm(string_value = "PG-13")]
    ParentsStronglyCautioned,
    #[sea_orm(string_value = "R")]
    Restricted,
    #[sea_orm(string_value = "NC-17")]
    AdultsOnly,
}

impl Rating {
    pub fn as_code(self) -> &'static str {
        match self {
            Rating::GeneralAudiences => "G",
            Rating::ParentalGuidance => "PG",
            Rating::ParentsStronglyCautioned => "PG-13",
            Rating::Restricted => "R",
            Rating::AdultsOnly => "NC-17",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Rating::iter().find(|r| r.as_code() == code.trim())
    }

    /// Minimum viewer age; `None` means the rating is open to everyone.
    pub fn min_age(self) -> Option<i16> {
        match self {
            Rating::GeneralAudiences | Rating::ParentalGuidance => None,
            Rating::ParentsStronglyCautioned => Some(13),
            Rating::Restricted => Some(17),
            Rating::AdultsOnly => Some(18),
        }
    }
}

/// A movie as shown on the catalog pages, whatever its origin.
#[derive(Clone, Debug)]
pub struct MovieView {
    pub slug: String,
    pub title: String,
    pub rated: Rating,
    pub plot: String,
    pub poster: String,
    pub released_at: civil::Date,
    pub genres: Vec<String>,
    pub imdb_id: Option<String>,
}

impl MovieView {
    pub fn from_entity(movie: movie::Model, genres: Vec<genre::Model>) -> Self {
        let released_at = movie.released_at.parse().unwrap_or(civil::date(1900, 1, 1));
        let mut genres: Vec<String> = genres.into_iter().map(|g| g.name).collect();
        genres.sort();
        Self {
            slug: movie.slug,
            title: movie.title,
            rated: movie.rated,
            plot: movie.plot,
            poster: movie.poster,
            released_at,
            genres,
            imdb_id: movie.imdb_id,
        }
    }

    /// Live OMDb records have no local slug.
    pub fn from_omdb(movie: &OmdbMovie) -> Option<Self> {
        let released_at = parse_released(&movie.released, &movie.year)?;
        Some(Self {
            slug: String::new(),
            title: movie.title.clone(),
            rated: Rating::from_code(&movie.rated).unwrap_or_default(),
            plot: movie.plot.clone(),
            poster: movie.poster.clone(),
            released_at,
            genres: split_genres(&movie.genre),
            imdb_id: Some(movie.imdb_id.clone()),
        })
    }

    pub fn year(&self) -> i16 {
        self.released_at.year()
    }

    pub fn is_remote_poster(&self) -> bool {
        self.poster.starts_with("http")
    }
}

/// OMDb releases look like `31 Mar 1999`. Falls back to January 1st of the
/// first four-digit year in `year` (`"2010–2013"` for series).
pub fn parse_released(released: &str, year: &str) -> Option<civil::Date> {
    if let Ok(date) = civil::Date::strptime("%d %b %Y", released.trim()) {
        return Some(date);
    }
    let digits: String = year.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
        return None;
    }
    civil::Date::new(digits.parse().ok()?, 1, 1).ok()
}

pub fn split_genres(genre: &str) -> Vec<String> {
    genre
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty() && *g != "N/A")
        .map(str::to_string)
        .collect()
}

/// ASCII slug of a title; accented letters are transliterated.
pub fn slugify(title: &str) -> String {
    let out = slug::slugify(title);
    if out.is_empty() { "untitled".to_string() } else { out }
}

pub fn movie_slug(released_at: civil::Date, title: &str) -> String {
    format!("{:04}-{}", released_at.year(), slugify(title))
}

pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() >= 7 && SLUG_RE.is_match(slug)
}

pub fn is_valid_imdb_id(id: &str) -> bool {
    id.len() > 2 && id.len() <= 52 && id.starts_with("tt")
}

pub fn is_valid_poster(poster: &str) -> bool {
    let poster = poster.trim();
    if let Some(rest) = poster.strip_prefix("https://").or_else(|| poster.strip_prefix("http://")) {
        return !rest.is_empty();
    }
    POSTER_FILE_RE.is_match(poster)
}

/// Raw admin form submission.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieForm {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub released_at: String,
    #[serde(default)]
    pub plot: String,
    #[serde(default)]
    pub rated: String,
    #[serde(default)]
    pub poster: String,
    #[serde(default)]
    pub genres: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidMovie {
    pub slug: String,
    pub title: String,
    pub released_at: civil::Date,
    pub plot: String,
    pub rated: Rating,
    pub poster: String,
    pub genre_ids: Vec<i32>,
}

pub type FormErrors = BTreeMap<&'static str, String>;

impl MovieForm {
    pub fn from_existing(movie: &movie::Model, genre_ids: Vec<i32>) -> Self {
        Self {
            slug: movie.slug.clone(),
            title: movie.title.clone(),
            released_at: movie.released_at.clone(),
            plot: movie.plot.clone(),
            rated: movie.rated.as_code().to_string(),
            poster: movie.poster.clone(),
            genres: genre_ids,
        }
    }

    pub fn validate(&self, today: civil::Date) -> Result<ValidMovie, FormErrors> {
        let mut errors = FormErrors::new();

        let slug = self.slug.trim();
        if !is_valid_slug(slug) {
            errors.insert("slug", "Use the form 1999-movie-title (at least 7 characters).".into());
        }

        let title = self.title.trim();
        if title.chars().count() < 2 {
            errors.insert("title", "The title needs at least 2 characters.".into());
        }

        let plot = self.plot.trim();
        let plot_len = plot.chars().count();
        if !(20..=2000).contains(&plot_len) {
            errors.insert("plot", "The plot must be between 20 and 2000 characters.".into());
        }

        let released_at = match self.released_at.trim().parse::<civil::Date>() {
            Ok(date) if date < civil::date(1900, 1, 1) => {
                errors.insert("released_at", "Release date must be 1900 or later.".into());
                None
            },
            Ok(date) if date >= today + jiff::Span::new().years(100) => {
                errors.insert("released_at", "Release date is too far in the future.".into());
                None
            },
            Ok(date) => Some(date),
            Err(_) => {
                errors.insert("released_at", "Enter a date as YYYY-MM-DD.".into());
                None
            },
        };

        let rated = Rating::from_code(&self.rated);
        if rated.is_none() {
            errors.insert("rated", "Pick a rating.".into());
        }

        let poster = self.poster.trim();
        if !is_valid_poster(poster) {
            errors.insert("poster", "Use an http(s) URL or an image file name.".into());
        }

        if self.genres.is_empty() {
            errors.insert("genres", "Pick at least one genre.".into());
        }

        match (released_at, rated) {
            (Some(released_at), Some(rated)) if errors.is_empty() => Ok(ValidMovie {
                slug: slug.to_string(),
                title: title.to_string(),
                released_at,
                plot: plot.to_string(),
                rated,
                poster: poster.to_string(),
                genre_ids: self.genres.clone(),
            }),
            _ => Err(errors),
        }
    }
}
