use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use crate::{
    entities::{genre, movie, movie_genre},
    models::{Rating, movie_slug, parse_released, split_genres},
    omdb::OmdbMovie,
};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("movie \"{slug}\" already exists (#{existing_id})")]
    Conflict { slug: String, existing_id: i32 },

    #[error("cannot import {imdb_id}: {reason}")]
    InvalidRecord { imdb_id: String, reason: String },

    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Turns OMDb records into catalog rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct MovieImporter;

impl MovieImporter {
    /// Inserts `record`, or updates the row sharing its IMDb id or slug when
    /// `overwrite` is set. Runs in its own (nested) transaction so a failed
    /// import leaves nothing behind.
    pub async fn import<C>(
        &self,
        conn: &C,
        record: &OmdbMovie,
        overwrite: bool,
    ) -> Result<movie::Model, ImportError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let released_at = parse_released(&record.released, &record.year).ok_or_else(|| {
            ImportError::InvalidRecord {
                imdb_id: record.imdb_id.clone(),
                reason: format!("no usable release date in {:?} / {:?}", record.released, record.year),
            }
        })?;
        let slug = movie_slug(released_at, &record.title);
        let rated = Rating::from_code(&record.rated).unwrap_or_default();

        let txn = conn.begin().await?;

        let mut matches = movie::Entity::find()
            .filter(
                Condition::any()
                    .add(movie::Column::ImdbId.eq(record.imdb_id.as_str()))
                    .add(movie::Column::Slug.eq(slug.as_str())),
            )
            .order_by_asc(movie::Column::Id)
            .all(&txn)
            .await?;

        // The id and the slug point at two different rows: updating either one
        // would collide with the other.
        if matches.len() > 1 {
            txn.rollback().await?;
            let existing_id = matches
                .iter()
                .find(|m| m.imdb_id.as_deref() == Some(record.imdb_id.as_str()))
                .unwrap_or(&matches[0])
                .id;
            return Err(ImportError::Conflict { slug, existing_id });
        }

        let saved = match matches.pop() {
            Some(existing) if !overwrite => {
                txn.rollback().await?;
                return Err(ImportError::Conflict { slug, existing_id: existing.id });
            },
            Some(existing) => {
                let mut active: movie::ActiveModel = existing.into();
                active.slug = Set(slug);
                active.title = Set(record.title.clone());
                active.released_at = Set(released_at.to_string());
                active.plot = Set(record.plot.clone());
                active.poster = Set(record.poster.clone());
                active.rated = Set(rated);
                active.imdb_id = Set(Some(record.imdb_id.clone()));
                let updated = active.update(&txn).await?;
                debug!(slug = %updated.slug, id = updated.id, "updated movie from OMDb");
                updated
            },
            None => {
                let created = movie::ActiveModel {
                    slug: Set(slug),
                    title: Set(record.title.clone()),
                    released_at: Set(released_at.to_string()),
                    plot: Set(record.plot.clone()),
                    poster: Set(record.poster.clone()),
                    rated: Set(rated),
                    imdb_id: Set(Some(record.imdb_id.clone())),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                debug!(slug = %created.slug, id = created.id, "created movie from OMDb");
                created
            },
        };

        let genres = resolve_genres(&txn, &split_genres(&record.genre)).await?;
        set_movie_genres(&txn, saved.id, genres.iter().map(|g| g.id)).await?;

        txn.commit().await?;
        Ok(saved)
    }
}

/// Finds genres by name, creating the missing ones.
pub async fn resolve_genres<C: ConnectionTrait>(
    conn: &C,
    names: &[String],
) -> Result<Vec<genre::Model>, DbErr> {
    let mut out: Vec<genre::Model> = Vec::with_capacity(names.len());
    for name in names {
        if out.iter().any(|g| &g.name == name) {
            continue;
        }
        let found = genre::Entity::find()
            .filter(genre::Column::Name.eq(name.as_str()))
            .one(conn)
            .await?;
        let genre = match found {
            Some(genre) => genre,
            None => genre::ActiveModel { name: Set(name.clone()), ..Default::default() }.insert(conn).await?,
        };
        out.push(genre);
    }
    Ok(out)
}

/// Replaces the genre links of a movie.
pub async fn set_movie_genres<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
    genre_ids: impl IntoIterator<Item = i32>,
) -> Result<(), DbErr> {
    movie_genre::Entity::delete_many()
        .filter(movie_genre::Column::MovieId.eq(movie_id))
        .exec(conn)
        .await?;

    let mut seen = Vec::new();
    for genre_id in genre_ids {
        if seen.contains(&genre_id) {
            continue;
        }
        seen.push(genre_id);
        movie_genre::Entity::insert(movie_genre::ActiveModel {
            movie_id: Set(movie_id),
            genre_id: Set(genre_id),
        })
        .exec_without_returning(conn)
        .await?;
    }
    Ok(())
}
