use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    ModelTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, TryIntoModel,
};

use crate::{
    entities::{genre, movie},
    importer::set_movie_genres,
    models::ValidMovie,
};

#[derive(Clone, Debug, FromQueryResult)]
pub struct NavItem {
    pub title: String,
    pub slug: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("slug \"{0}\" is already used by another movie")]
    SlugTaken(String),

    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Catalog reads and admin writes.
#[derive(Clone)]
pub struct MovieRepository {
    db: DatabaseConnection,
}

impl MovieRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list_all(&self) -> Result<Vec<(movie::Model, Vec<genre::Model>)>, DbErr> {
        movie::Entity::find()
            .find_with_related(genre::Entity)
            .order_by_asc(movie::Column::Title)
            .order_by_asc(movie::Column::Id)
            .all(&self.db)
            .await
    }

    pub async fn list_for_navbar(&self) -> Result<Vec<NavItem>, DbErr> {
        movie::Entity::find()
            .select_only()
            .column(movie::Column::Title)
            .column(movie::Column::Slug)
            .order_by_asc(movie::Column::Title)
            .into_model::<NavItem>()
            .all(&self.db)
            .await
    }

    pub async fn get_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<(movie::Model, Vec<genre::Model>)>, DbErr> {
        let Some(movie) =
            movie::Entity::find().filter(movie::Column::Slug.eq(slug)).one(&self.db).await?
        else {
            return Ok(None);
        };
        let genres = movie.find_related(genre::Entity).all(&self.db).await?;
        Ok(Some((movie, genres)))
    }

    pub async fn genres(&self) -> Result<Vec<genre::Model>, DbErr> {
        genre::Entity::find().order_by_asc(genre::Column::Name).all(&self.db).await
    }

    /// Creates a movie, or updates `existing`, from a validated form.
    pub async fn save(
        &self,
        existing: Option<movie::Model>,
        valid: &ValidMovie,
    ) -> Result<movie::Model, SaveError> {
        let txn = self.db.begin().await?;

        let mut clash = movie::Entity::find().filter(movie::Column::Slug.eq(valid.slug.as_str()));
        if let Some(existing) = &existing {
            clash = clash.filter(movie::Column::Id.ne(existing.id));
        }
        if clash.one(&txn).await?.is_some() {
            txn.rollback().await?;
            return Err(SaveError::SlugTaken(valid.slug.clone()));
        }

        let mut active: movie::ActiveModel = match existing {
            Some(existing) => existing.into(),
            None => movie::ActiveModel { imdb_id: Set(None), ..Default::default() },
        };
        active.slug = Set(valid.slug.clone());
        active.title = Set(valid.title.clone());
        active.released_at = Set(valid.released_at.to_string());
        active.plot = Set(valid.plot.clone());
        active.poster = Set(valid.poster.clone());
        active.rated = Set(valid.rated);
        let saved = active.save(&txn).await?.try_into_model()?;

        let known: Vec<i32> = genre::Entity::find()
            .filter(genre::Column::Id.is_in(valid.genre_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|g| g.id)
            .collect();
        set_movie_genres(&txn, saved.id, known).await?;

        txn.commit().await?;
        Ok(saved)
    }
}
