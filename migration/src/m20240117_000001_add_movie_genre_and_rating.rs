use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MovieGenre::Table)
                    .if_not_exists()
                    .col(integer(MovieGenre::MovieId))
                    .col(integer(MovieGenre::GenreId))
                    .primary_key(Index::create().col(MovieGenre::MovieId).col(MovieGenre::GenreId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genre_movie")
                            .from(MovieGenre::Table, MovieGenre::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genre_genre")
                            .from(MovieGenre::Table, MovieGenre::GenreId)
                            .to(Genre::Table, Genre::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // SQLite only accepts one change per ALTER TABLE.
        manager
            .alter_table(
                Table::alter()
                    .table(Movie::Table)
                    .add_column(string_len(Movie::Rated, 6).default("G"))
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Movie::Table)
                    .add_column(string_len_null(Movie::ImdbId, 20))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("movie_unique_imdb_id")
                    .table(Movie::Table)
                    .col(Movie::ImdbId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("movie_unique_imdb_id").table(Movie::Table).to_owned())
            .await?;
        manager
            .alter_table(Table::alter().table(Movie::Table).drop_column(Movie::ImdbId).to_owned())
            .await?;
        manager
            .alter_table(Table::alter().table(Movie::Table).drop_column(Movie::Rated).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(MovieGenre::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum MovieGenre {
    Table,
    MovieId,
    GenreId,
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
    Rated,
    ImdbId,
}

#[derive(DeriveIden)]
enum Genre {
    Table,
    Id,
}
