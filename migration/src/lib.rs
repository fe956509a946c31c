pub use sea_orm_migration::prelude::*;

mod m20240110_000001_create_movie_and_genre;
mod m20240117_000001_add_movie_genre_and_rating;
mod m20240124_000001_create_user;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240110_000001_create_movie_and_genre::Migration),
            Box::new(m20240117_000001_add_movie_genre_and_rating::Migration),
            Box::new(m20240124_000001_create_user::Migration),
        ]
    }
}
