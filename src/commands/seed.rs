use jiff::civil;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::info;

use crate::{
    auth,
    entities::user::{self, ROLE_ADMIN},
    importer::resolve_genres,
};

struct Fixture {
    username: &'static str,
    /// Birthday as (month, day) plus the age the user should have today.
    birthday: Option<(i8, i8, i16)>,
    is_admin: bool,
}

const GENRES: &[&str] = &[
    "Action", "Adventure", "Animation", "Comedy", "Crime", "Drama", "Fantasy", "Horror", "Romance",
    "Sci-Fi", "Thriller",
];

const USERS: &[Fixture] = &[
    Fixture { username: "adrien", birthday: Some((7, 10, 35)), is_admin: true },
    Fixture { username: "max", birthday: Some((2, 3, 15)), is_admin: false },
    Fixture { username: "lou", birthday: Some((12, 22, 5)), is_admin: false },
    Fixture { username: "john", birthday: None, is_admin: false },
];

/// Development accounts; each password equals the username. Existing
/// usernames are left untouched. Returns the names actually created.
pub async fn seed_users(db: &DatabaseConnection, today: civil::Date) -> anyhow::Result<Vec<String>> {
    let mut created = Vec::new();

    for fixture in USERS {
        let exists = user::Entity::find()
            .filter(user::Column::Username.eq(fixture.username))
            .one(db)
            .await?
            .is_some();
        if exists {
            info!(username = fixture.username, "user already present");
            continue;
        }

        let birthdate = match fixture.birthday {
            Some((month, day, age)) => Some(civil::Date::new(today.year() - age, month, day)?.to_string()),
            None => None,
        };

        user::ActiveModel {
            username: Set(fixture.username.to_string()),
            password_hash: Set(auth::hash_password(fixture.username)?),
            roles: Set(if fixture.is_admin { ROLE_ADMIN.to_string() } else { String::new() }),
            birthdate: Set(birthdate),
            last_logged_in_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(username = fixture.username, "user created");
        created.push(fixture.username.to_string());
    }

    Ok(created)
}

/// Makes sure the admin form has genres to offer on a fresh database.
pub async fn seed_genres(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let names: Vec<String> = GENRES.iter().map(|g| g.to_string()).collect();
    let genres = resolve_genres(db, &names).await?;
    info!(count = genres.len(), "genres ready");
    Ok(genres.len())
}
