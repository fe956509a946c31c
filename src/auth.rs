use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use cookie::{Cookie, SameSite};
use jiff::civil;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use tracing::{debug, info};

use crate::{AppState, entities::user, error::AppError, models::Rating};

pub const SESSION_COOKIE: &str = "cinematheque_session";

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("hashing password: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Checks credentials and stamps `last_logged_in_at` on success.
pub async fn authenticate(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    now: jiff::Timestamp,
) -> Result<Option<user::Model>, DbErr> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(username.trim()))
        .one(db)
        .await?;

    let Some(found) = found.filter(|u| verify_password(password, &u.password_hash)) else {
        debug!(username = %username, "login rejected");
        return Ok(None);
    };

    let mut active: user::ActiveModel = found.into();
    active.last_logged_in_at = Set(Some(now.as_second()));
    let updated = active.update(db).await?;

    info!(username = %updated.username, "user logged in");
    Ok(Some(updated))
}

pub fn session_cookie(user_id: i32) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, user_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(7))
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Completed years between `birthdate` and `today`.
pub fn age_on(birthdate: civil::Date, today: civil::Date) -> i16 {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}

/// G and PG are public. Everything else needs a logged-in user who is either
/// an admin or old enough; users without a birthdate count as too young.
pub fn can_view_details(user: Option<&user::Model>, rated: Rating, today: civil::Date) -> bool {
    let Some(min_age) = rated.min_age() else {
        return true;
    };
    let Some(user) = user else {
        return false;
    };
    if user.is_admin() {
        return true;
    }
    user.birthdate().is_some_and(|birthdate| age_on(birthdate, today) >= min_age)
}

/// The logged-in user, if the signed session cookie names one.
pub struct CurrentUser(pub Option<user::Model>);

impl CurrentUser {
    pub fn user(&self) -> Option<&user::Model> {
        self.0.as_ref()
    }

    pub fn require_admin(&self) -> Result<&user::Model, AppError> {
        self.0.as_ref().filter(|u| u.is_admin()).ok_or_else(AppError::forbidden)
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = match SignedCookieJar::<Key>::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };

        let Some(user_id) = jar.get(SESSION_COOKIE).and_then(|c| c.value().parse::<i32>().ok()) else {
            return Ok(Self(None));
        };

        let user = user::Entity::find_by_id(user_id).one(&state.db).await?;
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(roles: &str, birthdate: Option<&str>) -> user::Model {
        user::Model {
            id: 1,
            username: "someone".into(),
            password_hash: String::new(),
            roles: roles.into(),
            birthdate: birthdate.map(str::to_string),
            last_logged_in_at: None,
        }
    }

    #[test]
    fn hashes_verify() {
        let hash = hash_password("max").unwrap();
        assert!(verify_password("max", &hash));
        assert!(!verify_password("lou", &hash));
        assert!(!verify_password("max", "not a hash"));
    }

    #[test]
    fn age_counts_completed_years() {
        let birthdate = civil::date(2009, 2, 3);
        assert_eq!(age_on(birthdate, civil::date(2024, 2, 2)), 14);
        assert_eq!(age_on(birthdate, civil::date(2024, 2, 3)), 15);
    }

    #[test]
    fn public_ratings_need_no_login() {
        let today = civil::date(2024, 1, 10);
        assert!(can_view_details(None, Rating::GeneralAudiences, today));
        assert!(can_view_details(None, Rating::ParentalGuidance, today));
        assert!(!can_view_details(None, Rating::ParentsStronglyCautioned, today));
    }

    #[test]
    fn restricted_ratings_follow_age() {
        let today = civil::date(2024, 1, 10);
        let teen = account("", Some("2009-02-03"));
        let child = account("", Some("2018-12-22"));
        let unknown = account("", None);
        let admin = account("ROLE_ADMIN", None);

        assert!(can_view_details(Some(&teen), Rating::ParentsStronglyCautioned, today));
        assert!(!can_view_details(Some(&teen), Rating::Restricted, today));
        assert!(!can_view_details(Some(&child), Rating::ParentsStronglyCautioned, today));
        assert!(!can_view_details(Some(&unknown), Rating::ParentsStronglyCautioned, today));
        assert!(can_view_details(Some(&admin), Rating::AdultsOnly, today));
    }

    #[tokio::test]
    async fn login_is_recorded() {
        let db = crate::db::test_db().await;
        crate::commands::seed::seed_users(&db, civil::date(2024, 1, 10)).await.unwrap();
        let now = jiff::Timestamp::from_second(1_704_880_000).unwrap();

        assert!(authenticate(&db, "max", "wrong", now).await.unwrap().is_none());

        let max = authenticate(&db, "max", "max", now).await.unwrap().unwrap();
        assert_eq!(max.last_logged_in_at, Some(1_704_880_000));
    }
}
