use sea_orm::entity::prelude::*;

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub password_hash: String,
    /// Comma-separated role names.
    pub roles: String,
    /// Civil date, `YYYY-MM-DD`.
    pub birthdate: Option<String>,
    /// Unix seconds.
    pub last_logged_in_at: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_admin(&self) -> bool {
        self.roles.split(',').any(|r| r.trim() == ROLE_ADMIN)
    }

    pub fn birthdate(&self) -> Option<jiff::civil::Date> {
        self.birthdate.as_deref().and_then(|d| d.parse().ok())
    }
}
