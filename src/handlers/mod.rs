// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod csv_upload;
pub mod documents;
pub mod flags;
pub mod history;
pub mod oauth;
pub mod test;

/// Postgres unique_violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
