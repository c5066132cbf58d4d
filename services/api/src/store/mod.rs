//! Access to the `companies`, `users` and `income_expense_categories` tables.
//!
//! Handlers and the registration saga only see [`CompanyStore`]; which backend
//! sits behind it is decided once in `main` and injected through `AppState`.

use async_trait::async_trait;
use models::{Category, Company, NewCategory, NewCompany, User, UserUpsert};
use uuid::Uuid;

mod memory;
mod postgres;
mod rest;

pub use memory::{MemoryStore, StoreOp};
pub use postgres::PgStore;
pub use rest::RestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected store response: {0}")]
    Decode(String),
    #[error("row not found")]
    NotFound,
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => StoreError::Rejected {
                status: 409,
                message: db.message().to_string(),
            },
            decode @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
                StoreError::Decode(decode.to_string())
            }
            other => StoreError::Transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            StoreError::Decode(error.to_string())
        } else {
            StoreError::Transport(error.to_string())
        }
    }
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn create_company(&self, company: NewCompany) -> Result<Company, StoreError>;

    /// Inserts the user or, when `id` already exists, overwrites its columns.
    async fn upsert_user(&self, user: UserUpsert) -> Result<User, StoreError>;

    async fn delete_company(&self, id: Uuid) -> Result<(), StoreError>;

    async fn insert_categories(
        &self,
        categories: Vec<NewCategory>,
    ) -> Result<Vec<Category>, StoreError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Categories of one company, ordered by code.
    async fn list_categories(&self, company_id: Uuid) -> Result<Vec<Category>, StoreError>;
}
