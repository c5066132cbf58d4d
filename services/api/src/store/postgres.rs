use super::{CompanyStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::{Category, CategoryKind, Company, NewCategory, NewCompany, Role, User, UserUpsert};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

/// Direct Postgres access for self-hosted deployments. The connection owner
/// bypasses row-level security the same way the service-role key does.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn decode_error(error: models::UnknownVariant) -> StoreError {
    StoreError::Decode(error.to_string())
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        role: role.parse::<Role>().map_err(decode_error)?,
        company_id: row.try_get("company_id")?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    let kind: String = row.try_get("kind")?;
    Ok(Category {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        kind: kind.parse::<CategoryKind>().map_err(decode_error)?,
    })
}

#[async_trait]
impl CompanyStore for PgStore {
    async fn create_company(&self, company: NewCompany) -> Result<Company, StoreError> {
        let id = Uuid::new_v4();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"INSERT INTO companies (id, name, tax_number) VALUES ($1, $2, $3) RETURNING created_at"#,
        )
        .bind(id)
        .bind(&company.name)
        .bind(&company.tax_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(Company {
            id,
            name: company.name,
            tax_number: company.tax_number,
            created_at,
        })
    }

    async fn upsert_user(&self, user: UserUpsert) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
                INSERT INTO users (id, email, full_name, role, company_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE SET
                    email = EXCLUDED.email,
                    full_name = EXCLUDED.full_name,
                    role = EXCLUDED.role,
                    company_id = EXCLUDED.company_id,
                    updated_at = NOW()
                RETURNING id, email, full_name, role, company_id
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.company_id)
        .fetch_one(&self.pool)
        .await?;

        user_from_row(&row)
    }

    async fn delete_company(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM companies WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_categories(
        &self,
        categories: Vec<NewCategory>,
    ) -> Result<Vec<Category>, StoreError> {
        // All or nothing, matching a single bulk insert on the REST backend.
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(categories.len());
        for category in categories {
            let id = Uuid::new_v4();
            sqlx::query(
                r#"INSERT INTO income_expense_categories (id, company_id, code, name, kind) VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(id)
            .bind(category.company_id)
            .bind(&category.code)
            .bind(&category.name)
            .bind(category.kind.as_str())
            .execute(&mut *tx)
            .await?;

            rows.push(Category {
                id,
                company_id: category.company_id,
                code: category.code,
                name: category.name,
                kind: category.kind,
            });
        }
        tx.commit().await?;
        Ok(rows)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, email, full_name, role, company_id FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_categories(&self, company_id: Uuid) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, company_id, code, name, kind FROM income_expense_categories WHERE company_id = $1 ORDER BY code"#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(category_from_row).collect()
    }
}
