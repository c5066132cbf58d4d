use super::{CompanyStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use models::{Category, Company, NewCategory, NewCompany, User, UserUpsert};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Operations of [`CompanyStore`], used to arm failures on a [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateCompany,
    UpsertUser,
    DeleteCompany,
    InsertCategories,
}

#[derive(Default)]
struct Tables {
    companies: Vec<Company>,
    users: HashMap<String, User>,
    categories: Vec<Category>,
}

/// In-process tables with the same constraints the hosted schema enforces:
/// users and categories must reference an existing company, and category codes
/// are unique per company. Deleting a company cascades to its categories.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failures: Mutex<HashMap<StoreOp, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `op` fail with `reason` until [`Self::heal`].
    pub async fn fail(&self, op: StoreOp, reason: impl Into<String>) {
        self.failures.lock().await.insert(op, reason.into());
    }

    pub async fn heal(&self, op: StoreOp) {
        self.failures.lock().await.remove(&op);
    }

    pub async fn companies(&self) -> Vec<Company> {
        self.tables.lock().await.companies.clone()
    }

    pub async fn users(&self) -> Vec<User> {
        self.tables.lock().await.users.values().cloned().collect()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.tables.lock().await.categories.clone()
    }

    async fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        match self.failures.lock().await.get(&op) {
            Some(reason) => Err(StoreError::Rejected {
                status: 500,
                message: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn foreign_key_violation(table: &str) -> StoreError {
    StoreError::Rejected {
        status: 409,
        message: format!("insert or update on table \"{table}\" violates foreign key constraint"),
    }
}

#[async_trait]
impl CompanyStore for MemoryStore {
    async fn create_company(&self, company: NewCompany) -> Result<Company, StoreError> {
        self.check(StoreOp::CreateCompany).await?;
        let row = Company {
            id: Uuid::new_v4(),
            name: company.name,
            tax_number: company.tax_number,
            created_at: Utc::now(),
        };
        self.tables.lock().await.companies.push(row.clone());
        Ok(row)
    }

    async fn upsert_user(&self, user: UserUpsert) -> Result<User, StoreError> {
        self.check(StoreOp::UpsertUser).await?;
        let mut tables = self.tables.lock().await;
        if !tables.companies.iter().any(|c| c.id == user.company_id) {
            return Err(foreign_key_violation("users"));
        }
        let row = User::from(user);
        tables.users.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn delete_company(&self, id: Uuid) -> Result<(), StoreError> {
        self.check(StoreOp::DeleteCompany).await?;
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .values()
            .any(|user| user.company_id == Some(id))
        {
            return Err(StoreError::Rejected {
                status: 409,
                message: "company is still referenced from table \"users\"".to_string(),
            });
        }
        tables.companies.retain(|c| c.id != id);
        tables.categories.retain(|c| c.company_id != id);
        Ok(())
    }

    async fn insert_categories(
        &self,
        categories: Vec<NewCategory>,
    ) -> Result<Vec<Category>, StoreError> {
        self.check(StoreOp::InsertCategories).await?;
        let mut tables = self.tables.lock().await;

        let mut taken: HashSet<(Uuid, String)> = tables
            .categories
            .iter()
            .map(|c| (c.company_id, c.code.clone()))
            .collect();
        for category in &categories {
            if !tables.companies.iter().any(|c| c.id == category.company_id) {
                return Err(foreign_key_violation("income_expense_categories"));
            }
            if !taken.insert((category.company_id, category.code.clone())) {
                return Err(StoreError::Rejected {
                    status: 409,
                    message: format!("duplicate category code `{}`", category.code),
                });
            }
        }

        let rows: Vec<Category> = categories
            .into_iter()
            .map(|c| Category {
                id: Uuid::new_v4(),
                company_id: c.company_id,
                code: c.code,
                name: c.name,
                kind: c.kind,
            })
            .collect();
        tables.categories.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(id).cloned())
    }

    async fn list_categories(&self, company_id: Uuid) -> Result<Vec<Category>, StoreError> {
        let mut rows: Vec<Category> = self
            .tables
            .lock()
            .await
            .categories
            .iter()
            .filter(|c| c.company_id == company_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{default_categories, Role};

    fn acme() -> NewCompany {
        NewCompany {
            name: "Acme".into(),
            tax_number: None,
        }
    }

    fn admin(id: &str, company_id: Uuid) -> UserUpsert {
        UserUpsert {
            id: id.into(),
            email: "a@b.com".into(),
            full_name: "A B".into(),
            role: Role::Admin,
            company_id,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_user() {
        let store = MemoryStore::new();
        let first = store.create_company(acme()).await.unwrap();
        let second = store.create_company(acme()).await.unwrap();

        store.upsert_user(admin("u1", first.id)).await.unwrap();
        store.upsert_user(admin("u1", second.id)).await.unwrap();

        let users = store.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].company_id, Some(second.id));
    }

    #[tokio::test]
    async fn user_must_reference_existing_company() {
        let store = MemoryStore::new();
        let err = store.upsert_user(admin("u1", Uuid::new_v4())).await;
        assert!(matches!(err, Err(StoreError::Rejected { status: 409, .. })));
    }

    #[tokio::test]
    async fn duplicate_codes_rejected_without_partial_insert() {
        let store = MemoryStore::new();
        let company = store.create_company(acme()).await.unwrap();
        store
            .insert_categories(default_categories(company.id))
            .await
            .unwrap();

        let again = store.insert_categories(default_categories(company.id)).await;
        assert!(again.is_err());
        assert_eq!(store.list_categories(company.id).await.unwrap().len(), 11);
    }

    #[tokio::test]
    async fn delete_cascades_categories() {
        let store = MemoryStore::new();
        let company = store.create_company(acme()).await.unwrap();
        store
            .insert_categories(default_categories(company.id))
            .await
            .unwrap();

        store.delete_company(company.id).await.unwrap();
        assert!(store.companies().await.is_empty());
        assert!(store.categories().await.is_empty());
    }

    #[tokio::test]
    async fn armed_failure_applies_until_healed() {
        let store = MemoryStore::new();
        store.fail(StoreOp::CreateCompany, "offline").await;
        let err = store.create_company(acme()).await.unwrap_err();
        assert_eq!(err.to_string(), "offline");

        store.heal(StoreOp::CreateCompany).await;
        assert!(store.create_company(acme()).await.is_ok());
    }
}
