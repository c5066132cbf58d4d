//! Company provisioning for a freshly confirmed identity.
//!
//! The steps run against an external store that offers no multi-table
//! transaction, so consistency is kept saga style:
//!
//! ```text
//! Start → CompanyCreated → UserLinked → CategoriesSeeded → Done
//!               │                  └──(seed failure, logged)──→ Done
//!               └──(user link failure)──→ RolledBack → Failed
//! ```
//!
//! Every completed critical step pushes a [`Compensation`]. A later critical
//! failure runs the pending compensations newest first, then surfaces the
//! original error. Category seeding is not critical: its failure is logged and
//! the registration still succeeds.

use crate::store::{CompanyStore, StoreError};
use dto::RegisterRequest;
use models::{default_categories, NewCompany, Role, User, UserUpsert};
use uuid::Uuid;

pub const SUCCESS_MESSAGE: &str = "Kayıt başarıyla tamamlandı";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Kullanıcı kimliği gerekli")]
    MissingUserId,
    #[error("Geçerli bir e-posta adresi gerekli")]
    InvalidEmail,
    #[error("Şirket adı gerekli")]
    MissingCompanyName,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Şirket oluşturulamadı: {0}")]
    CompanyCreationFailed(#[source] StoreError),
    #[error("Kullanıcı güncellenemedi: {0}")]
    UserLinkFailed(#[source] StoreError),
    #[error("Varsayılan kategoriler oluşturulamadı: {0}")]
    CategorySeedFailed(#[source] StoreError),
}

/// Sign-up input after trimming and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub company_name: String,
    pub tax_number: Option<String>,
}

impl TryFrom<RegisterRequest> for Registration {
    type Error = ValidationError;

    fn try_from(req: RegisterRequest) -> Result<Self, Self::Error> {
        let user_id = req.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(ValidationError::MissingUserId);
        }
        let email = req.email.trim().to_string();
        if !email.contains('@') {
            return Err(ValidationError::InvalidEmail);
        }
        let company_name = req.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(ValidationError::MissingCompanyName);
        }
        let tax_number = req
            .tax_number
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            user_id,
            email,
            full_name: req.full_name.unwrap_or_default().trim().to_string(),
            company_name,
            tax_number,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Start,
    CompanyCreated,
    UserLinked,
    CategoriesSeeded,
    Done,
    RolledBack,
    Failed,
}

/// Undo action for a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    DeleteCompany(Uuid),
}

impl Compensation {
    async fn run(self, store: &dyn CompanyStore) -> Result<(), StoreError> {
        match self {
            Compensation::DeleteCompany(id) => store.delete_company(id).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registered {
    pub company_id: Uuid,
    pub user: User,
    /// Zero when seeding failed.
    pub categories_seeded: usize,
    pub trail: Vec<RegistrationState>,
}

/// One run of the provisioning saga. Consumed by [`RegistrationSaga::run`].
pub struct RegistrationSaga<'a> {
    store: &'a dyn CompanyStore,
    state: RegistrationState,
    trail: Vec<RegistrationState>,
    compensations: Vec<Compensation>,
}

impl<'a> RegistrationSaga<'a> {
    pub fn new(store: &'a dyn CompanyStore) -> Self {
        Self {
            store,
            state: RegistrationState::Start,
            trail: vec![RegistrationState::Start],
            compensations: Vec::new(),
        }
    }

    fn advance(&mut self, next: RegistrationState) {
        tracing::debug!(from = ?self.state, to = ?next, "registration transition");
        self.state = next;
        self.trail.push(next);
    }

    pub async fn run(mut self, registration: Registration) -> Result<Registered, RegistrationError> {
        let Registration {
            user_id,
            email,
            full_name,
            company_name,
            tax_number,
        } = registration;

        let company = self
            .store
            .create_company(NewCompany {
                name: company_name,
                tax_number,
            })
            .await
            .map_err(|error| {
                self.advance(RegistrationState::Failed);
                RegistrationError::CompanyCreationFailed(error)
            })?;
        tracing::info!(company_id = %company.id, %user_id, "company created");
        self.compensations
            .push(Compensation::DeleteCompany(company.id));
        self.advance(RegistrationState::CompanyCreated);

        let upsert = UserUpsert {
            id: user_id,
            email,
            full_name,
            role: Role::Admin,
            company_id: company.id,
        };
        let user = match self.store.upsert_user(upsert).await {
            Ok(user) => user,
            Err(error) => {
                let error = RegistrationError::UserLinkFailed(error);
                tracing::warn!(company_id = %company.id, %error, "user link failed, rolling back");
                self.roll_back().await;
                self.advance(RegistrationState::Failed);
                return Err(error);
            }
        };
        tracing::info!(company_id = %company.id, user_id = %user.id, "user linked");
        self.advance(RegistrationState::UserLinked);

        let categories_seeded = match self
            .store
            .insert_categories(default_categories(company.id))
            .await
        {
            Ok(rows) => {
                self.advance(RegistrationState::CategoriesSeeded);
                rows.len()
            }
            Err(error) => {
                let error = RegistrationError::CategorySeedFailed(error);
                tracing::warn!(company_id = %company.id, %error, "continuing without default categories");
                0
            }
        };
        self.advance(RegistrationState::Done);

        Ok(Registered {
            company_id: company.id,
            user,
            categories_seeded,
            trail: self.trail,
        })
    }

    async fn roll_back(&mut self) {
        while let Some(compensation) = self.compensations.pop() {
            if let Err(error) = compensation.run(self.store).await {
                // Nothing left to undo with; the row stays orphaned.
                tracing::error!(?compensation, %error, "compensation failed");
            }
        }
        self.advance(RegistrationState::RolledBack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreOp};

    fn registration(user_id: &str) -> Registration {
        Registration {
            user_id: user_id.into(),
            email: "a@b.com".into(),
            full_name: "A B".into(),
            company_name: "Acme".into(),
            tax_number: None,
        }
    }

    #[tokio::test]
    async fn happy_path_creates_company_admin_and_categories() {
        let store = MemoryStore::new();
        let outcome = RegistrationSaga::new(&store)
            .run(registration("u1"))
            .await
            .unwrap();

        assert_eq!(store.companies().await.len(), 1);
        assert_eq!(outcome.user.role, Role::Admin);
        assert_eq!(outcome.user.company_id, Some(outcome.company_id));
        assert_eq!(outcome.categories_seeded, 11);
        assert_eq!(
            store.list_categories(outcome.company_id).await.unwrap().len(),
            11
        );
        assert_eq!(
            outcome.trail,
            vec![
                RegistrationState::Start,
                RegistrationState::CompanyCreated,
                RegistrationState::UserLinked,
                RegistrationState::CategoriesSeeded,
                RegistrationState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn company_failure_propagates_without_compensation() {
        let store = MemoryStore::new();
        store.fail(StoreOp::CreateCompany, "quota exceeded").await;

        let err = RegistrationSaga::new(&store)
            .run(registration("u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::CompanyCreationFailed(_)));
        assert_eq!(err.to_string(), "Şirket oluşturulamadı: quota exceeded");
        assert!(store.users().await.is_empty());
    }

    #[tokio::test]
    async fn user_link_failure_deletes_company() {
        let store = MemoryStore::new();
        store.fail(StoreOp::UpsertUser, "permission denied").await;

        let err = RegistrationSaga::new(&store)
            .run(registration("u1"))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Kullanıcı güncellenemedi: permission denied"
        );
        assert!(store.companies().await.is_empty());
        assert!(store.users().await.is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_still_reports_user_link_error() {
        let store = MemoryStore::new();
        store.fail(StoreOp::UpsertUser, "permission denied").await;
        store.fail(StoreOp::DeleteCompany, "connection reset").await;

        let err = RegistrationSaga::new(&store)
            .run(registration("u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::UserLinkFailed(_)));
        // Orphan left behind; the delete failure is only logged.
        assert_eq!(store.companies().await.len(), 1);
    }

    #[tokio::test]
    async fn seed_failure_is_not_fatal() {
        let store = MemoryStore::new();
        store.fail(StoreOp::InsertCategories, "timeout").await;

        let outcome = RegistrationSaga::new(&store)
            .run(registration("u1"))
            .await
            .unwrap();

        assert_eq!(outcome.categories_seeded, 0);
        assert_eq!(store.companies().await.len(), 1);
        assert_eq!(store.users().await.len(), 1);
        assert!(!outcome.trail.contains(&RegistrationState::CategoriesSeeded));
        assert_eq!(outcome.trail.last(), Some(&RegistrationState::Done));
    }

    #[tokio::test]
    async fn rerun_for_same_user_upserts() {
        let store = MemoryStore::new();
        RegistrationSaga::new(&store)
            .run(registration("u1"))
            .await
            .unwrap();
        let second = RegistrationSaga::new(&store)
            .run(registration("u1"))
            .await
            .unwrap();

        let users = store.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].company_id, Some(second.company_id));
        // No dedup on company name.
        assert_eq!(store.companies().await.len(), 2);
    }

    #[test]
    fn validation_trims_and_normalises() {
        let reg = Registration::try_from(RegisterRequest {
            user_id: " u1 ".into(),
            email: "a@b.com".into(),
            full_name: None,
            company_name: "  Acme Ltd ".into(),
            tax_number: Some("   ".into()),
        })
        .unwrap();
        assert_eq!(reg.user_id, "u1");
        assert_eq!(reg.company_name, "Acme Ltd");
        assert_eq!(reg.tax_number, None);
    }

    #[test]
    fn validation_rejects_missing_company_name() {
        let err = Registration::try_from(RegisterRequest {
            user_id: "u1".into(),
            email: "a@b.com".into(),
            full_name: Some("A B".into()),
            company_name: " ".into(),
            tax_number: None,
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingCompanyName);
    }
}
