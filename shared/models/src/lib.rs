//! Tenant-scoped rows shared by every service. A `Company` is the tenant; all
//! business data, users included, hangs off exactly one of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub tax_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `companies`; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub tax_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {column} value `{value}`")]
pub struct UnknownVariant {
    pub column: &'static str,
    pub value: String,
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(UnknownVariant {
                column: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// A row of `users`. `id` is the identity provider's subject, not a local key.
///
/// `company_id` is only `None` for identities that never finished registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
}

/// Insert-or-update payload for `users`, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpsert {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub company_id: Uuid,
}

impl From<UserUpsert> for User {
    fn from(upsert: UserUpsert) -> Self {
        Self {
            id: upsert.id,
            email: upsert.email,
            full_name: upsert.full_name,
            role: upsert.role,
            company_id: Some(upsert.company_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }
}

impl FromStr for CategoryKind {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(UnknownVariant {
                column: "kind",
                value: other.to_string(),
            }),
        }
    }
}

/// A row of `income_expense_categories`. `code` is unique per company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub company_id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: CategoryKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub company_id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: CategoryKind,
}

const DEFAULT_CATEGORIES: [(&str, &str, CategoryKind); 11] = [
    ("GDR-KIRA", "Kira", CategoryKind::Expense),
    ("GDR-PERSONEL", "Personel Giderleri", CategoryKind::Expense),
    ("GDR-ELEKTRIK", "Elektrik", CategoryKind::Expense),
    ("GDR-SU", "Su", CategoryKind::Expense),
    ("GDR-DOGALGAZ", "Doğalgaz", CategoryKind::Expense),
    ("GDR-ILETISIM", "İletişim", CategoryKind::Expense),
    ("GDR-KIRTASIYE", "Kırtasiye", CategoryKind::Expense),
    ("GDR-DIGER", "Diğer Giderler", CategoryKind::Expense),
    ("GLR-SATIS", "Satış Gelirleri", CategoryKind::Income),
    ("GLR-HIZMET", "Hizmet Gelirleri", CategoryKind::Income),
    ("GLR-DIGER", "Diğer Gelirler", CategoryKind::Income),
];

/// The income/expense categories every new company starts with.
pub fn default_categories(company_id: Uuid) -> Vec<NewCategory> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(code, name, kind)| NewCategory {
            company_id,
            code: (*code).to_string(),
            name: (*name).to_string(),
            kind: *kind,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_set_is_eight_expense_three_income() {
        let company_id = Uuid::new_v4();
        let categories = default_categories(company_id);

        assert_eq!(categories.len(), 11);
        let expense = categories
            .iter()
            .filter(|c| c.kind == CategoryKind::Expense)
            .count();
        assert_eq!(expense, 8);
        assert_eq!(categories.len() - expense, 3);
        assert!(categories.iter().all(|c| c.company_id == company_id));
    }

    #[test]
    fn default_codes_are_unique() {
        let categories = default_categories(Uuid::new_v4());
        let codes: HashSet<_> = categories.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes.len(), categories.len());
    }

    #[test]
    fn role_and_kind_use_lowercase_wire_names() {
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
        assert_eq!(serde_json::to_value(CategoryKind::Income).unwrap(), "income");
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("owner".parse::<Role>().is_err());
    }
}
