use super::{CompanyStore, StoreError};
use async_trait::async_trait;
use models::{Category, Company, NewCategory, NewCompany, User, UserUpsert};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// The hosted backend's table REST interface, authenticated with the
/// service-role key so row-level security does not apply.
#[derive(Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RestErrorBody {
    message: Option<String>,
}

impl RestStore {
    pub fn new(
        url: &str,
        service_role_key: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(service_role_key)
            .map_err(|e| StoreError::Transport(format!("invalid service role key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {service_role_key}"))
            .map_err(|e| StoreError::Transport(format!("invalid service role key: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, table))
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, StoreError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn single<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("empty representation".to_string()))
    }

    async fn ensure_success(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message: Self::rejection_message(status, response.text().await),
        })
    }

    /// Prefers the backend's `message` field, then the raw body, then the
    /// status line.
    fn rejection_message(status: StatusCode, body: Result<String, reqwest::Error>) -> String {
        let body = match body {
            Ok(body) => body,
            Err(error) => {
                tracing::debug!(%status, %error, "failed to read rejection body");
                return status.to_string();
            }
        };
        let parsed = serde_json::from_str::<RestErrorBody>(&body)
            .ok()
            .and_then(|b| b.message);
        match parsed {
            Some(message) => message,
            None if body.trim().is_empty() => status.to_string(),
            None => body,
        }
    }
}

#[async_trait]
impl CompanyStore for RestStore {
    #[instrument(skip(self, company), fields(name = %company.name))]
    async fn create_company(&self, company: NewCompany) -> Result<Company, StoreError> {
        let response = self
            .request(Method::POST, "companies")
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&company)
            .send()
            .await?;
        Self::single(response).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn upsert_user(&self, user: UserUpsert) -> Result<User, StoreError> {
        let response = self
            .request(Method::POST, "users")
            .query(&[("on_conflict", "id")])
            .header("Prefer", MERGE_DUPLICATES)
            .json(&user)
            .send()
            .await?;
        Self::single(response).await
    }

    #[instrument(skip(self))]
    async fn delete_company(&self, id: Uuid) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, "companies")
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self, categories), fields(count = categories.len()))]
    async fn insert_categories(
        &self,
        categories: Vec<NewCategory>,
    ) -> Result<Vec<Category>, StoreError> {
        let response = self
            .request(Method::POST, "income_expense_categories")
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&categories)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let response = self
            .request(Method::GET, "users")
            .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())])
            .send()
            .await?;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn list_categories(&self, company_id: Uuid) -> Result<Vec<Category>, StoreError> {
        let response = self
            .request(Method::GET, "income_expense_categories")
            .query(&[
                ("company_id", format!("eq.{company_id}")),
                ("order", "code.asc".to_string()),
            ])
            .send()
            .await?;
        Self::rows(response).await
    }
}
