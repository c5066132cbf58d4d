use crate::error::ApiError;
use crate::identity::IdentityVerifier;
use crate::registration::{Registration, RegistrationSaga, SUCCESS_MESSAGE};
use crate::store::CompanyStore;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use dto::{RegisterRequest, RegisterResponse};
use models::{Category, User};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn CompanyStore>,
    identity: Option<Arc<IdentityVerifier>>,
}

impl AppState {
    pub fn new(store: Arc<dyn CompanyStore>, identity: Option<IdentityVerifier>) -> Self {
        Self {
            store,
            identity: identity.map(Arc::new),
        }
    }

    fn store(&self) -> &dyn CompanyStore {
        self.store.as_ref()
    }
}

/// Lightweight health probe used by readiness checks.
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status":"ok"}))
}

/// Provision a company for a newly confirmed identity and make the caller its
/// admin.
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    // Unauthenticated callers get no validation feedback.
    if let Some(identity) = &state.identity {
        identity.verify(&headers, req.user_id.trim())?;
    }
    let registration = Registration::try_from(req)?;

    let outcome = RegistrationSaga::new(state.store())
        .run(registration)
        .await?;
    tracing::info!(
        company_id = %outcome.company_id,
        user_id = %outcome.user.id,
        categories = outcome.categories_seeded,
        "registration complete"
    );

    Ok(Json(RegisterResponse {
        success: true,
        company_id: outcome.company_id,
        message: SUCCESS_MESSAGE.to_string(),
    }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = state.store().get_user(&id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(user))
}

async fn list_categories(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.store().list_categories(company_id).await?))
}

pub fn build_router(state: AppState) -> Router {
    // The browser front end lives on another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/users/:id", get(get_user))
        .route("/companies/:id/categories", get(list_categories))
        .layer(cors)
        .with_state(state)
}
