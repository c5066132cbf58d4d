use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /register`, sent by the sign-up form once the identity
/// provider has confirmed the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_id: String,
    pub email: String,
    /// Absent and `null` both mean "no display name".
    #[serde(default)]
    pub full_name: Option<String>,
    pub company_name: String,
    #[serde(default)]
    pub tax_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub company_id: Uuid,
    pub message: String,
}

/// Flat failure body; clients only get a message, never an error code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: String, // identity provider user id
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}
