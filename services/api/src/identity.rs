//! Confirms that the caller of `/register` is the identity being registered.

use crate::config::IdentityConfig;
use axum::http::HeaderMap;
use dto::AuthClaims;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Oturum bilgisi bulunamadı")]
    MissingToken,
    #[error("Oturum doğrulanamadı")]
    InvalidToken,
    #[error("Oturum bu kullanıcıya ait değil")]
    SubjectMismatch,
}

pub struct IdentityVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    pub fn new(config: &IdentityConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[config.audience.as_str()]);
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, headers: &HeaderMap, user_id: &str) -> Result<AuthClaims, IdentityError> {
        let token = bearer_token(headers).ok_or(IdentityError::MissingToken)?;
        let claims = decode::<AuthClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| {
                tracing::warn!(error = %err, "jwt decode failed");
                IdentityError::InvalidToken
            })?
            .claims;
        if claims.sub != user_id {
            return Err(IdentityError::SubjectMismatch);
        }
        Ok(claims)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
