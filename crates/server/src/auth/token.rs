use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::Role;

use crate::{config::AuthConfig, error::AppError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    #[default]
    Access,
    /// Short-lived read-only token minted by an admin
    View,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    #[serde(default)]
    pub kind: TokenKind,
}

/// Signs and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    view_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret_key.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_minutes),
            view_ttl: Duration::minutes(config.view_token_minutes),
        }
    }

    pub fn access_token(&self, subject: &str, role: Role) -> Result<String, AppError> {
        self.mint(subject, role, TokenKind::Access, self.access_ttl)
    }

    pub fn view_token(&self, subject: &str) -> Result<String, AppError> {
        self.mint(subject, Role::Admin, TokenKind::View, self.view_ttl)
    }

    pub fn mint(
        &self,
        subject: &str,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let expiration = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to calculate expiration")))?
            .timestamp() as usize;

        let claims = Claims {
            sub: subject.to_string(),
            role,
            exp: expiration,
            kind,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("signing token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected token: {}", e);
                AppError::Unauthorized("Could not validate credentials".to_string())
            })
    }
}
