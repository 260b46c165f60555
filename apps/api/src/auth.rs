//! JWT authentication.
//!
//! Bearer tokens are validated by [`auth_middleware`], which stores the
//! caller as an [`AuthenticatedUser`] in the request extensions. Handlers
//! take it with the [`Auth`] extractor and run role checks on it.
//!
//! ```text
//! Authorization: Bearer <jwt>
//!       │
//!       ▼
//! auth_middleware ──► JwtManager::validate_token ──► Claims
//!       │                                              │
//!       ▼                                              ▼
//! request.extensions ◄──────────────────── AuthenticatedUser
//!       │
//!       ▼
//! handler(Auth(user)) ──► user.require_admin()?
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use salesdesk_core::{Role, User};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID
    pub jti: String,
}

/// JWT token manager.
#[derive(Debug)]
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, lifetime_secs: i64) -> Self {
        JwtManager {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    /// Issues a token for a CRM user.
    pub fn generate_token(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Authenticated User
// =============================================================================

/// The caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: Claims) -> Self {
        AuthenticatedUser {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }

    /// Name recorded on documents this user writes.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    fn require(&self, allowed: bool, message: &str) -> ApiResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(ApiError::forbidden(message))
        }
    }

    pub fn require_super_admin(&self) -> ApiResult<()> {
        self.require(self.role.is_super_admin(), "Super admin access required")
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        self.require(self.role.is_admin(), "Admin access required")
    }

    pub fn require_finance(&self) -> ApiResult<()> {
        self.require(self.role.can_manage_finance(), "Finance access required")
    }

    pub fn require_inventory(&self) -> ApiResult<()> {
        self.require(self.role.can_manage_inventory(), "Inventory access required")
    }

    pub fn require_lead_manager(&self) -> ApiResult<()> {
        self.require(self.role.can_manage_leads(), "Lead management access required")
    }
}

// =============================================================================
// Middleware & Extractor
// =============================================================================

/// Rejects requests without a valid bearer token.
pub async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(auth_header) = auth_header else {
        return ApiError::Unauthorized("Missing Authorization header".into()).into_response();
    };

    let Some(token) = extract_bearer_token(auth_header) else {
        return ApiError::Unauthorized("Invalid Authorization header format".into()).into_response();
    };

    match state.jwt.validate_token(token) {
        Ok(claims) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser::from_claims(claims));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extractor for authenticated user.
#[derive(Debug, Clone)]
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Auth)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))
    }
}
