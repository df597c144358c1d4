/*!
 * # Authentication and Authorization Module
 *
 * JWT bearer authentication for the procurement API. Tokens carry the
 * caller's id, display name and role; the role decides which approval
 * level (if any) the caller may record.
 */

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

/// Role of an authenticated user. Staff create requests; the two manager
/// levels approve in either order, and finance signs off last.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, utoipa::ToSchema,
)]
pub enum Role {
    #[serde(rename = "staff")]
    #[strum(serialize = "staff")]
    Staff,
    #[serde(rename = "manager_level_1")]
    #[strum(serialize = "manager_level_1")]
    ManagerLevel1,
    #[serde(rename = "manager_level_2")]
    #[strum(serialize = "manager_level_2")]
    ManagerLevel2,
    #[serde(rename = "finance")]
    #[strum(serialize = "finance")]
    Finance,
}

/// The three approval levels. Finance is the gate that turns a fully
/// approved request into a purchase order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApprovalLevel {
    ManagerOne,
    ManagerTwo,
    Finance,
}

impl ApprovalLevel {
    pub fn number(&self) -> i16 {
        match self {
            ApprovalLevel::ManagerOne => 1,
            ApprovalLevel::ManagerTwo => 2,
            ApprovalLevel::Finance => 3,
        }
    }
}

impl Role {
    /// The approval level this role may record, if any.
    pub fn approval_level(&self) -> Option<ApprovalLevel> {
        match self {
            Role::Staff => None,
            Role::ManagerLevel1 => Some(ApprovalLevel::ManagerOne),
            Role::ManagerLevel2 => Some(ApprovalLevel::ManagerTwo),
            Role::Finance => Some(ApprovalLevel::Finance),
        }
    }
}

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing Authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("expected Bearer token".into()))?;

        let claims = verify_token(token, &state.config.jwt_secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("invalid subject claim".into()))?;

        Ok(AuthUser {
            user_id,
            name: claims.name,
            role: claims.role,
        })
    }
}

/// Decodes and validates a bearer token.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))
}

/// Issues a signed token for the given user. Used by tests and by
/// deployments that mint tokens out of band.
pub fn issue_token(
    user_id: Uuid,
    name: &str,
    role: Role,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, ServiceError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        name: name.to_string(),
        role,
        iat: now,
        exp: now + expiration_secs as i64,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {}", e)))
}
