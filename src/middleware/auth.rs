use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use crate::{error::AppError, security::Role, state::AppState};

/// Caller identity, resolved once per request from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Admin { id: i64, username: String },
    Customer { id: i64, email: String },
    Anonymous,
}

impl Principal {
    pub fn require_admin(&self) -> Result<i64, AppError> {
        match self {
            Principal::Admin { id, .. } => Ok(*id),
            Principal::Customer { .. } => Err(AppError::Forbidden("admin access required")),
            Principal::Anonymous => Err(missing_token()),
        }
    }

    pub fn require_customer(&self) -> Result<i64, AppError> {
        match self {
            Principal::Customer { id, .. } => Ok(*id),
            Principal::Admin { .. } => Err(AppError::Forbidden("customer access required")),
            Principal::Anonymous => Err(missing_token()),
        }
    }

    pub fn require_authenticated(&self) -> Result<(), AppError> {
        match self {
            Principal::Anonymous => Err(missing_token()),
            _ => Ok(()),
        }
    }
}

fn missing_token() -> AppError {
    AppError::Unauthorized("Missing bearer token".into())
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Principal::Anonymous);
        };

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

        let claims = state.jwt.verify(token)?;
        let id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Invalid subject in token".into()))?;

        Ok(match claims.role {
            Role::Admin => Principal::Admin {
                id,
                username: claims.username,
            },
            Role::Customer => Principal::Customer {
                id,
                email: claims.username,
            },
        })
    }
}
