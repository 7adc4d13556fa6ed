//! Middleware d'authentification par jeton porteur.
//! Vérifie l'en-tête `Authorization: Bearer <jeton>` et rejette les requêtes
//! non authentifiées.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::backend::{errors::ApiError, state::AppState};
use crate::utils::error_messages::{AUTH_FAILED, MISSING_TOKEN};
use crate::utils::token::Claims;

/// L'identité de l'appelant, extraite d'un jeton valide
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already checked by the route layer
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(ApiError::Unauthorized(MISSING_TOKEN))?;

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized(AUTH_FAILED))?;

        let claims = state.service.authenticate(token).map_err(|e| {
            log::warn!("Rejected bearer token: {e}");
            ApiError::Unauthorized(AUTH_FAILED)
        })?;

        let user = AuthUser(claims);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
