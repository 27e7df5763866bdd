use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;

use crate::{error::AppError, graphql::Credentials, services::Services, state::AppState};

/// An admin caller. The bearer token is the caller's identity session and is
/// forwarded to the backend as-is; the backend decides what it may touch.
#[derive(Clone)]
pub struct AdminSession {
    token: String,
}

impl AdminSession {
    pub fn credentials(&self) -> Credentials {
        Credentials::UserSession(self.token.clone())
    }

    pub fn services(&self, state: &AppState) -> Services {
        state.services_for(self.credentials())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let token = bearer.token().trim();
        if token.is_empty() {
            return Err(AppError::unauthorized());
        }

        Ok(AdminSession {
            token: token.to_string(),
        })
    }
}
