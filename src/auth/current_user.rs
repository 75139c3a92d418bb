//! Extractor for the authenticated user.
//!
//! Credentials are tried in priority order: the JWT session cookie (browser
//! clients), then an `Authorization: Bearer <jwt>` header (programmatic
//! clients). Either way the token decodes to the same [`CurrentUser`].

use crate::{
    api::models::users::CurrentUser,
    auth::session,
    errors::{Error, Result},
    AppState,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::instrument;

/// Extract user from JWT session cookie if present and valid
/// Returns:
/// - None: No JWT cookie present
/// - Some(Ok(user)): Valid JWT found and verified
/// - Some(Err(error)): Cookie header present but unreadable
#[instrument(skip(parts, config))]
fn try_cookie_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }))
        }
    };
    let cookie_name = &config.auth.native.session.cookie_name;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=') {
            if name == cookie_name {
                match session::verify_session_token(value, config) {
                    Ok(user) => return Some(Ok(user)),
                    Err(_) => {
                        // Expired/invalid cookie tokens are expected; fall through
                        continue;
                    }
                }
            }
        }
    }
    None
}

/// Extract user from a bearer JWT if present and valid
fn try_bearer_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }))
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?;
    Some(session::verify_session_token(token, config))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(result) = try_cookie_auth(parts, &state.config) {
            return result;
        }
        if let Some(result) = try_bearer_auth(parts, &state.config) {
            return result;
        }
        Err(Error::Unauthenticated { message: None })
    }
}

/// Extract the user if credentials are present, without requiring them.
/// Used by the analytics ingest endpoint to attribute events when possible.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = match try_cookie_auth(parts, &state.config).or_else(|| try_bearer_auth(parts, &state.config)) {
            Some(Ok(user)) => Some(user),
            // Invalid credentials on an optional-auth route degrade to anonymous
            Some(Err(_)) | None => None,
        };
        Ok(MaybeUser(user))
    }
}
