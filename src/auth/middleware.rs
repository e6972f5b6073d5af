//! Authentication middleware that validates the auth token cookie.

use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::{
    AppState, Environment, Error,
    auth::{
        cookie::COOKIE_TOKEN,
        token::{JwtKeys, decode_token},
    },
};

/// The state needed for the auth middleware and for issuing auth cookies.
#[derive(Clone)]
pub struct AuthState {
    /// The keys for signing and verifying tokens, `None` if no JWT secret was configured.
    pub jwt_keys: Option<JwtKeys>,
    /// Decides whether the auth cookie is marked `Secure` and `HttpOnly`.
    pub environment: Environment,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            jwt_keys: state.jwt_keys.clone(),
            environment: state.environment,
        }
    }
}

/// Middleware function that checks for a valid auth token cookie.
/// The user ID is placed into the request and then the request executed normally if the token
/// is valid, otherwise a 401 response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(
    State(state): State<AuthState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = jar.get(COOKIE_TOKEN) else {
        return Error::MissingToken.into_response();
    };

    let Some(keys) = state.jwt_keys.as_ref() else {
        return Error::MissingJwtSecret.into_response();
    };

    match decode_token(token.value(), keys) {
        Ok(claims) => {
            request.extensions_mut().insert(claims.user_id);
            next.run(request).await
        }
        Err(error) => error.into_response(),
    }
}
