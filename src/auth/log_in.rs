//! This file defines the route for handling log-in requests with a username and password.
//! The auth module handles the lower level token and cookie logic.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
};
use axum_extra::extract::CookieJar;
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::{
        AuthState,
        cookie::issue_auth_cookie,
        user::{UserResponse, get_user_by_username},
    },
    db::acquire,
};

/// The state needed to sign up or log in a user with a password.
#[derive(Clone)]
pub struct LoginState {
    /// The shared database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The keys and cookie settings for issuing auth cookies.
    pub auth: AuthState,
    /// The bcrypt cost for hashing new passwords.
    pub password_cost: u32,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            auth: AuthState::from_ref(state),
            password_cost: state.password_cost,
        }
    }
}

/// The data for logging in a user.
#[derive(Debug, Clone, Deserialize)]
pub struct LogInData {
    /// The name the user signed up with.
    #[serde(default)]
    pub username: String,
    /// The user's password in plain text.
    #[serde(default)]
    pub password: String,
}

/// Handler for log-in requests.
///
/// On success, the response carries the auth cookie and the user's public details.
/// An unknown username, a wrong password, and an account without a password all
/// produce the same error so that clients cannot probe for usernames.
///
/// # Errors
///
/// Returns a [Error::InvalidCredentials] if the username and password do not match a user.
pub async fn log_in(
    State(state): State<LoginState>,
    jar: CookieJar,
    payload: Result<Json<LogInData>, JsonRejection>,
) -> Result<(CookieJar, Json<UserResponse>), Error> {
    let Json(data) = payload?;

    let user = {
        let connection = acquire(&state.db_connection)?;
        get_user_by_username(data.username.trim(), &connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            error => error,
        })?
    };

    let Some(password_hash) = user.password_hash.as_ref() else {
        tracing::debug!("User {} tried to log in with a password but has none", user.id);
        return Err(Error::InvalidCredentials);
    };

    if !password_hash.verify(&data.password)? {
        return Err(Error::InvalidCredentials);
    }

    let jar = issue_auth_cookie(jar, user.id, &state.auth)?;
    tracing::info!("User {} logged in", user.id);

    Ok((jar, Json(UserResponse::from(&user))))
}
