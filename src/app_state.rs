//! Implements a struct that holds the state of the REST server.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};

use crate::{
    AppConfig, Environment, Error,
    auth::{JwtKeys, OAuthClients},
    db::initialize,
    media::MediaStore,
};

/// The state of the REST server.
///
/// Route handlers take the parts they need through `FromRef` sub-states.
#[derive(Clone)]
pub struct AppState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The keys for signing and verifying auth tokens, `None` if no JWT secret was configured.
    pub jwt_keys: Option<JwtKeys>,

    /// The key used for encrypting private cookies, i.e. the OAuth state cookie.
    pub cookie_key: Key,

    /// Decides whether the auth cookie is marked `Secure` and `HttpOnly`.
    pub environment: Environment,

    /// Where uploaded media files are kept.
    pub media_store: MediaStore,

    /// Where a copy of every generated report is kept.
    pub report_dir: PathBuf,

    /// The OAuth clients for the providers that have credentials.
    pub oauth_clients: OAuthClients,

    /// The HTTP client for fetching OAuth profiles.
    pub http_client: reqwest::Client,

    /// The bcrypt cost for hashing new passwords.
    pub password_cost: u32,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or an OAuth callback URL is invalid.
    pub fn new(db_connection: Connection, config: AppConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let jwt_keys = match config.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Some(JwtKeys::new(secret)),
            _ => {
                tracing::warn!("JWT_SECRET is not set, sign up and log in will fail.");
                None
            }
        };

        let cookie_key = match config.session_secret.as_deref() {
            Some(secret) if !secret.is_empty() => create_cookie_key(secret),
            _ => {
                tracing::warn!(
                    "SESSION_SECRET is not set, OAuth sign in will not survive a server restart."
                );
                Key::generate()
            }
        };

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            jwt_keys,
            cookie_key,
            environment: config.environment,
            media_store: MediaStore::new(config.upload_dir.clone()),
            report_dir: config.report_dir.clone(),
            oauth_clients: OAuthClients::new(&config)?,
            http_client: reqwest::Client::new(),
            password_cost: config.password_cost,
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::{AppConfig, AppState, Environment};

    use super::create_cookie_key;

    #[test]
    fn same_secret_gives_same_cookie_key() {
        assert_eq!(
            create_cookie_key("secret").master(),
            create_cookie_key("secret").master()
        );
        assert_ne!(
            create_cookie_key("secret").master(),
            create_cookie_key("other").master()
        );
    }

    #[test]
    fn empty_jwt_secret_counts_as_missing() {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            AppConfig {
                jwt_secret: Some(String::new()),
                environment: Environment::Production,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(state.jwt_keys.is_none());
        assert_eq!(state.environment, Environment::Production);
    }
}
