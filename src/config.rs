//! Runtime configuration shared by the server binary and the tests.

use std::path::PathBuf;

use clap::ValueEnum;

/// The deployment environment the server runs in.
///
/// In production, the auth cookie is marked `Secure` and `HttpOnly`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    /// Local development over plain HTTP.
    #[default]
    Development,
    /// A deployment served over HTTPS.
    Production,
}

impl Environment {
    /// Whether cookies should be restricted to HTTPS and hidden from scripts.
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// The client ID and secret issued by an OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The public client ID.
    pub client_id: String,
    /// The client secret.
    pub client_secret: String,
}

impl OAuthCredentials {
    /// Pair up an ID and a secret, returning `None` unless both are set and non-empty.
    pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Option<Self> {
        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(Self {
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        }
    }
}

/// Everything [crate::AppState::new] needs besides the database connection.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The secret for signing auth tokens. Token endpoints fail with a server error when unset.
    pub jwt_secret: Option<String>,
    /// The secret for encrypting the OAuth state cookie. A random key is used when unset.
    pub session_secret: Option<String>,
    /// The deployment environment.
    pub environment: Environment,
    /// The directory uploaded media files are stored in.
    pub upload_dir: PathBuf,
    /// The directory generated reports are archived in.
    pub report_dir: PathBuf,
    /// The externally visible base URL, used to build OAuth callback URLs.
    pub public_url: String,
    /// Credentials for signing in with Google.
    pub google: Option<OAuthCredentials>,
    /// Credentials for signing in with GitHub.
    pub github: Option<OAuthCredentials>,
    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            session_secret: None,
            environment: Environment::Development,
            upload_dir: PathBuf::from("uploads"),
            report_dir: PathBuf::from("reports"),
            public_url: "http://localhost:5000".to_owned(),
            google: None,
            github: None,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}
