//! Sign in with Google or GitHub using the OAuth 2.0 authorization code flow.
//!
//! The flow has two legs. The start endpoint redirects the browser to the provider with a
//! random CSRF state that is also stored in an encrypted cookie. The provider then redirects
//! back to the callback endpoint, which checks the state, exchanges the code for an access
//! token, fetches the user's profile and logs in the linked user, creating them if needed.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar, PrivateCookieJar,
    cookie::{Cookie, Key, SameSite},
};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient, reqwest::async_http_client,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use time::Duration;

use crate::{
    AppConfig, AppState, Error, OAuthCredentials,
    auth::{
        AuthState, User,
        cookie::issue_auth_cookie,
        user::{NewUser, UserResponse, create_user, get_user_by_oauth_id},
    },
    db::acquire,
    endpoints,
};

/// The name of the private cookie holding the CSRF state between the two legs of the flow.
pub(crate) const COOKIE_OAUTH_STATE: &str = "oauth_state";

/// How long the user has to complete the provider's consent screen.
const OAUTH_STATE_DURATION: Duration = Duration::minutes(10);

/// The OAuth providers users can sign in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    GitHub,
}

impl OAuthProvider {
    /// The provider's name as shown to users.
    pub fn display_name(self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::GitHub => "GitHub",
        }
    }

    /// The lowercase name used in usernames and log messages.
    fn slug(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::GitHub => "github",
        }
    }

    /// The user table column that stores the provider's account ID.
    pub(crate) fn id_column(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google_id",
            OAuthProvider::GitHub => "github_id",
        }
    }

    fn auth_url(self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            OAuthProvider::GitHub => "https://github.com/login/oauth/authorize",
        }
    }

    fn token_url(self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://oauth2.googleapis.com/token",
            OAuthProvider::GitHub => "https://github.com/login/oauth/access_token",
        }
    }

    fn profile_url(self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://www.googleapis.com/oauth2/v2/userinfo",
            OAuthProvider::GitHub => "https://api.github.com/user",
        }
    }

    fn scopes(self) -> &'static [&'static str] {
        match self {
            OAuthProvider::Google => &["profile", "email"],
            OAuthProvider::GitHub => &["read:user"],
        }
    }

    fn callback_path(self) -> &'static str {
        match self {
            OAuthProvider::Google => endpoints::GOOGLE_CALLBACK,
            OAuthProvider::GitHub => endpoints::GITHUB_CALLBACK,
        }
    }
}

/// The configured OAuth clients, `None` for providers without credentials.
#[derive(Clone, Default)]
pub struct OAuthClients {
    google: Option<BasicClient>,
    github: Option<BasicClient>,
}

impl OAuthClients {
    /// Build a client for each provider that has credentials in `config`.
    ///
    /// # Errors
    ///
    /// Returns a [Error::OAuthFailed] if the public URL does not form a valid callback URL.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        let build = |provider: OAuthProvider, credentials: &Option<OAuthCredentials>| {
            credentials
                .as_ref()
                .map(|credentials| build_client(provider, credentials, &config.public_url))
                .transpose()
        };

        Ok(Self {
            google: build(OAuthProvider::Google, &config.google)?,
            github: build(OAuthProvider::GitHub, &config.github)?,
        })
    }

    fn get(&self, provider: OAuthProvider) -> Result<&BasicClient, Error> {
        let client = match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::GitHub => self.github.as_ref(),
        };

        client.ok_or(Error::OAuthNotConfigured(provider.display_name()))
    }
}

fn build_client(
    provider: OAuthProvider,
    credentials: &OAuthCredentials,
    public_url: &str,
) -> Result<BasicClient, Error> {
    let invalid_url = |error: oauth2::url::ParseError| {
        Error::OAuthFailed(format!("invalid {} URL: {error}", provider.slug()))
    };

    let redirect_url = format!(
        "{}{}",
        public_url.trim_end_matches('/'),
        provider.callback_path()
    );

    Ok(BasicClient::new(
        ClientId::new(credentials.client_id.clone()),
        Some(ClientSecret::new(credentials.client_secret.clone())),
        AuthUrl::new(provider.auth_url().to_owned()).map_err(invalid_url)?,
        Some(TokenUrl::new(provider.token_url().to_owned()).map_err(invalid_url)?),
    )
    .set_redirect_uri(RedirectUrl::new(redirect_url).map_err(invalid_url)?))
}

/// The state needed for both legs of the OAuth flow.
#[derive(Clone)]
pub struct OAuthState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub auth: AuthState,
    pub cookie_key: Key,
    pub clients: OAuthClients,
    pub http_client: reqwest::Client,
}

impl FromRef<AppState> for OAuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            auth: AuthState::from_ref(state),
            cookie_key: state.cookie_key.clone(),
            clients: state.oauth_clients.clone(),
            http_client: state.http_client.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<OAuthState> for Key {
    fn from_ref(state: &OAuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// The query parameters the provider appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// The parts of a provider profile needed to find or create a user.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    /// The account ID at the provider.
    pub provider_id: String,
    pub full_name: String,
    /// The preferred username, may already be taken by another user.
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    id: String,
    name: Option<String>,
    email: Option<String>,
}

impl From<GoogleProfile> for OAuthProfile {
    fn from(profile: GoogleProfile) -> Self {
        let username = profile
            .email
            .clone()
            .unwrap_or_else(|| format!("google-{}", profile.id));

        Self {
            full_name: profile.name.unwrap_or_else(|| username.clone()),
            username,
            provider_id: profile.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubProfile {
    id: u64,
    login: String,
    name: Option<String>,
}

impl From<GitHubProfile> for OAuthProfile {
    fn from(profile: GitHubProfile) -> Self {
        Self {
            provider_id: profile.id.to_string(),
            full_name: profile.name.unwrap_or_else(|| profile.login.clone()),
            username: profile.login,
        }
    }
}

/// Redirect the browser to Google's consent screen.
pub async fn start_google_auth(
    State(state): State<OAuthState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), Error> {
    start_auth(OAuthProvider::Google, &state, jar)
}

/// Redirect the browser to GitHub's consent screen.
pub async fn start_github_auth(
    State(state): State<OAuthState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), Error> {
    start_auth(OAuthProvider::GitHub, &state, jar)
}

/// Complete a Google sign in.
pub async fn google_callback(
    State(state): State<OAuthState>,
    jar: PrivateCookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, Error> {
    complete_auth(OAuthProvider::Google, state, jar, query).await
}

/// Complete a GitHub sign in.
pub async fn github_callback(
    State(state): State<OAuthState>,
    jar: PrivateCookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, Error> {
    complete_auth(OAuthProvider::GitHub, state, jar, query).await
}

fn start_auth(
    provider: OAuthProvider,
    state: &OAuthState,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), Error> {
    let client = state.clients.get(provider)?;

    let request = provider
        .scopes()
        .iter()
        .fold(client.authorize_url(CsrfToken::new_random), |request, scope| {
            request.add_scope(Scope::new((*scope).to_owned()))
        });
    let (authorize_url, csrf_state) = request.url();

    // Lax so that the cookie survives the top-level redirect back from the provider.
    let jar = jar.add(
        Cookie::build((COOKIE_OAUTH_STATE, csrf_state.secret().to_owned()))
            .path("/")
            .max_age(OAUTH_STATE_DURATION)
            .http_only(true)
            .secure(state.auth.environment.is_production())
            .same_site(SameSite::Lax),
    );

    Ok((jar, Redirect::to(authorize_url.as_str())))
}

async fn complete_auth(
    provider: OAuthProvider,
    state: OAuthState,
    jar: PrivateCookieJar,
    query: CallbackQuery,
) -> Result<Response, Error> {
    let client = state.clients.get(provider)?;

    let expected_state = jar.get(COOKIE_OAUTH_STATE).map(|cookie| cookie.value().to_owned());
    let jar = jar.remove(Cookie::build(COOKIE_OAUTH_STATE).path("/"));

    if let Some(error) = query.error {
        return Err(Error::OAuthFailed(format!(
            "{} returned an error: {error}",
            provider.slug()
        )));
    }

    match (query.state, expected_state) {
        (Some(received), Some(expected)) if received == expected => {}
        _ => return Err(Error::OAuthFailed("CSRF state mismatch".to_owned())),
    }

    let code = query
        .code
        .ok_or_else(|| Error::OAuthFailed("missing authorization code".to_owned()))?;

    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(async_http_client)
        .await
        .map_err(|error| Error::OAuthFailed(format!("code exchange failed: {error}")))?;

    let profile = fetch_profile(provider, &state.http_client, token.access_token().secret()).await?;

    let user = {
        let connection = acquire(&state.db_connection)?;
        find_or_create_oauth_user(provider, &profile, &connection)?
    };

    let auth_jar = issue_auth_cookie(CookieJar::new(), user.id, &state.auth)?;
    tracing::info!("User {} signed in with {}", user.id, provider.display_name());

    Ok((
        jar,
        auth_jar,
        Json(json!({
            "message": format!("{} Authentication Successful", provider.display_name()),
            "user": UserResponse::from(&user),
        })),
    )
        .into_response())
}

async fn fetch_profile(
    provider: OAuthProvider,
    http_client: &reqwest::Client,
    access_token: &str,
) -> Result<OAuthProfile, Error> {
    let fetch_failed =
        |error: reqwest::Error| Error::OAuthFailed(format!("profile request failed: {error}"));

    // GitHub rejects API requests without a user agent.
    let response = http_client
        .get(provider.profile_url())
        .bearer_auth(access_token)
        .header(reqwest::header::USER_AGENT, "cashtrack")
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(fetch_failed)?;

    let profile = match provider {
        OAuthProvider::Google => response
            .json::<GoogleProfile>()
            .await
            .map_err(fetch_failed)?
            .into(),
        OAuthProvider::GitHub => response
            .json::<GitHubProfile>()
            .await
            .map_err(fetch_failed)?
            .into(),
    };

    Ok(profile)
}

/// Get the user linked to the provider account in `profile`, creating one on first sign in.
///
/// If the profile's username is taken, the provider name and account ID are appended to it.
pub(crate) fn find_or_create_oauth_user(
    provider: OAuthProvider,
    profile: &OAuthProfile,
    connection: &Connection,
) -> Result<User, Error> {
    match get_user_by_oauth_id(provider, &profile.provider_id, connection) {
        Ok(user) => return Ok(user),
        Err(Error::NotFound) => {}
        Err(error) => return Err(error),
    }

    let new_user = |username: String| {
        let provider_id = Some(profile.provider_id.clone());
        let (google_id, github_id) = match provider {
            OAuthProvider::Google => (provider_id, None),
            OAuthProvider::GitHub => (None, provider_id),
        };

        NewUser {
            full_name: profile.full_name.clone(),
            username,
            password_hash: None,
            google_id,
            github_id,
        }
    };

    match create_user(new_user(profile.username.clone()), connection) {
        Err(Error::DuplicateUsername) => {
            let username = format!("{}-{}", profile.username, profile.provider_id);
            tracing::info!(
                "Username {} is taken, using {username} for the new {} user",
                profile.username,
                provider.display_name()
            );
            create_user(new_user(username.clone()), connection).map_err(|error| match error {
                Error::DuplicateUsername => Error::OAuthFailed(format!(
                    "usernames {} and {username} are both taken",
                    profile.username
                )),
                error => error,
            })
        }
        result => result,
    }
}
