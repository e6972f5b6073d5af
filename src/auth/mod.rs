//! User accounts, password and OAuth sign in, and the token cookie that keeps users logged in.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
pub(crate) mod oauth;
mod password;
mod sign_up;
mod token;
mod user;

pub use log_in::{LoginState, log_in};
pub use log_out::log_out;
pub use middleware::{AuthState, auth_guard};
pub use oauth::{
    OAuthClients, github_callback, google_callback, start_github_auth,
    start_google_auth,
};
pub use password::{PasswordHash, ValidatedPassword};
pub use sign_up::sign_up;
pub use token::JwtKeys;
pub use user::{User, UserID, create_user_table};

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
#[cfg(test)]
pub(crate) use user::{NewUser, count_users, create_user, get_user_by_username};
