//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{PasswordHash, oauth::OAuthProvider},
};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
///
/// A user has a password, a linked OAuth identity, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name shown to other people.
    pub full_name: String,
    /// The unique name the user logs in with.
    pub username: String,
    /// The user's password hash, absent for users that only sign in through OAuth.
    pub password_hash: Option<PasswordHash>,
    /// The user's Google account ID.
    pub google_id: Option<String>,
    /// The user's GitHub account ID.
    pub github_id: Option<String>,
    /// When the user signed up.
    pub created_at: OffsetDateTime,
    /// When the user was last modified.
    pub updated_at: OffsetDateTime,
}

/// The data needed to insert a user, see [create_user].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub password_hash: Option<PasswordHash>,
    pub google_id: Option<String>,
    pub github_id: Option<String>,
}

/// The public view of a user that is sent back to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: UserID,
    pub full_name: String,
    pub username: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            username: user.username.clone(),
        }
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                username TEXT NOT NULL UNIQUE,
                password TEXT,
                google_id TEXT UNIQUE,
                github_id TEXT UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (password IS NOT NULL OR google_id IS NOT NULL OR github_id IS NOT NULL)
                )",
        (),
    )?;

    Ok(())
}

const USER_COLUMNS: &str =
    "id, full_name, username, password, google_id, github_id, created_at, updated_at";

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateUsername] if the username is taken,
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .prepare(&format!(
            "INSERT INTO user (full_name, username, password, google_id, github_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING {USER_COLUMNS}"
        ))?
        .query_row(
            (
                new_user.full_name,
                new_user.username,
                new_user.password_hash.as_ref().map(AsRef::as_ref),
                new_user.google_id,
                new_user.github_id,
                now,
            ),
            map_user_row,
        )
        .map_err(|error| error.into())
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
#[cfg(test)]
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user with the given `username`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the username.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE username = :username"
        ))?
        .query_row(&[(":username", username)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user linked to the account `provider_id` at `provider`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user is linked to the account.
pub fn get_user_by_oauth_id(
    provider: OAuthProvider,
    provider_id: &str,
    connection: &Connection,
) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE {} = :provider_id",
            provider.id_column()
        ))?
        .query_row(&[(":provider_id", provider_id)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
#[cfg(test)]
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: Option<String> = row.get(3)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        full_name: row.get(1)?,
        username: row.get(2)?,
        password_hash: raw_password_hash.as_deref().map(PasswordHash::new_unchecked),
        google_id: row.get(4)?,
        github_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
