//! Handles requests to create a local account with a username and password.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    Error, FieldError,
    auth::{
        LoginState, PasswordHash, ValidatedPassword,
        cookie::issue_auth_cookie,
        user::{NewUser, UserResponse, create_user},
    },
    db::acquire,
};

/// The data for creating a local account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpData {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl SignUpData {
    fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if self.full_name.trim().is_empty() {
            errors.push(FieldError::new("fullName", "Full name is required"));
        }
        if self.username.trim().is_empty() {
            errors.push(FieldError::new("username", "Username is required"));
        }
        if self.password.trim().is_empty() {
            errors.push(FieldError::new("password", "Password is required"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }
}

/// Handler for sign-up requests.
///
/// Creates the user, logs them in by setting the auth cookie, and echoes the
/// user's public details with the status code 201.
///
/// # Errors
///
/// Returns a:
/// - [Error::Validation] if a field is empty,
/// - [Error::PasswordMismatch] if the confirmation password differs,
/// - [Error::DuplicateUsername] if the username is taken.
pub async fn sign_up(
    State(state): State<LoginState>,
    jar: CookieJar,
    payload: Result<Json<SignUpData>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<UserResponse>), Error> {
    let Json(data) = payload?;
    data.validate()?;

    if data.password != data.confirm_password {
        return Err(Error::PasswordMismatch);
    }

    // No point creating an account the user cannot be logged in to.
    if state.auth.jwt_keys.is_none() {
        return Err(Error::MissingJwtSecret);
    }

    let password_hash = PasswordHash::new(ValidatedPassword::new(&data.password)?, state.password_cost)?;

    let user = {
        let connection = acquire(&state.db_connection)?;
        create_user(
            NewUser {
                full_name: data.full_name.trim().to_owned(),
                username: data.username.trim().to_owned(),
                password_hash: Some(password_hash),
                ..Default::default()
            },
            &connection,
        )?
    };

    let jar = issue_auth_cookie(jar, user.id, &state.auth)?;
    tracing::info!("Created user {} ({})", user.id, user.username);

    Ok((StatusCode::CREATED, jar, Json(UserResponse::from(&user))))
}

#[cfg(test)]
mod sign_up_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        auth::{cookie::COOKIE_TOKEN, count_users},
        endpoints,
        test_utils::{TEST_PASSWORD, test_app, test_app_with},
    };

    fn sign_up_body(username: &str, confirm_password: &str) -> Value {
        json!({
            "fullName": "Alice Smith",
            "username": username,
            "password": TEST_PASSWORD,
            "confirmPassword": confirm_password,
        })
    }

    #[tokio::test]
    async fn sign_up_creates_user_and_logs_in() {
        let app = test_app();

        let response = app
            .server
            .post(endpoints::SIGN_UP)
            .json(&sign_up_body("ab1", TEST_PASSWORD))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["fullName"], "Alice Smith");
        assert_eq!(body["username"], "ab1");
        assert!(body["_id"].is_i64());
        assert!(body.get("password").is_none());
        assert!(!response.cookie(COOKIE_TOKEN).value().is_empty());
    }

    #[tokio::test]
    async fn sign_up_fails_when_passwords_differ() {
        let app = test_app();

        let response = app
            .server
            .post(endpoints::SIGN_UP)
            .json(&sign_up_body("ab1", "somethingelse"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Passwords don't match!" }));
        let connection = app.state.db_connection.lock().unwrap();
        assert_eq!(count_users(&connection).unwrap(), 0);
    }

    #[tokio::test]
    async fn sign_up_fails_on_duplicate_username() {
        let app = test_app();
        app.server
            .post(endpoints::SIGN_UP)
            .json(&sign_up_body("ab1", TEST_PASSWORD))
            .await
            .assert_status(StatusCode::CREATED);

        let response = app
            .server
            .post(endpoints::SIGN_UP)
            .json(&sign_up_body("ab1", TEST_PASSWORD))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Username already exists!" }));
        let connection = app.state.db_connection.lock().unwrap();
        assert_eq!(count_users(&connection).unwrap(), 1);
    }

    #[tokio::test]
    async fn sign_up_reports_missing_fields() {
        let app = test_app();

        let response = app
            .server
            .post(endpoints::SIGN_UP)
            .json(&json!({ "password": "", "confirmPassword": "" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|error| error["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, ["fullName", "username", "password"]);
    }

    #[tokio::test]
    async fn sign_up_without_jwt_secret_is_a_server_error() {
        let app = test_app_with(|config| config.jwt_secret = None);

        let response = app
            .server
            .post(endpoints::SIGN_UP)
            .json(&sign_up_body("ab1", TEST_PASSWORD))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&json!({ "error": "Internal Server Error: Missing JWT_SECRET" }));
    }
}
