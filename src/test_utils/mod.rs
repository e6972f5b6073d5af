#![allow(missing_docs)]

use axum_extra::extract::cookie::Cookie;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

use crate::{AppConfig, AppState, auth::COOKIE_TOKEN, build_router, endpoints};

/// The password every test user signs up with.
pub(crate) const TEST_PASSWORD: &str = "pw123456";

/// A test server over a fresh in-memory database.
///
/// Uploads and reports are written to a temporary directory that is deleted on drop.
pub(crate) struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    _dir: TempDir,
}

pub(crate) fn test_app() -> TestApp {
    test_app_with(|_| {})
}

/// Like [test_app], but `configure` can change the config before the state is built.
pub(crate) fn test_app_with(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().expect("Could not create temp dir");

    let mut config = AppConfig {
        jwt_secret: Some("test-jwt-secret".to_owned()),
        session_secret: Some("test-session-secret".to_owned()),
        upload_dir: dir.path().join("uploads"),
        report_dir: dir.path().join("reports"),
        password_cost: 4,
        ..Default::default()
    };
    configure(&mut config);

    let connection = Connection::open_in_memory().expect("Could not open database");
    let state = AppState::new(connection, config).expect("Could not create app state");
    let server =
        TestServer::new(build_router(state.clone())).expect("Could not create test server.");

    TestApp {
        server,
        state,
        _dir: dir,
    }
}

/// Sign up `username` with [TEST_PASSWORD] and return the auth cookie.
pub(crate) async fn sign_up_user(server: &TestServer, username: &str) -> Cookie<'static> {
    let response = server
        .post(endpoints::SIGN_UP)
        .json(&json!({
            "fullName": "Test User",
            "username": username,
            "password": TEST_PASSWORD,
            "confirmPassword": TEST_PASSWORD,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    response.cookie(COOKIE_TOKEN)
}
