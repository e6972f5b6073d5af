use axum::Json;
use axum_extra::extract::CookieJar;
use serde_json::{Value, json};

use crate::auth::cookie::invalidate_cookies;

/// Invalidate the auth cookie and clear every other cookie the client holds.
///
/// Succeeds whether or not the client was logged in.
pub async fn log_out(jar: CookieJar) -> (CookieJar, Json<Value>) {
    (
        invalidate_cookies(jar),
        Json(json!({ "message": "Logged out successfully" })),
    )
}
