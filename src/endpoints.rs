//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/expenses/{id}', tests use `format_endpoint`.

#[cfg(test)]
use std::fmt::Display;

/// The route for creating an account with a username and password.
pub const SIGN_UP: &str = "/api/auth/signup";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/auth/login";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/auth/logout";
/// The route that starts signing in with Google.
pub const GOOGLE_AUTH: &str = "/api/auth/google";
/// The route Google redirects back to.
pub const GOOGLE_CALLBACK: &str = "/api/auth/google/callback";
/// The route that starts signing in with GitHub.
pub const GITHUB_AUTH: &str = "/api/auth/github";
/// The route GitHub redirects back to.
pub const GITHUB_CALLBACK: &str = "/api/auth/github/callback";

/// The route to create and list expenses.
pub const EXPENSES: &str = "/api/expenses";
/// The route to update or delete a single expense.
pub const EXPENSE: &str = "/api/expenses/{id}";
/// The route for media files.
///
/// GET takes a stored file name, DELETE takes the ID of the expense the file belongs to.
/// Both methods live on one route, so they share the parameter name.
pub const MEDIA: &str = "/api/expenses/media/{target}";
/// The route to download a report of expenses.
pub const REPORT: &str = "/api/expenses/report";

/// Replace the parameter in `endpoint_path` with `param`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/expenses/{id}', '{id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, param: impl Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        param,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::SIGN_UP);
        assert_endpoint_is_valid_uri(endpoints::LOG_IN);
        assert_endpoint_is_valid_uri(endpoints::LOG_OUT);
        assert_endpoint_is_valid_uri(endpoints::GOOGLE_AUTH);
        assert_endpoint_is_valid_uri(endpoints::GOOGLE_CALLBACK);
        assert_endpoint_is_valid_uri(endpoints::GITHUB_AUTH);
        assert_endpoint_is_valid_uri(endpoints::GITHUB_CALLBACK);
        assert_endpoint_is_valid_uri(endpoints::EXPENSES);
        assert_endpoint_is_valid_uri(endpoints::EXPENSE);
        assert_endpoint_is_valid_uri(endpoints::MEDIA);
        assert_endpoint_is_valid_uri(endpoints::REPORT);
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());

        // Parameter with single word should also work.
        let formatted_path = format_endpoint("/hello/{world}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn accepts_string_parameters() {
        let formatted_path = format_endpoint(endpoints::MEDIA, "1-123456789-receipt.png");

        assert_eq!(formatted_path, "/api/expenses/media/1-123456789-receipt.png");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", 1);

        assert_eq!(formatted_path, "/hello/1/bye");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
