//! Defines functions for handling user authentication with cookies.

use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{
    Environment, Error,
    auth::{
        UserID,
        middleware::AuthState,
        token::{TOKEN_DURATION, encode_token},
    },
};

/// The name of the cookie that carries the auth token.
pub(crate) const COOKIE_TOKEN: &str = "jwt";

/// Add the auth cookie carrying `token` to the cookie jar.
///
/// The cookie is only marked `Secure` and `HttpOnly` in production so that it
/// still works over plain HTTP during development.
pub(crate) fn set_auth_cookie(jar: CookieJar, token: String, environment: Environment) -> CookieJar {
    let is_production = environment.is_production();

    jar.add(
        Cookie::build((COOKIE_TOKEN, token))
            .path("/")
            .max_age(TOKEN_DURATION)
            .http_only(is_production)
            .secure(is_production)
            .same_site(SameSite::Strict),
    )
}

/// Sign a fresh token for `user_id` and add it to the cookie jar.
///
/// # Errors
///
/// Returns a:
/// - [Error::MissingJwtSecret] if the server was started without a JWT secret,
/// - [Error::TokenCreation] if the token could not be signed.
pub(crate) fn issue_auth_cookie(
    jar: CookieJar,
    user_id: UserID,
    state: &AuthState,
) -> Result<CookieJar, Error> {
    let keys = state.jwt_keys.as_ref().ok_or(Error::MissingJwtSecret)?;
    let token = encode_token(user_id, keys, OffsetDateTime::now_utc())?;

    Ok(set_auth_cookie(jar, token, state.environment))
}

/// Expire the auth cookie and remove every other cookie the client sent.
///
/// The auth cookie is always expired, even if the client did not send it.
pub(crate) fn invalidate_cookies(jar: CookieJar) -> CookieJar {
    let names: Vec<String> = jar
        .iter()
        .map(|cookie| cookie.name().to_owned())
        .filter(|name| name != COOKIE_TOKEN)
        .collect();

    let jar = jar.add(
        Cookie::build((COOKIE_TOKEN, ""))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .same_site(SameSite::Strict),
    );

    names
        .into_iter()
        .fold(jar, |jar, name| jar.remove(Cookie::build(name).path("/")))
}

#[cfg(test)]
mod cookie_tests {
    use axum::{
        http::{HeaderMap, HeaderValue, header::COOKIE},
        response::IntoResponse,
    };
    use axum_extra::extract::{
        CookieJar,
        cookie::{Cookie, SameSite},
    };
    use time::Duration;

    use crate::{
        Environment, Error,
        auth::{
            UserID,
            cookie::{COOKIE_TOKEN, invalidate_cookies, issue_auth_cookie, set_auth_cookie},
            middleware::AuthState,
            token::{JwtKeys, decode_token},
        },
    };

    fn set_cookie_headers(jar: CookieJar) -> Vec<Cookie<'static>> {
        jar.into_response()
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|value| Cookie::parse(value.to_str().unwrap().to_owned()).unwrap())
            .collect()
    }

    #[test]
    fn auth_cookie_lasts_fifteen_days() {
        let jar = set_auth_cookie(CookieJar::new(), "token".to_owned(), Environment::Development);

        let cookie = jar.get(COOKIE_TOKEN).unwrap();

        assert_eq!(cookie.value(), "token");
        assert_eq!(cookie.max_age(), Some(Duration::days(15)));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn auth_cookie_is_relaxed_in_development() {
        let jar = set_auth_cookie(CookieJar::new(), "token".to_owned(), Environment::Development);

        let cookie = jar.get(COOKIE_TOKEN).unwrap();

        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.http_only(), Some(false));
    }

    #[test]
    fn auth_cookie_is_locked_down_in_production() {
        let jar = set_auth_cookie(CookieJar::new(), "token".to_owned(), Environment::Production);

        let cookie = jar.get(COOKIE_TOKEN).unwrap();

        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[test]
    fn issue_fails_without_secret() {
        let state = AuthState {
            jwt_keys: None,
            environment: Environment::Development,
        };

        let result = issue_auth_cookie(CookieJar::new(), UserID::new(1), &state);

        assert_eq!(result.err(), Some(Error::MissingJwtSecret));
    }

    #[test]
    fn issued_cookie_carries_valid_token() {
        let keys = JwtKeys::new("averysecretsecret");
        let state = AuthState {
            jwt_keys: Some(keys.clone()),
            environment: Environment::Development,
        };

        let jar = issue_auth_cookie(CookieJar::new(), UserID::new(3), &state).unwrap();
        let token = jar.get(COOKIE_TOKEN).unwrap();

        assert_eq!(
            decode_token(token.value(), &keys).unwrap().user_id,
            UserID::new(3)
        );
    }

    #[test]
    fn invalidate_removes_every_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("jwt=token; theme=dark"));
        let jar = CookieJar::from_headers(&headers);

        let cookies = set_cookie_headers(invalidate_cookies(jar));

        assert_eq!(cookies.len(), 2);
        for cookie in cookies {
            assert_eq!(cookie.value(), "", "cookie {} was not cleared", cookie.name());
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }

    #[test]
    fn invalidate_expires_auth_cookie_even_when_absent() {
        let cookies = set_cookie_headers(invalidate_cookies(CookieJar::new()));

        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), COOKIE_TOKEN);
        assert_eq!(cookies[0].max_age(), Some(Duration::ZERO));
    }
}
