//! Creates and verifies the signed tokens that identify a logged in user.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, auth::UserID};

/// How long a token, and the cookie that carries it, stays valid.
pub const TOKEN_DURATION: Duration = Duration::days(15);

/// The keys for signing and verifying tokens, derived from one shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    /// Derive the HMAC keys from `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// The claims carried by an auth token.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// The ID of the user the token was issued to.
    #[serde(rename = "userID")]
    pub user_id: UserID,
    /// When the token was issued, as a Unix timestamp.
    pub iat: i64,
    /// When the token expires, as a Unix timestamp.
    pub exp: i64,
}

/// Sign a token for `user_id` that is valid for [TOKEN_DURATION] from `issued_at`.
///
/// # Errors
///
/// Returns a [Error::TokenCreation] if the token could not be signed.
pub fn encode_token(
    user_id: UserID,
    keys: &JwtKeys,
    issued_at: OffsetDateTime,
) -> Result<String, Error> {
    let claims = Claims {
        user_id,
        iat: issued_at.unix_timestamp(),
        exp: (issued_at + TOKEN_DURATION).unix_timestamp(),
    };

    encode(&Header::default(), &claims, &keys.encoding_key)
        .map_err(|error| Error::TokenCreation(error.to_string()))
}

/// Verify the signature and expiry of `token` and return its claims.
///
/// # Errors
///
/// Returns a [Error::InvalidToken] if the token is malformed, was signed with another secret, or has expired.
pub fn decode_token(token: &str, keys: &JwtKeys) -> Result<Claims, Error> {
    decode::<Claims>(token, &keys.decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|error| {
            tracing::debug!("rejected auth token: {error}");
            Error::InvalidToken
        })
}
