use axum::http::StatusCode;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorMessage, HttpError};

/// Claims minted by the identity service. This service only verifies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Returns the token's subject, the user id.
pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<String, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => Ok(token.claims.sub),
        Err(_) => Err(HttpError::new(
            ErrorMessage::InvalidToken.to_string(),
            StatusCode::UNAUTHORIZED,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(sub: &str, secret: &[u8], minutes: i64) -> String {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: sub.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + Duration::minutes(minutes)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn tokens_decode_back_to_the_subject() {
        let user_id = uuid::Uuid::new_v4().to_string();
        let secret = b"test-secret";

        let subject = decode_token(mint(&user_id, secret, 60), secret).unwrap();
        assert_eq!(subject, user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("some-user", b"right-secret", 60);
        assert!(decode_token(token, b"wrong-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint("some-user", b"test-secret", -120);
        assert!(decode_token(token, b"test-secret").is_err());
    }
}
