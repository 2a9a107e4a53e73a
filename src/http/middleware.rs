//! Bot authentication middleware and token signing
//!
//! A bot token is `hex(HMAC-SHA256(secret, "<match_id>:<side>"))`. It binds
//! the bearer to one side of one match, so the side is recovered from the
//! token itself.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::app::AppState;
use crate::bot::protocol::Side;

type HmacSha256 = Hmac<Sha256>;

fn token_mac(secret: &str, match_id: Uuid, side: Side) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(format!("{}:{}", match_id, side.as_str()).as_bytes());
    Ok(mac)
}

/// Sign the bot token for one side of a match
pub fn sign_bot_token(secret: &str, match_id: Uuid, side: Side) -> Result<String, AuthError> {
    let mac = token_mac(secret, match_id, side)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a bot token and return the side it was issued for
pub fn verify_bot_token(token: &str, secret: &str, match_id: Uuid) -> Result<Side, AuthError> {
    let provided = hex::decode(token.trim()).map_err(|_| AuthError::InvalidToken)?;

    for side in Side::BOTH {
        // verify_slice compares in constant time
        if token_mac(secret, match_id, side)?.verify_slice(&provided).is_ok() {
            return Ok(side);
        }
    }
    Err(AuthError::InvalidToken)
}

/// Extract token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Authentication error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        };

        (status, self.to_string()).into_response()
    }
}

/// The bot behind an authenticated request
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedBot {
    pub match_id: Uuid,
    pub side: Side,
}

/// Middleware to require a bot token for the match in the path
pub async fn require_bot_token(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;

    let token = extract_bearer_token(auth_header).ok_or(AuthError::InvalidFormat)?;

    let side = verify_bot_token(token, &state.config.bot_token_secret, match_id)?;

    // Insert into request extensions for handlers to access
    request
        .extensions_mut()
        .insert(AuthenticatedBot { match_id, side });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_recovers_side() {
        let match_id = Uuid::new_v4();
        let p1 = sign_bot_token("secret", match_id, Side::P1).unwrap();
        let p2 = sign_bot_token("secret", match_id, Side::P2).unwrap();
        assert_ne!(p1, p2);
        assert_eq!(p1.len(), 64);
        assert_eq!(verify_bot_token(&p1, "secret", match_id), Ok(Side::P1));
        assert_eq!(verify_bot_token(&p2, "secret", match_id), Ok(Side::P2));
    }

    #[test]
    fn test_token_is_bound_to_match_and_secret() {
        let match_id = Uuid::new_v4();
        let token = sign_bot_token("secret", match_id, Side::P1).unwrap();
        assert_eq!(
            verify_bot_token(&token, "secret", Uuid::new_v4()),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            verify_bot_token(&token, "other", match_id),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            verify_bot_token("not-hex", "secret", match_id),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }
}
