//! Bearer token check for the project publish endpoint.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::AppState;

/// A caller allowed to publish project events.
///
/// When no `PUBLISH_TOKEN` is configured every caller is accepted.
#[derive(Debug, Clone, Copy)]
pub struct PublishCaller {
    pub authenticated: bool,
}

impl FromRequestParts<AppState> for PublishCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.publish_token.as_deref() else {
            return Ok(PublishCaller { authenticated: false });
        };

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        if !tokens_match(token.as_bytes(), expected.as_bytes()) {
            return Err(ApiError::unauthorized("Invalid publish token"));
        }

        Ok(PublishCaller { authenticated: true })
    }
}

/// Length-checked comparison that does not stop at the first differing byte.
fn tokens_match(given: &[u8], expected: &[u8]) -> bool {
    given.len() == expected.len() && given.iter().zip(expected).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use super::tokens_match;

    #[test]
    fn compares_whole_token() {
        assert!(tokens_match(b"s3cret", b"s3cret"));
        assert!(!tokens_match(b"s3cres", b"s3cret"));
        assert!(!tokens_match(b"s3cre", b"s3cret"));
        assert!(!tokens_match(b"", b"s3cret"));
    }
}
