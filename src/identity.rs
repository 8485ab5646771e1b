use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;
use uuid::Uuid;

use crate::shared::AppError;

pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// The calling player's identity, read from the `x-player-id` header.
///
/// Identity assignment happens upstream; this only parses what it's given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerIdentity(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for PlayerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PLAYER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing player identity".to_string()))?;

        let player_id = Uuid::parse_str(raw.trim()).map_err(|_| {
            warn!(header = %raw, "Malformed player identity");
            AppError::Unauthorized("Invalid player identity".to_string())
        })?;

        Ok(PlayerIdentity(player_id))
    }
}
