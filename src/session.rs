use time::Duration;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer, cookie::SameSite};

use crate::{AppError, AppResult};

/// Session key under which the external auth layer stores the signed-in
/// user's id.
pub const USER_ID: &str = "user_id";

/// Re-derive the principal from the session. Called on every request; no
/// authorization decision is cached across requests.
pub async fn require_user(session: &Session) -> AppResult<String> {
    session
        .get::<String>(USER_ID)
        .await?
        .ok_or(AppError::Unauthenticated)
}

pub fn layer() -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(30)))
}
