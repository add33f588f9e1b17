use uuid::Uuid;

use crate::store::MessageStore;
use crate::{AppError, AppResult};

/// Authorize a principal against a room before any message read or write.
/// A missing room wins over a missing membership.
pub async fn authorize(store: &MessageStore, user_id: &str, room_id: Uuid) -> AppResult<()> {
    if !store.room_exists(room_id).await? {
        return Err(AppError::NotFound);
    }
    if !store.is_member(user_id, room_id).await? {
        return Err(AppError::Forbidden);
    }
    Ok(())
}
