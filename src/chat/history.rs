use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::store::{Message, MessageStore};
use crate::{AppResult, guard, session};

/// Full message history for a room, ascending by creation time. A reloaded
/// client rebuilds its view from this; an empty sequence means the room has
/// not seen its first turn yet.
#[debug_handler]
pub(crate) async fn history(
    State(store): State<MessageStore>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Vec<Message>>> {
    let user_id = session::require_user(&session).await?;
    guard::authorize(&store, &user_id, room_id).await?;

    Ok(Json(store.list_messages(room_id).await?))
}
