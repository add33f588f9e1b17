use axum::{Json, debug_handler, extract::State, response::IntoResponse};
use serde::Serialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::store::MessageStore;
use crate::{AppResult, session};

#[derive(Serialize)]
struct CreatedRoom {
    id: Uuid,
}

#[derive(Serialize)]
pub(crate) struct RoomEntry {
    id: Uuid,
}

#[debug_handler]
pub(crate) async fn create_room(
    State(store): State<MessageStore>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user_id = session::require_user(&session).await?;
    let room_id = store.create_room(&user_id).await?;
    tracing::info!(%room_id, %user_id, "created chat room");

    Ok(Json(CreatedRoom { id: room_id }))
}

#[debug_handler]
pub(crate) async fn list_rooms(
    State(store): State<MessageStore>,
    session: Session,
) -> AppResult<Json<Vec<RoomEntry>>> {
    let user_id = session::require_user(&session).await?;
    let rooms = store.rooms_for_user(&user_id).await?;

    Ok(Json(
        rooms.into_iter().map(|id| RoomEntry { id }).collect(),
    ))
}
