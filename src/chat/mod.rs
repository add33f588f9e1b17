mod history;
mod new;
mod stream;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(new::list_rooms).post(new::create_room))
        .route("/{id}", get(history::history).post(stream::stream_chat))
}
