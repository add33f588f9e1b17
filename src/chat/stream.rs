use axum::{
    Json,
    body::Body,
    debug_handler,
    extract::{Path, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_sessions::Session;
use uuid::Uuid;

use crate::providers::{ChatTurn, ProviderId, Providers, TokenStream};
use crate::store::{MessageContent, MessageStore, NewMessage, Role};
use crate::{AppError, AppResult, AppState, guard, session};

#[derive(Deserialize)]
pub(crate) struct ChatRequest {
    provider: ProviderId,
    model: String,
    messages: Vec<IncomingMessage>,
}

#[derive(Deserialize)]
pub(crate) struct IncomingMessage {
    role: Role,
    content: MessageContent,
}

/// One chat turn: validate, authorize, persist the inbound message, then
/// relay provider tokens to the client as a chunked plain-text stream. The
/// relay task owns the provider stream and the outbound persist, so a
/// client that disconnects mid-stream still gets its assistant message
/// written to the log.
#[debug_handler(state = AppState)]
pub(crate) async fn stream_chat(
    State(store): State<MessageStore>,
    State(providers): State<Providers>,
    session: Session,
    Path(room_id): Path<Uuid>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Response> {
    // The (provider, model) pair must be in the catalog before anything
    // touches the store or the network.
    let Json(request) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    if !request.provider.supports(&request.model) {
        return Err(AppError::UnsupportedProvider {
            provider: request.provider.id().to_owned(),
            model: request.model.clone(),
        });
    }
    let Some(inbound) = request.messages.last() else {
        return Err(AppError::BadRequest("messages must not be empty".to_owned()));
    };

    let user_id = session::require_user(&session).await?;
    guard::authorize(&store, &user_id, room_id).await?;

    // Only the newest message gets persisted here; prior history rows were
    // written by their own requests.
    store
        .append_messages(
            room_id,
            &[NewMessage::new(inbound.role, inbound.content.flatten())],
        )
        .await?;

    let generator = providers.resolve(request.provider, &request.model)?;
    let turns: Vec<ChatTurn> = request
        .messages
        .iter()
        .map(|message| ChatTurn {
            role: message.role,
            content: message.content.flatten(),
        })
        .collect();
    let tokens = generator.stream(&turns).await.map_err(AppError::Upstream)?;

    // The client only holds the receiving half of a channel; the relay task
    // runs detached to completion.
    let (tx, rx) = mpsc::channel::<String>(32);
    tokio::spawn(relay_and_persist(store, room_id, tokens, tx));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>));
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

/// Forward tokens to the client while accumulating the full response, then
/// persist the assistant message. Token delivery is best-effort; the
/// outbound persist is not.
async fn relay_and_persist(
    store: MessageStore,
    room_id: Uuid,
    mut tokens: TokenStream,
    tx: mpsc::Sender<String>,
) {
    let mut full = String::new();
    let mut client_gone = false;

    while let Some(next) = tokens.next().await {
        match next {
            Ok(chunk) => {
                full.push_str(&chunk);
                if !client_gone && tx.send(chunk).await.is_err() {
                    // Client went away; keep generating for the log.
                    client_gone = true;
                    tracing::debug!(%room_id, "client disconnected mid-stream");
                }
            }
            Err(err) => {
                tracing::warn!(%room_id, error = %err, "generation truncated by upstream failure");
                break;
            }
        }
    }
    drop(tx);

    // A failure here is recoverable (the client already saw the tokens) and
    // goes to the operational log for reconciliation.
    if let Err(err) = store
        .append_messages(room_id, &[NewMessage::assistant(full)])
        .await
    {
        tracing::error!(%room_id, error = %err, "failed to persist assistant message");
    }
}
