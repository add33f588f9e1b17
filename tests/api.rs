use axum::{
    Router,
    body::Body,
    extract::Path,
    http::{Request, StatusCode, header},
    routing::get,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_sessions::Session;
use uuid::Uuid;

use parlor::providers::Providers;
use parlor::store::MessageStore;
use parlor::{AppState, chat, db, session};

// The credential-issuing side lives outside the service; tests stand in for
// it with a route that drops a user id into the session.
async fn login(session: Session, Path(user): Path<String>) -> &'static str {
    session.insert(session::USER_ID, &user).await.unwrap();
    "ok"
}

async fn test_app() -> (Router, MessageStore) {
    let pool = db::connect("sqlite::memory:").await.unwrap();
    let store = MessageStore::new(pool);
    let state = AppState {
        store: store.clone(),
        providers: Providers::from_keys(Some("test-key".into()), None),
    };
    let app = Router::new()
        .route("/login/{user}", get(login))
        .nest("/chat", chat::router())
        .with_state(state)
        .layer(session::layer());
    (app, store)
}

async fn sign_in(app: &Router, user: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/login/{user}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    cookie.split(';').next().unwrap().to_owned()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_room(app: &Router, cookie: &str) -> Uuid {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

fn post_chat(room: Uuid, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/chat/{room}"))
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn fresh_room_has_an_empty_history() {
    let (app, _) = test_app().await;
    let cookie = sign_in(&app, "alice").await;
    let room = create_room(&app, &cookie).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/chat/{room}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn requests_without_a_session_are_rejected() {
    let (app, _) = test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/chat/{}", Uuid::now_v7()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_rooms_are_not_found() {
    let (app, _) = test_app().await;
    let cookie = sign_in(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/chat/{}", Uuid::now_v7()))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_members_get_403_and_nothing_is_persisted() {
    let (app, store) = test_app().await;
    let alice = sign_in(&app, "alice").await;
    let bob = sign_in(&app, "bob").await;
    let room = create_room(&app, &alice).await;

    let response = app
        .clone()
        .oneshot(post_chat(
            room,
            &bob,
            json!({
                "provider": "google",
                "model": "gemini-1.5-flash",
                "messages": [{"role": "user", "content": "hi"}],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The body was well-formed, but inbound persistence never ran.
    assert!(store.list_messages(room).await.unwrap().is_empty());
}

#[tokio::test]
async fn unenumerated_models_get_400_and_nothing_is_persisted() {
    let (app, store) = test_app().await;
    let cookie = sign_in(&app, "alice").await;
    let room = create_room(&app, &cookie).await;

    let response = app
        .clone()
        .oneshot(post_chat(
            room,
            &cookie,
            json!({
                "provider": "google",
                "model": "gemini-ultra-max",
                "messages": [{"role": "user", "content": "hi"}],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.list_messages(room).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_bodies_get_400_before_authorization() {
    let (app, _) = test_app().await;

    // No session at all: validation still answers first.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/chat/{}", Uuid::now_v7()))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn room_listing_is_scoped_to_the_caller() {
    let (app, _) = test_app().await;
    let alice = sign_in(&app, "alice").await;
    let bob = sign_in(&app, "bob").await;

    let first = create_room(&app, &alice).await;
    let second = create_room(&app, &alice).await;
    create_room(&app, &bob).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/chat")
                .header(header::COOKIE, &alice)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let ids: Vec<Uuid> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| Uuid::parse_str(entry["id"].as_str().unwrap()).unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));
}

#[tokio::test]
async fn resume_reflects_rows_written_by_the_store() {
    use parlor::store::{NewMessage, Role};

    let (app, store) = test_app().await;
    let cookie = sign_in(&app, "alice").await;
    let room = create_room(&app, &cookie).await;

    store
        .append_messages(
            room,
            &[
                NewMessage::new(Role::User, "hi"),
                NewMessage::assistant("hello!"),
            ],
        )
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/chat/{room}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let history = body.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["content"], "hi");
    assert_eq!(history[1]["role"], "assistant");
    assert_eq!(history[1]["content"], "hello!");
}
