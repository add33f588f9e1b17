pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod providers;
pub mod session;
pub mod store;

use axum::extract::FromRef;

pub use config::Config;
pub use error::{AppError, AppResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: store::MessageStore,
    pub providers: providers::Providers,
}
