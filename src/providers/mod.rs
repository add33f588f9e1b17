mod google;
mod openai;
mod sse;

use std::fmt;

use futures_util::stream::BoxStream;
use serde::Deserialize;

use crate::config::Config;
use crate::store::Role;
use crate::{AppError, AppResult};

/// A finite, non-restartable sequence of generated text chunks.
pub type TokenStream = BoxStream<'static, Result<String, ProviderError>>;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} api key not configured")]
    NotConfigured(&'static str),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("could not decode provider event: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Google,
    Openai,
}

impl ProviderId {
    pub fn id(self) -> &'static str {
        match self {
            ProviderId::Google => "google",
            ProviderId::Openai => "openai",
        }
    }

    /// The closed set of models served through this provider.
    pub fn models(self) -> &'static [&'static str] {
        match self {
            ProviderId::Google => &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-2.0-flash"],
            ProviderId::Openai => &["gpt-4o", "gpt-4o-mini"],
        }
    }

    pub fn supports(self, model: &str) -> bool {
        self.models().contains(&model)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// One turn of flattened chat history handed to a generation backend.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Holds the shared HTTP client and whatever provider keys were configured.
#[derive(Clone)]
pub struct Providers {
    client: reqwest::Client,
    google_api_key: Option<String>,
    openai_api_key: Option<String>,
}

impl Providers {
    pub fn new(config: &Config) -> Self {
        Self::from_keys(
            config.google_api_key.clone(),
            config.openai_api_key.clone(),
        )
    }

    pub fn from_keys(google_api_key: Option<String>, openai_api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            google_api_key,
            openai_api_key,
        }
    }

    /// Validate the (provider, model) pair against the closed catalog and
    /// hand back a generator for it. No network is touched here; an invalid
    /// pair fails before any request could be made.
    pub fn resolve(&self, provider: ProviderId, model: &str) -> AppResult<Generator> {
        if !provider.supports(model) {
            return Err(AppError::UnsupportedProvider {
                provider: provider.id().to_owned(),
                model: model.to_owned(),
            });
        }

        let api_key = match provider {
            ProviderId::Google => self.google_api_key.clone(),
            ProviderId::Openai => self.openai_api_key.clone(),
        }
        .ok_or(ProviderError::NotConfigured(provider.id()))?;

        Ok(Generator {
            provider,
            model: model.to_owned(),
            api_key,
            client: self.client.clone(),
        })
    }
}

/// A resolved (provider, model) pair. Each `stream` call opens one fresh
/// generation; streams terminate when the backend signals completion and
/// cannot be restarted.
#[derive(Debug)]
pub struct Generator {
    provider: ProviderId,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl Generator {
    pub async fn stream(&self, turns: &[ChatTurn]) -> Result<TokenStream, ProviderError> {
        match self.provider {
            ProviderId::Google => {
                google::stream(&self.client, &self.api_key, &self.model, turns).await
            }
            ProviderId::Openai => {
                openai::stream(&self.client, &self.api_key, &self.model, turns).await
            }
        }
    }
}
