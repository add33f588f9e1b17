use anyhow::bail;

/// Process configuration, read once at startup from the environment (with
/// `.env` support via dotenv).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Prefix the chat routes are nested under. Must start with '/'.
    pub http_prefix: String,
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key).unwrap_or_else(|_| default.to_owned())
}

fn optional_var(key: &str) -> Option<String> {
    dotenv::var(key).ok().filter(|value| !value.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let config = Config {
            database_url: var_or("DATABASE_URL", "sqlite:parlor.db"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            http_prefix: var_or("HTTP_PREFIX", "/chat"),
            google_api_key: optional_var("GOOGLE_API_KEY"),
            openai_api_key: optional_var("OPENAI_API_KEY"),
        };

        if !config.http_prefix.starts_with('/') {
            bail!("HTTP_PREFIX must start with '/', got '{}'", config.http_prefix);
        }

        Ok(config)
    }
}
