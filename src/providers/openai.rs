//! OpenAI chat-completions streaming adapter.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ChatTurn, ProviderError, TokenStream, sse};
use crate::store::Role;

const URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

fn build_request(model: &str, turns: &[ChatTurn]) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_owned(),
        messages: turns
            .iter()
            .map(|turn| WireMessage {
                role: match turn.role {
                    Role::System => "system",
                    Role::Assistant => "assistant",
                    Role::User | Role::Data => "user",
                },
                content: turn.content.clone(),
            })
            .collect(),
        stream: true,
    }
}

fn decode_event(data: &str) -> Result<Option<String>, ProviderError> {
    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|err| ProviderError::Decode(err.to_string()))?;
    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();
    Ok((!text.is_empty()).then_some(text))
}

pub(super) async fn stream(
    client: &reqwest::Client,
    api_key: &str,
    model: &str,
    turns: &[ChatTurn],
) -> Result<TokenStream, ProviderError> {
    let response = client
        .post(URL)
        .bearer_auth(api_key)
        .json(&build_request(model, turns))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let events = sse::data_events(response.bytes_stream());
    Ok(Box::pin(events.filter_map(|event| async move {
        match event {
            Ok(data) if data == "[DONE]" => None,
            Ok(data) => decode_event(&data).transpose(),
            Err(err) => Some(Err(err)),
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_delta_content() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"},"index":0}]}"#;
        assert_eq!(decode_event(data).unwrap(), Some("Hel".to_owned()));
    }

    #[test]
    fn skips_role_only_deltas() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#;
        assert_eq!(decode_event(data).unwrap(), None);
    }

    #[test]
    fn data_role_maps_to_user() {
        let turns = [ChatTurn {
            role: Role::Data,
            content: "payload".to_owned(),
        }];
        let request = build_request("gpt-4o", &turns);
        assert_eq!(request.messages[0].role, "user");
        assert!(request.stream);
    }
}
