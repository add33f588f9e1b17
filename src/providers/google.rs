//! Gemini streaming adapter, speaking `streamGenerateContent` with SSE
//! framing.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ChatTurn, ProviderError, TokenStream, sse};
use crate::store::Role;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// Gemini only knows "user" and "model" turns; system turns travel in the
// dedicated systemInstruction field and data turns go through as user text.
fn build_request(turns: &[ChatTurn]) -> GenerateRequest {
    let mut system = Vec::new();
    let mut contents = Vec::new();
    for turn in turns {
        let text = TextPart {
            text: turn.content.clone(),
        };
        match turn.role {
            Role::System => system.push(text),
            Role::Assistant => contents.push(Content {
                role: Some("model"),
                parts: vec![text],
            }),
            Role::User | Role::Data => contents.push(Content {
                role: Some("user"),
                parts: vec![text],
            }),
        }
    }

    GenerateRequest {
        contents,
        system_instruction: (!system.is_empty()).then(|| Content {
            role: None,
            parts: system,
        }),
    }
}

fn decode_event(data: &str) -> Result<Option<String>, ProviderError> {
    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|err| ProviderError::Decode(err.to_string()))?;
    let text: String = chunk
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect();
    Ok((!text.is_empty()).then_some(text))
}

pub(super) async fn stream(
    client: &reqwest::Client,
    api_key: &str,
    model: &str,
    turns: &[ChatTurn],
) -> Result<TokenStream, ProviderError> {
    let url = format!("{BASE_URL}/{model}:streamGenerateContent?alt=sse");
    let response = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(&build_request(turns))
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
            Ok(data) => decode_event(&data).transpose(),
            Err(err) => Some(Err(err)),
        }
    })))
}
