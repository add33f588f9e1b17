use futures_util::{Stream, StreamExt, pin_mut};

use super::ProviderError;

/// Decode the `data:` payload lines out of a server-sent-event byte stream.
/// Other SSE fields and blank event separators are ignored; each data line
/// becomes one item. Bytes are only converted to text once a full line is
/// buffered, so multi-byte sequences split across network chunks survive.
pub(super) fn data_events<S, B, E>(body: S) -> impl Stream<Item = Result<String, ProviderError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ProviderError>,
{
    async_stream::try_stream! {
        let mut buf: Vec<u8> = Vec::new();
        pin_mut!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<ProviderError>::into)?;
            buf.extend_from_slice(chunk.as_ref());
            while let Some(end) = buf.iter().position(|&byte| byte == b'\n') {
                let line: Vec<u8> = buf.drain(..=end).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim_end_matches(['\n', '\r']);
                if let Some(data) = line.strip_prefix("data:") {
                    yield data.trim_start().to_owned();
                }
            }
        }
    }
}
