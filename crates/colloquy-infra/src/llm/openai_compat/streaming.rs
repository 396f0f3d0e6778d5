//! OpenAI SSE stream to [`ProviderStream`] adapter.
//!
//! async-openai yields one chunk per SSE event, each carrying a text delta.
//! The deltas are folded into cumulative events by
//! [`colloquy_core::llm::cumulative::accumulate`]. The first item is awaited
//! before the stream is handed out so that a rejected request surfaces as an
//! `open_stream` error rather than as an empty truncated answer.

use async_openai::types::chat::{ChatCompletionResponseStream, CreateChatCompletionStreamResponse};
use futures_util::{Stream, StreamExt};

use colloquy_core::llm::cumulative::accumulate;
use colloquy_core::llm::provider::ProviderStream;
use colloquy_types::llm::ProviderError;

use super::map_openai_error;

/// Concatenated text of every choice in one chunk.
///
/// Role-only and usage-only chunks produce an empty string.
pub(crate) fn chunk_text(chunk: &CreateChatCompletionStreamResponse) -> String {
    chunk
        .choices
        .iter()
        .filter_map(|choice| choice.delta.content.as_deref())
        .collect()
}

/// Map an async-openai [`ChatCompletionResponseStream`] to text deltas.
pub fn map_openai_stream(
    stream: ChatCompletionResponseStream,
) -> impl Stream<Item = Result<String, ProviderError>> + Send + 'static {
    stream.map(|result| result.map(|chunk| chunk_text(&chunk)).map_err(map_openai_error))
}

/// Wait for the first delta, then hand out the cumulative stream.
///
/// An error before any delta is returned directly. A stream that ends
/// without any delta yields a single empty `Completed`.
pub async fn open_cumulative<S>(deltas: S) -> Result<ProviderStream, ProviderError>
where
    S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
{
    let mut deltas = Box::pin(deltas);
    match deltas.next().await {
        Some(Err(err)) => Err(err),
        Some(Ok(first)) => {
            let replay = futures_util::stream::once(async move { Ok(first) });
            Ok(accumulate(replay.chain(deltas)))
        }
        None => Ok(accumulate(futures_util::stream::empty())),
    }
}
