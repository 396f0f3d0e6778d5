//! Conversion of vendor delta streams into cumulative provider streams.
//!
//! Vendors send increments; consumers of [`ProviderStream`] expect every
//! event to carry the full answer so far plus an explicit terminal event.

use futures_util::{Stream, StreamExt};

use colloquy_types::llm::{ProviderError, StreamEvent};

use super::provider::ProviderStream;

/// Fold a stream of text deltas into cumulative events.
///
/// Empty deltas are skipped so content length strictly grows between
/// `Partial` events. A delta error ends the stream with `Truncated`
/// carrying whatever was received; a clean end yields `Completed`.
pub fn accumulate<S>(deltas: S) -> ProviderStream
where
    S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut deltas = std::pin::pin!(deltas);
        let mut content = String::new();

        while let Some(item) = deltas.next().await {
            match item {
                Ok(delta) => {
                    if delta.is_empty() {
                        continue;
                    }
                    content.push_str(&delta);
                    yield StreamEvent::Partial { content: content.clone() };
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        received_bytes = content.len(),
                        "provider stream interrupted"
                    );
                    yield StreamEvent::Truncated {
                        content,
                        reason: err.to_string(),
                    };
                    return;
                }
            }
        }

        yield StreamEvent::Completed { content };
    })
}
