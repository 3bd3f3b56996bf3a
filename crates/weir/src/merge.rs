//! Fan-in: merge several result streams into one.

use crate::{
    completion::{Completion, CompletionGuard},
    sink::{self, ResultSink, ResultStream},
};
use futures::{Stream, StreamExt};

/// Forwards every value of every source into a single stream.
///
/// One forwarding task is spawned per source. The merged stream closes
/// exactly once, after every source has ended (or after the merged stream
/// itself was dropped and the forwarders gave up). With no sources the merged
/// stream is closed from the start.
///
/// Values of one source keep their relative order. Values of different
/// sources interleave in no particular order.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime.
pub fn merge<I, S>(sources: I, capacity: usize) -> ResultStream<S::Item>
where
    I: IntoIterator<Item = S>,
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    let sources: Vec<S> = sources.into_iter().collect();
    let (sink, stream) = sink::bounded(capacity);
    let completion = Completion::new(sources.len(), sink);

    #[cfg(feature = "tracing")]
    tracing::debug!("Merging {} streams", sources.len());

    for (source_id, source) in sources.into_iter().enumerate() {
        tokio::spawn(forward(
            source_id,
            source,
            completion.writer(),
            completion.guard(),
        ));
    }
    completion.mark_launched();

    stream
}

async fn forward<S>(
    _source_id: usize,
    source: S,
    sink: ResultSink<S::Item>,
    _guard: CompletionGuard<S::Item>,
) where
    S: Stream,
{
    let mut source = core::pin::pin!(source);

    while let Some(value) = source.next().await {
        if sink.send(value).await.is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Forwarder {_source_id} exiting, merged stream dropped");
            return;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Forwarder {_source_id} finished");
}
