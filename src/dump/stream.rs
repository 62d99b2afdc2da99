// ABOUTME: Backpressure-aware output pipeline around the fragment sequence
// ABOUTME: Normalizes line endings, applies modifiers, tees into sinks

use futures::stream::Stream;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::sequencer::DumpSequencer;
use crate::config::{Destination, DumpConfig, Modifier};
use crate::connection::Connection;
use crate::error::Result;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

enum Sink {
    None,
    Pending(Destination),
    Open(Box<dyn AsyncWrite + Send + Unpin>),
    Closed,
}

/// Lazily pulls fragments, post-processes them, and hands finished chunks to
/// the consumer while optionally teeing them into a destination sink.
///
/// Nothing runs until the first [`next_chunk`] call; the consumer may stop
/// pulling at any point and drop the stream, which releases the open cursor
/// and file handle. Output already flushed stays in place.
///
/// [`next_chunk`]: DumpStream::next_chunk
pub struct DumpStream<'a, C: Connection + ?Sized> {
    sequencer: DumpSequencer<'a, C>,
    modifiers: Vec<Modifier>,
    sink: Sink,
    return_output: bool,
}

impl<'a, C: Connection + ?Sized> DumpStream<'a, C> {
    /// Validates the configuration; fails before any I/O on conflicting
    /// options.
    pub fn new(conn: &'a C, mut config: DumpConfig) -> Result<Self> {
        let sink = match config.destination.take() {
            Some(destination) => Sink::Pending(destination),
            None => Sink::None,
        };
        let modifiers = std::mem::take(&mut config.modifiers);
        let return_output = config.return_output;
        Ok(Self {
            sequencer: DumpSequencer::new(conn, config)?,
            modifiers,
            sink,
            return_output,
        })
    }

    /// Whether `dump()` should accumulate the output in memory.
    pub fn accumulates_output(&self) -> bool {
        self.return_output
    }

    /// Produce the next post-processed chunk, writing it to the destination
    /// sink on the way out. `None` means the dump is complete and the sink
    /// has been flushed and closed.
    pub async fn next_chunk(&mut self) -> Result<Option<String>> {
        self.open_sink().await?;

        let Some(fragment) = self.sequencer.next_fragment().await? else {
            self.close_sink().await?;
            return Ok(None);
        };

        let mut text = normalize_line_endings(&fragment.into_sql());
        for modifier in &self.modifiers {
            text = modifier(text);
        }

        if let Sink::Open(writer) = &mut self.sink {
            writer.write_all(text.as_bytes()).await?;
        }
        Ok(Some(text))
    }

    /// Adapt into a `futures::Stream` of chunks.
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> + 'a
    where
        C: 'a,
    {
        futures::stream::try_unfold(self, |mut stream| async move {
            Ok(stream.next_chunk().await?.map(|chunk| (chunk, stream)))
        })
    }

    async fn open_sink(&mut self) -> Result<()> {
        if !matches!(self.sink, Sink::Pending(_)) {
            return Ok(());
        }
        let Sink::Pending(destination) = std::mem::replace(&mut self.sink, Sink::Closed) else {
            unreachable!("sink variant checked above");
        };
        let writer: Box<dyn AsyncWrite + Send + Unpin> = match destination {
            Destination::Path(path) => Box::new(tokio::fs::File::create(&path).await?),
            Destination::Writer(writer) => writer,
        };
        self.sink = Sink::Open(writer);
        Ok(())
    }

    async fn close_sink(&mut self) -> Result<()> {
        if let Sink::Open(writer) = &mut self.sink {
            writer.flush().await?;
            writer.shutdown().await?;
            self.sink = Sink::Closed;
        }
        Ok(())
    }
}

/// Rewrite every line ending in the fragment to the host's native one.
fn normalize_line_endings(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    if LINE_ENDING == "\n" {
        unified
    } else {
        unified.replace('\n', LINE_ENDING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_mixed_line_endings() {
        let normalized = normalize_line_endings("a\r\nb\nc");
        assert_eq!(normalized, format!("a{}b{}c", LINE_ENDING, LINE_ENDING));
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_line_endings("x\ny\r\n");
        assert_eq!(normalize_line_endings(&once), once);
    }
}
