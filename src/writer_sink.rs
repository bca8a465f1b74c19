use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stderr, Stdout};
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::sink::LogSink;

/// Writes entries to any async writer, one after another.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        WriterSink { writer: Mutex::new(writer) }
    }
}

impl WriterSink<Stdout> {
    pub fn stdout() -> Self {
        WriterSink::new(tokio::io::stdout())
    }
}

impl WriterSink<Stderr> {
    pub fn stderr() -> Self {
        WriterSink::new(tokio::io::stderr())
    }
}

#[async_trait]
impl<W> LogSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, entry: &[u8]) -> Result<(), SinkError> {
        self.writer.lock().await.write_all(entry).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_entries_in_order() {
        let sink = WriterSink::new(Vec::<u8>::new());
        sink.send(b"{\"a\":1}\n").await.unwrap();
        sink.send(b"{\"b\":2}\n").await.unwrap();
        sink.flush().await.unwrap();

        let written = sink.writer.lock().await.clone();
        assert_eq!(written, b"{\"a\":1}\n{\"b\":2}\n");
    }
}
