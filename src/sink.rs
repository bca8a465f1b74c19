use async_trait::async_trait;

use crate::error::SinkError;

/// Asynchronous destination for encoded log entries.
///
/// Implementations are responsible for transporting entries to a concrete
/// destination (stdout, a file, a log agent socket). The pipeline calls
/// `send` from a background task and never awaits it on the application
/// thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Write one encoded entry.
    ///
    /// **Parameters**
    /// - `entry`: a single JSON document terminated by a newline, as produced
    ///   by an [`Encoder`](crate::encoder::Encoder).
    ///
    /// **Returns**
    /// - `Ok(())` if the entry was accepted.
    /// - `Err(..)` if the destination failed. The pipeline reports the
    ///   failure and drops the rest of the batch; it does not retry.
    async fn send(&self, entry: &[u8]) -> Result<(), SinkError>;

    /// Flush any buffered entries, if the destination buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
