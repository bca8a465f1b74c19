use async_trait::async_trait;

use crate::error::SinkError;
use crate::sink::LogSink;

/// A sink that simply drops all entries.
///
/// Useful for measuring the overhead of encoding without any I/O.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _entry: &[u8]) -> Result<(), SinkError> {
        Ok(())
    }
}
