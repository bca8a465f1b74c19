use std::backtrace::Backtrace;
use std::panic::Location;
use std::sync::Arc;

use crate::encoder::Encoder;
use crate::error::SinkError;
use crate::level::Level;
use crate::pipeline::Pipeline;
use crate::record::{Caller, Field, Fields, LogRecord};
use crate::schema::{ServiceContext, SERVICE_CONTEXT_KEY};

struct Core {
    level: Level,
    stacktrace_level: Option<Level>,
    encoder: Box<dyn Encoder>,
    pipeline: Pipeline,
}

/// Handle used to emit entries.
///
/// Cheap to clone. Derived loggers (`named`, `with`) share the encoder and
/// the delivery pipeline with their parent.
#[derive(Clone)]
pub struct Logger {
    core: Arc<Core>,
    name: Option<String>,
    context: Fields,
}

impl Logger {
    pub(crate) fn new(
        level: Level,
        stacktrace_level: Option<Level>,
        encoder: Box<dyn Encoder>,
        pipeline: Pipeline,
    ) -> Self {
        Logger {
            core: Arc::new(Core { level, stacktrace_level, encoder, pipeline }),
            name: None,
            context: Fields::new(),
        }
    }

    /// Child logger whose name is `name` appended to the current one with a dot.
    pub fn named(&self, name: &str) -> Logger {
        let mut logger = self.clone();
        logger.name = match (&self.name, name.is_empty()) {
            (_, true) => self.name.clone(),
            (Some(parent), false) => Some(format!("{}.{}", parent, name)),
            (None, false) => Some(name.to_string()),
        };
        logger
    }

    /// Child logger that attaches `fields` to every entry.
    pub fn with(&self, fields: impl IntoIterator<Item = Field>) -> Logger {
        let mut logger = self.clone();
        logger.context.extend(fields);
        logger
    }

    pub fn with_service_context(&self, ctx: ServiceContext) -> Logger {
        self.with([Field::object(SERVICE_CONTEXT_KEY, ctx)])
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn level(&self) -> Level {
        self.core.level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.core.level
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.core.pipeline
    }

    /// Emit an entry at `level`. The caller's location is recorded.
    #[track_caller]
    pub fn log(&self, level: Level, message: &str, fields: impl IntoIterator<Item = Field>) {
        if !self.enabled(level) {
            return;
        }
        let caller = Caller::from(Location::caller());
        let mut record = LogRecord::new(level, message).with_caller(caller);
        record.fields.extend(fields);
        self.write(record);
    }

    #[track_caller]
    pub fn debug(&self, message: &str, fields: impl IntoIterator<Item = Field>) {
        self.log(Level::Debug, message, fields)
    }

    #[track_caller]
    pub fn info(&self, message: &str, fields: impl IntoIterator<Item = Field>) {
        self.log(Level::Info, message, fields)
    }

    #[track_caller]
    pub fn warn(&self, message: &str, fields: impl IntoIterator<Item = Field>) {
        self.log(Level::Warn, message, fields)
    }

    #[track_caller]
    pub fn error(&self, message: &str, fields: impl IntoIterator<Item = Field>) {
        self.log(Level::Error, message, fields)
    }

    /// Logged at critical severity. Does not panic.
    #[track_caller]
    pub fn dpanic(&self, message: &str, fields: impl IntoIterator<Item = Field>) {
        self.log(Level::DPanic, message, fields)
    }

    /// Logged at alert severity. Does not panic.
    #[track_caller]
    pub fn panic(&self, message: &str, fields: impl IntoIterator<Item = Field>) {
        self.log(Level::Panic, message, fields)
    }

    /// Logged at emergency severity. Does not exit the process.
    #[track_caller]
    pub fn fatal(&self, message: &str, fields: impl IntoIterator<Item = Field>) {
        self.log(Level::Fatal, message, fields)
    }

    /// Encode and queue a record built elsewhere, e.g. by the tracing layer.
    ///
    /// The logger's name and context fields are applied. Context fields are
    /// written first, a record field with the same key wins, and an error in
    /// the context is not folded into the message. Encoding failures are
    /// reported on stderr and the record is dropped.
    pub fn write(&self, mut record: LogRecord) {
        if !self.enabled(record.level) {
            return;
        }
        if record.logger.is_none() {
            record.logger = self.name.clone();
        }
        if !self.context.is_empty() {
            let mut context = self.context.clone();
            context.extend(std::mem::take(&mut record.context));
            record.context = context;
        }
        if record.stack.is_none() && self.core.stacktrace_level.is_some_and(|l| record.level >= l) {
            record.stack = Some(Backtrace::force_capture().to_string());
        }

        match self.core.encoder.encode_entry(record) {
            Ok(entry) => self.core.pipeline.submit(entry),
            Err(e) => {
                self.core.pipeline.dropped_events.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                eprintln!("failed to encode log entry: {}", e);
            }
        }
    }

    /// Wait until everything logged so far reached the sink.
    pub async fn flush(&self) -> Result<(), SinkError> {
        self.core.pipeline.flush().await
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.core.level)
            .field("name", &self.name)
            .field("context", &self.context)
            .finish()
    }
}
