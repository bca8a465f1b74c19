use std::str::FromStr;
use std::sync::Arc;

use tokio::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::encoder::{Encoder, JsonEncoder, StackdriverEncoder};
use crate::error::{ConfigError, InitError};
use crate::layer::StackdriverLayer;
use crate::level::Level;
use crate::logger::Logger;
use crate::pipeline::Pipeline;
use crate::schema::ServiceContext;
use crate::sink::LogSink;
use crate::writer_sink::WriterSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Cloud Logging structured payload.
    Stackdriver,
    /// Plain line-delimited JSON.
    Json,
}

impl FromStr for Encoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stackdriver" => Ok(Encoding::Stackdriver),
            "json" => Ok(Encoding::Json),
            _ => Err(ConfigError::InvalidEncoding(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Stdout,
    Stderr,
}

impl FromStr for Output {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Output::Stdout),
            "stderr" => Ok(Output::Stderr),
            _ => Err(ConfigError::InvalidOutput(s.to_string())),
        }
    }
}

/// Logger configuration.
///
/// **Fields**
/// - `level`: minimal level that gets encoded.
/// - `encoding`: output format.
/// - `output`: where [`Config::build`] writes.
/// - `name`: root logger name.
/// - `service_context`: attached to every entry when set.
/// - `stacktrace_level`: entries at or above this level carry a backtrace.
/// - `channel_buffer`: maximal number of entries queued before new ones are
///   dropped.
/// - `batch_size`: entries written to the sink per batch.
/// - `flush_interval`: maximal delay before a partial batch is written.
#[derive(Clone, Debug)]
pub struct Config {
    pub level: Level,
    pub encoding: Encoding,
    pub output: Output,
    pub name: Option<String>,
    pub service_context: Option<ServiceContext>,
    pub stacktrace_level: Option<Level>,
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Config {
    /// Everything at debug and above, stackdriver-encoded to stdout.
    pub fn stackdriver() -> Self {
        Config {
            level: Level::Debug,
            encoding: Encoding::Stackdriver,
            output: Output::Stdout,
            name: None,
            service_context: None,
            stacktrace_level: Some(Level::Error),
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
        }
    }

    /// Plain JSON to stderr, stack traces from warn up.
    pub fn development() -> Self {
        Config {
            encoding: Encoding::Json,
            output: Output::Stderr,
            stacktrace_level: Some(Level::Warn),
            ..Config::stackdriver()
        }
    }

    pub fn with_service_context(mut self, ctx: ServiceContext) -> Self {
        self.service_context = Some(ctx);
        self
    }

    /// Build a logger writing to the configured output.
    ///
    /// Must be called from within a tokio runtime: it spawns the task that
    /// feeds the sink.
    pub fn build(&self) -> Result<Logger, ConfigError> {
        let sink: Arc<dyn LogSink> = match self.output {
            Output::Stdout => Arc::new(WriterSink::stdout()),
            Output::Stderr => Arc::new(WriterSink::stderr()),
        };
        self.build_with_sink(sink)
    }

    /// Build a logger writing to `sink`.
    pub fn build_with_sink(&self, sink: Arc<dyn LogSink>) -> Result<Logger, ConfigError> {
        if let Some(ctx) = &self.service_context {
            if ctx.service.is_empty() {
                return Err(ConfigError::EmptyServiceName);
            }
        }

        let encoder: Box<dyn Encoder> = match self.encoding {
            Encoding::Stackdriver => Box::new(StackdriverEncoder::new()),
            Encoding::Json => Box::new(JsonEncoder::default()),
        };
        let (pipeline, _handle) = Pipeline::new(sink, self.channel_buffer, self.batch_size, self.flush_interval);

        let mut logger = Logger::new(self.level, self.stacktrace_level, encoder, pipeline);
        if let Some(name) = &self.name {
            logger = logger.named(name);
        }
        if let Some(ctx) = &self.service_context {
            logger = logger.with_service_context(ctx.clone());
        }
        Ok(logger)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::stackdriver()
    }
}

/// A [`Registry`] filtered at the logger's level, with a [`StackdriverLayer`]
/// over `logger`.
pub fn subscriber(logger: &Logger) -> impl tracing::Subscriber + Send + Sync + 'static {
    Registry::default()
        .with(LevelFilter::from(logger.level()))
        .with(StackdriverLayer::new(logger.clone()))
}

/// Install [`subscriber`] as the global default, so every `tracing` event in
/// the process is encoded by `logger`.
pub fn init_tracing(logger: &Logger) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    tracing::subscriber::set_global_default(subscriber(logger))
}

/// Build a logger from `config` and install it for `tracing` events.
///
/// The returned logger is the one to hand to the gRPC interceptors.
pub fn init_tracing_with_config(config: &Config) -> Result<Logger, InitError> {
    let logger = config.build()?;
    init_tracing(&logger)?;
    logger.info("logger has been initialized", []);
    Ok(logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_sink::MemorySink;

    #[test]
    fn parse_encoding_and_output() {
        assert_eq!("Stackdriver".parse::<Encoding>().unwrap(), Encoding::Stackdriver);
        assert_eq!("json".parse::<Encoding>().unwrap(), Encoding::Json);
        assert!(matches!("xml".parse::<Encoding>(), Err(ConfigError::InvalidEncoding(_))));

        assert_eq!("stderr".parse::<Output>().unwrap(), Output::Stderr);
        assert!(matches!("/var/log/app".parse::<Output>(), Err(ConfigError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn rejects_empty_service_name() {
        let config = Config::stackdriver().with_service_context(ServiceContext {
            service: String::new(),
            version: "v1".into(),
        });
        let err = config.build_with_sink(Arc::new(MemorySink::new())).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyServiceName));
    }

    #[tokio::test]
    async fn build_applies_name_and_service() {
        let sink = MemorySink::new();
        let config = Config {
            name: Some("billing".into()),
            ..Config::stackdriver()
        }
        .with_service_context(ServiceContext::new("billing-api", "v2.3.0").unwrap());

        let logger = config.build_with_sink(Arc::new(sink.clone())).unwrap();
        logger.info("started", []);
        logger.flush().await.unwrap();

        let entries = sink.json();
        assert_eq!(entries[0]["logger"], "billing");
        assert_eq!(entries[0]["serviceContext"]["service"], "billing-api");
    }

    #[tokio::test]
    async fn development_encodes_plain_json() {
        let sink = MemorySink::new();
        let logger = Config::development().build_with_sink(Arc::new(sink.clone())).unwrap();
        logger.info("started", []);
        logger.flush().await.unwrap();

        let entries = sink.json();
        assert_eq!(entries[0]["level"], "info");
        assert_eq!(entries[0]["msg"], "started");
        assert!(entries[0]["caller"].as_str().unwrap().contains("init.rs"));
    }
}
