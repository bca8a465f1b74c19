use std::error::Error;
use std::fmt;

use tracing::field::{Field as TracingField, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::level::Level;
use crate::logger::Logger;
use crate::operation::{OperationContext, OperationId, SPAN_FIELD};
use crate::record::{Caller, Field, FieldValue, Fields, LogRecord};

/// `tracing_subscriber` layer that turns `tracing` events into entries of a
/// [`Logger`].
///
/// The event's file and line become the caller, its target the logger name.
/// Events inside a span that recorded an `operation.id` field are annotated
/// as interior events of that operation.
pub struct StackdriverLayer {
    logger: Logger,
}

impl StackdriverLayer {
    pub fn new(logger: Logger) -> Self {
        StackdriverLayer { logger }
    }
}

impl<S> Layer<S> for StackdriverLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = OperationVisitor(None);
        attrs.record(&mut visitor);
        if let (Some(operation), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(operation);
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = OperationVisitor(None);
        values.record(&mut visitor);
        if let (Some(operation), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().replace(operation);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Level::from(meta.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut fields = Fields::new();
        let mut message = None;
        event.record(&mut FieldVisitor { fields: &mut fields, message: &mut message });

        let operation = ctx.event_scope(event).and_then(|scope| {
            scope
                .from_root()
                .filter_map(|span| span.extensions().get::<OperationId>().copied())
                .last()
        });
        if let Some(id) = operation {
            fields.insert(OperationContext::background().with_id(id).interior("").into_field());
        }

        let mut record = LogRecord::new(level, message.unwrap_or_default());
        record.logger = Some(meta.target().to_string());
        record.caller = match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => Some(Caller::new(file, line)),
            _ => None,
        };
        record.fields = fields;

        self.logger.write(record);
    }
}

struct OperationVisitor(Option<OperationId>);

impl Visit for OperationVisitor {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == SPAN_FIELD {
            self.0 = OperationId::parse(value);
        }
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        if field.name() == SPAN_FIELD {
            self.0 = OperationId::parse(&format!("{:?}", value));
        }
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Fields,
    pub message: &'a mut Option<String>,
}

impl FieldVisitor<'_> {
    fn insert(&mut self, field: &TracingField, value: FieldValue) {
        self.fields.insert(Field::new(field.name(), value));
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.insert(field, FieldValue::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.insert(field, FieldValue::I64(value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.insert(field, FieldValue::U64(value));
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.insert(field, FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.insert(field, FieldValue::Bool(value));
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn Error + 'static)) {
        self.insert(field, FieldValue::Error(value.to_string()));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, FieldValue::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::StackdriverEncoder;
    use crate::memory_sink::MemorySink;
    use crate::pipeline::Pipeline;
    use crate::schema::{OPERATION_KEY, SOURCE_LOCATION_KEY};
    use std::io;
    use std::sync::Arc;
    use tokio::time::Duration;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    fn setup() -> (Logger, MemorySink) {
        let sink = MemorySink::new();
        let (pipeline, _handle) = Pipeline::new(Arc::new(sink.clone()), 64, 16, Duration::from_secs(60));
        let logger = Logger::new(Level::Debug, None, Box::new(StackdriverEncoder::new()), pipeline);
        (logger, sink)
    }

    #[tokio::test]
    async fn event_becomes_entry() {
        let (logger, sink) = setup();
        let subscriber = Registry::default().with(StackdriverLayer::new(logger.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let err = io::Error::new(io::ErrorKind::Other, "timeout");
            tracing::warn!(
                attempt = 3,
                ratio = 0.5,
                cached = true,
                error = &err as &(dyn std::error::Error + 'static),
                "upstream call failed"
            );
        });
        logger.flush().await.unwrap();

        let entries = sink.json();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry["severity"], "WARNING");
        assert_eq!(entry["message"], "upstream call failed\ndue to error: timeout");
        assert_eq!(entry["attempt"], 3);
        assert_eq!(entry["ratio"], 0.5);
        assert_eq!(entry["cached"], true);
        assert_eq!(entry["logger"], module_path!());
        assert!(entry[SOURCE_LOCATION_KEY]["file"].as_str().unwrap().ends_with("layer.rs"));
        assert!(entry.get(OPERATION_KEY).is_none());
    }

    #[tokio::test]
    async fn span_operation_is_inherited() {
        let (logger, sink) = setup();
        let subscriber = Registry::default().with(StackdriverLayer::new(logger.clone()));
        let ctx = OperationContext::background().with_operation();
        let id = ctx.id().unwrap();

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("grpc_call", operation.id = %id);
            let _guard = span.enter();
            let inner = tracing::info_span!("db_query");
            let _inner = inner.enter();
            tracing::info!("query done");
        });
        logger.flush().await.unwrap();

        let entries = sink.json();
        let operation = &entries[0][OPERATION_KEY];
        assert_eq!(operation["id"], id.to_string());
        assert_eq!(operation["first"], false);
        assert_eq!(operation["last"], false);
    }

    #[tokio::test]
    async fn level_filter_applies() {
        let sink = MemorySink::new();
        let (pipeline, _handle) = Pipeline::new(Arc::new(sink.clone()), 64, 16, Duration::from_secs(60));
        let logger = Logger::new(Level::Warn, None, Box::new(StackdriverEncoder::new()), pipeline);
        let subscriber = Registry::default().with(StackdriverLayer::new(logger.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("ignored");
            tracing::error!("kept");
        });
        logger.flush().await.unwrap();

        let entries = sink.json();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["severity"], "ERROR");
    }
}
