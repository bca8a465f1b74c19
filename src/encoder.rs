use chrono::SecondsFormat;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::EncodeError;
use crate::level::Level;
use crate::record::{FieldValue, LogRecord};
use crate::transform::transform;

/// Turns a finished [`LogRecord`] into one line of output.
///
/// Encoders hold no per-entry state; a single instance is shared by every
/// thread that logs.
pub trait Encoder: Send + Sync {
    fn encode_entry(&self, record: LogRecord) -> Result<Vec<u8>, EncodeError>;
}

/// Names of the top-level entry keys and how levels are spelled.
///
/// A `None` key drops that part of the entry.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub time_key: Option<&'static str>,
    pub level_key: Option<&'static str>,
    pub name_key: Option<&'static str>,
    pub caller_key: Option<&'static str>,
    pub message_key: &'static str,
    pub stacktrace_key: Option<&'static str>,
    pub encode_level: fn(Level) -> &'static str,
}

impl EncoderConfig {
    /// Key table of the Cloud Logging structured payload.
    pub fn stackdriver() -> Self {
        EncoderConfig {
            time_key: Some("eventTime"),
            level_key: Some("severity"),
            name_key: Some("logger"),
            caller_key: Some("caller"),
            message_key: "message",
            stacktrace_key: None,
            encode_level: Level::severity,
        }
    }

    pub fn production() -> Self {
        EncoderConfig {
            time_key: Some("ts"),
            level_key: Some("level"),
            name_key: Some("logger"),
            caller_key: Some("caller"),
            message_key: "msg",
            stacktrace_key: Some("stacktrace"),
            encode_level: Level::as_str,
        }
    }
}

/// Line-delimited JSON encoder driven by an [`EncoderConfig`].
#[derive(Debug, Clone)]
pub struct JsonEncoder {
    config: EncoderConfig,
}

impl JsonEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        JsonEncoder { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        JsonEncoder::new(EncoderConfig::production())
    }
}

impl Encoder for JsonEncoder {
    fn encode_entry(&self, mut record: LogRecord) -> Result<Vec<u8>, EncodeError> {
        if !record.context.is_empty() {
            let mut merged = std::mem::take(&mut record.context);
            merged.extend(std::mem::take(&mut record.fields));
            record.fields = merged;
        }

        let fields = record
            .fields
            .iter()
            .map(|field| Ok((field.key.as_str(), field_value(&field.key, &field.value)?)))
            .collect::<Result<Vec<_>, EncodeError>>()?;

        let entry = Entry { config: &self.config, record: &record, fields };
        let mut buf = Vec::with_capacity(256);
        serde_json::to_writer(&mut buf, &entry)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

/// [`JsonEncoder`] with the stackdriver key table, preceded by [`transform`].
#[derive(Debug, Clone)]
pub struct StackdriverEncoder {
    inner: JsonEncoder,
}

impl StackdriverEncoder {
    pub fn new() -> Self {
        StackdriverEncoder { inner: JsonEncoder::new(EncoderConfig::stackdriver()) }
    }
}

impl Default for StackdriverEncoder {
    fn default() -> Self {
        StackdriverEncoder::new()
    }
}

impl Encoder for StackdriverEncoder {
    fn encode_entry(&self, record: LogRecord) -> Result<Vec<u8>, EncodeError> {
        self.inner.encode_entry(transform(record))
    }
}

fn field_value(key: &str, value: &FieldValue) -> Result<Value, EncodeError> {
    Ok(match value {
        FieldValue::String(s) | FieldValue::Error(s) => Value::String(s.clone()),
        FieldValue::I64(n) => Value::from(*n),
        FieldValue::U64(n) => Value::from(*n),
        FieldValue::F64(n) => Value::from(*n),
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Duration(d) => Value::from(d.as_secs_f64()),
        FieldValue::Object(obj) => obj.to_value().map_err(|source| EncodeError::Object {
            key: key.to_string(),
            source,
        })?,
        FieldValue::Json(v) => v.clone(),
    })
}

struct Entry<'a> {
    config: &'a EncoderConfig,
    record: &'a LogRecord,
    fields: Vec<(&'a str, Value)>,
}

impl Serialize for Entry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let config = self.config;
        let record = self.record;
        let mut map = serializer.serialize_map(None)?;

        if let Some(key) = config.time_key {
            map.serialize_entry(key, &record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))?;
        }
        if let Some(key) = config.level_key {
            map.serialize_entry(key, (config.encode_level)(record.level))?;
        }
        if let (Some(key), Some(name)) = (config.name_key, record.logger.as_deref()) {
            map.serialize_entry(key, name)?;
        }
        if let (Some(key), Some(caller)) = (config.caller_key, record.caller.as_ref()) {
            map.serialize_entry(key, &caller.short())?;
        }
        map.serialize_entry(config.message_key, &record.message)?;
        if let (Some(key), Some(stack)) = (config.stacktrace_key, record.stack.as_deref()) {
            if !stack.is_empty() {
                map.serialize_entry(key, stack)?;
            }
        }
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }

        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Caller, Field};
    use crate::schema::{ServiceContext, SOURCE_LOCATION_KEY};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;

    fn record() -> LogRecord {
        let mut record = LogRecord::new(Level::Warn, "slow request")
            .with_caller(Caller::new("src/handlers/users.rs", 87))
            .with_stack("0: main")
            .with_field(Field::duration("elapsed", Duration::from_millis(250)))
            .with_field(Field::bool("cached", false));
        record.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        record.logger = Some("api".into());
        record
    }

    fn parse(buf: &[u8]) -> Value {
        assert_eq!(buf.last(), Some(&b'\n'));
        serde_json::from_slice(buf).unwrap()
    }

    #[test]
    fn stackdriver_entry() {
        let buf = StackdriverEncoder::new().encode_entry(record()).unwrap();
        let value = parse(&buf);

        assert_eq!(
            value,
            json!({
                "eventTime": "2024-05-01T12:30:00.000Z",
                "severity": "WARNING",
                "logger": "api",
                "message": "slow request\n0: main",
                "elapsed": 0.25,
                "cached": false,
                SOURCE_LOCATION_KEY: {"file": "src/handlers/users.rs", "line": 87},
            })
        );
    }

    #[test]
    fn stackdriver_key_order() {
        let buf = StackdriverEncoder::new().encode_entry(record()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let positions: Vec<_> = ["\"eventTime\"", "\"severity\"", "\"logger\"", "\"message\""]
            .iter()
            .map(|k| text.find(k).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn deterministic() {
        let encoder = StackdriverEncoder::new();
        let a = encoder.encode_entry(record()).unwrap();
        let b = encoder.encode_entry(record()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn production_entry_keeps_caller_and_stack() {
        let value = parse(&JsonEncoder::default().encode_entry(record()).unwrap());
        assert_eq!(value["level"], "warn");
        assert_eq!(value["caller"], "handlers/users.rs:87");
        assert_eq!(value["msg"], "slow request");
        assert_eq!(value["stacktrace"], "0: main");
    }

    #[test]
    fn object_failure_propagates() {
        let bad = ServiceContext { service: String::new(), version: "v1".into() };
        let record = LogRecord::new(Level::Info, "hi").with_field(Field::object("serviceContext", bad));

        match StackdriverEncoder::new().encode_entry(record) {
            Err(EncodeError::Object { key, .. }) => assert_eq!(key, "serviceContext"),
            other => panic!("expected object error, got {:?}", other.map(|_| ())),
        }
    }
}
