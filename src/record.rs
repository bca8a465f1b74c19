use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::level::Level;

/// Source position of the call site that produced a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub file: String,
    pub line: u32,
}

impl Caller {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Caller { file: file.into(), line }
    }

    /// `dir/file.rs:line`, keeping only the last directory of the path.
    pub fn short(&self) -> String {
        let file = self.file.replace('\\', "/");
        let mut parts = file.rsplitn(3, '/');
        let name = parts.next().unwrap_or_default();
        match parts.next() {
            Some(dir) => format!("{}/{}:{}", dir, name, self.line),
            None => format!("{}:{}", name, self.line),
        }
    }
}

impl From<&Location<'_>> for Caller {
    fn from(location: &Location<'_>) -> Self {
        Caller::new(location.file(), location.line())
    }
}

/// A nested value that knows how to render itself as a JSON object.
///
/// Anything `Serialize` qualifies. Serialization runs at encode time, so an
/// object that refuses to serialize fails the encoding of the entry carrying it.
pub trait LogObject: fmt::Debug + Send + Sync {
    fn to_value(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T> LogObject for T
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Duration(Duration),
    /// Text of an error value. Kept apart from plain strings so the
    /// transformer can fold it into the message.
    Error(String),
    Object(Arc<dyn LogObject>),
    Json(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<String>, value: FieldValue) -> Self {
        Field { key: key.into(), value }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(key, FieldValue::String(value.into()))
    }

    pub fn i64(key: impl Into<String>, value: i64) -> Self {
        Field::new(key, FieldValue::I64(value))
    }

    pub fn u64(key: impl Into<String>, value: u64) -> Self {
        Field::new(key, FieldValue::U64(value))
    }

    pub fn f64(key: impl Into<String>, value: f64) -> Self {
        Field::new(key, FieldValue::F64(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Field::new(key, FieldValue::Bool(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Field::new(key, FieldValue::Duration(value))
    }

    /// Error field under the conventional `error` key.
    pub fn error(err: &(dyn std::error::Error + 'static)) -> Self {
        Field::named_error("error", err)
    }

    pub fn named_error(key: impl Into<String>, err: &(dyn std::error::Error + 'static)) -> Self {
        Field::new(key, FieldValue::Error(err.to_string()))
    }

    pub fn object(key: impl Into<String>, value: impl LogObject + 'static) -> Self {
        Field::new(key, FieldValue::Object(Arc::new(value)))
    }

    pub fn json(key: impl Into<String>, value: serde_json::Value) -> Self {
        Field::new(key, FieldValue::Json(value))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.value, FieldValue::Error(_))
    }
}

/// Ordered field set with unique keys. Inserting an existing key replaces
/// the value in place.
#[derive(Debug, Clone, Default)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn new() -> Self {
        Fields(Vec::new())
    }

    pub fn insert(&mut self, field: Field) {
        match self.0.iter_mut().find(|f| f.key == field.key) {
            Some(existing) => existing.value = field.value,
            None => self.0.push(field),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut fields = Fields::new();
        fields.extend(iter);
        fields
    }
}

impl Extend<Field> for Fields {
    fn extend<I: IntoIterator<Item = Field>>(&mut self, iter: I) {
        for field in iter {
            self.insert(field);
        }
    }
}

impl IntoIterator for Fields {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One emitted entry, before encoding.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger: Option<String>,
    pub message: String,
    pub caller: Option<Caller>,
    pub stack: Option<String>,
    /// Fields attached by the emitting logger. Written before `fields` and
    /// never folded into the message.
    pub context: Fields,
    pub fields: Fields,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            logger: None,
            message: message.into(),
            caller: None,
            stack: None,
            context: Fields::new(),
            fields: Fields::new(),
        }
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.insert(field);
        self
    }
}
