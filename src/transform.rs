use crate::record::{Field, FieldValue, LogRecord};
use crate::schema::{SourceLocation, SOURCE_LOCATION_KEY};

/// Rewrite a record into the shape Cloud Logging expects.
///
/// - with caller info, the text of an error field named `error` is appended
///   to the message;
/// - caller info moves into a `sourceLocation` object and is cleared from the
///   record;
/// - stack text is appended to the message and cleared.
///
/// Error folding only happens when caller info is present. Records emitted
/// without a caller keep their message untouched even if they carry an error.
pub fn transform(mut record: LogRecord) -> LogRecord {
    if let Some(caller) = record.caller.take() {
        for field in record.fields.iter() {
            if let (FieldValue::Error(text), "error") = (&field.value, field.key.as_str()) {
                record.message.push_str("\ndue to error: ");
                record.message.push_str(text);
            }
        }

        record.fields.insert(Field::object(
            SOURCE_LOCATION_KEY,
            SourceLocation {
                file: caller.file,
                line: caller.line,
                function: None,
            },
        ));
    }

    if let Some(stack) = record.stack.take().filter(|s| !s.is_empty()) {
        record.message.push('\n');
        record.message.push_str(&stack);
    }

    record
}
