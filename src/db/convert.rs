use bson::{Bson, Document};
use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};

/// Convert a BSON document into plain JSON for API responses.
///
/// Ids become hex strings and dates become RFC 3339 strings with millisecond
/// precision. Numbers keep their BSON width.
pub fn document_to_json(doc: Document) -> Value {
    Value::Object(
        doc.into_iter()
            .map(|(key, value)| (key, bson_to_json(value)))
            .collect::<Map<String, Value>>(),
    )
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(date) => {
            Value::String(date.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Bson::Double(n) => Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
        Bson::Int32(n) => Value::from(n),
        Bson::Int64(n) => Value::from(n),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        other => other.into_relaxed_extjson(),
    }
}

/// Serialize a tour document for a response, adding the computed
/// `durationWeeks` field when `duration` is present.
pub fn tour_to_json(doc: Document) -> Value {
    let duration_weeks = match doc.get("duration") {
        Some(Bson::Double(d)) => Some(*d / 7.0),
        Some(Bson::Int32(d)) => Some(f64::from(*d) / 7.0),
        Some(Bson::Int64(d)) => Some(*d as f64 / 7.0),
        _ => None,
    };

    let mut json = document_to_json(doc);
    if let (Some(weeks), Value::Object(map)) = (duration_weeks, &mut json) {
        if let Some(weeks) = Number::from_f64(weeks) {
            map.insert("durationWeeks".to_string(), Value::Number(weeks));
        }
    }
    json
}
