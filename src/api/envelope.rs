use serde::Serialize;
use serde_json::{Map, Value};

/// Body of every successful JSON response.
///
/// `data` always holds a single named entry, e.g. `{"tour": {...}}`.
/// `results` is only present for collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    pub data: Map<String, Value>,
}

impl Envelope {
    /// A single named item.
    pub fn item(key: &str, value: Value) -> Self {
        Self {
            status: "success",
            results: None,
            data: named(key, value),
        }
    }

    /// A named collection, with its size in `results`.
    pub fn list(key: &str, items: Vec<Value>) -> Self {
        Self {
            status: "success",
            results: Some(items.len()),
            data: named(key, Value::Array(items)),
        }
    }
}

fn named(key: &str, value: Value) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(key.to_string(), value);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_envelope() {
        let body = serde_json::to_value(Envelope::list("tours", vec![json!({"name": "a"})])).unwrap();
        assert_eq!(
            body,
            json!({ "status": "success", "results": 1, "data": { "tours": [{ "name": "a" }] } })
        );
    }

    #[test]
    fn test_item_envelope_has_no_results() {
        let body = serde_json::to_value(Envelope::item("tour", json!({"name": "a"}))).unwrap();
        assert_eq!(body, json!({ "status": "success", "data": { "tour": { "name": "a" } } }));
    }
}
