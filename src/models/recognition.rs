use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured recognition output stored on a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Recognized text with sensitive fields obscured, always a plain string once stored.
    pub masked_text: String,
    /// Identifier fields keyed by field name.
    pub json: Value,
    pub validation: Value,
}

/// The encodings `masked_text` is known to arrive in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskedText {
    /// Plain, non-JSON text.
    PlainText(String),
    /// A string holding JSON such as `"{\"text\":\"...\"}"`.
    JsonEncodedText(String),
    /// An object carrying a `text` field.
    ObjectWithText(String),
    /// Nothing recoverable.
    Absent,
}

impl MaskedText {
    /// Classify a raw `masked_text` value. JSON decoding is tried first,
    /// then the raw string, then nothing.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => match text_field(&map) {
                    Some(text) => MaskedText::JsonEncodedText(text),
                    None => MaskedText::Absent,
                },
                Ok(Value::String(inner)) => MaskedText::JsonEncodedText(inner),
                Ok(_) => MaskedText::Absent,
                Err(_) => MaskedText::PlainText(raw.clone()),
            },
            Value::Object(map) => match text_field(map) {
                Some(text) => MaskedText::ObjectWithText(text),
                None => MaskedText::Absent,
            },
            _ => MaskedText::Absent,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            MaskedText::PlainText(text)
            | MaskedText::JsonEncodedText(text)
            | MaskedText::ObjectWithText(text) => text,
            MaskedText::Absent => String::new(),
        }
    }
}

fn text_field(map: &Map<String, Value>) -> Option<String> {
    map.get("text").and_then(Value::as_str).map(str::to_owned)
}

/// Normalize any accepted `masked_text` shape to a plain string.
pub fn resolve_masked_text(value: &Value) -> String {
    MaskedText::classify(value).into_text()
}

impl RecognitionResult {
    /// Build a result from whatever the engine returned.
    ///
    /// A body already shaped as `{masked_text, json, validation}` is taken as is.
    /// Any other JSON object is the identifier-field map; its `text` field, when
    /// present, becomes the masked text. Non-JSON bodies are kept as text.
    pub fn from_engine_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) if is_result_shaped(&map) => Self {
                masked_text: map
                    .get("masked_text")
                    .map(resolve_masked_text)
                    .unwrap_or_default(),
                json: map.get("json").cloned().unwrap_or_else(empty_object),
                validation: map.get("validation").cloned().unwrap_or_else(empty_object),
            },
            Ok(Value::Object(map)) => Self {
                masked_text: text_field(&map).unwrap_or_else(|| body.trim().to_string()),
                json: Value::Object(map),
                validation: empty_object(),
            },
            Ok(value @ Value::String(_)) => Self {
                masked_text: resolve_masked_text(&value),
                json: empty_object(),
                validation: empty_object(),
            },
            _ => Self {
                masked_text: body.trim().to_string(),
                json: empty_object(),
                validation: empty_object(),
            },
        }
    }
}

fn is_result_shaped(map: &Map<String, Value>) -> bool {
    ["masked_text", "json", "validation"]
        .iter()
        .any(|key| map.contains_key(*key))
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
