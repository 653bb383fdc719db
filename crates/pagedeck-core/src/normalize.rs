use serde_json::Value;
use tracing::debug;

use crate::error::{CoreError, Result};

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Object keys a model may wrap its card list in, checked in order.
const WRAPPER_KEYS: [&str; 3] = ["cards", "items", "flashcards"];

/// The top-level shapes a model reply can take once parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum CardPayload {
    /// `[{...}, {...}]`
    List(Vec<Value>),
    /// `{"cards": ...}` (or one of the other wrapper keys).
    Wrapped { key: &'static str, inner: Value },
    /// Anything else, usually a single bare card object.
    Single(Value),
}

impl CardPayload {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => CardPayload::List(items),
            Value::Object(mut map) => {
                let key = WRAPPER_KEYS
                    .iter()
                    .copied()
                    .find(|key| map.get(*key).is_some_and(|v| !v.is_null()));
                match key.and_then(|key| map.remove(key).map(|inner| (key, inner))) {
                    Some((key, inner)) => CardPayload::Wrapped { key, inner },
                    None => CardPayload::Single(Value::Object(map)),
                }
            }
            other => CardPayload::Single(other),
        }
    }

    /// Flatten to a card list. Only one level of wrapper is unwrapped.
    pub fn into_cards(self) -> Vec<Value> {
        match self {
            CardPayload::List(items) => items,
            CardPayload::Wrapped { inner, .. } => match inner {
                Value::Array(items) => items,
                other => vec![other],
            },
            CardPayload::Single(value) => vec![value],
        }
    }
}

/// Remove every markdown fence marker from the model output.
pub fn strip_fences(raw: &str) -> String {
    raw.replace(FENCE_OPEN, "").replace(FENCE_CLOSE, "")
}

/// Turn a raw model reply into a list of card-like JSON values.
///
/// Always yields a list, whether the model emitted an array, a wrapped
/// object or a bare object. Field presence is not checked here.
pub fn normalize(raw: &str) -> Result<Vec<Value>> {
    let cleaned = strip_fences(raw);
    let value: Value = serde_json::from_str(cleaned.trim())
        .map_err(|e| CoreError::Parse(format!("{e}")))?;

    let payload = CardPayload::classify(value);
    match &payload {
        CardPayload::List(items) => debug!(cards = items.len(), "model returned a card list"),
        CardPayload::Wrapped { key, .. } => debug!(key = *key, "unwrapping card list"),
        CardPayload::Single(_) => debug!("model returned a single value, wrapping"),
    }
    Ok(payload.into_cards())
}
