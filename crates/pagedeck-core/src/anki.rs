use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::AnkiConfig;
use crate::error::{CoreError, Result};

/// AnkiConnect API version spoken on every request.
pub const API_VERSION: u8 = 6;

// -- Wire types --

/// One AnkiConnect call: `{"action": ..., "version": 6, "params": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnkiRequest<P> {
    pub action: &'static str,
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<P> AnkiRequest<P> {
    pub fn new(action: &'static str, params: Option<P>) -> Self {
        Self {
            action,
            version: API_VERSION,
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub deck_name: String,
    pub model_name: String,
    /// Local field name → value. A side the model did not provide is left out.
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub options: NoteOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOptions {
    pub allow_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddNoteParams {
    pub note: Note,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiParams {
    pub actions: Vec<ImportAction>,
}

/// An `addNote` call for a single card.
pub type ImportAction = AnkiRequest<AddNoteParams>;

/// A `multi` call wrapping every `addNote` of a run.
pub type BatchRequest = AnkiRequest<MultiParams>;

impl BatchRequest {
    pub fn len(&self) -> usize {
        self.params.as_ref().map_or(0, |p| p.actions.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnkiResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl<T> AnkiResponse<T> {
    /// The top-level error text, if the response reports one.
    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// One positional entry of a `multi` result.
///
/// Older AnkiConnect builds answer with the bare note id (or `null`);
/// newer ones wrap each sub-result as `{"result": ..., "error": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Envelope {
        result: Option<Value>,
        #[serde(default)]
        error: Option<Value>,
    },
    Bare(Value),
}

impl BatchEntry {
    pub fn is_failure(&self) -> bool {
        match self {
            BatchEntry::Bare(value) => value.is_null(),
            BatchEntry::Envelope { result, error } => {
                result.as_ref().map_or(true, Value::is_null)
                    || error.as_ref().is_some_and(|e| !e.is_null())
            }
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            BatchEntry::Envelope {
                error: Some(Value::String(s)),
                ..
            } => Some(s.clone()),
            BatchEntry::Envelope {
                error: Some(other), ..
            } if !other.is_null() => Some(other.to_string()),
            _ => None,
        }
    }
}

pub type BatchResponse = AnkiResponse<Vec<BatchEntry>>;

// -- Batching --

/// Package every mapped note into a single `multi` call, preserving order.
pub fn build_batch(actions: Vec<ImportAction>) -> BatchRequest {
    AnkiRequest::new("multi", Some(MultiParams { actions }))
}

// -- Client --

pub struct AnkiClient {
    client: reqwest::Client,
    url: String,
}

impl AnkiClient {
    pub fn new(config: &AnkiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: config.url.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Submit the whole batch in one request.
    pub async fn submit(&self, batch: &BatchRequest) -> Result<BatchResponse> {
        debug!(url = %self.url, actions = batch.len(), "submitting batch");
        self.call(batch).await
    }

    /// Ask AnkiConnect for its API version. Used as a reachability probe.
    pub async fn version(&self) -> Result<u32> {
        let request = AnkiRequest::<()>::new("version", None);
        let response: AnkiResponse<u32> = self.call(&request).await?;
        if let Some(message) = response.error_message() {
            return Err(CoreError::Import(message));
        }
        response
            .result
            .ok_or_else(|| CoreError::Import("version response has no result".into()))
    }

    async fn call<P, T>(&self, request: &AnkiRequest<P>) -> Result<AnkiResponse<T>>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| CoreError::AnkiUnreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Import(format!(
                "{} returned {status}",
                request.action
            )));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| CoreError::AnkiUnreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        serde_json::from_str(&raw)
            .map_err(|e| CoreError::Import(format!("invalid {} response: {e}", request.action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(front: &str) -> ImportAction {
        let mut fields = BTreeMap::new();
        fields.insert("Front".to_string(), front.to_string());
        fields.insert("Back".to_string(), "A".to_string());
        AnkiRequest::new(
            "addNote",
            Some(AddNoteParams {
                note: Note {
                    deck_name: "inbox".to_string(),
                    model_name: "Basic".to_string(),
                    fields,
                    tags: vec!["t".to_string()],
                    options: NoteOptions {
                        allow_duplicate: false,
                    },
                },
            }),
        )
    }

    #[test]
    fn test_batch_wire_format() {
        let batch = build_batch(vec![note("Q1"), note("Q2")]);
        let json = serde_json::to_value(&batch).unwrap();

        assert_eq!(json["action"], "multi");
        assert_eq!(json["version"], 6);
        let actions = json["params"]["actions"].as_array().unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            json!({
                "action": "addNote",
                "version": 6,
                "params": {
                    "note": {
                        "deckName": "inbox",
                        "modelName": "Basic",
                        "fields": {"Back": "A", "Front": "Q1"},
                        "tags": ["t"],
                        "options": {"allowDuplicate": false}
                    }
                }
            })
        );
        assert_eq!(actions[1]["params"]["note"]["fields"]["Front"], "Q2");
    }

    #[test]
    fn test_empty_batch() {
        let batch = build_batch(Vec::new());
        assert!(batch.is_empty());
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["params"]["actions"], json!([]));
    }

    #[test]
    fn test_request_without_params_omits_key() {
        let json = serde_json::to_value(AnkiRequest::<()>::new("version", None)).unwrap();
        assert_eq!(json, json!({"action": "version", "version": 6}));
    }

    #[test]
    fn test_batch_entries_bare_and_enveloped() {
        let response: BatchResponse = serde_json::from_value(json!({
            "result": [
                1690000001,
                null,
                {"result": 7, "error": null},
                {"result": null, "error": "cannot create note because it is a duplicate"}
            ],
            "error": null
        }))
        .unwrap();

        let entries = response.result.unwrap();
        let failures: Vec<bool> = entries.iter().map(BatchEntry::is_failure).collect();
        assert_eq!(failures, vec![false, true, false, true]);
        assert_eq!(
            entries[3].error_message().as_deref(),
            Some("cannot create note because it is a duplicate")
        );
        assert_eq!(entries[1].error_message(), None);
    }

    #[test]
    fn test_error_message_ignores_null_and_empty() {
        let ok: BatchResponse = serde_json::from_value(json!({"result": [], "error": null})).unwrap();
        assert_eq!(ok.error_message(), None);

        let empty: BatchResponse = serde_json::from_value(json!({"result": [], "error": ""})).unwrap();
        assert_eq!(empty.error_message(), None);

        let failed: BatchResponse =
            serde_json::from_value(json!({"result": null, "error": "deck was not found"})).unwrap();
        assert_eq!(failed.error_message().as_deref(), Some("deck was not found"));
    }
}
