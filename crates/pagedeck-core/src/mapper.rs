use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::anki::{AddNoteParams, AnkiRequest, ImportAction, Note, NoteOptions};
use crate::config::AnkiConfig;

/// A card as the model wrote it, before casing and tag format are resolved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCard {
    front: Option<Value>,
    #[serde(rename = "Front")]
    front_title: Option<Value>,
    back: Option<Value>,
    #[serde(rename = "Back")]
    back_title: Option<Value>,
    tags: Option<Value>,
    #[serde(rename = "Tags")]
    tags_title: Option<Value>,
}

impl RawCard {
    /// Non-object values yield an empty card rather than an error.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// The forms a `tags` value arrives in.
#[derive(Debug, Clone, PartialEq)]
pub enum TagsPayload {
    List(Vec<Value>),
    Text(String),
    Absent,
}

impl TagsPayload {
    fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => TagsPayload::Absent,
            Some(Value::Array(items)) => TagsPayload::List(items),
            Some(Value::String(s)) => TagsPayload::Text(s),
            Some(other) => TagsPayload::Text(other.to_string()),
        }
    }

    /// Lists are used as given; anything else is split on single spaces.
    ///
    /// An absent value splits the empty string, giving `[""]`.
    pub fn into_tags(self) -> Vec<String> {
        match self {
            TagsPayload::List(items) => items.into_iter().filter_map(value_text).collect(),
            TagsPayload::Text(text) => text.split(' ').map(str::to_string).collect(),
            TagsPayload::Absent => "".split(' ').map(str::to_string).collect(),
        }
    }
}

/// A card with front/back/tags resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub front: Option<String>,
    pub back: Option<String>,
    pub tags: Vec<String>,
}

impl Card {
    pub fn resolve(raw: RawCard) -> Self {
        let tags = if is_blank(raw.tags.as_ref()) {
            raw.tags_title.or(raw.tags)
        } else {
            raw.tags
        };
        Self {
            front: resolve_text(raw.front, raw.front_title),
            back: resolve_text(raw.back, raw.back_title),
            tags: TagsPayload::from_value(tags).into_tags(),
        }
    }

    pub fn from_value(value: Value) -> Self {
        Self::resolve(RawCard::from_value(value))
    }

    pub fn is_complete(&self) -> bool {
        self.front.is_some() && self.back.is_some()
    }

    /// Build the `addNote` action for this card.
    pub fn into_action(self, config: &AnkiConfig) -> ImportAction {
        let mut fields = BTreeMap::new();
        if let Some(front) = self.front {
            fields.insert(config.front_field.clone(), front);
        }
        if let Some(back) = self.back {
            fields.insert(config.back_field.clone(), back);
        }

        let tags = if config.drop_empty_tags {
            self.tags.into_iter().filter(|t| !t.is_empty()).collect()
        } else {
            self.tags
        };

        AnkiRequest::new(
            "addNote",
            Some(AddNoteParams {
                note: Note {
                    deck_name: config.deck_name.clone(),
                    model_name: config.note_type.clone(),
                    fields,
                    tags,
                    options: NoteOptions {
                        allow_duplicate: config.allow_duplicate,
                    },
                },
            }),
        )
    }
}

/// Map every normalized card to an `addNote` action, in order.
///
/// Cards missing a side are forwarded anyway; AnkiConnect rejects them and
/// the rejection shows up in the batch result.
pub fn map_cards(values: Vec<Value>, config: &AnkiConfig) -> Vec<ImportAction> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let card = Card::from_value(value);
            if !card.is_complete() {
                warn!(
                    index,
                    has_front = card.front.is_some(),
                    has_back = card.back.is_some(),
                    "card is missing a side, forwarding as-is"
                );
            }
            card.into_action(config)
        })
        .collect()
}

/// `primary` unless it is missing or empty, otherwise `fallback`.
fn resolve_text(primary: Option<Value>, fallback: Option<Value>) -> Option<String> {
    if is_blank(primary.as_ref()) {
        fallback.and_then(value_text)
    } else {
        primary.and_then(value_text)
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
