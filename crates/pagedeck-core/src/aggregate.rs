use std::fmt;

use tracing::{info, warn};

use crate::anki::{BatchEntry, BatchResponse};
use crate::config::AnkiConfig;
use crate::error::{CoreError, Result};

/// How a batch went, keyed only on the number of failed entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    FullSuccess(usize),
    PartialSuccess { imported: usize, failed: usize },
    TotalFailure,
}

pub fn classify(total: usize, failures: usize) -> Classification {
    if failures == 0 {
        Classification::FullSuccess(total)
    } else if failures >= total {
        Classification::TotalFailure
    } else {
        Classification::PartialSuccess {
            imported: total - failures,
            failed: failures,
        }
    }
}

/// The non-fatal end states of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    FullSuccess {
        imported: usize,
        deck: String,
    },
    PartialSuccess {
        imported: usize,
        failed: usize,
        deck: String,
    },
}

impl ImportOutcome {
    pub fn imported(&self) -> usize {
        match self {
            ImportOutcome::FullSuccess { imported, .. }
            | ImportOutcome::PartialSuccess { imported, .. } => *imported,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            ImportOutcome::FullSuccess { .. } => 0,
            ImportOutcome::PartialSuccess { failed, .. } => *failed,
        }
    }
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportOutcome::FullSuccess { imported, deck } => {
                let noun = if *imported == 1 { "card" } else { "cards" };
                write!(f, "{imported} {noun} imported into {deck}")
            }
            ImportOutcome::PartialSuccess {
                imported,
                failed,
                deck,
            } => write!(
                f,
                "partial success: {imported} imported into {deck}, {failed} failed"
            ),
        }
    }
}

/// Interpret the `multi` response for a batch of `total` cards.
pub fn aggregate(response: BatchResponse, total: usize, config: &AnkiConfig) -> Result<ImportOutcome> {
    if let Some(message) = response.error_message() {
        return Err(CoreError::Import(message));
    }

    let entries = response
        .result
        .ok_or_else(|| CoreError::Import("response has neither result nor error".into()))?;

    if entries.len() != total {
        return Err(CoreError::Import(format!(
            "expected {total} results, got {}",
            entries.len()
        )));
    }

    let failures = count_failures(&entries);

    match classify(total, failures) {
        Classification::FullSuccess(imported) => {
            info!(imported, deck = %config.deck_name, "import complete");
            Ok(ImportOutcome::FullSuccess {
                imported,
                deck: config.deck_name.clone(),
            })
        }
        Classification::PartialSuccess { imported, failed } => {
            warn!(imported, failed, deck = %config.deck_name, "import partially failed");
            Ok(ImportOutcome::PartialSuccess {
                imported,
                failed,
                deck: config.deck_name.clone(),
            })
        }
        Classification::TotalFailure => Err(CoreError::TotalFailure {
            note_type: config.note_type.clone(),
            front_field: config.front_field.clone(),
            back_field: config.back_field.clone(),
        }),
    }
}

fn count_failures(entries: &[BatchEntry]) -> usize {
    entries
        .iter()
        .enumerate()
        .filter(|(index, entry)| {
            let failed = entry.is_failure();
            if failed {
                match entry.error_message() {
                    Some(reason) => warn!(index = *index, reason = %reason, "note rejected"),
                    None => warn!(index = *index, "note rejected"),
                }
            }
            failed
        })
        .count()
}
