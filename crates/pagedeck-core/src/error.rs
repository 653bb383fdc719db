use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cannot read page: {0}")]
    Extraction(String),

    #[error("AI endpoint unreachable; verify credential ({0})")]
    Network(String),

    #[error("failed to parse model output: {0}")]
    Parse(String),

    #[error("Anki error: {0}")]
    Import(String),

    #[error(
        "import failed: no note was added. Check that note type \"{note_type}\" exists in Anki \
         and that its fields are named exactly \"{front_field}\" and \"{back_field}\""
    )]
    TotalFailure {
        note_type: String,
        front_field: String,
        back_field: String,
    },

    #[error("cannot reach Anki at {url} ({reason}); make sure Anki is open with AnkiConnect installed")]
    AnkiUnreachable { url: String, reason: String },

    #[error("API key is empty; set ai.api_key or pass --api-key")]
    MissingApiKey,

    #[error("a run is already in progress")]
    Busy,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
