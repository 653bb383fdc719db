pub mod aggregate;
pub mod anki;
pub mod completion;
pub mod config;
pub mod error;
pub mod mapper;
pub mod normalize;
pub mod pipeline;
pub mod prompt;

pub use aggregate::ImportOutcome;
pub use config::AppConfig;
pub use error::{CoreError, Result};
pub use pipeline::{PageTextProvider, Runner, Status, StatusSink};
