use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub anki: AnkiConfig,
    pub page: PageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnkiConfig {
    pub url: String,
    pub deck_name: String,
    pub note_type: String,
    /// Name of the note type's question field.
    pub front_field: String,
    /// Name of the note type's answer field.
    pub back_field: String,
    pub allow_duplicate: bool,
    /// Filter out empty tags (e.g. the `[""]` produced when a card has no tags).
    pub drop_empty_tags: bool,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub max_chars: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_seconds: 120,
            connect_timeout_seconds: 10,
        }
    }
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8765".to_string(),
            deck_name: "inbox".to_string(),
            note_type: "Basic".to_string(),
            front_field: "Front".to_string(),
            back_field: "Back".to_string(),
            allow_duplicate: false,
            drop_empty_tags: false,
            timeout_seconds: 30,
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            max_chars: crate::prompt::MAX_SNIPPET_CHARS,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.pagedeck/config.toml`, creating defaults if missing.
    pub fn load() -> Result<Self> {
        Self::load_or_create(&Self::default_path()?)
    }

    /// Load config from `path`, writing defaults there if the file does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = AppConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Load config from a specific path (for testing or custom setups).
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("failed to read config: {e}")))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .map_err(|e| CoreError::Config(format!("failed to parse config: {e}")))?;
        config.ai.api_key = config.ai.api_key.trim().to_string();
        Ok(config)
    }

    /// Overwrite the whole file at `path` with the current values.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("failed to serialize config: {e}")))?;
        fs::write(path, toml_str)?;
        Ok(())
    }

    /// Returns the default base directory (`~/.pagedeck`).
    pub fn default_base_dir() -> Result<PathBuf> {
        resolve_tilde("~/.pagedeck")
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::default_base_dir()?.join("config.toml"))
    }

    /// The API key reduced to its last four characters, for display.
    pub fn masked_api_key(&self) -> String {
        let key = &self.ai.api_key;
        if key.is_empty() {
            return "(not set)".to_string();
        }
        let count = key.chars().count();
        if count <= 4 {
            return "*".repeat(count);
        }
        let tail: String = key.chars().skip(count - 4).collect();
        format!("{}{tail}", "*".repeat(count - 4))
    }
}

/// Expand `~` to the user's home directory.
pub fn resolve_tilde(path: &str) -> Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Config("could not determine home directory".to_string()))?;
        Ok(home.join(rest))
    } else if path == "~" {
        dirs::home_dir()
            .ok_or_else(|| CoreError::Config("could not determine home directory".to_string()))
    } else {
        Ok(PathBuf::from(path))
    }
}

/// Initialize tracing/logging with env filter.
///
/// Respects `RUST_LOG` env var. Defaults to `info` level, or `debug` when
/// `verbose` is set. Logs go to stderr; stdout is reserved for run status.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.page.max_chars, 5000);
        assert_eq!(config.anki.url, "http://127.0.0.1:8765");
        assert_eq!(config.anki.deck_name, "inbox");
        assert!(!config.anki.allow_duplicate);
        assert!(!config.anki.drop_empty_tags);
        assert!((config.ai.temperature - 0.1).abs() < f32::EPSILON);
        assert!(config.ai.api_key.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let toml_content = r#"
[ai]
api_key = "sk-test"
base_url = "https://llm.example.com/v1"
model = "deepseek-chat"

[anki]
deck_name = "biology"
note_type = "问答题"
front_field = "正面"
back_field = "背面"
"#;
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::load_from(f.path()).unwrap();
        assert_eq!(config.ai.api_key, "sk-test");
        assert_eq!(config.ai.model, "deepseek-chat");
        assert_eq!(config.anki.deck_name, "biology");
        assert_eq!(config.anki.note_type, "问答题");
        assert_eq!(config.anki.front_field, "正面");
        // defaults for fields not specified
        assert_eq!(config.ai.timeout_seconds, 120);
        assert_eq!(config.anki.url, "http://127.0.0.1:8765");
        assert_eq!(config.page.max_chars, 5000);
    }

    #[test]
    fn test_load_from_trims_api_key() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"[ai]\napi_key = \"  sk-test\\n \"\n").unwrap();

        let config = AppConfig::load_from(f.path()).unwrap();
        assert_eq!(config.ai.api_key, "sk-test");
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = AppConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.anki.deck_name, "inbox");
    }

    #[test]
    fn test_save_overwrites_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.ai.api_key = "first".to_string();
        config.anki.deck_name = "one".to_string();
        config.save_to(&path).unwrap();

        config.ai.api_key = "second".to_string();
        config.save_to(&path).unwrap();

        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.ai.api_key, "second");
        assert_eq!(reloaded.anki.deck_name, "one");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"[ai\napi_key = ").unwrap();

        let err = AppConfig::load_from(f.path()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_masked_api_key() {
        let mut config = AppConfig::default();
        assert_eq!(config.masked_api_key(), "(not set)");
        config.ai.api_key = "abc".to_string();
        assert_eq!(config.masked_api_key(), "***");
        config.ai.api_key = "sk-123456".to_string();
        assert_eq!(config.masked_api_key(), "*****3456");
    }
}
