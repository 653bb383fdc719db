mod detect;
mod page;
mod status;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pagedeck_core::anki::AnkiClient;
use pagedeck_core::config::init_logging;
use pagedeck_core::pipeline::preview_batch;
use pagedeck_core::{AppConfig, PageTextProvider, Runner, StatusSink};
use tracing::{debug, info};

use crate::detect::TabHandle;
use crate::status::TerminalStatus;

#[derive(Parser)]
#[command(name = "pagedeck", about = "Turn a web page into Anki flashcards")]
struct Cli {
    /// Config file (defaults to ~/.pagedeck/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate cards from a page and import them into Anki
    Run {
        /// Page to read: a file path, an http(s) URL, or - for stdin
        tab: String,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Print the import request instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that AnkiConnect is reachable
    Check,
    /// Inspect the stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings (API key masked)
    Show,
    /// Print the config file location
    Path,
}

/// Values that overwrite the stored settings for this run and are saved back.
#[derive(Args, Default)]
struct SettingsArgs {
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    deck: Option<String>,
    #[arg(long)]
    note_type: Option<String>,
    #[arg(long)]
    front_field: Option<String>,
    #[arg(long)]
    back_field: Option<String>,
    /// Characters of page text sent to the model
    #[arg(long)]
    max_chars: Option<usize>,
}

impl SettingsArgs {
    fn apply(self, config: &mut AppConfig) {
        let set = |target: &mut String, value: Option<String>| {
            if let Some(value) = value {
                *target = value.trim().to_string();
            }
        };
        set(&mut config.ai.api_key, self.api_key);
        set(&mut config.ai.base_url, self.base_url);
        set(&mut config.ai.model, self.model);
        set(&mut config.anki.deck_name, self.deck);
        set(&mut config.anki.note_type, self.note_type);
        set(&mut config.anki.front_field, self.front_field);
        set(&mut config.anki.back_field, self.back_field);
        if let Some(max_chars) = self.max_chars {
            config.page.max_chars = max_chars;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };

    match cli.command {
        Command::Run {
            tab,
            settings,
            dry_run,
        } => run_import(&config_path, &tab, settings, dry_run).await,
        Command::Check => run_check(&config_path).await,
        Command::Config { action } => run_config(&config_path, action),
    }
}

async fn run_import(
    config_path: &Path,
    tab: &str,
    settings: SettingsArgs,
    dry_run: bool,
) -> anyhow::Result<ExitCode> {
    let mut config = AppConfig::load_or_create(config_path)?;
    settings.apply(&mut config);
    config.save_to(config_path)?;
    debug!(path = %config_path.display(), "settings saved");

    let handle = TabHandle::parse(tab);
    let provider = detect::create_page_provider(&handle);
    let status = TerminalStatus;

    info!(
        tab = %tab,
        model = %config.ai.model,
        deck = %config.anki.deck_name,
        dry_run,
        "starting run"
    );

    if dry_run {
        return match render_dry_run(&config, provider.as_ref(), tab, &status).await {
            Ok(json) => {
                println!("{json}");
                Ok(ExitCode::SUCCESS)
            }
            Err(_) => Ok(ExitCode::FAILURE),
        };
    }

    let runner = Runner::new();
    match runner.run(&config, provider.as_ref(), tab, &status).await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        // Already reported on the status line.
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

/// The `multi` request a run would send, as pretty JSON. Nothing is imported.
async fn render_dry_run(
    config: &AppConfig,
    provider: &dyn PageTextProvider,
    tab: &str,
    status: &dyn StatusSink,
) -> anyhow::Result<String> {
    let batch = preview_batch(config, provider, tab, status).await?;
    Ok(serde_json::to_string_pretty(&batch)?)
}

async fn run_check(config_path: &Path) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load_or_create(config_path)?;
    let client = AnkiClient::new(&config.anki);

    match client.version().await {
        Ok(version) => {
            println!("AnkiConnect reachable at {} (API version {version})", client.url());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_config(config_path: &Path, action: ConfigAction) -> anyhow::Result<ExitCode> {
    match action {
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Show => {
            let mut config = AppConfig::load_or_create(config_path)?;
            config.ai.api_key = config.masked_api_key();
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
