//! 命令行入口

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use livetrans::core::{print_error_message, print_info_message, DocumentTranslator};
use livetrans::env::{core::LogLevel, generate_env_docs, EnvVar};
use livetrans::translation::backend::settings::mask_credential;
use livetrans::translation::config::load_translation_config;
use livetrans::translation::{
    ChatTranslator, ConfigManager, FileSettings, SettingKey, SettingsStore, TranslationCache,
    TranslationConfig, TranslationResult,
};

/// Livetrans CLI.
#[derive(Parser)]
#[command(name = "livetrans")]
#[command(about = "Incremental, mutation-aware translation of HTML documents")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate an HTML document ("-" reads from stdin)
    Translate {
        /// Input HTML file
        input: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Persist translations to this JSON file between runs
        #[arg(long)]
        cache_file: Option<PathBuf>,

        /// Input character encoding
        #[arg(short = 'E', long)]
        encoding: Option<String>,
    },

    /// Stored backend settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Store the credential and/or model
    Set {
        /// API key sent as a bearer token
        #[arg(long)]
        credential: Option<String>,

        /// Model name (falls back to the configured default when unset)
        #[arg(long)]
        model: Option<String>,
    },

    /// Print stored settings (credential masked)
    Show,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write an example configuration file
    Init {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// List supported environment variables
    Env,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LogLevel::get_or_default("info".to_string())));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> TranslationResult<TranslationConfig> {
    match path {
        Some(path) => Ok(ConfigManager::from_path(path)?.into_config()),
        None => Ok(load_translation_config()),
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            print_error_message(&format!("Error: {}", e));
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Translate {
            input,
            output,
            cache_file,
            encoding,
        } => translate(config, &input, output, cache_file, encoding).await,
        Commands::Settings { action } => settings(&config, action).await,
        Commands::Config { action } => config_command(&config, action),
    };

    if let Err(e) = result {
        print_error_message(&format!("Error: {}", e));
        process::exit(1);
    }
}

async fn translate(
    config: TranslationConfig,
    input: &str,
    output: Option<PathBuf>,
    cache_file: Option<PathBuf>,
    encoding: Option<String>,
) -> TranslationResult<()> {
    let settings = Arc::new(FileSettings::from_config_path(&config.settings_path));
    if settings.get(SettingKey::Credential).await?.is_none() {
        print_error_message(&format!(
            "No API key configured in {}. Run `livetrans settings set --credential <KEY>` first.",
            settings.path().display()
        ));
        process::exit(1);
    }

    let input_data = if input == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(input)?
    };

    let cache = Arc::new(TranslationCache::from_config(config.cache_max_entries));
    if let Some(path) = &cache_file {
        let loaded = cache.load_from_file(path)?;
        tracing::info!("从 {} 载入 {} 条缓存译文", path.display(), loaded);
    }

    let translator = Arc::new(ChatTranslator::new(&config, settings)?);
    let document_translator = DocumentTranslator::new(config, translator, Arc::clone(&cache));
    let translated = document_translator
        .translate(&input_data, encoding.as_deref())
        .await?;

    if let Some(path) = &cache_file {
        let saved = cache.save_to_file(path)?;
        tracing::info!("已保存 {} 条缓存译文到 {}", saved, path.display());
    }

    match output {
        Some(path) => std::fs::write(path, &translated.data)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&translated.data)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

async fn settings(config: &TranslationConfig, action: SettingsAction) -> TranslationResult<()> {
    let settings = FileSettings::from_config_path(&config.settings_path);

    match action {
        SettingsAction::Set { credential, model } => {
            if credential.is_none() && model.is_none() {
                print_error_message("Nothing to store, pass --credential and/or --model");
                process::exit(1);
            }
            if let Some(credential) = credential {
                settings.set(SettingKey::Credential, &credential).await?;
            }
            if let Some(model) = model {
                settings.set(SettingKey::Model, &model).await?;
            }
            print_info_message(&format!("Saved to {}", settings.path().display()));
        }
        SettingsAction::Show => {
            let stored = settings.load().await?;
            print_info_message(&format!("settings: {}", settings.path().display()));
            print_info_message(&format!(
                "apiKey:   {}",
                stored
                    .get(SettingKey::Credential)
                    .map(|key| mask_credential(&key))
                    .unwrap_or_else(|| "(not set)".to_string())
            ));
            print_info_message(&format!(
                "model:    {}",
                stored
                    .get(SettingKey::Model)
                    .unwrap_or_else(|| format!("{} (default)", config.default_model))
            ));
        }
    }

    Ok(())
}

fn config_command(config: &TranslationConfig, action: ConfigAction) -> TranslationResult<()> {
    match action {
        ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                print_error_message(&format!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                ));
                process::exit(1);
            }
            ConfigManager::generate_example_config(&path)?;
            print_info_message(&format!("Wrote {}", path.display()));
        }
        ConfigAction::Show => {
            let content = toml::to_string_pretty(config)?;
            print_info_message(&content);
        }
        ConfigAction::Env => print_info_message(&generate_env_docs()),
    }

    Ok(())
}
