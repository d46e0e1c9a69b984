//! Configuration management commands.
//!
//! Stores CLI settings in `~/.taxaformer/config.toml`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::output::{self, OutputFormat};

/// Settings the CLI reads.
const KNOWN_KEYS: &[(&str, &str)] = &[
    ("api-url", "Server base URL, e.g. http://localhost:8080"),
    ("session", "Session token used for submissions and status queries"),
    ("poll-interval", "Seconds between status polls when following a job"),
];

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        /// Configuration key (api-url, session, poll-interval)
        key: String,
        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Remove a configuration value
    Unset {
        /// Configuration key
        key: String,
    },

    /// Show all configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Settings persisted between invocations.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliSettings {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl CliSettings {
    fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".taxaformer").join("config.toml"))
    }

    /// Read settings, or defaults when no file exists yet.
    fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn validate(key: &str, value: &str) -> Result<()> {
    match key {
        "api-url" if !(value.starts_with("http://") || value.starts_with("https://")) => {
            anyhow::bail!("api-url must start with http:// or https://")
        }
        "poll-interval" => {
            value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .context("poll-interval must be a positive number of seconds")?;
            Ok(())
        }
        "session" if value.trim().is_empty() => anyhow::bail!("session must not be empty"),
        k if KNOWN_KEYS.iter().any(|(known, _)| *known == k) => Ok(()),
        other => {
            let keys: Vec<&str> = KNOWN_KEYS.iter().map(|(k, _)| *k).collect();
            anyhow::bail!("Unknown key '{}'. Known keys: {}", other, keys.join(", "))
        }
    }
}

/// Load a single value from the settings file, if set.
pub fn load_value(key: &str) -> Option<String> {
    CliSettings::load()
        .ok()
        .and_then(|settings| settings.values.get(key).cloned())
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Set { key, value } => {
            validate(&key, &value)?;
            let mut settings = CliSettings::load()?;
            settings.values.insert(key.clone(), value.clone());
            settings.save()?;

            match format {
                OutputFormat::Table => output::print_success(&format!("{} = {}", key, value)),
                _ => output::print_item(&serde_json::json!({ "key": key, "value": value }), format),
            }
        }

        ConfigCommands::Get { key } => {
            let settings = CliSettings::load()?;
            let value = settings
                .values
                .get(&key)
                .with_context(|| format!("Key '{}' is not set", key))?;
            match format {
                OutputFormat::Table => println!("{}", value),
                _ => output::print_item(&serde_json::json!({ "key": key, "value": value }), format),
            }
        }

        ConfigCommands::Unset { key } => {
            let mut settings = CliSettings::load()?;
            if settings.values.remove(&key).is_some() {
                settings.save()?;
                output::print_success(&format!("Removed {}", key));
            } else {
                output::print_info(&format!("Key '{}' was not set", key));
            }
        }

        ConfigCommands::Show => {
            let settings = CliSettings::load()?;

            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    for (key, description) in KNOWN_KEYS {
                        let value = settings.values.get(*key).map(String::as_str).unwrap_or("-");
                        output::print_detail(key, &format!("{}  ({})", value, description));
                    }
                }
                _ => output::print_item(&settings.values, format),
            }
        }

        ConfigCommands::Reset { force } => {
            if !force {
                output::print_info("This will remove all CLI settings. Use --force to confirm.");
                return Ok(());
            }

            let path = CliSettings::path()?;
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
            output::print_success("Configuration reset to defaults");
        }
    }

    Ok(())
}
