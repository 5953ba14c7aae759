//! Engine configuration loaded from `config.toml`.
//!
//! All sections are optional in the file; missing sections and fields fall
//! back to the defaults below. [`patch_value`] edits a single key in the
//! file while preserving comments and formatting, so hand-edited config
//! files survive programmatic updates from the `config.patch` command.

use crate::error::{AutomatorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reference to an API key secret.
///
/// Keys are never stored in the persisted collections; they live only in
/// `config.toml`, either inline or as a pointer to an environment variable
/// or a command that prints the key (e.g. a password manager CLI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiKeyRef {
    /// No key configured. Requests are sent without an `Authorization` header.
    #[default]
    None,
    /// Key stored inline in the config file.
    Literal { value: String },
    /// Key read from an environment variable at startup.
    Env { var: String },
    /// Key produced by running a shell command and capturing stdout.
    Command { cmd: String },
}

impl ApiKeyRef {
    /// Resolve the reference to an actual key.
    ///
    /// Returns `Ok(None)` when no key is configured. A configured but
    /// unresolvable reference (unset variable, failing command) is an
    /// error so that a misconfigured host fails loudly at startup.
    pub fn resolve(&self) -> Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Literal { value } => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_owned()))
                }
            }
            Self::Env { var } => std::env::var(var).map(Some).map_err(|_| {
                AutomatorError::Config(format!("environment variable '{var}' is not set"))
            }),
            Self::Command { cmd } => {
                let output = std::process::Command::new("/bin/sh")
                    .arg("-lc")
                    .arg(cmd)
                    .output()
                    .map_err(|e| {
                        AutomatorError::Config(format!("api key command failed to run: {e}"))
                    })?;
                if !output.status.success() {
                    return Err(AutomatorError::Config(format!(
                        "api key command exited with status {}",
                        output.status
                    )));
                }
                let key = String::from_utf8_lossy(&output.stdout).trim().to_owned();
                if key.is_empty() {
                    return Err(AutomatorError::Config(
                        "api key command produced no output".to_owned(),
                    ));
                }
                Ok(Some(key))
            }
        }
    }
}

/// Chat-completions endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature sent with every request.
    pub temperature: f64,
    /// API key reference resolved once at startup.
    pub api_key: ApiKeyRef,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.7,
            api_key: ApiKeyRef::None,
        }
    }
}

/// Writing-assistant settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    /// Language that the translate action targets.
    pub target_language: String,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            target_language: "English".to_owned(),
        }
    }
}

/// Desktop notification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Icon URL included in every notification payload. Resolved by the
    /// shell relative to its own bundle.
    pub icon_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            icon_url: "icons/icon-128.png".to_owned(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomatorConfig {
    pub completion: CompletionConfig,
    pub assist: AssistConfig,
    pub notifications: NotificationConfig,
}

impl AutomatorConfig {
    /// Default config file path (`config_dir()/config.toml`).
    #[must_use]
    pub fn default_config_path() -> std::path::PathBuf {
        crate::app_dirs::config_file()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AutomatorError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|e| {
            AutomatorError::Config(format!(
                "failed to parse config file '{}': {e}",
                path.display()
            ))
        })
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AutomatorError::Config(format!(
                    "failed to create config directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AutomatorError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents).map_err(|e| {
            AutomatorError::Config(format!(
                "failed to write config file '{}': {e}",
                path.display()
            ))
        })
    }
}

/// Set a single value in the config file by dotted key path
/// (e.g. `"completion.model"`), preserving comments and formatting.
///
/// Intermediate tables are created as needed; a missing file starts from
/// an empty document. The edited document is validated against
/// [`AutomatorConfig`] before anything is written, then persisted via a
/// temp file and atomic rename.
pub fn patch_value(path: &Path, key_path: &str, value: &serde_json::Value) -> Result<()> {
    let contents = if path.is_file() {
        std::fs::read_to_string(path).map_err(|e| {
            AutomatorError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?
    } else {
        String::new()
    };
    let mut doc: toml_edit::DocumentMut = contents.parse().map_err(|e| {
        AutomatorError::Config(format!(
            "failed to parse config file '{}': {e}",
            path.display()
        ))
    })?;

    let item = json_to_toml_item(key_path, value)?;
    set_dotted(&mut doc, key_path, item)?;

    let toml_text = doc.to_string();
    // Reject edits that would leave the file unloadable.
    let _config: AutomatorConfig = toml::from_str(&toml_text)
        .map_err(|e| AutomatorError::Config(format!("patched config is invalid: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AutomatorError::Config(format!(
                "failed to create config directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, toml_text.as_bytes())
        .map_err(|e| AutomatorError::Config(format!("failed to write temp file: {e}")))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| AutomatorError::Config(format!("failed to rename temp file: {e}")))
}

fn json_to_toml_item(key_path: &str, value: &serde_json::Value) -> Result<toml_edit::Item> {
    match value {
        serde_json::Value::String(s) => Ok(toml_edit::value(s.as_str())),
        serde_json::Value::Bool(b) => Ok(toml_edit::value(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(toml_edit::value(i))
            } else if let Some(f) = n.as_f64() {
                Ok(toml_edit::value(f))
            } else {
                Err(AutomatorError::Config(format!(
                    "unsupported number for key '{key_path}'"
                )))
            }
        }
        _ => Err(AutomatorError::Config(format!(
            "config.patch only accepts string, number or bool values for key '{key_path}'"
        ))),
    }
}

fn set_dotted(
    doc: &mut toml_edit::DocumentMut,
    key_path: &str,
    item: toml_edit::Item,
) -> Result<()> {
    let parts: Vec<&str> = key_path.split('.').collect();
    if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return Err(AutomatorError::Config(format!(
            "invalid config key path '{key_path}'"
        )));
    }

    let last = parts[parts.len() - 1];
    let parents = &parts[..parts.len() - 1];

    let mut current: &mut toml_edit::Item = doc.as_item_mut();
    for part in parents {
        // Create intermediate tables as needed.
        if current.get(part).is_none() {
            current[part] = toml_edit::Item::Table(toml_edit::Table::new());
        }
        current = &mut current[part];
    }
    current[last] = item;
    Ok(())
}
