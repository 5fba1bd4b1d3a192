/// `load_config` module: loads a static YAML config and merges command-line
/// overrides into the internal run settings.
///
/// This module is the only place where untrusted YAML is parsed and mapped
/// to rich, strongly-typed internal structs.
///
/// # Responsibilities
/// - Parse the user-supplied YAML configuration file (when present) into
///   type-safe Rust structs
/// - Apply CLI flag overrides on top of file values
/// - Validate that a folder id is configured before the pipeline starts
/// - Decide whether the completion webhook is in play (url + shared token
///   configured, and not skipped)
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich
/// diagnostics, and are surfaced at the CLI boundary.
use std::path::{Path, PathBuf};

use anyhow::Result;
use drive_merge_core::config::RunOptions;
use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_TOKEN_PATH: &str = "token.json";
const DEFAULT_ROOT_FOLDER: &str = "Rememly";
const DEFAULT_PDF_FOLDER: &str = "pdf";

/// The `merge:` section of the YAML config file. Every key is optional;
/// CLI flags override file values.
#[derive(Debug, Default, Deserialize)]
pub struct MergeSection {
    pub folder_id: Option<String>,
    pub token: Option<PathBuf>,
    pub output_name: Option<String>,
    #[serde(default)]
    pub save_local: bool,
    #[serde(default)]
    pub move_to_root: bool,
    #[serde(default)]
    pub clean_chunks: bool,
    #[serde(default)]
    pub delete_chunks_folder: bool,
    pub root_folder_name: Option<String>,
    pub pdf_folder_name: Option<String>,
    pub webhook_url: Option<String>,
    pub merge_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    merge: MergeSection,
}

/// CLI flag values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub folder_id: Option<String>,
    pub token: Option<PathBuf>,
    pub output_name: Option<String>,
    pub save_local: bool,
    pub move_to_root: bool,
    pub clean_chunks: bool,
    pub delete_folder: bool,
    pub skip_notify: bool,
}

/// Webhook endpoint configuration, present only when both the url and the
/// shared secret are configured.
#[derive(Debug, Clone)]
pub struct Webhook {
    pub url: String,
    pub token: String,
}

/// Fully resolved settings for one run.
#[derive(Debug)]
pub struct Settings {
    pub token_path: PathBuf,
    pub options: RunOptions,
    pub webhook: Option<Webhook>,
}

/// Load the YAML config file (missing file means defaults), apply CLI
/// overrides and validate.
pub fn load_config(path: &Path, overrides: Overrides) -> Result<Settings> {
    let file = if path.exists() {
        info!(config_path = ?path, "Loading configuration from file");
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!(error = ?e, config_path = ?path, "Failed to read config file");
                return Err(anyhow::anyhow!("Failed to read config file {path:?}: {e}"));
            }
        };
        match serde_yaml::from_str::<FileConfig>(&content) {
            Ok(config) => {
                info!(config_path = ?path, "Parsed config YAML successfully");
                config
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    } else {
        info!(config_path = ?path, "Config file not found, using defaults and CLI flags");
        FileConfig::default()
    };
    let merge = file.merge;

    let Some(folder_id) = overrides.folder_id.or(merge.folder_id) else {
        return Err(anyhow::anyhow!(
            "Missing folder id. Set merge.folder_id in the config or pass --folder-id."
        ));
    };

    let token_path = overrides
        .token
        .or(merge.token)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH));

    let save_local = if overrides.save_local || merge.save_local {
        Some(std::env::current_dir()?)
    } else {
        None
    };

    let options = RunOptions {
        folder_id,
        output_name: overrides.output_name.or(merge.output_name),
        save_local,
        move_to_root: overrides.move_to_root || merge.move_to_root,
        clean_chunks: overrides.clean_chunks || merge.clean_chunks,
        delete_folder: overrides.delete_folder || merge.delete_chunks_folder,
        root_folder_name: merge
            .root_folder_name
            .unwrap_or_else(|| DEFAULT_ROOT_FOLDER.to_string()),
        pdf_folder_name: merge
            .pdf_folder_name
            .unwrap_or_else(|| DEFAULT_PDF_FOLDER.to_string()),
    };

    let webhook = if overrides.skip_notify {
        info!("Completion webhook skipped by flag");
        None
    } else {
        match (merge.webhook_url, merge.merge_token) {
            (Some(url), Some(token)) if !url.trim().is_empty() && !token.trim().is_empty() => {
                Some(Webhook {
                    url: url.trim().to_string(),
                    token: token.trim().to_string(),
                })
            }
            _ => {
                info!("No webhook url/token configured, completion callback disabled");
                None
            }
        }
    };

    Ok(Settings {
        token_path,
        options,
        webhook,
    })
}
