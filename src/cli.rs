/// This module implements the CLI interface for drive-merge: command
/// parsing, argument validation, and the async entrypoint used both by
/// `main` and by integration tests.
///
/// All pipeline logic lives in the `drive-merge-core` crate; this module is
/// strictly CLI glue and orchestration.
///
/// ## Output contract
/// On success the FINAL stdout line is a single JSON object
/// `{"file_id": ..., "url": ...}` for machine consumption. All progress
/// output goes through `tracing` (stderr) and must not be parsed.
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drive_merge_core::auth::TokenFile;
use drive_merge_core::drive::DriveClient;
use drive_merge_core::notify::WebhookNotifier;
use drive_merge_core::pipeline;

use crate::load_config::{load_config, Overrides};

/// CLI for drive-merge: concatenate chunked PDFs from a Drive folder and
/// publish the result.
#[derive(Parser)]
#[clap(
    name = "drive-merge",
    version,
    about = "Merge PDF chunks from a Drive folder, upload the result, and run optional clean-up"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge all PDF chunks in the configured folder and publish the result
    Merge {
        /// Path to the YAML config file
        #[clap(long, default_value = "drive-merge.yaml")]
        config: PathBuf,
        /// Drive folder id containing the PDF chunks
        #[clap(long)]
        folder_id: Option<String>,
        /// Token cache JSON path
        #[clap(long)]
        token: Option<PathBuf>,
        /// Explicit output file name (default: merged_<timestamp>.pdf)
        #[clap(long)]
        output_name: Option<String>,
        /// Also write the merged PDF to the current directory
        #[clap(long)]
        save_local: bool,
        /// Move the published file into the configured root/pdf folder
        #[clap(long)]
        move_to_root: bool,
        /// Delete chunk PDFs after a successful merge
        #[clap(long)]
        clean_chunks: bool,
        /// Delete the source folder after cleaning (implies nothing without
        /// --clean-chunks)
        #[clap(long)]
        delete_folder: bool,
        /// Do not call the merge-complete webhook
        #[clap(long)]
        skip_notify: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Merge {
            config,
            folder_id,
            token,
            output_name,
            save_local,
            move_to_root,
            clean_chunks,
            delete_folder,
            skip_notify,
        } => {
            let settings = load_config(
                &config,
                Overrides {
                    folder_id,
                    token,
                    output_name,
                    save_local,
                    move_to_root,
                    clean_chunks,
                    delete_folder,
                    skip_notify,
                },
            )?;
            tracing::info!(
                folder_id = %settings.options.folder_id,
                clean_chunks = settings.options.clean_chunks,
                "Starting merge run"
            );

            let credentials = TokenFile::new(settings.token_path.clone());
            let storage = DriveClient::new(credentials);
            let notifier = settings
                .webhook
                .as_ref()
                .map(|w| WebhookNotifier::new(w.url.clone(), w.token.clone()));

            let result = pipeline::run(&storage, notifier.as_ref(), &settings.options).await;
            match result {
                Ok(result) => {
                    tracing::info!(file_id = ?result.file_id, "Merge run complete");
                    // Keep the machine-readable result as the final stdout
                    // line for CI consumers.
                    println!("{}", serde_json::to_string(&result)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(error = %e, "Merge run failed");
                    Err(anyhow::anyhow!("{e}"))
                }
            }
        }
    }
}
