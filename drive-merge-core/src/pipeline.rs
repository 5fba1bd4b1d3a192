//! High-level pipeline: list → fetch/merge → publish → post-process.
//!
//! This module orchestrates one merge run against a remote folder of PDF
//! chunks:
//!   - Verifies the source folder exists, is a folder, and is not trashed
//!   - Lists the chunk files and sorts them into deterministic merge order
//!   - Downloads each file sequentially and appends its pages
//!   - Serializes the result and uploads it as `merged_<timestamp>.pdf`
//!   - Optionally moves the artifact, deletes the source chunks, notifies a
//!     webhook, and deletes the emptied source folder
//!
//! # Failure policy
//! Every error is fatal: no retries, no partial-success mode, no resume. A
//! failed run is restarted from the beginning. Sequential execution is a
//! deliberate floor, not an omission: page order is semantically
//! significant and a single thread trivially preserves it.
//!
//! # Callable From
//! - The CLI crate and integration tests; all collaborators arrive through
//!   the [`crate::contract`] traits, so the whole run is testable against
//!   mocks.
//!
//! # Navigation
//! - Main entrypoint: [`run`]
//! - Pre-flight check (independently callable): [`verify_folder`]

use chrono::Local;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::RunOptions;
use crate::contract::{
    AuthError, MergeComplete, Notifier, NotifyError, Storage, StorageError, FOLDER_MIME, PDF_MIME,
};
use crate::merge::{MergeError, PdfMerger};
use crate::order;

/// States of one pipeline run, in the order they are reached. Bracketed
/// post-processing stages are skipped when their toggle is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    FolderVerified,
    Listed,
    Merging,
    Saved,
    Published,
    Moved,
    Cleaned,
    Notified,
    FolderDeleted,
    Done,
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = ?stage, to = ?next, "pipeline stage transition");
    *stage = next;
}

/// The durable output of a successful run, emitted by the CLI as the final
/// stdout line for machine consumption.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub file_id: Option<String>,
    pub url: Option<String>,
}

/// Fatal pipeline errors, one variant per failure class.
#[derive(Debug)]
pub enum PipelineError {
    /// No valid or refreshable credential.
    Auth(AuthError),
    /// Missing, trashed, or wrong-type source folder.
    Folder(String),
    /// No matching files found in the source folder.
    EmptyFolder(String),
    /// Any download or upload failure.
    Transfer(StorageError),
    /// A source document could not be parsed or concatenated.
    Merge(MergeError),
    /// Writing the local copy failed.
    SaveLocal(std::io::Error),
    /// The completion webhook call failed. Not best-effort.
    Notify(NotifyError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Auth(e) => write!(f, "authentication failed: {e}"),
            PipelineError::Folder(msg) => write!(f, "{msg}"),
            PipelineError::EmptyFolder(id) => {
                write!(f, "no PDF files found in folder: {id}")
            }
            PipelineError::Transfer(e) => write!(f, "{e}"),
            PipelineError::Merge(e) => write!(f, "merge failed: {e}"),
            PipelineError::SaveLocal(e) => write!(f, "failed to save local copy: {e}"),
            PipelineError::Notify(e) => write!(f, "merge-complete notification failed: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<StorageError> for PipelineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Auth(auth) => PipelineError::Auth(auth),
            other => PipelineError::Transfer(other),
        }
    }
}

impl From<MergeError> for PipelineError {
    fn from(e: MergeError) -> Self {
        PipelineError::Merge(e)
    }
}

impl From<NotifyError> for PipelineError {
    fn from(e: NotifyError) -> Self {
        PipelineError::Notify(e)
    }
}

/// Default generation-stamped output name.
pub fn default_output_name() -> String {
    format!("merged_{}.pdf", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Pre-flight check that the source folder exists, is a folder, and is not
/// trashed. Fails fast before any download work begins.
pub async fn verify_folder<S: Storage>(storage: &S, folder_id: &str) -> Result<(), PipelineError> {
    let meta = match storage.get_metadata(folder_id).await {
        Ok(meta) => meta,
        Err(StorageError::Auth(e)) => return Err(PipelineError::Auth(e)),
        Err(e) => {
            error!(folder_id, error = %e, "folder lookup failed");
            return Err(PipelineError::Folder(format!(
                "folder not found or inaccessible: {folder_id}"
            )));
        }
    };
    if meta.trashed {
        return Err(PipelineError::Folder(format!("folder is trashed: {folder_id}")));
    }
    if meta.mime_type != FOLDER_MIME {
        return Err(PipelineError::Folder(format!("not a folder: {folder_id}")));
    }
    Ok(())
}

/// Run the full merge pipeline.
///
/// Pass `None` for `notifier` to skip the completion callback; when a
/// notifier is given, its failure fails the run.
pub async fn run<S, N>(
    storage: &S,
    notifier: Option<&N>,
    options: &RunOptions,
) -> Result<PipelineResult, PipelineError>
where
    S: Storage,
    N: Notifier,
{
    let mut stage = Stage::Init;
    info!(folder_id = %options.folder_id, "starting merge pipeline");

    verify_folder(storage, &options.folder_id).await?;
    advance(&mut stage, Stage::FolderVerified);

    let mut files = storage.list_files(&options.folder_id, PDF_MIME).await?;
    order::sort_files(&mut files);
    if files.is_empty() {
        error!(folder_id = %options.folder_id, "no PDF files found");
        return Err(PipelineError::EmptyFolder(options.folder_id.clone()));
    }
    advance(&mut stage, Stage::Listed);
    info!(count = files.len(), "found PDF files");

    advance(&mut stage, Stage::Merging);
    let mut merger = PdfMerger::new();
    let total = files.len();
    for (idx, file) in files.iter().enumerate() {
        let position = idx + 1;
        info!(
            position,
            total,
            name = %file.name,
            size = ?file.size,
            "downloading chunk"
        );
        let bytes = storage.download(&file.id).await?;
        let pages = merger.append(&bytes)?;
        debug!(name = %file.name, pages, "appended pages");
        if position % 5 == 0 || position == total {
            info!(merged = position, total, "merge progress");
        }
    }

    info!(pages = merger.page_count(), "saving merged PDF");
    let output_name = options
        .output_name
        .clone()
        .unwrap_or_else(default_output_name);
    let merged = merger.finish()?;
    if let Some(dir) = &options.save_local {
        let path = dir.join(&output_name);
        std::fs::write(&path, &merged).map_err(PipelineError::SaveLocal)?;
        info!(path = %path.display(), "saved local copy");
    }
    advance(&mut stage, Stage::Saved);

    info!(name = %output_name, "uploading merged PDF");
    let created = storage
        .upload(&options.folder_id, &output_name, merged)
        .await?;
    advance(&mut stage, Stage::Published);
    info!(file_id = %created.id, url = ?created.web_view_link, "published merged PDF");

    if options.move_to_root {
        match resolve_destination(storage, options).await? {
            Some(destination) => {
                storage.move_file(&created.id, &destination).await?;
                advance(&mut stage, Stage::Moved);
                info!(
                    root = %options.root_folder_name,
                    child = %options.pdf_folder_name,
                    "moved merged PDF to destination folder"
                );
            }
            // Lookup miss is non-fatal, but loud: a silently skipped move
            // is indistinguishable from a successful one otherwise.
            None => warn!(
                root = %options.root_folder_name,
                child = %options.pdf_folder_name,
                "destination folder not found, skipping move"
            ),
        }
    }

    if options.clean_chunks {
        // Re-list so the freshly uploaded file (still in the source folder
        // unless moved) is seen and kept by id.
        let current = storage.list_files(&options.folder_id, PDF_MIME).await?;
        let mut deleted = 0usize;
        for file in &current {
            if file.id == created.id {
                continue;
            }
            storage.delete(&file.id).await?;
            deleted += 1;
        }
        advance(&mut stage, Stage::Cleaned);
        info!(deleted, "cleaned chunk PDFs in source folder");
    }

    if let Some(notifier) = notifier {
        let event = MergeComplete {
            folder_id: options.folder_id.clone(),
            file_id: created.id.clone(),
            url: created.web_view_link.clone().unwrap_or_default(),
            clean_chunks: options.clean_chunks,
        };
        notifier.merge_complete(&event).await?;
        advance(&mut stage, Stage::Notified);
        info!("delivered merge-complete notification");
    }

    if options.clean_chunks && options.delete_folder {
        storage.delete(&options.folder_id).await?;
        advance(&mut stage, Stage::FolderDeleted);
        info!(folder_id = %options.folder_id, "deleted source folder");
    }

    advance(&mut stage, Stage::Done);
    Ok(PipelineResult {
        file_id: Some(created.id),
        url: created.web_view_link,
    })
}

/// Two-level destination lookup for the move step: root folder by name,
/// then a named child within it.
async fn resolve_destination<S: Storage>(
    storage: &S,
    options: &RunOptions,
) -> Result<Option<String>, StorageError> {
    let Some(root_id) = storage.find_folder(&options.root_folder_name).await? else {
        return Ok(None);
    };
    storage
        .find_child_folder(&root_id, &options.pdf_folder_name)
        .await
}
