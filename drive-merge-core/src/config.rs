//! Run configuration for the merge pipeline.

use std::path::PathBuf;

/// Options for one pipeline run.
///
/// Post-processing steps (move, clean, notify, delete folder) are all
/// independently toggleable; the notify step is controlled by whether the
/// caller passes a notifier to [`crate::pipeline::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Source folder holding the PDF chunks.
    pub folder_id: String,
    /// Explicit output file name; defaults to `merged_<YYYYMMDD_HHMMSS>.pdf`.
    pub output_name: Option<String>,
    /// Directory to write a local copy of the merged PDF into, if any.
    pub save_local: Option<PathBuf>,
    /// Move the published file into `<root_folder_name>/<pdf_folder_name>`.
    pub move_to_root: bool,
    /// Delete every chunk in the source folder after a successful publish.
    pub clean_chunks: bool,
    /// Delete the source folder itself; only honoured together with
    /// `clean_chunks`.
    pub delete_folder: bool,
    /// Name of the application root folder for the move step.
    pub root_folder_name: String,
    /// Name of the destination child folder for the move step.
    pub pdf_folder_name: String,
}

impl RunOptions {
    /// Minimal options: merge and publish back into the source folder,
    /// no post-processing.
    pub fn new(folder_id: impl Into<String>) -> Self {
        RunOptions {
            folder_id: folder_id.into(),
            output_name: None,
            save_local: None,
            move_to_root: false,
            clean_chunks: false,
            delete_folder: false,
            root_folder_name: "Rememly".to_string(),
            pdf_folder_name: "pdf".to_string(),
        }
    }
}
