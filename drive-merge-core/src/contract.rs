//! # contract: trait seams between the pipeline and its collaborators
//!
//! This module defines the three traits the pipeline depends on, plus the
//! plain data types that cross those seams:
//!
//! - [`Storage`]: the remote Drive operations the pipeline needs (list,
//!   metadata, download, upload, move, delete, folder lookup by name).
//! - [`CredentialProvider`]: yields a bearer token; the refresh strategy is
//!   an implementation concern, so the pipeline stays testable without any
//!   interactive authentication flow.
//! - [`Notifier`]: delivers the merge-complete callback.
//!
//! ## Mocking & Testing
//! All traits are annotated for `mockall`, so consumers can generate
//! deterministic mocks for unit/integration tests (exported behind the
//! `test-export-mocks` feature).
//!
//! ## Adding New Backends
//! Implement [`Storage`] for your storage service. Convert all meaningful
//! upstream errors to a [`StorageError`] variant so the pipeline can map
//! them onto its own taxonomy.

use async_trait::async_trait;
use mockall::automock;

/// MIME type used to select mergeable chunk files.
pub const PDF_MIME: &str = "application/pdf";
/// MIME type Drive uses for folders.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// A file discovered in the remote source folder.
///
/// Identity is the `id`; `name` and `created_time` only participate in
/// ordering and progress output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    /// Advisory, the remote service may omit it.
    pub size: Option<u64>,
    /// RFC 3339 timestamp as reported by the remote service.
    pub created_time: String,
}

/// Metadata for the pre-flight folder verification.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub id: String,
    pub mime_type: String,
    pub trashed: bool,
}

/// The file created by a successful upload.
#[derive(Debug, Clone)]
pub struct CreatedFile {
    pub id: String,
    pub web_view_link: Option<String>,
}

/// Event data for the merge-complete webhook.
#[derive(Debug, Clone)]
pub struct MergeComplete {
    pub folder_id: String,
    pub file_id: String,
    pub url: String,
    pub clean_chunks: bool,
}

/// Errors surfaced by [`CredentialProvider`] implementations.
#[derive(Debug)]
pub enum AuthError {
    /// The stored token could not be read, parsed, or lacks required fields.
    TokenFile(String),
    /// The refresh request against the token endpoint failed.
    Refresh(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::TokenFile(msg) => write!(f, "credential token file error: {msg}"),
            AuthError::Refresh(msg) => write!(f, "token refresh failed: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Errors surfaced by [`Storage`] implementations.
#[derive(Debug)]
pub enum StorageError {
    /// No valid credential could be obtained for the request.
    Auth(AuthError),
    /// The remote object does not exist (or is not visible to this account).
    NotFound(String),
    /// Any other download/upload/request failure. Fatal to the run.
    Transfer(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Auth(e) => write!(f, "{e}"),
            StorageError::NotFound(what) => write!(f, "not found: {what}"),
            StorageError::Transfer(msg) => write!(f, "transfer error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<AuthError> for StorageError {
    fn from(e: AuthError) -> Self {
        StorageError::Auth(e)
    }
}

/// Errors surfaced by [`Notifier`] implementations.
#[derive(Debug)]
pub enum NotifyError {
    /// The request never completed.
    Request(String),
    /// The endpoint answered with a non-success status.
    Status(u16, String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Request(msg) => write!(f, "webhook request failed: {msg}"),
            NotifyError::Status(code, body) => {
                write!(f, "webhook returned status {code}: {body}")
            }
        }
    }
}

impl std::error::Error for NotifyError {}

/// Remote storage operations the pipeline depends on.
///
/// Implemented by the real Drive client and by test mocks. Every operation
/// either runs to completion or fails; there are no partial-content
/// semantics exposed to callers.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// List non-trashed files of the given MIME type in a folder.
    /// Order of the returned list is unspecified; callers sort.
    async fn list_files(
        &self,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<Vec<RemoteFile>, StorageError>;

    /// Fetch id/mimeType/trashed for a single object.
    async fn get_metadata(&self, file_id: &str) -> Result<FileMetadata, StorageError>;

    /// Download the complete content of a file.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError>;

    /// Create a new file with the given parent folder, returning its id and
    /// shareable link.
    async fn upload(
        &self,
        parent_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<CreatedFile, StorageError>;

    /// Re-parent a file, removing all its current parents.
    async fn move_file(&self, file_id: &str, new_parent_id: &str) -> Result<(), StorageError>;

    /// Delete an object (file or folder) by id.
    async fn delete(&self, file_id: &str) -> Result<(), StorageError>;

    /// Resolve a non-trashed folder by name, anywhere in the tree.
    /// Returns the first match, if any.
    async fn find_folder(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Resolve a non-trashed child folder by name within a parent.
    /// Returns the first match, if any.
    async fn find_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<String>, StorageError>;
}

/// Yields a valid bearer token for storage requests.
///
/// Implementations decide whether that means reading a cached token,
/// refreshing an expired one, or failing because re-authentication would
/// require user interaction.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// Delivers the merge-complete callback to an external endpoint.
///
/// Notification is not best-effort: a failure here fails the whole run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn merge_complete(&self, event: &MergeComplete) -> Result<(), NotifyError>;
}
