//! Google Drive v3 REST client implementing the [`Storage`] seam.
//!
//! Only the six operations the pipeline needs are implemented: list by
//! folder and type, get metadata, get media, create with parent, update
//! parents, and delete by id (plus the name lookup used by the move step).
//! Base URLs are injectable so tests can point the client at a local
//! server.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::contract::{
    CreatedFile, CredentialProvider, FileMetadata, RemoteFile, Storage, StorageError, FOLDER_MIME,
};

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

pub struct DriveClient<C> {
    http: reqwest::Client,
    credentials: C,
    api_base: String,
    upload_base: String,
}

impl<C: CredentialProvider> DriveClient<C> {
    pub fn new(credentials: C) -> Self {
        Self::with_base_urls(credentials, API_BASE, UPLOAD_BASE)
    }

    /// Client against non-default endpoints, for tests.
    pub fn with_base_urls(
        credentials: C,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        DriveClient {
            http: reqwest::Client::new(),
            credentials,
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    async fn bearer(&self) -> Result<String, StorageError> {
        Ok(self.credentials.access_token().await?)
    }

    async fn first_folder_matching(&self, q: &str) -> Result<Option<String>, StorageError> {
        let token = self.bearer().await?;
        debug!(%q, "looking up folder");
        let resp = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(token)
            .query(&[("q", q), ("fields", "files(id,name)")])
            .send()
            .await
            .map_err(|e| request_error(e, "find folder"))?;
        if !resp.status().is_success() {
            return Err(into_error(resp, "find folder").await);
        }
        let list: FileList = resp
            .json()
            .await
            .map_err(|e| request_error(e, "decode folder list"))?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    /// Drive reports sizes as decimal strings.
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
}

impl From<DriveFile> for RemoteFile {
    fn from(f: DriveFile) -> Self {
        RemoteFile {
            id: f.id,
            name: f.name,
            size: f.size.and_then(|s| s.parse().ok()),
            created_time: f.created_time.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveMetadata {
    id: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    trashed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveCreated {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveParents {
    #[serde(default)]
    parents: Vec<String>,
}

/// Escape single quotes for embedding a value in a Drive query string.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn into_error(resp: reqwest::Response, what: &str) -> StorageError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        StorageError::NotFound(what.to_string())
    } else {
        StorageError::Transfer(format!("{what}: status {status}: {body}"))
    }
}

fn request_error(e: reqwest::Error, what: &str) -> StorageError {
    StorageError::Transfer(format!("{what}: {e}"))
}

#[async_trait]
impl<C: CredentialProvider> Storage for DriveClient<C> {
    async fn list_files(
        &self,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<Vec<RemoteFile>, StorageError> {
        let token = self.bearer().await?;
        let q = format!(
            "'{}' in parents and mimeType='{}' and trashed=false",
            escape_query_value(folder_id),
            mime_type
        );
        debug!(%q, "listing files");
        let resp = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(token)
            .query(&[
                ("q", q.as_str()),
                ("fields", "files(id,name,size,createdTime)"),
                ("pageSize", "1000"),
            ])
            .send()
            .await
            .map_err(|e| request_error(e, "list files"))?;
        if !resp.status().is_success() {
            return Err(into_error(resp, "list files").await);
        }
        let list: FileList = resp
            .json()
            .await
            .map_err(|e| request_error(e, "decode file list"))?;
        debug!(count = list.files.len(), "listed files");
        Ok(list.files.into_iter().map(RemoteFile::from).collect())
    }

    async fn get_metadata(&self, file_id: &str) -> Result<FileMetadata, StorageError> {
        let token = self.bearer().await?;
        let resp = self
            .http
            .get(format!("{}/files/{file_id}", self.api_base))
            .bearer_auth(token)
            .query(&[("fields", "id,mimeType,trashed")])
            .send()
            .await
            .map_err(|e| request_error(e, "get metadata"))?;
        if !resp.status().is_success() {
            return Err(into_error(resp, file_id).await);
        }
        let meta: DriveMetadata = resp
            .json()
            .await
            .map_err(|e| request_error(e, "decode metadata"))?;
        Ok(FileMetadata {
            id: meta.id,
            mime_type: meta.mime_type,
            trashed: meta.trashed,
        })
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let token = self.bearer().await?;
        let resp = self
            .http
            .get(format!("{}/files/{file_id}", self.api_base))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| request_error(e, "download"))?;
        if !resp.status().is_success() {
            return Err(into_error(resp, file_id).await);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| request_error(e, "download body"))?;
        debug!(file_id, bytes = bytes.len(), "downloaded file");
        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        parent_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<CreatedFile, StorageError> {
        let token = self.bearer().await?;
        // Drive multipart upload is multipart/related: one JSON metadata
        // part, one media part, assembled by hand.
        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id],
        });
        let boundary = "drive_merge_upload_boundary";
        let mut body = Vec::with_capacity(content.len() + 512);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Type: application/pdf\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(&content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        info!(name, parent_id, bytes = content.len(), "uploading file");
        let resp = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| request_error(e, "upload"))?;
        if !resp.status().is_success() {
            return Err(into_error(resp, "upload").await);
        }
        let created: DriveCreated = resp
            .json()
            .await
            .map_err(|e| request_error(e, "decode upload response"))?;
        info!(file_id = %created.id, "upload complete");
        Ok(CreatedFile {
            id: created.id,
            web_view_link: created.web_view_link,
        })
    }

    async fn move_file(&self, file_id: &str, new_parent_id: &str) -> Result<(), StorageError> {
        let token = self.bearer().await?;
        let resp = self
            .http
            .get(format!("{}/files/{file_id}", self.api_base))
            .bearer_auth(&token)
            .query(&[("fields", "parents")])
            .send()
            .await
            .map_err(|e| request_error(e, "get parents"))?;
        if !resp.status().is_success() {
            return Err(into_error(resp, file_id).await);
        }
        let current: DriveParents = resp
            .json()
            .await
            .map_err(|e| request_error(e, "decode parents"))?;
        let previous = current.parents.join(",");

        let resp = self
            .http
            .patch(format!("{}/files/{file_id}", self.api_base))
            .bearer_auth(token)
            .query(&[
                ("addParents", new_parent_id),
                ("removeParents", previous.as_str()),
                ("fields", "id,parents"),
            ])
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| request_error(e, "move file"))?;
        if !resp.status().is_success() {
            return Err(into_error(resp, file_id).await);
        }
        debug!(file_id, new_parent_id, "moved file");
        Ok(())
    }

    async fn delete(&self, file_id: &str) -> Result<(), StorageError> {
        let token = self.bearer().await?;
        let resp = self
            .http
            .delete(format!("{}/files/{file_id}", self.api_base))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| request_error(e, "delete"))?;
        if !resp.status().is_success() {
            return Err(into_error(resp, file_id).await);
        }
        debug!(file_id, "deleted object");
        Ok(())
    }

    async fn find_folder(&self, name: &str) -> Result<Option<String>, StorageError> {
        let q = format!(
            "name='{}' and mimeType='{}' and trashed=false",
            escape_query_value(name),
            FOLDER_MIME
        );
        self.first_folder_matching(&q).await
    }

    async fn find_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<String>, StorageError> {
        let q = format!(
            "'{}' in parents and name='{}' and mimeType='{}' and trashed=false",
            escape_query_value(parent_id),
            escape_query_value(name),
            FOLDER_MIME
        );
        self.first_folder_matching(&q).await
    }
}
