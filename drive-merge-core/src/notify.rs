//! Merge-complete webhook delivery.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::contract::{MergeComplete, Notifier, NotifyError};

/// Wire payload for the merge-complete callback. The shared secret token
/// lives in the notifier, not in the pipeline.
#[derive(Debug, Serialize)]
struct MergeCompleteBody<'a> {
    token: &'a str,
    folder_id: &'a str,
    file_id: &'a str,
    url: &'a str,
    clean_chunks: bool,
}

/// Posts the completion payload to `<base>?path=pdf/merge-complete`.
pub struct WebhookNotifier {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        WebhookNotifier {
            base_url: base_url.into(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// The receiving script matches the raw query string, so the slash in
    /// the path value must not be percent-encoded.
    fn callback_url(&self) -> String {
        format!("{}?path=pdf/merge-complete", self.base_url)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn merge_complete(&self, event: &MergeComplete) -> Result<(), NotifyError> {
        let body = MergeCompleteBody {
            token: &self.token,
            folder_id: &event.folder_id,
            file_id: &event.file_id,
            url: &event.url,
            clean_chunks: event.clean_chunks,
        };
        info!(url = %self.base_url, file_id = %event.file_id, "posting merge-complete callback");
        let resp = self
            .http
            .post(self.callback_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Status(status.as_u16(), body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_url_keeps_the_path_value_literal() {
        let notifier = WebhookNotifier::new("https://script.example/exec", "s3cret");
        assert_eq!(
            notifier.callback_url(),
            "https://script.example/exec?path=pdf/merge-complete"
        );
    }
}
