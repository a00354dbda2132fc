// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source archive fetching.
//!
//! Download the zip snapshot that code hosts like GitHub serve for any branch
//! or tag at `https://<repo>/archive/<ref>.zip`. The whole archive is
//! buffered in memory, because zip readers need random access to the
//! central directory at the end of the file.

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use std::future::Future;
use tracing::{debug, instrument};

/// Layer of indirection for obtaining source archives.
pub trait Fetch: Send + Sync {
    /// Fetch raw archive bytes of `repo` at `branch`.
    ///
    /// Any transport level content encoding must already be undone.
    fn fetch(&self, repo: &str, branch: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Fetch source archives over HTTPS.
///
/// Gzip transfer encoding is requested, and transparently decoded. Download
/// progress is displayed through a progress bar.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    bar: ProgressBar,
}

impl HttpFetcher {
    /// Construct new HTTP fetcher reporting progress on `bar`.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Request`] if HTTP client cannot be built.
    pub fn try_new(bar: ProgressBar) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self { client, bar })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, repo: &str, branch: &str) -> Result<Vec<u8>> {
        let url = archive_url(repo, branch);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {bytes}",
        )?
        .progress_chars("-Cco.");
        self.bar.set_style(style);
        self.bar.set_message(url.clone());
        self.bar.enable_steady_tick(std::time::Duration::from_millis(100));

        let mut response = self.client.get(&url).send().await?;
        if let Err(error) = check_status(&url, response.status()) {
            self.bar.abandon();
            return Err(error);
        }

        if let Some(length) = response.content_length() {
            self.bar.set_length(length);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            self.bar.inc(chunk.len() as u64);
        }
        self.bar.finish_and_clear();
        debug!("downloaded {} bytes from {url}", body.len());

        Ok(body)
    }
}

/// URL of zip snapshot for `repo` at `branch`.
pub fn archive_url(repo: &str, branch: &str) -> String {
    format!("https://{repo}/archive/{branch}.zip")
}

/// Reject any response status outside of the 2xx range.
///
/// # Errors
///
/// - Return [`FetchError::Status`] if `status` is not a success.
pub fn check_status(url: &str, status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    Err(FetchError::Status { url: url.into(), status })
}

/// Archive fetching error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request or response body transfer fails.
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    /// Remote answers with a non-success status.
    #[error("fetch {url} failed with status {status}")]
    Status { url: String, status: StatusCode },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test]
    fn archive_url_layout() {
        assert_eq!(
            archive_url("github.com/old/demo", "master"),
            "https://github.com/old/demo/archive/master.zip"
        );
    }

    #[test_case(StatusCode::OK; "ok")]
    #[test_case(StatusCode::NO_CONTENT; "no content")]
    #[test]
    fn check_status_accepts_success(status: StatusCode) {
        assert!(check_status("https://github.com/old/demo/archive/master.zip", status).is_ok());
    }

    #[test_case(StatusCode::NOT_FOUND; "not found")]
    #[test_case(StatusCode::MOVED_PERMANENTLY; "unfollowed redirect")]
    #[test_case(StatusCode::INTERNAL_SERVER_ERROR; "server error")]
    #[test]
    fn check_status_rejects_failure(status: StatusCode) {
        use pretty_assertions::assert_eq;
        let url = "https://github.com/old/demo/archive/nope.zip";
        match check_status(url, status) {
            Err(FetchError::Status { url: got_url, status: got_status }) => {
                assert_eq!(got_url, url);
                assert_eq!(got_status, status);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
