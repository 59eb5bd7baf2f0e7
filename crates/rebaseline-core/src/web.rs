//! HTTP access for baselines, tree status and log posting.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{RebaselineError, Result};

#[async_trait]
pub trait Web: Send + Sync {
    /// Fetch `url`; a 404 (or a missing `file://` path) yields `None`.
    async fn get_binary(&self, url: &str) -> Result<Option<Vec<u8>>>;

    /// POST an urlencoded form and return the response body.
    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<String>;
}

/// [`Web`] backed by `reqwest`. `file://` URLs are read from disk so local
/// results directories work the same way as builder URLs.
#[derive(Debug, Clone, Default)]
pub struct ReqwestWeb {
    client: reqwest::Client,
}

impl ReqwestWeb {
    pub fn new() -> Self {
        ReqwestWeb {
            client: reqwest::Client::new(),
        }
    }
}

fn local_path(url: &str) -> Option<PathBuf> {
    url.strip_prefix("file://").map(PathBuf::from)
}

#[async_trait]
impl Web for ReqwestWeb {
    async fn get_binary(&self, url: &str) -> Result<Option<Vec<u8>>> {
        if let Some(path) = local_path(url) {
            return match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(RebaselineError::Io(e)),
            };
        }

        debug!(url = %url, "fetching");
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RebaselineError::Http(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<String> {
        let response = self.client.post(url).form(fields).send().await?;
        if !response.status().is_success() {
            return Err(RebaselineError::Http(format!(
                "POST {url} returned {}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_url_reads_local_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast/test-actual.txt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "actual text").unwrap();

        let web = ReqwestWeb::new();
        let url = format!("file://{}", path.display());
        assert_eq!(
            web.get_binary(&url).await.unwrap(),
            Some(b"actual text".to_vec())
        );

        let missing = format!("file://{}/missing-actual.png", dir.path().display());
        assert_eq!(web.get_binary(&missing).await.unwrap(), None);
    }
}
