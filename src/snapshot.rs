//! Raw HTTP snapshot pass.
//!
//! Saves the server's HTML for each URL as-is, without a browser, to
//! `archive_<url minus scheme>_<YYYYmmdd_HHMMSS>.html`. Runs after the
//! renderer pass as a cheap second copy. Errors are per URL and never abort
//! the pass.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use reqwest::Client;
use tracing::{info, warn};

use crate::error::ArchiveError;

/// Longest file-name stem kept before the timestamp.
const MAX_STEM_CHARS: usize = 150;

#[derive(Debug, Default)]
pub struct SnapshotReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

pub struct SnapshotClient {
    client: Client,
}

impl SnapshotClient {
    pub fn new(timeout: Duration) -> Result<Self, ArchiveError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches every URL in order and writes each body into `output_dir`.
    pub async fn snapshot_all(&self, urls: &[String], output_dir: &Path) -> SnapshotReport {
        let mut report = SnapshotReport::default();

        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            warn!(dir = %output_dir.display(), error = %e, "cannot create snapshot directory");
            report.failed = urls.iter().map(|u| (u.clone(), e.to_string())).collect();
            return report;
        }

        for url in urls {
            match self.snapshot_one(url, output_dir).await {
                Ok(path) => {
                    info!(url, path = %path.display(), "snapshot saved");
                    report.saved.push(path);
                }
                Err(e) => {
                    warn!(url, error = %e, "snapshot failed");
                    report.failed.push((url.clone(), e.to_string()));
                }
            }
        }

        report
    }

    async fn snapshot_one(&self, url: &str, output_dir: &Path) -> Result<PathBuf, ArchiveError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        let path = output_dir.join(snapshot_file_name(url, Local::now()));
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

/// `archive_<url without scheme, '/' as '_'>_<timestamp>.html`, with
/// characters Windows rejects also replaced by `_`.
pub fn snapshot_file_name(url: &str, at: DateTime<Local>) -> String {
    let without_scheme = url.rsplit("//").next().unwrap_or(url);
    let stem: String = without_scheme
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_STEM_CHARS)
        .collect();
    format!("archive_{stem}_{}.html", at.format("%Y%m%d_%H%M%S"))
}
