use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::io::AsyncWriteExt;

use crate::error::InstallError;

/// Fetches installer files.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, InstallError>;
}

pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// `timeout` bounds connecting and each read, not the whole transfer.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, InstallError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(format!("rebuild/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(InstallError::ClientBuild)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, InstallError> {
        use futures_util::StreamExt;

        info!("Downloading {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| InstallError::http("download request failed", error))?;

        if !response.status().is_success() {
            return Err(InstallError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|error| InstallError::io("failed to create download file", dest, error))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|error| InstallError::http("download stream error", error))?;
            file.write_all(&chunk)
                .await
                .map_err(|error| InstallError::io("failed to write download data", dest, error))?;
            downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|error| InstallError::io("failed to flush download file", dest, error))?;

        debug!("Downloaded {downloaded} bytes to {}", dest.display());
        Ok(downloaded)
    }
}

/// File name to save a download under: the last URL segment without its
/// query, or `<Tool_Name>_installer.exe` when that is not an installer.
#[must_use]
pub fn installer_file_name(tool: &str, url: &str) -> String {
    let last = url.rsplit('/').next().unwrap_or_default();
    let name = last.split(['?', '#']).next().unwrap_or_default();
    let lower = name.to_ascii_lowercase();
    let is_installer = [".exe", ".msi", ".zip"]
        .iter()
        .any(|ext| lower.ends_with(ext));

    if is_installer && !name.contains("..") && !name.contains('\\') {
        name.to_string()
    } else {
        format!("{}_installer.exe", tool.replace(' ', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::installer_file_name;

    #[test]
    fn file_name_comes_from_url_without_query() {
        assert_eq!(
            installer_file_name(
                "Insomnia",
                "https://github.com/Kong/insomnia/releases/latest/download/Insomnia.Core.exe?x=1"
            ),
            "Insomnia.Core.exe"
        );
        assert_eq!(
            installer_file_name("Tool", "https://example.com/files/pkg.MSI"),
            "pkg.MSI"
        );
    }

    #[test]
    fn non_installer_urls_fall_back_to_tool_name() {
        assert_eq!(
            installer_file_name("Some Tool", "https://example.com/download?id=5"),
            "Some_Tool_installer.exe"
        );
        assert_eq!(
            installer_file_name("Some Tool", "https://example.com/../evil..exe"),
            "Some_Tool_installer.exe"
        );
    }
}
