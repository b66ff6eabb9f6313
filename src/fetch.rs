//! Source retrieval.
//!
//! Before a job is probed its source is copied into the job's input
//! reference. Local files are copied; remote URLs are streamed over HTTP with
//! a size ceiling. Every failure is reported as [`Error::Download`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use futures::StreamExt;
use of_core::config::FetchConfig;
use of_core::{Error, Result};
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;

/// Where a job's primary media comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    Remote(Url),
}

impl Source {
    /// File stem used to name the produced artifact.
    pub fn file_stem(&self) -> String {
        let stem = match self {
            Source::Local(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned()),
            Source::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .and_then(|last| Path::new(last).file_stem())
                .map(|s| s.to_string_lossy().into_owned()),
        };
        stem.filter(|s| !s.is_empty())
            .unwrap_or_else(|| "media".to_string())
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s).map_err(|e| Error::Validation(format!("invalid URL {s}: {e}")))?;
            Ok(Source::Remote(url))
        } else {
            Ok(Source::Local(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(path) => write!(f, "{}", path.display()),
            Source::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Copies a source into a job's input reference.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Write the source to `dest`, returning the number of bytes written.
    async fn fetch(&self, source: &Source, dest: &Path) -> Result<u64>;
}

/// Copies files from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalFetcher;

#[async_trait]
impl Fetcher for LocalFetcher {
    async fn fetch(&self, source: &Source, dest: &Path) -> Result<u64> {
        let Source::Local(path) = source else {
            return Err(Error::Download(format!("{source} is not a local file")));
        };
        tokio::fs::copy(path, dest)
            .await
            .map_err(|e| Error::Download(format!("failed to copy {}: {e}", path.display())))
    }
}

/// Streams remote sources over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("overlayforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            max_bytes: config.max_download_bytes,
        }
    }

    async fn download(&self, url: &Url, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Download(format!("GET {url}: {e}")))?;

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(Error::Download(format!(
                    "{url} is {len} bytes, limit is {}",
                    self.max_bytes
                )));
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::Download(format!("failed to create {}: {e}", dest.display())))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Download(format!("reading {url}: {e}")))?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(Error::Download(format!(
                    "{url} exceeds the download limit of {} bytes",
                    self.max_bytes
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::Download(format!("writing {}: {e}", dest.display())))?;
        }

        file.flush()
            .await
            .map_err(|e| Error::Download(format!("writing {}: {e}", dest.display())))?;

        Ok(written)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &Source, dest: &Path) -> Result<u64> {
        let Source::Remote(url) = source else {
            return Err(Error::Download(format!("{source} is not a URL")));
        };
        self.download(url, dest).await
    }
}

/// Dispatches to the local or HTTP fetcher by source kind.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    local: LocalFetcher,
    http: HttpFetcher,
}

impl SourceFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            local: LocalFetcher,
            http: HttpFetcher::new(config),
        }
    }
}

#[async_trait]
impl Fetcher for SourceFetcher {
    async fn fetch(&self, source: &Source, dest: &Path) -> Result<u64> {
        let written = match source {
            Source::Local(_) => self.local.fetch(source, dest).await?,
            Source::Remote(_) => self.http.fetch(source, dest).await?,
        };
        tracing::debug!(source = %source, bytes = written, "Source fetched");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_sources() {
        assert_matches!("clip.mp4".parse::<Source>(), Ok(Source::Local(_)));
        assert_matches!(
            "https://cdn.example.com/media/cat.gif".parse::<Source>(),
            Ok(Source::Remote(_))
        );
        assert_matches!("http://".parse::<Source>(), Err(Error::Validation(_)));
    }

    #[test]
    fn file_stems() {
        let local: Source = "/tmp/photos/holiday.jpg".parse().unwrap();
        assert_eq!(local.file_stem(), "holiday");

        let remote: Source = "https://cdn.example.com/media/cat.gif?x=1".parse().unwrap();
        assert_eq!(remote.file_stem(), "cat");

        let bare: Source = "https://example.com/".parse().unwrap();
        assert_eq!(bare.file_stem(), "media");
    }

    #[tokio::test]
    async fn local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.png");
        std::fs::write(&src, b"pixels").unwrap();
        let dest = dir.path().join("copy");

        let n = LocalFetcher
            .fetch(&Source::Local(src), &dest)
            .await
            .unwrap();
        assert_eq!(n, 6);
        assert_eq!(std::fs::read(&dest).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn missing_local_file_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalFetcher
            .fetch(
                &Source::Local(dir.path().join("nope.mp4")),
                &dir.path().join("dest"),
            )
            .await;
        assert_matches!(result, Err(Error::Download(_)));
    }

    #[tokio::test]
    async fn local_fetcher_rejects_urls() {
        let dir = tempfile::tempdir().unwrap();
        let source: Source = "https://example.com/a.gif".parse().unwrap();
        let result = LocalFetcher.fetch(&source, &dir.path().join("dest")).await;
        assert_matches!(result, Err(Error::Download(_)));
    }
}
