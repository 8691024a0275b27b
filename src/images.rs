//! Downloads monster images into a local directory that doubles as a cache.

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::fetch::WikiClient;
use crate::utils::write_atomic;

/// Outcome of asking the wiki for one file.
#[derive(Debug)]
pub enum FetchedImage {
    Found(Vec<u8>),
    /// Any non-200 response.
    Status(u16),
}

/// Source of image bytes. Implemented over HTTP by `WikiClient`.
pub trait ImageSource {
    fn fetch_image(&self, name: &str) -> Result<FetchedImage>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadStats {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Ensures every image in `names` exists in `cache_dir`.
///
/// Existing files are never re-fetched. Failed fetches are counted and the
/// run continues; only local write errors abort.
pub fn download_all(
    source: &impl ImageSource,
    names: &BTreeSet<String>,
    cache_dir: &Path,
) -> Result<DownloadStats> {
    fs::create_dir_all(cache_dir)
        .with_context(|| format!("Failed to create image dir: {}", cache_dir.display()))?;

    let mut stats = DownloadStats::default();
    let total = names.len();

    for (idx, name) in names.iter().enumerate() {
        if cache_dir.join(name).is_file() {
            debug!("Already have image: {}", name);
            stats.skipped += 1;
            continue;
        }

        info!("({}/{}) Fetching image: {}", idx + 1, total, name);
        match source.fetch_image(name) {
            Ok(FetchedImage::Found(bytes)) => {
                write_atomic(&cache_dir.join(name), &bytes)?;
                debug!("Saved image: {} ({} bytes)", name, bytes.len());
                stats.succeeded += 1;
            }
            Ok(FetchedImage::Status(status)) => {
                warn!("Unable to save image: {} (HTTP {})", name, status);
                stats.failed += 1;
            }
            Err(e) => {
                warn!("Unable to save image: {} ({:#})", name, e);
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

impl WikiClient {
    fn file_path_url(&self, name: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!("{}/w/Special:Filepath", self.base))
            .with_context(|| format!("Invalid wiki URL: {}", self.base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Wiki URL cannot have a path: {}", self.base))?
            .push(name);
        Ok(url)
    }
}

impl ImageSource for WikiClient {
    fn fetch_image(&self, name: &str) -> Result<FetchedImage> {
        let url = self.file_path_url(name)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .with_context(|| format!("Failed to fetch: {}", url))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Ok(FetchedImage::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("Failed to read response: {}", url))?;
        Ok(FetchedImage::Found(bytes.to_vec()))
    }
}

/// Deduplicated, non-empty image names.
pub fn required_images<'a>(images: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    images
        .into_iter()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
