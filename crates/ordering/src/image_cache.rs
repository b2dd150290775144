//! Network-first cache for menu images.
//!
//! Image requests always go to the network first. A successful response is
//! stored and returned; if the network fails, the stored copy is served
//! instead. Entries expire 7 days after they were stored. Requests that are
//! not for images bypass the cache entirely.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

/// How long a stored image is kept.
pub const IMAGE_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];
const IMAGE_PATH_MARKERS: &[&str] = &["media", "thumbnail"];

/// Errors from fetching an image.
#[derive(Debug, Error, Clone)]
pub enum ImageCacheError {
    #[error("Invalid image URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Image request failed: {0}")]
    Network(String),

    #[error("Image request returned HTTP {0}")]
    Status(u16),
}

/// A fetched image body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBody {
    pub content_type: Option<String>,
    pub bytes: Arc<[u8]>,
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Network,
    Cache,
}

/// Fetches image bodies over the network.
pub trait ImageFetcher {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<ImageBody, ImageCacheError>> + Send;
}

/// [`ImageFetcher`] over `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<ImageBody, ImageCacheError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ImageCacheError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageCacheError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageCacheError::Network(e.to_string()))?;

        Ok(ImageBody {
            content_type,
            bytes: Arc::from(bytes.as_ref()),
        })
    }
}

/// Whether requests for `url` go through the image cache.
#[must_use]
pub fn is_cacheable(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || IMAGE_PATH_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Network-first image cache.
#[derive(Clone)]
pub struct ImageCache<F> {
    fetcher: F,
    cache: Cache<String, ImageBody>,
}

impl<F: ImageFetcher> ImageCache<F> {
    /// Create a cache with the default 7-day retention.
    #[must_use]
    pub fn new(fetcher: F) -> Self {
        Self::with_retention(fetcher, IMAGE_RETENTION)
    }

    #[must_use]
    pub fn with_retention(fetcher: F, retention: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(retention)
            .build();
        Self { fetcher, cache }
    }

    /// GET an image.
    ///
    /// # Errors
    ///
    /// Returns the network error when the request fails and nothing is
    /// stored for `url`, or immediately for non-image URLs.
    #[instrument(skip(self))]
    pub async fn get(&self, url: &str) -> Result<(ImageBody, ImageSource), ImageCacheError> {
        let url = Url::parse(url)?;

        if !is_cacheable(&url) {
            return self
                .fetcher
                .fetch(&url)
                .await
                .map(|body| (body, ImageSource::Network));
        }

        let key = String::from(url.clone());
        match self.fetcher.fetch(&url).await {
            Ok(body) => {
                self.cache.insert(key, body.clone()).await;
                Ok((body, ImageSource::Network))
            }
            Err(e) => {
                if let Some(body) = self.cache.get(&key).await {
                    warn!(error = %e, "Image fetch failed, serving cached copy");
                    return Ok((body, ImageSource::Cache));
                }
                debug!(error = %e, "Image fetch failed with nothing cached");
                Err(e)
            }
        }
    }

    /// Whether a copy of `url` is currently stored.
    pub async fn contains(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(url) => self.cache.get(url.as_str()).await.is_some(),
            Err(_) => false,
        }
    }

    /// Drop every stored image.
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
