// src/storage/mod.rs

//! Read-only object storage access for the staging loader.
//!
//! [`ObjectSource`] wraps an `object_store` backend rooted at a bucket (or a
//! local directory) and exposes just what staging needs: list the keys under
//! a prefix and fetch an object's bytes.
//!
//! - [`jsonpaths`] parses JSONPaths documents and evaluates them on records.

pub mod jsonpaths;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use thiserror::Error;
use tracing::debug;

use crate::config::model::StorageSection;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid storage url '{0}' (expected s3://bucket[/prefix], file:///dir or memory://)")]
    InvalidUrl(String),

    #[error("location '{location}' is not inside '{root}'")]
    ForeignLocation { location: String, root: String },

    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
}

impl StorageError {
    /// A missing object is a configuration problem, not an outage.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ObjectStore(object_store::Error::NotFound { .. })
                | StorageError::ForeignLocation { .. }
                | StorageError::InvalidUrl(_)
        )
    }
}

/// Drop trailing slashes from a root URL, keeping the `scheme://` of a bare
/// scheme such as `memory://`.
pub fn normalize_root(url: &str) -> String {
    let url = url.trim();
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with(':') && url.len() > trimmed.len() {
        format!("{trimmed}//")
    } else {
        trimmed.to_string()
    }
}

/// `root` + `/` + `key`, without doubling the separator.
pub fn join_location(root: &str, key: &str) -> String {
    let key = key.trim_start_matches('/');
    if root.ends_with('/') {
        format!("{root}{key}")
    } else {
        format!("{root}/{key}")
    }
}

/// Client-side retry policy for object storage requests: one attempt per
/// call. Connectivity failures are retried by the task runner instead.
pub fn single_attempt_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        ..Default::default()
    }
}

/// Object storage location that staging tasks read from.
#[derive(Clone)]
pub struct ObjectSource {
    store: Arc<dyn ObjectStore>,
    /// URL the store is rooted at, e.g. `s3://udacity-dend`.
    root_url: String,
    /// Key prefix inside the store that every key is relative to.
    base: Option<Path>,
}

impl fmt::Debug for ObjectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectSource<{}>", self.root_url)
    }
}

impl ObjectSource {
    /// Wrap an existing store (used by tests with `InMemory`).
    pub fn new(store: Arc<dyn ObjectStore>, root_url: impl Into<String>) -> Self {
        Self {
            store,
            root_url: normalize_root(&root_url.into()),
            base: None,
        }
    }

    /// Build the source described by the `[storage]` config section.
    pub fn from_config(cfg: &StorageSection) -> Result<Self, StorageError> {
        let url = cfg.url.trim().trim_end_matches('/');

        if let Some(rest) = url.strip_prefix("s3://") {
            let (bucket, prefix) = match rest.split_once('/') {
                Some((bucket, prefix)) => (bucket, Some(prefix)),
                None => (rest, None),
            };
            if bucket.is_empty() {
                return Err(StorageError::InvalidUrl(cfg.url.clone()));
            }

            let mut builder = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .with_retry(single_attempt_retry());
            if let Some(region) = &cfg.region {
                builder = builder.with_region(region);
            }
            if let Some(endpoint) = &cfg.endpoint {
                builder = builder.with_endpoint(endpoint).with_allow_http(true);
            }
            let store: Arc<dyn ObjectStore> = Arc::new(builder.build()?);

            debug!(bucket, region = ?cfg.region, "configured S3 object source");
            return Ok(Self {
                store,
                root_url: format!("s3://{bucket}"),
                base: prefix.filter(|p| !p.is_empty()).map(Path::from),
            });
        }

        if let Some(dir) = url.strip_prefix("file://") {
            let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(dir)?);
            debug!(dir, "configured local object source");
            return Ok(Self::new(store, url));
        }

        if url == "memory:" || url == "memory:/" || url == "memory://" {
            return Ok(Self::new(Arc::new(InMemory::new()), "memory://"));
        }

        Err(StorageError::InvalidUrl(cfg.url.clone()))
    }

    fn qualify(&self, key: &str) -> Path {
        let key = key.trim_matches('/');
        match &self.base {
            Some(base) if key.is_empty() => base.clone(),
            Some(base) => Path::from(format!("{base}/{key}")),
            None => Path::from(key),
        }
    }

    /// Turn a location into a key. Accepts either a bare key
    /// (`log_json_path.json`) or a full URL under this source's root
    /// (`s3://bucket/log_json_path.json`).
    pub fn resolve_location(&self, location: &str) -> Result<Path, StorageError> {
        if !location.contains("://") {
            return Ok(self.qualify(location));
        }

        match location.strip_prefix(&self.root_url) {
            Some(rest) if self.root_url.ends_with('/') || rest.is_empty() || rest.starts_with('/') => {
                Ok(Path::from(rest.trim_matches('/')))
            }
            _ => Err(StorageError::ForeignLocation {
                location: location.to_string(),
                root: self.root_url.clone(),
            }),
        }
    }

    /// Human-readable URL of a key prefix, for logs and errors.
    pub fn display_location(&self, key: &str) -> String {
        join_location(&self.root_url, self.qualify(key).as_ref())
    }

    /// All object keys starting with `prefix`, sorted.
    ///
    /// Matching is by plain string prefix, so `log_data/2018/11/2018-11-01`
    /// selects `log_data/2018/11/2018-11-01-events.json` and a full key
    /// selects that object. Only the directory holding the prefix is listed.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<Path>, StorageError> {
        let qualified = self.qualify(prefix);
        let wanted = qualified.as_ref();
        let parent = wanted
            .rsplit_once('/')
            .map(|(dir, _)| Path::from(dir))
            .filter(|dir| !dir.as_ref().is_empty());

        let mut keys: Vec<Path> = self
            .store
            .list(parent.as_ref())
            .try_filter(|meta| futures::future::ready(meta.location.as_ref().starts_with(wanted)))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?;
        keys.sort();

        debug!(prefix = wanted, parent = ?parent, count = keys.len(), "listed objects");
        Ok(keys)
    }

    /// Fetch the full contents of an object.
    pub async fn get(&self, key: &Path) -> Result<Bytes, StorageError> {
        let bytes = self.store.get(key).await?.bytes().await?;
        Ok(bytes)
    }
}
