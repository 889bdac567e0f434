//! Storage backend abstraction for object storage (S3, local, memory).
//!
//! This module defines the core storage contract that all backends must implement.
//! The catalog layer only ever sees this trait:
//! - Whole-object reads and writes (documents are small JSON files)
//! - Server-side copies for backup and rename flows
//! - Prefix listing with object metadata including `last_modified`
//! - Batch deletes for cascade and directory removal
//!
//! Keys are flat strings with `/` separators; there are no real directories.
//! Callers that want directory semantics pass directory-style prefixes ending
//! in `/` and interpret the listing themselves.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for object storage.
///
/// All storage backends (S3, memory) implement this trait.
/// The contract is designed for cloud object storage semantics.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an object, replacing any existing content.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Deletes an object.
    ///
    /// Succeeds even if the object doesn't exist (idempotent).
    async fn delete(&self, path: &str) -> Result<()>;

    /// Deletes a batch of objects.
    ///
    /// Missing objects are skipped; the call fails only on a real
    /// storage error.
    async fn delete_batch(&self, paths: &[String]) -> Result<()>;

    /// Copies an object to a new path, replacing any existing destination.
    ///
    /// Returns `Error::NotFound` if the source doesn't exist.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Lists objects with the given prefix.
    ///
    /// Returns an empty vec if no objects match.
    ///
    /// **Ordering**: Results are returned in arbitrary order that may vary
    /// between backends and invocations. Callers requiring deterministic
    /// order should sort the results (e.g., by `path` or `last_modified`).
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if the object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(path);
        Ok(())
    }

    async fn delete_batch(&self, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let source = objects
            .get(from)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {from}")))?;

        objects.insert(
            to.to_string(),
            StoredObject {
                data: source,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| ObjectMeta {
                path: path.clone(),
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects.get(path).map(|obj| ObjectMeta {
            path: path.to_string(),
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
        }))
    }
}

/// Storage backend over the `object_store` crate.
///
/// Production backend for S3-compatible stores. Construct with
/// [`ObjectStoreBackend::from_bucket`] (credentials and region come from the
/// environment) or wrap an existing store with
/// [`ObjectStoreBackend::from_store`].
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    /// Creates a backend for the given S3 bucket.
    ///
    /// Accepts a bare bucket name or an `s3://bucket` URL. Credentials,
    /// region, and endpoint are read from the standard AWS environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for unsupported bucket schemes and
    /// `Error::Storage` if the client cannot be constructed.
    pub fn from_bucket(bucket: &str) -> Result<Self> {
        let name = bucket.strip_prefix("s3://").unwrap_or(bucket);
        if name.is_empty() || name.contains("://") {
            return Err(Error::InvalidInput(format!(
                "unsupported storage bucket: {bucket}"
            )));
        }

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(name)
            .build()
            .map_err(|e| Error::storage_with_source(format!("build S3 client for {name}"), e))?;

        Ok(Self {
            store: Arc::new(store),
        })
    }

    /// Wraps an existing `object_store` implementation.
    #[must_use]
    pub fn from_store(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

fn map_store_error(path: &str, err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => {
            Error::NotFound(format!("object not found: {path}"))
        }
        other => Error::storage_with_source(format!("storage operation on {path} failed"), other),
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = StorePath::from(path);
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_store_error(path, e))?;
        result.bytes().await.map_err(|e| map_store_error(path, e))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let location = StorePath::from(path);
        self.store
            .put(&location, PutPayload::from(data))
            .await
            .map(|_| ())
            .map_err(|e| map_store_error(path, e))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = StorePath::from(path);
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(map_store_error(path, e)),
        }
    }

    async fn delete_batch(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let locations = stream::iter(
            paths
                .iter()
                .map(|p| Ok(StorePath::from(p.as_str())))
                .collect::<Vec<object_store::Result<StorePath>>>(),
        )
        .boxed();

        let mut results = self.store.delete_stream(locations);
        while let Some(result) = results.next().await {
            match result {
                Ok(_) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(Error::storage_with_source("batch delete failed", e)),
            }
        }
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let source = StorePath::from(from);
        let dest = StorePath::from(to);
        self.store
            .copy(&source, &dest)
            .await
            .map_err(|e| map_store_error(from, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let location = (!prefix.is_empty()).then(|| StorePath::from(prefix));
        let mut entries = self.store.list(location.as_ref());

        let mut metas = Vec::new();
        while let Some(meta) = entries
            .try_next()
            .await
            .map_err(|e| map_store_error(prefix, e))?
        {
            metas.push(ObjectMeta {
                path: meta.location.to_string(),
                size: meta.size,
                last_modified: Some(meta.last_modified),
            });
        }
        Ok(metas)
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let location = StorePath::from(path);
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                path: meta.location.to_string(),
                size: meta.size,
                last_modified: Some(meta.last_modified),
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(map_store_error(path, e)),
        }
    }
}
