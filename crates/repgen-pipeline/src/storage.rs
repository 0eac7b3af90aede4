//! Object-store read capability.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;

use repgen_core::error::{ReportError, Result, StorageError};

pub const DEFAULT_S3_ENDPOINT: &str = "https://s3.amazonaws.com";

/// A parsed `s3://bucket/key` location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S3Path {
    pub bucket: String,
    pub key: String,
}

impl S3Path {
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = || ReportError::Storage(StorageError::InvalidPath(path.to_string()));
        let rest = path.strip_prefix("s3://").ok_or_else(invalid)?;
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        if bucket.is_empty() || key.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// True when the raw path sits under `s3://<bucket>/`.
    pub fn is_within_bucket(path: &str, bucket: &str) -> bool {
        path.strip_prefix("s3://")
            .and_then(|rest| rest.strip_prefix(bucket))
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl FromStr for S3Path {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for S3Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Read access to stored data files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.get_object(bucket, key).await {
            Ok(_) => Ok(true),
            Err(ReportError::Storage(StorageError::NotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// In-process store, filled up front. Used for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: HashMap<(String, String), Bytes>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bucket: impl Into<String>, key: impl Into<String>, body: impl Into<Bytes>) {
        self.objects.insert((bucket.into(), key.into()), body.into());
    }

    /// Builder form of [`insert`](Self::insert) taking an `s3://` path.
    pub fn with_object(mut self, path: &str, body: impl Into<Bytes>) -> Result<Self> {
        let S3Path { bucket, key } = S3Path::parse(path)?;
        self.insert(bucket, key, body);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| {
                ReportError::Storage(StorageError::NotFound {
                    bucket: bucket.into(),
                    key: key.into(),
                })
            })
    }
}

/// Path-style HTTP GET against an S3-compatible endpoint.
///
/// Objects are fetched from `{endpoint}/{bucket}/{key}`; requests are
/// unsigned, so the bucket must allow reads from this service.
pub struct HttpObjectStore {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let url = self.object_url(bucket, key);
        tracing::debug!(%url, "fetching object");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReportError::Storage(StorageError::Request(e.to_string())))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ReportError::Storage(StorageError::NotFound {
                bucket: bucket.into(),
                key: key.into(),
            }));
        }
        if !status.is_success() {
            return Err(ReportError::Storage(StorageError::Request(format!(
                "HTTP {status} for s3://{bucket}/{key}"
            ))));
        }

        response
            .bytes()
            .await
            .map_err(|e| ReportError::Storage(StorageError::Request(e.to_string())))
    }
}
