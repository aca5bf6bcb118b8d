//! Object storage for rendered prescription documents.
//!
//! Uploads are two-step: ask the store for a short-lived upload URL, then
//! send the bytes to it and receive a storage id. `HttpObjectStore` talks to
//! a remote storage service; `LocalObjectStore` keeps files under the data
//! directory, content-addressed by SHA-256:
//!
//! ```text
//! files/
//! └── sha256/
//!     └── ab/          # two-level sharding
//!         └── ab3f9e…  # full hash as filename
//! ```
//!
//! No operation is retried.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Lifetime of a local upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

const LOCAL_UPLOAD_PREFIX: &str = "local://upload/";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot reach storage service at {0}")]
    Connection(String),

    #[error("Storage request timed out after {0}s")]
    Timeout(u64),

    #[error("Storage service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected storage response: {0}")]
    Response(String),

    #[error("Upload URL is unknown or expired")]
    UploadUrl,

    #[error("Stored object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage id: {0}")]
    InvalidId(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Internal lock poisoned")]
    LockPoisoned,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadUrl(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageId(pub String);

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binary object store. Implementations block; async callers go through
/// `spawn_blocking`.
pub trait ObjectStore: Send + Sync {
    fn create_upload_url(&self) -> Result<UploadUrl, StorageError>;

    fn upload(
        &self,
        url: &UploadUrl,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StorageId, StorageError>;

    fn fetch(&self, id: &StorageId) -> Result<Vec<u8>, StorageError>;

    fn delete(&self, id: &StorageId) -> Result<(), StorageError>;
}

// ─── HTTP store ───────────────────────────────────────────────────────────────

/// Client for a remote storage service.
pub struct HttpObjectStore {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    storage_id: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, StorageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, StorageError> {
        let response = request.send().map_err(|e| {
            if e.is_connect() {
                StorageError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                StorageError::Timeout(self.timeout_secs)
            } else {
                StorageError::Client(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn file_url(&self, id: &StorageId) -> Result<String, StorageError> {
        if id.0.is_empty() || !id.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(StorageError::InvalidId(id.0.clone()));
        }
        Ok(format!("{}/files/{}", self.base_url, id.0))
    }
}

impl ObjectStore for HttpObjectStore {
    fn create_upload_url(&self) -> Result<UploadUrl, StorageError> {
        let url = format!("{}/upload-url", self.base_url);
        let parsed: UploadUrlResponse = self
            .send(self.client.post(&url))?
            .json()
            .map_err(|e| StorageError::Response(e.to_string()))?;
        Ok(UploadUrl(parsed.upload_url))
    }

    fn upload(
        &self,
        url: &UploadUrl,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StorageId, StorageError> {
        let request = self
            .client
            .post(&url.0)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        let parsed: UploadResponse = self
            .send(request)?
            .json()
            .map_err(|e| StorageError::Response(e.to_string()))?;
        if parsed.storage_id.trim().is_empty() {
            return Err(StorageError::Response("empty storageId".into()));
        }
        Ok(StorageId(parsed.storage_id))
    }

    fn fetch(&self, id: &StorageId) -> Result<Vec<u8>, StorageError> {
        let url = self.file_url(id)?;
        let bytes = self
            .send(self.client.get(&url))?
            .bytes()
            .map_err(|e| StorageError::Response(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn delete(&self, id: &StorageId) -> Result<(), StorageError> {
        let url = self.file_url(id)?;
        self.send(self.client.delete(&url))?;
        Ok(())
    }
}

// ─── Local store ──────────────────────────────────────────────────────────────

/// Filesystem store with one-shot upload tokens.
///
/// Identical content maps to one file, so deleting an id removes the bytes
/// for every upload that produced it.
#[derive(Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    ttl: Duration,
    pending: Mutex<HashMap<String, Instant>>,
}

impl LocalObjectStore {
    pub fn new(root: &Path) -> Self {
        Self::with_ttl(root, UPLOAD_URL_TTL)
    }

    pub fn with_ttl(root: &Path, ttl: Duration) -> Self {
        Self {
            root: root.to_path_buf(),
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn object_path(&self, id: &StorageId) -> Result<PathBuf, StorageError> {
        let hash = id.0.as_str();
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidId(hash.to_string()));
        }
        Ok(self.root.join("sha256").join(&hash[..2]).join(hash))
    }
}

impl ObjectStore for LocalObjectStore {
    fn create_upload_url(&self) -> Result<UploadUrl, StorageError> {
        let mut raw = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);

        let now = Instant::now();
        let mut pending = self.pending.lock().map_err(|_| StorageError::LockPoisoned)?;
        pending.retain(|_, expires| *expires > now);
        pending.insert(token.clone(), now + self.ttl);

        Ok(UploadUrl(format!("{LOCAL_UPLOAD_PREFIX}{token}")))
    }

    fn upload(
        &self,
        url: &UploadUrl,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StorageId, StorageError> {
        let token = url
            .0
            .strip_prefix(LOCAL_UPLOAD_PREFIX)
            .ok_or(StorageError::UploadUrl)?;
        let expires = self
            .pending
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .remove(token)
            .ok_or(StorageError::UploadUrl)?;
        if Instant::now() >= expires {
            return Err(StorageError::UploadUrl);
        }

        let hash = format!("{:x}", Sha256::digest(bytes));
        let id = StorageId(hash);
        let path = self.object_path(&id)?;
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)?;
        }
        tracing::debug!(storage_id = %id, size = bytes.len(), content_type, "Stored object");
        Ok(id)
    }

    fn fetch(&self, id: &StorageId) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(id)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(id.0.clone()),
            _ => StorageError::Io(e),
        })
    }

    fn delete(&self, id: &StorageId) -> Result<(), StorageError> {
        let path = self.object_path(id)?;
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(id.0.clone()),
            _ => StorageError::Io(e),
        })
    }
}

// ─── Test double ──────────────────────────────────────────────────────────────

/// In-memory store recording every call, with switchable failures.
#[cfg(test)]
#[derive(Default)]
pub struct MockObjectStore {
    fail_upload: bool,
    fail_delete: bool,
    calls: Mutex<Vec<String>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload_failure(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn with_delete_failure(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[cfg(test)]
impl ObjectStore for MockObjectStore {
    fn create_upload_url(&self) -> Result<UploadUrl, StorageError> {
        self.record("create_upload_url");
        Ok(UploadUrl("mock://upload".into()))
    }

    fn upload(&self, _url: &UploadUrl, bytes: &[u8], _ct: &str) -> Result<StorageId, StorageError> {
        self.record("upload");
        if self.fail_upload {
            return Err(StorageError::Status { status: 503, body: "unavailable".into() });
        }
        let mut objects = self.objects.lock().unwrap();
        let id = format!("mock-{}", objects.len() + 1);
        objects.insert(id.clone(), bytes.to_vec());
        Ok(StorageId(id))
    }

    fn fetch(&self, id: &StorageId) -> Result<Vec<u8>, StorageError> {
        self.record("fetch");
        self.objects
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.0.clone()))
    }

    fn delete(&self, id: &StorageId) -> Result<(), StorageError> {
        self.record("delete");
        if self.fail_delete {
            return Err(StorageError::Connection("mock".into()));
        }
        self.objects.lock().unwrap().remove(&id.0);
        Ok(())
    }
}
