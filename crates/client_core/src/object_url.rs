//! Session-local `blob:` URLs for binary artifacts fetched by the controller.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use uuid::Uuid;

const OBJECT_URL_PREFIX: &str = "blob:geoflow/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }

    /// File extension matching the blob's content type, `bin` when unknown.
    pub fn extension(&self) -> &'static str {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        match essence {
            "text/html" => "html",
            other => mime_guess::get_mime_extensions_str(other)
                .and_then(|exts| exts.first().copied())
                .unwrap_or("bin"),
        }
    }
}

#[derive(Default)]
pub struct ObjectUrlRegistry {
    blobs: RwLock<HashMap<String, Arc<Blob>>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, blob: Blob) -> String {
        let url = format!("{OBJECT_URL_PREFIX}{}", Uuid::new_v4());
        self.blobs.write().await.insert(url.clone(), Arc::new(blob));
        url
    }

    pub async fn resolve(&self, url: &str) -> Option<Arc<Blob>> {
        self.blobs.read().await.get(url).cloned()
    }

    pub async fn revoke(&self, url: &str) -> bool {
        self.blobs.write().await.remove(url).is_some()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}
