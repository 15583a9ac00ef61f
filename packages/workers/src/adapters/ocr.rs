//! OCR backend selection (spec §6 "OCR backends").
//!
//! Two supported backends named by a configuration string, `tesseract` and
//! `vision`; an unavailable backend at runtime must fall back to
//! `tesseract` and log the downgrade.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{Result, WorkerError};

#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn recognize(&self, image_path: &str) -> Result<String>;
}

/// Resolves a backend label (`"tesseract"` | `"vision"`) to an
/// implementation, downgrading to `tesseract` when the requested backend
/// isn't registered (spec §6).
pub struct OcrBackendRegistry {
    backends: HashMap<String, std::sync::Arc<dyn OcrBackend>>,
    default_backend: String,
}

impl OcrBackendRegistry {
    pub fn new(default_backend: impl Into<String>) -> Self {
        Self { backends: HashMap::new(), default_backend: default_backend.into() }
    }

    pub fn register(mut self, label: impl Into<String>, backend: std::sync::Arc<dyn OcrBackend>) -> Self {
        self.backends.insert(label.into(), backend);
        self
    }

    pub async fn recognize(&self, backend_label: &str, image_path: &str) -> Result<String> {
        let backend = match self.backends.get(backend_label) {
            Some(backend) => backend.clone(),
            None => {
                warn!(requested = backend_label, fallback = %self.default_backend, "ocr backend unavailable, downgrading");
                self.backends
                    .get(&self.default_backend)
                    .cloned()
                    .ok_or_else(|| WorkerError::Ocr(format!("no backend registered for fallback {}", self.default_backend)))?
            }
        };
        backend.recognize(image_path).await
    }
}

/// Deterministic test double returning fixed text per invocation, or a
/// caller-supplied error to exercise the failure paths.
pub struct FakeOcrBackend {
    result: std::result::Result<String, String>,
}

impl FakeOcrBackend {
    pub fn succeeding(text: impl Into<String>) -> Self {
        Self { result: Ok(text.into()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { result: Err(message.into()) }
    }
}

#[async_trait]
impl OcrBackend for FakeOcrBackend {
    async fn recognize(&self, _image_path: &str) -> Result<String> {
        self.result.clone().map_err(WorkerError::Ocr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_default_backend_when_requested_is_missing() {
        let registry = OcrBackendRegistry::new("tesseract")
            .register("tesseract", std::sync::Arc::new(FakeOcrBackend::succeeding("hello")));

        let text = registry.recognize("vision", "page.png").await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn uses_requested_backend_when_registered() {
        let registry = OcrBackendRegistry::new("tesseract")
            .register("tesseract", std::sync::Arc::new(FakeOcrBackend::succeeding("tess")))
            .register("vision", std::sync::Arc::new(FakeOcrBackend::succeeding("vis")));

        let text = registry.recognize("vision", "page.png").await.unwrap();
        assert_eq!(text, "vis");
    }
}
