use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{info, warn};

use crate::models::config::AppConfig;
use crate::models::error::AppError;
use crate::models::image::{InlinePayload, PayloadState, SlotId};
use crate::services::store::{ImageStore, SingleSlot};

/// Reads selected files, validates and encodes them, and commits the
/// results into pre-reserved slots.
#[derive(Clone)]
pub struct Ingestor {
    config: Arc<AppConfig>,
}

impl Ingestor {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Decodes one file into a self-describing payload plus content digest.
    async fn decode_file(&self, path: &Path) -> Result<(InlinePayload, String), AppError> {
        let data = fs::read(path)
            .await
            .map_err(|e| AppError::FileRead(format!("{}: {}", path.display(), e)))?;

        if data.len() as u64 > self.config.max_image_bytes {
            return Err(AppError::FileTooLarge(data.len() as u64));
        }

        let mime_type = match infer::get(&data) {
            Some(kind) if kind.mime_type().starts_with("image/") => {
                kind.mime_type().to_string()
            }
            Some(kind) => return Err(AppError::InvalidMimeType(kind.mime_type().to_string())),
            None => return Err(AppError::InvalidMimeType("unknown".to_string())),
        };

        let mut hasher = Sha256::new();
        hasher.update(&data);
        let hash = hex::encode(hasher.finalize());

        let base64 = base64::engine::general_purpose::STANDARD.encode(&data);
        Ok((InlinePayload { mime_type, base64 }, hash))
    }

    /// Decodes one file into a standalone slot. The reservation happens
    /// before the first await, so a later reset or re-selection strands
    /// this decode instead of racing it.
    pub async fn ingest_single(
        &self,
        slot: &SingleSlot,
        path: &Path,
    ) -> Result<(), AppError> {
        let token = slot.reserve();
        match self.decode_file(path).await {
            Ok((payload, hash)) => {
                info!(path = %path.display(), mime = %payload.mime_type, hash = %hash, "image ingested");
                slot.fill(token, PayloadState::Ready(payload));
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ingest failed");
                slot.fill(token, PayloadState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Ingests a selection of files into the store. Every slot is reserved
    /// synchronously, in selection order, before any decoding starts;
    /// decodes then run concurrently and commit by slot identity, so the
    /// final order matches the selection regardless of completion order.
    /// An empty selection is a no-op.
    pub async fn ingest_batch(
        &self,
        store: &Arc<ImageStore>,
        paths: &[PathBuf],
    ) -> Vec<SlotId> {
        let reserved: Vec<(SlotId, PathBuf)> = paths
            .iter()
            .map(|p| {
                let name = p
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string());
                (store.reserve(&name).0, p.clone())
            })
            .collect();

        let mut handles = Vec::with_capacity(reserved.len());
        for (id, path) in &reserved {
            let ingestor = self.clone();
            let store = store.clone();
            let id = *id;
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                match ingestor.decode_file(&path).await {
                    Ok((payload, hash)) => {
                        info!(slot = %id, path = %path.display(), "image ingested");
                        store.fill(id, payload, hash);
                    }
                    Err(e) => {
                        warn!(slot = %id, path = %path.display(), error = %e, "ingest failed");
                        store.fail(id, e.to_string());
                    }
                }
            }));
        }
        for handle in handles {
            // Decode tasks neither panic on bad input nor get aborted.
            let _ = handle.await;
        }

        reserved.into_iter().map(|(id, _)| id).collect()
    }
}
