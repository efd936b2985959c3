use parking_lot::Mutex;
use tracing::info;

use crate::models::image::{PayloadState, SlotId};
use crate::services::store::ImageStore;

/// One rendered preview row, bound to its image by slot identity.
/// `index` is the image's ordinal at the last sync and is display-only;
/// removal always resolves the live index from the store.
#[derive(Debug, Clone)]
pub struct PreviewRow {
    pub slot: SlotId,
    pub index: usize,
    pub source_name: String,
    pub data_url: Option<String>,
    pub failure: Option<String>,
}

/// Keeps one preview row per stored image, in store order.
pub struct PreviewPanel {
    rows: Mutex<Vec<PreviewRow>>,
}

impl PreviewPanel {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Rebuilds the rows from the store, renumbering labels to match the
    /// store's current indices.
    pub fn sync(&self, store: &ImageStore) {
        let rows = store
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(index, image)| {
                let (data_url, failure) = match &image.state {
                    PayloadState::Ready(p) => (Some(p.to_data_url()), None),
                    PayloadState::Failed(msg) => (None, Some(msg.clone())),
                    PayloadState::Pending => (None, None),
                };
                PreviewRow {
                    slot: image.id,
                    index,
                    source_name: image.source_name,
                    data_url,
                    failure,
                }
            })
            .collect();
        *self.rows.lock() = rows;
    }

    pub fn rows(&self) -> Vec<PreviewRow> {
        self.rows.lock().clone()
    }

    /// Removal trigger for one row. The index passed to the store is the
    /// slot's position right now, not whatever it was when the row was
    /// created; a slot already gone is a no-op.
    pub fn remove(&self, store: &ImageStore, slot: SlotId) -> Option<usize> {
        let index = store.position_of(slot)?;
        store.remove_at(index);
        self.sync(store);
        info!(slot = %slot, index, "preview row removed");
        Some(index)
    }

    /// Full reset of the collection and its rows.
    pub fn clear(&self, store: &ImageStore) {
        store.reset();
        self.rows.lock().clear();
    }
}

impl Default for PreviewPanel {
    fn default() -> Self {
        Self::new()
    }
}
