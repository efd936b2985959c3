use parking_lot::Mutex;
use tracing::{info, warn};

use crate::models::image::{InlinePayload, PayloadState, SlotId, UploadedImage};

/// Ordered collection of uploaded images. Sole owner of collection
/// mutation; indices are always the contiguous range `0..len`.
///
/// Positions shift on removal, so asynchronous completions address slots
/// by `SlotId`, never by index. A fill whose target id no longer exists
/// is dropped with a log line.
pub struct ImageStore {
    slots: Mutex<Vec<UploadedImage>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Reserves the next ordinal slot and returns its identity and index.
    /// The slot starts out pending until its decode completes.
    pub fn reserve(&self, source_name: &str) -> (SlotId, usize) {
        let mut slots = self.slots.lock();
        let image = UploadedImage::pending(source_name);
        let id = image.id;
        slots.push(image);
        let index = slots.len() - 1;
        info!(slot = %id, index, "slot reserved");
        (id, index)
    }

    /// Commits a decoded payload into its reserved slot.
    pub fn fill(&self, id: SlotId, payload: InlinePayload, content_hash: String) {
        let mut slots = self.slots.lock();
        let duplicate = slots
            .iter()
            .any(|s| s.id != id && s.content_hash.as_deref() == Some(content_hash.as_str()));
        match slots.iter_mut().find(|s| s.id == id) {
            Some(slot) => {
                slot.state = PayloadState::Ready(payload);
                slot.content_hash = Some(content_hash);
                if duplicate {
                    warn!(slot = %id, name = %slot.source_name, "duplicate image content ingested");
                }
            }
            None => warn!(slot = %id, "late fill for a slot that no longer exists, dropped"),
        }
    }

    /// Marks a reserved slot's decode as failed.
    pub fn fail(&self, id: SlotId, message: String) {
        let mut slots = self.slots.lock();
        match slots.iter_mut().find(|s| s.id == id) {
            Some(slot) => slot.state = PayloadState::Failed(message),
            None => warn!(slot = %id, "late failure for a slot that no longer exists, dropped"),
        }
    }

    /// Removes the image at `index`; every later image shifts down one.
    pub fn remove_at(&self, index: usize) -> Option<SlotId> {
        let mut slots = self.slots.lock();
        if index >= slots.len() {
            warn!(index, len = slots.len(), "remove_at out of range, ignored");
            return None;
        }
        let removed = slots.remove(index);
        info!(slot = %removed.id, index, "slot removed");
        Some(removed.id)
    }

    pub fn reset(&self) {
        let mut slots = self.slots.lock();
        let n = slots.len();
        slots.clear();
        info!(cleared = n, "store reset");
    }

    /// Read-only ordered view for request building and rendering.
    pub fn snapshot(&self) -> Vec<UploadedImage> {
        self.slots.lock().clone()
    }

    pub fn get(&self, id: SlotId) -> Option<UploadedImage> {
        self.slots.lock().iter().find(|s| s.id == id).cloned()
    }

    /// Current ordinal of a slot, if it still exists.
    pub fn position_of(&self, id: SlotId) -> Option<usize> {
        self.slots.lock().iter().position(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Token tying an asynchronous fill to one reservation of a standalone
/// slot. A reset or re-selection bumps the epoch, which strands any
/// outstanding decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotToken(u64);

/// A single designated image slot, used for the "original image" fields
/// of the three workflows and the candidate of the pairwise ones.
pub struct SingleSlot {
    inner: Mutex<(u64, PayloadState)>,
}

impl SingleSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new((0, PayloadState::Pending)),
        }
    }

    /// Starts a new reservation, invalidating any outstanding decode.
    pub fn reserve(&self) -> SlotToken {
        let mut inner = self.inner.lock();
        inner.0 += 1;
        inner.1 = PayloadState::Pending;
        SlotToken(inner.0)
    }

    pub fn fill(&self, token: SlotToken, state: PayloadState) {
        let mut inner = self.inner.lock();
        if inner.0 == token.0 {
            inner.1 = state;
        } else {
            warn!("stale fill for superseded slot reservation, dropped");
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.0 += 1;
        inner.1 = PayloadState::Pending;
    }

    pub fn current(&self) -> PayloadState {
        self.inner.lock().1.clone()
    }

    pub fn ready_payload(&self) -> Option<InlinePayload> {
        self.inner.lock().1.payload().cloned()
    }
}

impl Default for SingleSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(tag: &str) -> InlinePayload {
        InlinePayload {
            mime_type: "image/png".to_string(),
            base64: tag.to_string(),
        }
    }

    #[test]
    fn reserve_assigns_contiguous_indices() {
        let store = ImageStore::new();
        let (_, i0) = store.reserve("a.png");
        let (_, i1) = store.reserve("b.png");
        let (_, i2) = store.reserve("c.png");
        assert_eq!((i0, i1, i2), (0, 1, 2));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn fill_out_of_order_lands_in_reserved_slots() {
        let store = ImageStore::new();
        let (a, _) = store.reserve("a.png");
        let (b, _) = store.reserve("b.png");
        // Second file finishes decoding first.
        store.fill(b, payload("B"), "hb".to_string());
        store.fill(a, payload("A"), "ha".to_string());
        let snap = store.snapshot();
        assert_eq!(snap[0].state.payload().unwrap().base64, "A");
        assert_eq!(snap[1].state.payload().unwrap().base64, "B");
    }

    #[test]
    fn remove_shifts_later_slots_down() {
        let store = ImageStore::new();
        let ids: Vec<_> = (0..4).map(|i| store.reserve(&format!("{i}.png")).0).collect();
        for (i, id) in ids.iter().enumerate() {
            store.fill(*id, payload(&i.to_string()), format!("h{i}"));
        }
        store.remove_at(1);
        let snap = store.snapshot();
        assert_eq!(snap.len(), 3);
        let bodies: Vec<_> = snap
            .iter()
            .map(|s| s.state.payload().unwrap().base64.clone())
            .collect();
        assert_eq!(bodies, vec!["0", "2", "3"]);
        assert_eq!(store.position_of(ids[3]), Some(2));
        assert_eq!(store.position_of(ids[1]), None);
    }

    #[test]
    fn fill_after_removal_is_dropped() {
        let store = ImageStore::new();
        let (a, _) = store.reserve("a.png");
        let (b, _) = store.reserve("b.png");
        store.remove_at(0);
        store.fill(a, payload("A"), "ha".to_string());
        assert_eq!(store.len(), 1);
        let snap = store.snapshot();
        assert_eq!(snap[0].id, b);
        assert_eq!(snap[0].state, PayloadState::Pending);
    }

    #[test]
    fn fill_after_reset_does_not_repopulate() {
        let store = ImageStore::new();
        let (a, _) = store.reserve("a.png");
        store.reset();
        store.fill(a, payload("A"), "ha".to_string());
        assert!(store.is_empty());
    }

    #[test]
    fn remove_out_of_range_is_ignored() {
        let store = ImageStore::new();
        store.reserve("a.png");
        assert!(store.remove_at(5).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn single_slot_drops_superseded_fill() {
        let slot = SingleSlot::new();
        let old = slot.reserve();
        let newer = slot.reserve();
        slot.fill(old, PayloadState::Ready(payload("stale")));
        assert_eq!(slot.current(), PayloadState::Pending);
        slot.fill(newer, PayloadState::Ready(payload("fresh")));
        assert_eq!(slot.ready_payload().unwrap().base64, "fresh");
    }

    #[test]
    fn single_slot_reset_strands_outstanding_decode() {
        let slot = SingleSlot::new();
        let token = slot.reserve();
        slot.reset();
        slot.fill(token, PayloadState::Ready(payload("late")));
        assert_eq!(slot.current(), PayloadState::Pending);
    }
}
