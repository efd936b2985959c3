use std::cmp::Ordering;

use tracing::warn;

use crate::models::image::SlotId;
use crate::services::comparison::CandidateResult;
use crate::services::store::ImageStore;

/// Six-way partition of the similarity range, inclusive on the lower
/// bound of each band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityTier {
    NearlyIdentical,
    HighlySimilar,
    FairlySimilar,
    ModeratelySimilar,
    SlightlySimilar,
    NotSimilar,
}

impl SimilarityTier {
    pub fn from_score(similarity: f64) -> Self {
        if similarity >= 0.9 {
            SimilarityTier::NearlyIdentical
        } else if similarity >= 0.8 {
            SimilarityTier::HighlySimilar
        } else if similarity >= 0.7 {
            SimilarityTier::FairlySimilar
        } else if similarity >= 0.6 {
            SimilarityTier::ModeratelySimilar
        } else if similarity >= 0.5 {
            SimilarityTier::SlightlySimilar
        } else {
            SimilarityTier::NotSimilar
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SimilarityTier::NearlyIdentical => "nearly identical",
            SimilarityTier::HighlySimilar => "highly similar",
            SimilarityTier::FairlySimilar => "fairly similar",
            SimilarityTier::ModeratelySimilar => "moderately similar",
            SimilarityTier::SlightlySimilar => "slightly similar",
            SimilarityTier::NotSimilar => "not similar",
        }
    }
}

/// Score rendered to one decimal percent, as shown everywhere in the UI.
pub fn format_percent(similarity: f64) -> String {
    format!("{:.1}%", similarity * 100.0)
}

/// One row ready for rendering. `candidate_index` is the position in the
/// submitted request, retained for source lookup; the row's position in
/// the display list means nothing beyond ordering.
#[derive(Debug, Clone)]
pub struct DisplayItem {
    pub candidate_index: usize,
    pub slot: SlotId,
    pub source_name: String,
    pub data_url: Option<String>,
    pub outcome: Result<f64, String>,
    pub tier: Option<SimilarityTier>,
}

/// Stable display ordering: descending similarity, errored entries after
/// every scored one, ties (scored or errored) by candidate index.
/// Sorting a sorted list changes nothing.
pub fn order_for_display(mut results: Vec<CandidateResult>) -> Vec<CandidateResult> {
    results.sort_by(|a, b| {
        let by_score = match (&a.outcome, &b.outcome) {
            (Ok(x), Ok(y)) => y.partial_cmp(x).unwrap_or(Ordering::Equal),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => Ordering::Equal,
        };
        by_score.then_with(|| a.index.cmp(&b.index))
    });
    results
}

/// Orders results and resolves each one's source image through its slot
/// id. A slot that no longer exists in the store (removed or reset since
/// submission) makes its entry stale; stale entries are dropped rather
/// than resolved against the changed collection.
pub fn present(results: Vec<CandidateResult>, store: &ImageStore) -> Vec<DisplayItem> {
    order_for_display(results)
        .into_iter()
        .filter_map(|result| match store.get(result.slot) {
            Some(image) => {
                let tier = result.outcome.as_ref().ok().map(|s| SimilarityTier::from_score(*s));
                Some(DisplayItem {
                    candidate_index: result.index,
                    slot: result.slot,
                    source_name: image.source_name,
                    data_url: image.state.payload().map(|p| p.to_data_url()),
                    outcome: result.outcome,
                    tier,
                })
            }
            None => {
                warn!(slot = %result.slot, index = result.index, "stale result for vanished slot, dropped");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::image::InlinePayload;

    fn result(index: usize, outcome: Result<f64, &str>) -> CandidateResult {
        CandidateResult {
            index,
            slot: SlotId::new(),
            outcome: outcome.map_err(|e| e.to_string()),
        }
    }

    #[test]
    fn orders_descending_with_errors_last() {
        // Service reply arrives out of order and partially failed.
        let results = vec![
            result(2, Ok(0.95)),
            result(0, Err("bad")),
            result(1, Ok(0.4)),
        ];
        let ordered = order_for_display(results);
        let indices: Vec<_> = ordered.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![2, 1, 0]);
    }

    #[test]
    fn ties_keep_candidate_order_and_sort_is_idempotent() {
        let results = vec![
            result(3, Err("y")),
            result(1, Ok(0.5)),
            result(2, Err("x")),
            result(0, Ok(0.5)),
        ];
        let once = order_for_display(results);
        let indices: Vec<_> = once.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let twice = order_for_display(once.clone());
        let again: Vec<_> = twice.iter().map(|r| r.index).collect();
        assert_eq!(again, indices);
    }

    #[test]
    fn tier_boundaries_are_inclusive_below() {
        assert_eq!(SimilarityTier::from_score(1.0), SimilarityTier::NearlyIdentical);
        assert_eq!(SimilarityTier::from_score(0.9), SimilarityTier::NearlyIdentical);
        assert_eq!(SimilarityTier::from_score(0.8999), SimilarityTier::HighlySimilar);
        assert_eq!(SimilarityTier::from_score(0.8), SimilarityTier::HighlySimilar);
        assert_eq!(SimilarityTier::from_score(0.7), SimilarityTier::FairlySimilar);
        assert_eq!(SimilarityTier::from_score(0.6), SimilarityTier::ModeratelySimilar);
        assert_eq!(SimilarityTier::from_score(0.5), SimilarityTier::SlightlySimilar);
        assert_eq!(SimilarityTier::from_score(0.4999), SimilarityTier::NotSimilar);
        assert_eq!(SimilarityTier::from_score(0.0), SimilarityTier::NotSimilar);
    }

    #[test]
    fn percent_formatting_keeps_one_decimal() {
        assert_eq!(format_percent(0.95), "95.0%");
        assert_eq!(format_percent(0.4), "40.0%");
        assert_eq!(format_percent(0.123), "12.3%");
    }

    fn filled_store(n: usize) -> (ImageStore, Vec<SlotId>) {
        let store = ImageStore::new();
        let ids = (0..n)
            .map(|i| {
                let (id, _) = store.reserve(&format!("{i}.png"));
                store.fill(
                    id,
                    InlinePayload {
                        mime_type: "image/png".to_string(),
                        base64: i.to_string(),
                    },
                    format!("h{i}"),
                );
                id
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn display_items_resolve_source_by_retained_index() {
        let (store, ids) = filled_store(3);
        let results = vec![
            CandidateResult { index: 2, slot: ids[2], outcome: Ok(0.95) },
            CandidateResult { index: 0, slot: ids[0], outcome: Err("bad".to_string()) },
            CandidateResult { index: 1, slot: ids[1], outcome: Ok(0.4) },
        ];
        let items = present(results, &store);
        assert_eq!(items.len(), 3);
        // Display position 0 is candidate 2, and its source resolves
        // through the retained index/slot, not the display position.
        assert_eq!(items[0].candidate_index, 2);
        assert_eq!(items[0].source_name, "2.png");
        assert_eq!(items[0].tier, Some(SimilarityTier::NearlyIdentical));
        assert_eq!(items[1].candidate_index, 1);
        assert_eq!(items[1].tier, Some(SimilarityTier::NotSimilar));
        assert_eq!(items[2].candidate_index, 0);
        assert!(items[2].outcome.is_err());
        assert_eq!(items[2].tier, None);
    }

    #[test]
    fn reset_makes_all_results_stale() {
        let (store, ids) = filled_store(2);
        let results = vec![
            CandidateResult { index: 0, slot: ids[0], outcome: Ok(0.8) },
            CandidateResult { index: 1, slot: ids[1], outcome: Ok(0.6) },
        ];
        store.reset();
        assert!(present(results, &store).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn removed_candidate_drops_only_its_row() {
        let (store, ids) = filled_store(3);
        let results: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| CandidateResult { index: i, slot: *id, outcome: Ok(0.5 + i as f64 * 0.1) })
            .collect();
        store.remove_at(1);
        let items = present(results, &store);
        let indices: Vec<_> = items.iter().map(|i| i.candidate_index).collect();
        assert_eq!(indices, vec![2, 0]);
    }
}
