//! Assertions against the ground truth

use std::sync::Arc;

use nestbench_core::asset::{AssetStore, ChairAttributes, EstateAttributes, Viewable};

/// Popularity may have drifted this much between server and truth counters
pub const POPULARITY_TOLERANCE: i64 = 3;

/// Whether `ids` are listed most popular first, within tolerance.
/// An id unknown to the truth fails the check.
pub fn ordered_by_popularity<T, F>(ids: impl IntoIterator<Item = i64>, lookup: F) -> bool
where
    T: Viewable,
    F: Fn(i64) -> Option<Arc<T>>,
{
    let mut previous: Option<i64> = None;
    for id in ids {
        let Some(asset) = lookup(id) else {
            return false;
        };
        let popularity = asset.popularity();
        if let Some(prev) = previous {
            if prev - popularity < -POPULARITY_TOLERANCE {
                return false;
            }
        }
        previous = Some(popularity);
    }
    true
}

pub fn chairs_ordered(store: &AssetStore, chairs: &[ChairAttributes]) -> bool {
    ordered_by_popularity(chairs.iter().map(|c| c.id), |id| store.get_chair(id).ok())
}

pub fn estates_ordered(store: &AssetStore, estates: &[EstateAttributes]) -> bool {
    ordered_by_popularity(estates.iter().map(|e| e.id), |id| store.get_estate(id).ok())
}

pub fn chair_matches_truth(store: &AssetStore, chair: &ChairAttributes) -> bool {
    store
        .get_chair(chair.id)
        .map_or(false, |truth| truth.matches(chair))
}

pub fn estate_matches_truth(store: &AssetStore, estate: &EstateAttributes) -> bool {
    store
        .get_estate(estate.id)
        .map_or(false, |truth| truth.matches(estate))
}
