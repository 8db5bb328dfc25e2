//! Ground-truth assets
//!
//! The benchmarker keeps its own copy of every chair and estate it expects the
//! target to serve. Descriptive attributes are immutable; the counters that
//! scenarios mutate (views, stock) are atomics so the store never funnels
//! traffic through a single lock.

mod chair;
mod estate;
mod store;

pub use chair::{Chair, ChairAttributes};
pub use estate::{Estate, EstateAttributes};
pub use store::AssetStore;

use crate::error::AssetKind;

/// An asset whose detail page can be viewed and ranked by popularity
pub trait Viewable: Send + Sync {
    /// Shape of the record as echoed back by the target service
    type Echo;

    const KIND: AssetKind;

    fn id(&self) -> i64;

    fn view_count(&self) -> i64;

    fn increment_view_count(&self);

    /// Ranking key used by the target: higher is listed first, ties by id ascending
    fn popularity(&self) -> i64 {
        self.view_count()
    }

    /// Whether a record served by the target corresponds to this truth record
    fn matches(&self, echoed: &Self::Echo) -> bool;
}

/// An asset with a finite stock that purchases consume
pub trait Stockable: Viewable {
    fn stock(&self) -> i64;

    /// Consume one unit. Saturates at zero; returns whether a unit was taken.
    fn decrement_stock(&self) -> bool;
}
