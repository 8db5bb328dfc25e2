//! Search-condition catalog
//!
//! Valid filter buckets and facet values for each resource type, used to build
//! randomized queries that always have matches. The last feature of each list
//! is held out for verification fixtures and never offered to load queries.

use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AssetKind, BenchError, Result};

const CHAIR_CONDITION_FILE: &str = "chair_condition.json";
const ESTATE_CONDITION_FILE: &str = "estate_condition.json";

/// One numeric bucket. `-1` on either side means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub id: i64,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeCondition {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    pub ranges: Vec<Range>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCondition {
    pub list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChairSearchCondition {
    pub width: RangeCondition,
    pub height: RangeCondition,
    pub depth: RangeCondition,
    pub price: RangeCondition,
    pub color: ListCondition,
    pub feature: ListCondition,
    pub kind: ListCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstateSearchCondition {
    pub door_width: RangeCondition,
    pub door_height: RangeCondition,
    pub rent: RangeCondition,
    pub feature: ListCondition,
}

#[derive(Debug)]
struct Held<C> {
    condition: C,
    verify_feature: String,
}

/// Split the verify-only feature off the end of `features`
fn split_verify_feature(features: &mut ListCondition, kind: AssetKind) -> Result<String> {
    features.list.pop().ok_or_else(|| {
        BenchError::fixture(
            format!("{kind}_condition.json"),
            "feature list is empty",
        )
    })
}

/// Read-only after [`ConditionCatalog::load`]; reads before that fail with
/// [`BenchError::NotLoaded`].
#[derive(Debug, Default)]
pub struct ConditionCatalog {
    chair: OnceCell<Held<ChairSearchCondition>>,
    estate: OnceCell<Held<EstateSearchCondition>>,
}

impl ConditionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a loaded catalog directly from parsed conditions
    pub fn from_conditions(
        chair: ChairSearchCondition,
        estate: EstateSearchCondition,
    ) -> Result<Self> {
        let catalog = Self::new();
        catalog.install_chair(chair)?;
        catalog.install_estate(estate)?;
        Ok(catalog)
    }

    /// Parse both condition documents from `fixture_dir`
    pub async fn load(&self, fixture_dir: &Path) -> Result<()> {
        let chair_path = fixture_dir.join(CHAIR_CONDITION_FILE);
        let estate_path = fixture_dir.join(ESTATE_CONDITION_FILE);
        let chair = read_condition::<ChairSearchCondition>(&chair_path);
        let estate = read_condition::<EstateSearchCondition>(&estate_path);
        let (chair, estate) = tokio::try_join!(chair, estate)?;

        self.install_chair(chair)?;
        self.install_estate(estate)?;
        debug!(dir = %fixture_dir.display(), "Search conditions loaded");
        Ok(())
    }

    fn install_chair(&self, mut condition: ChairSearchCondition) -> Result<()> {
        let verify_feature = split_verify_feature(&mut condition.feature, AssetKind::Chair)?;
        // a second load keeps the first catalog
        let _ = self.chair.set(Held {
            condition,
            verify_feature,
        });
        Ok(())
    }

    fn install_estate(&self, mut condition: EstateSearchCondition) -> Result<()> {
        let verify_feature = split_verify_feature(&mut condition.feature, AssetKind::Estate)?;
        let _ = self.estate.set(Held {
            condition,
            verify_feature,
        });
        Ok(())
    }

    pub fn chair_condition(&self) -> Result<&ChairSearchCondition> {
        self.chair
            .get()
            .map(|held| &held.condition)
            .ok_or(BenchError::NotLoaded(AssetKind::Chair))
    }

    pub fn chair_verify_feature(&self) -> Result<&str> {
        self.chair
            .get()
            .map(|held| held.verify_feature.as_str())
            .ok_or(BenchError::NotLoaded(AssetKind::Chair))
    }

    pub fn estate_condition(&self) -> Result<&EstateSearchCondition> {
        self.estate
            .get()
            .map(|held| &held.condition)
            .ok_or(BenchError::NotLoaded(AssetKind::Estate))
    }

    pub fn estate_verify_feature(&self) -> Result<&str> {
        self.estate
            .get()
            .map(|held| held.verify_feature.as_str())
            .ok_or(BenchError::NotLoaded(AssetKind::Estate))
    }
}

async fn read_condition<C: serde::de::DeserializeOwned>(path: &Path) -> Result<C> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BenchError::fixture(path, e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| BenchError::fixture(path, e.to_string()))
}
