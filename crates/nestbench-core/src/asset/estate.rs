use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

use super::Viewable;
use crate::error::AssetKind;
use crate::geometry::Point;

/// Descriptive estate attributes, exactly as the target echoes them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstateAttributes {
    pub id: i64,
    pub thumbnail: String,
    pub name: String,
    pub description: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub door_height: i64,
    pub door_width: i64,
    pub rent: i64,
    pub features: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstateLine {
    #[serde(flatten)]
    attributes: EstateAttributes,
    #[serde(default)]
    view_count: i64,
}

/// Ground-truth estate record
#[derive(Debug)]
pub struct Estate {
    attributes: EstateAttributes,
    view_count: AtomicI64,
}

impl Estate {
    pub fn new(attributes: EstateAttributes, view_count: i64) -> Self {
        Self {
            attributes,
            view_count: AtomicI64::new(view_count),
        }
    }

    /// Parse one line of the estate fixture stream
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        let parsed: EstateLine = serde_json::from_str(line)?;
        Ok(Self::new(parsed.attributes, parsed.view_count))
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(&EstateLine {
            attributes: self.attributes.clone(),
            view_count: self.view_count(),
        })
    }

    pub fn attributes(&self) -> &EstateAttributes {
        &self.attributes
    }

    pub fn location(&self) -> Point {
        Point::new(self.attributes.latitude, self.attributes.longitude)
    }

    /// CSV row accepted by the draft-post endpoint
    pub fn csv_record(&self) -> Vec<String> {
        let a = &self.attributes;
        vec![
            a.id.to_string(),
            a.name.clone(),
            a.description.clone(),
            a.thumbnail.clone(),
            a.address.clone(),
            a.latitude.to_string(),
            a.longitude.to_string(),
            a.rent.to_string(),
            a.door_height.to_string(),
            a.door_width.to_string(),
            a.features.clone(),
            self.popularity().to_string(),
        ]
    }
}

impl Viewable for Estate {
    type Echo = EstateAttributes;

    const KIND: AssetKind = AssetKind::Estate;

    fn id(&self) -> i64 {
        self.attributes.id
    }

    fn view_count(&self) -> i64 {
        self.view_count.load(Ordering::Acquire)
    }

    fn increment_view_count(&self) {
        self.view_count.fetch_add(1, Ordering::AcqRel);
    }

    // Estates are matched by identity; coordinates round-trip through the
    // target's float columns and are not compared.
    fn matches(&self, echoed: &EstateAttributes) -> bool {
        self.attributes.id == echoed.id
    }
}
