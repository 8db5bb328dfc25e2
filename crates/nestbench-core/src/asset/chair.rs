use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

use super::{Stockable, Viewable};
use crate::error::AssetKind;

/// Descriptive chair attributes, exactly as the target echoes them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChairAttributes {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub thumbnail: String,
    pub price: i64,
    pub height: i64,
    pub width: i64,
    pub depth: i64,
    pub color: String,
    pub features: String,
    pub kind: String,
}

/// Fixture line layout: attributes plus the mutable counters
#[derive(Serialize, Deserialize)]
struct ChairLine {
    #[serde(flatten)]
    attributes: ChairAttributes,
    #[serde(default)]
    view_count: i64,
    #[serde(default)]
    stock: i64,
}

/// Ground-truth chair record
#[derive(Debug)]
pub struct Chair {
    attributes: ChairAttributes,
    view_count: AtomicI64,
    stock: AtomicI64,
}

impl Chair {
    pub fn new(attributes: ChairAttributes, view_count: i64, stock: i64) -> Self {
        Self {
            attributes,
            view_count: AtomicI64::new(view_count),
            stock: AtomicI64::new(stock.max(0)),
        }
    }

    /// Parse one line of the chair fixture stream
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        let parsed: ChairLine = serde_json::from_str(line)?;
        Ok(Self::new(parsed.attributes, parsed.view_count, parsed.stock))
    }

    /// Encode with the current counter values, in fixture line layout
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ChairLine {
            attributes: self.attributes.clone(),
            view_count: self.view_count(),
            stock: self.stock(),
        })
    }

    pub fn attributes(&self) -> &ChairAttributes {
        &self.attributes
    }

    /// CSV row accepted by the draft-post endpoint
    pub fn csv_record(&self) -> Vec<String> {
        let a = &self.attributes;
        vec![
            a.id.to_string(),
            a.name.clone(),
            a.description.clone(),
            a.thumbnail.clone(),
            a.price.to_string(),
            a.height.to_string(),
            a.width.to_string(),
            a.depth.to_string(),
            a.color.clone(),
            a.features.clone(),
            a.kind.clone(),
            self.popularity().to_string(),
            self.stock().to_string(),
        ]
    }
}

impl Viewable for Chair {
    type Echo = ChairAttributes;

    const KIND: AssetKind = AssetKind::Chair;

    fn id(&self) -> i64 {
        self.attributes.id
    }

    fn view_count(&self) -> i64 {
        self.view_count.load(Ordering::Acquire)
    }

    fn increment_view_count(&self) {
        self.view_count.fetch_add(1, Ordering::AcqRel);
    }

    fn matches(&self, echoed: &ChairAttributes) -> bool {
        self.attributes == *echoed
    }
}

impl Stockable for Chair {
    fn stock(&self) -> i64 {
        self.stock.load(Ordering::Acquire)
    }

    fn decrement_stock(&self) -> bool {
        self.stock
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |stock| {
                (stock > 0).then(|| stock - 1)
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    pub(crate) fn sample_attributes(id: i64) -> ChairAttributes {
        ChairAttributes {
            id,
            name: format!("chair-{id}"),
            description: "description".to_string(),
            thumbnail: "/images/chair/1.png".to_string(),
            price: 12000,
            height: 80,
            width: 50,
            depth: 45,
            color: "black".to_string(),
            features: "armrest,caster".to_string(),
            kind: "gaming".to_string(),
        }
    }

    #[test]
    fn test_json_line_round_trip_keeps_counters() {
        let chair = Chair::new(sample_attributes(1), 7, 6);
        let line = chair.to_json_line().unwrap();
        let parsed = Chair::from_json_line(&line).unwrap();

        assert_eq!(parsed.attributes(), chair.attributes());
        assert_eq!(parsed.view_count(), 7);
        assert_eq!(parsed.stock(), 6);
    }

    #[test]
    fn test_fixture_line_layout() {
        let line = r#"{"id":3,"name":"n","description":"d","thumbnail":"t","price":2,"height":3,"width":4,"depth":5,"color":"red","features":"f","kind":"k","view_count":11,"stock":2}"#;
        let chair = Chair::from_json_line(line).unwrap();
        assert_eq!(chair.id(), 3);
        assert_eq!(chair.popularity(), 11);
        assert_eq!(chair.stock(), 2);
    }

    #[test]
    fn test_decrement_saturates_at_zero() {
        let chair = Chair::new(sample_attributes(1), 0, 2);
        assert!(chair.decrement_stock());
        assert!(chair.decrement_stock());
        assert!(!chair.decrement_stock());
        assert_eq!(chair.stock(), 0);
    }

    #[test]
    fn test_parallel_stock_decrement() {
        let chair = Arc::new(Chair::new(sample_attributes(1), 0, 1_000_000));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let chair = chair.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        chair.decrement_stock();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(chair.stock(), 1_000_000 - 100 * 100);
    }

    #[test]
    fn test_parallel_decrement_past_zero() {
        let chair = Arc::new(Chair::new(sample_attributes(1), 0, 500));
        let handles: Vec<_> = (0..50)
            .map(|_| {
                let chair = chair.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        chair.decrement_stock();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(chair.stock(), 0);
    }

    #[test]
    fn test_matches_compares_echoed_fields() {
        let chair = Chair::new(sample_attributes(5), 0, 1);
        let mut echoed = sample_attributes(5);
        assert!(chair.matches(&echoed));

        echoed.price += 1;
        assert!(!chair.matches(&echoed));
    }
}
