use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Chair, Estate, Stockable, Viewable};
use crate::error::{AssetKind, BenchError, Result};

const CHAIR_FIXTURE: &str = "result/chair_json.txt";
const ESTATE_FIXTURE: &str = "result/estate_json.txt";

/// In-memory oracle of every chair and estate the target should serve.
///
/// Records are keyed by id in sharded maps; counters live inside each record,
/// so concurrent scenarios only contend on the record they touch.
#[derive(Debug, Default)]
pub struct AssetStore {
    chairs: DashMap<i64, Arc<Chair>>,
    chair_ids: RwLock<Vec<i64>>,
    estates: DashMap<i64, Arc<Estate>>,
    estate_ids: RwLock<Vec<i64>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load both fixture streams under `data_dir` in parallel
    pub async fn load(data_dir: &Path, cancel: &CancellationToken) -> Result<Self> {
        Self::load_files(
            &data_dir.join(CHAIR_FIXTURE),
            &data_dir.join(ESTATE_FIXTURE),
            cancel,
        )
        .await
    }

    /// Load from explicit line-delimited JSON files. Any stream error or a
    /// cancellation fails the whole load.
    pub async fn load_files(
        chair_path: &Path,
        estate_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let (chairs, estates) = tokio::select! {
            _ = cancel.cancelled() => return Err(BenchError::Cancelled),
            loaded = async {
                tokio::try_join!(
                    read_lines(chair_path, cancel, Chair::from_json_line),
                    read_lines(estate_path, cancel, Estate::from_json_line),
                )
            } => loaded?,
        };

        let store = Self::new();
        for chair in chairs {
            store.insert_chair(chair);
        }
        for estate in estates {
            store.insert_estate(estate);
        }

        info!(
            chairs = store.chair_count(),
            estates = store.estate_count(),
            "Ground-truth assets loaded"
        );
        Ok(store)
    }

    pub fn insert_chair(&self, chair: Chair) {
        let id = chair.id();
        if self.chairs.insert(id, Arc::new(chair)).is_none() {
            self.chair_ids.write().push(id);
        }
    }

    pub fn insert_estate(&self, estate: Estate) {
        let id = estate.id();
        if self.estates.insert(id, Arc::new(estate)).is_none() {
            self.estate_ids.write().push(id);
        }
    }

    pub fn get_chair(&self, id: i64) -> Result<Arc<Chair>> {
        self.chairs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(BenchError::NotFound {
                kind: AssetKind::Chair,
                id,
            })
    }

    pub fn get_estate(&self, id: i64) -> Result<Arc<Estate>> {
        self.estates
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(BenchError::NotFound {
                kind: AssetKind::Estate,
                id,
            })
    }

    /// Saturating; absent ids and sold-out chairs are left untouched
    pub fn decrement_chair_stock(&self, id: i64) {
        if let Some(chair) = self.chairs.get(&id) {
            chair.decrement_stock();
        }
    }

    pub fn increment_chair_view_count(&self, id: i64) {
        if let Some(chair) = self.chairs.get(&id) {
            chair.increment_view_count();
        }
    }

    pub fn increment_estate_view_count(&self, id: i64) {
        if let Some(estate) = self.estates.get(&id) {
            estate.increment_view_count();
        }
    }

    pub fn chair_count(&self) -> usize {
        self.chairs.len()
    }

    pub fn estate_count(&self) -> usize {
        self.estates.len()
    }

    /// Pick up to `amount` distinct estates uniformly at random
    pub fn sample_estates<R: Rng + ?Sized>(&self, rng: &mut R, amount: usize) -> Vec<Arc<Estate>> {
        let ids = self.estate_ids.read();
        let amount = amount.min(ids.len());
        rand::seq::index::sample(rng, ids.len(), amount)
            .into_iter()
            .filter_map(|index| self.estates.get(&ids[index]).map(|e| e.value().clone()))
            .collect()
    }
}

async fn read_lines<T, F>(path: &Path, cancel: &CancellationToken, parse: F) -> Result<Vec<T>>
where
    F: Fn(&str) -> serde_json::Result<T>,
{
    let file = File::open(path)
        .await
        .map_err(|e| BenchError::fixture(path, e.to_string()))?;
    let mut lines = BufReader::new(file).lines();
    let mut records = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if cancel.is_cancelled() {
            return Err(BenchError::Cancelled);
        }
        if line.trim().is_empty() {
            continue;
        }
        let record = parse(&line).map_err(|e| BenchError::fixture(path, e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{ChairAttributes, EstateAttributes};
    use std::io::Write;

    fn chair(id: i64, stock: i64) -> Chair {
        Chair::new(
            ChairAttributes {
                id,
                name: "c".into(),
                description: "d".into(),
                thumbnail: "t".into(),
                price: 100,
                height: 1,
                width: 1,
                depth: 1,
                color: "red".into(),
                features: String::new(),
                kind: "k".into(),
            },
            0,
            stock,
        )
    }

    fn estate(id: i64, latitude: f64, longitude: f64) -> Estate {
        Estate::new(
            EstateAttributes {
                id,
                thumbnail: "t".into(),
                name: "e".into(),
                description: "d".into(),
                address: "a".into(),
                latitude,
                longitude,
                door_height: 100,
                door_width: 100,
                rent: 1000,
                features: String::new(),
            },
            0,
        )
    }

    fn write_fixture(dir: &Path, name: &str, lines: &[String]) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    #[tokio::test]
    async fn test_load_from_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let chairs: Vec<String> = (1..=3).map(|i| chair(i, 5).to_json_line().unwrap()).collect();
        let estates: Vec<String> = (1..=4)
            .map(|i| estate(i, 35.0 + i as f64, 139.0).to_json_line().unwrap())
            .collect();
        write_fixture(dir.path(), CHAIR_FIXTURE, &chairs);
        write_fixture(dir.path(), ESTATE_FIXTURE, &estates);

        let store = AssetStore::load(dir.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.chair_count(), 3);
        assert_eq!(store.estate_count(), 4);
        assert_eq!(store.get_chair(2).unwrap().stock(), 5);
        assert!(matches!(
            store.get_estate(99),
            Err(BenchError::NotFound { kind: AssetKind::Estate, id: 99 })
        ));
    }

    #[tokio::test]
    async fn test_load_fails_when_one_stream_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), CHAIR_FIXTURE, &[chair(1, 1).to_json_line().unwrap()]);
        write_fixture(dir.path(), ESTATE_FIXTURE, &["{not json".to_string()]);

        let result = AssetStore::load(dir.path(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(BenchError::Fixture { .. })));
    }

    #[tokio::test]
    async fn test_load_respects_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), CHAIR_FIXTURE, &[chair(1, 1).to_json_line().unwrap()]);
        write_fixture(dir.path(), ESTATE_FIXTURE, &[estate(1, 0.0, 0.0).to_json_line().unwrap()]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = AssetStore::load(dir.path(), &cancel).await;
        assert!(matches!(result, Err(BenchError::Cancelled)));
    }

    #[test]
    fn test_mutations_on_absent_ids_are_noops() {
        let store = AssetStore::new();
        store.decrement_chair_stock(1);
        store.increment_chair_view_count(1);
        store.increment_estate_view_count(1);
        assert_eq!(store.chair_count(), 0);
    }

    #[test]
    fn test_concurrent_decrements_never_go_negative() {
        let store = Arc::new(AssetStore::new());
        store.insert_chair(chair(1, 250));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.decrement_chair_stock(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get_chair(1).unwrap().stock(), 0);
    }

    fn assert_no_lost_view_updates<T: Viewable + 'static>(asset: Arc<T>) {
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let asset = asset.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        asset.increment_view_count();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(asset.view_count(), 100 + 100 * 100);
    }

    #[test]
    fn test_parallel_view_count_increment() {
        let c = chair(1, 1);
        assert_no_lost_view_updates(Arc::new(Chair::new(c.attributes().clone(), 100, 1)));

        let e = estate(1, 0.0, 0.0);
        assert_no_lost_view_updates(Arc::new(Estate::new(e.attributes().clone(), 100)));
    }

    #[test]
    fn test_sample_estates_without_repeats() {
        let store = AssetStore::new();
        for id in 0..10 {
            store.insert_estate(estate(id, id as f64, 0.0));
        }
        let mut rng = rand::thread_rng();
        let picked = store.sample_estates(&mut rng, 8);
        let mut ids: Vec<i64> = picked.iter().map(|e| e.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);

        assert_eq!(store.sample_estates(&mut rng, 50).len(), 10);
    }
}
