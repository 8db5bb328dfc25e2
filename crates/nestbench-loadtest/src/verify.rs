//! Snapshot verification
//!
//! Captured request/response pairs are replayed against the target before any
//! load is applied. Bodies are compared as decoded JSON, so key order does not
//! matter but every value does.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use nestbench_core::fails::{ErrorAggregator, ScenarioError, ScenarioLabel};
use nestbench_core::BenchError;
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{RawResponse, WebappClient};

/// Snapshot categories and how many files of each are replayed
pub const CATEGORIES: [(&str, usize); 8] = [
    ("chair_search_condition", 3),
    ("chair_search", 3),
    ("estate_search_condition", 3),
    ("estate_search", 3),
    ("chair_low_priced", 1),
    ("estate_low_priced", 1),
    ("recommended_estate_with_chair", 3),
    ("estate_nazotte", 3),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub method: String,
    pub resource: String,
    #[serde(default)]
    pub query: String,
    /// JSON text; empty when the request had no body
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default)]
    pub body: String,
}

/// One captured request and the response it should produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub request: SnapshotRequest,
    pub response: SnapshotResponse,
}

impl Snapshot {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    fn endpoint(&self) -> String {
        format!("{} {}", self.request.method, self.request.resource)
    }
}

/// Compare a live response with the captured one.
///
/// An expected 200 requires a live 200 with an equal decoded body. Any other
/// expected status only requires the live response not to be a 200.
pub fn compare_response(snapshot: &Snapshot, live: &RawResponse) -> Result<(), ScenarioError> {
    let endpoint = snapshot.endpoint();

    if snapshot.response.status_code != StatusCode::OK.as_u16() {
        if live.status == StatusCode::OK {
            return Err(ScenarioError::application(format!(
                "{endpoint}: got response status code 200; expected {}",
                snapshot.response.status_code
            )));
        }
        return Ok(());
    }

    if live.status != StatusCode::OK {
        return Err(ScenarioError::application(format!(
            "{endpoint}: got response status code {}; expected 200",
            live.status.as_u16()
        )));
    }

    let expected: Value = serde_json::from_str(&snapshot.response.body).map_err(|e| {
        ScenarioError::Unclassified(format!("{endpoint}: snapshot body is not JSON: {e}"))
    })?;
    let actual: Value = serde_json::from_str(&live.body)
        .map_err(|_| ScenarioError::application(format!("{endpoint}: failed to decode JSON")))?;

    if expected != actual {
        return Err(ScenarioError::application(format!(
            "{endpoint}: response body does not match"
        )));
    }
    Ok(())
}

/// Replays a random sample of the snapshot directory
#[derive(Debug, Clone)]
pub struct SnapshotVerifier {
    dir: PathBuf,
}

impl SnapshotVerifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Draw the files to replay, with replacement, per category
    pub async fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<PathBuf>, BenchError> {
        let mut listed = Vec::with_capacity(CATEGORIES.len());
        for (category, amount) in CATEGORIES {
            let dir = self.dir.join(category);
            let files = list_files(&dir).await?;
            if files.is_empty() {
                return Err(BenchError::fixture(dir, "no snapshots in category"));
            }
            listed.push((files, amount));
        }

        let mut picked = Vec::new();
        for (files, amount) in &listed {
            for _ in 0..*amount {
                if let Some(file) = files.choose(rng) {
                    picked.push(file.clone());
                }
            }
        }
        Ok(picked)
    }

    /// Replay the sample concurrently. Every mismatch is reported to `errors`
    /// under the verify label; returns how many snapshots failed.
    pub async fn verify(&self, client: &WebappClient, errors: &ErrorAggregator) -> usize {
        let picked = self.pick(&mut StdRng::from_entropy()).await;
        let picked = match picked {
            Ok(picked) => picked,
            Err(e) => {
                errors.add(&ScenarioError::from(e), ScenarioLabel::Verify);
                return 1;
            }
        };

        info!(snapshots = picked.len(), "Verifying snapshots");
        let results = join_all(picked.iter().map(|path| replay_snapshot(client, path))).await;

        let mut failed = 0;
        for (path, result) in picked.iter().zip(results) {
            if let Err(err) = result {
                debug!(snapshot = %path.display(), "Snapshot mismatch: {}", err);
                errors.add(&err, ScenarioLabel::Verify);
                if !err.is_cancelled() {
                    failed += 1;
                }
            }
        }
        failed
    }
}

async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, BenchError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| BenchError::fixture(dir, e.to_string()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

async fn replay_snapshot(client: &WebappClient, path: &Path) -> Result<(), ScenarioError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BenchError::fixture(path, e.to_string()))?;
    let snapshot =
        Snapshot::from_json(&text).map_err(|e| BenchError::fixture(path, e.to_string()))?;

    let method = Method::from_bytes(snapshot.request.method.as_bytes())
        .map_err(|e| BenchError::fixture(path, e.to_string()))?;
    let body = (!snapshot.request.body.is_empty()).then(|| snapshot.request.body.clone());

    let live = client
        .replay(method, &snapshot.request.resource, &snapshot.request.query, body)
        .await?;
    compare_response(&snapshot, &live)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: u16, body: &str) -> Snapshot {
        Snapshot {
            request: SnapshotRequest {
                method: "GET".to_string(),
                resource: "/api/chair/search".to_string(),
                query: "priceRangeId=1&perPage=30&page=0".to_string(),
                body: String::new(),
            },
            response: SnapshotResponse {
                status_code: status,
                body: body.to_string(),
            },
        }
    }

    fn live(status: StatusCode, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_key_order_is_irrelevant() {
        let expected = snapshot(200, r#"{"count":1,"chairs":[{"id":1,"name":"a"}]}"#);
        let actual = live(StatusCode::OK, r#"{"chairs":[{"name":"a","id":1}],"count":1}"#);
        assert!(compare_response(&expected, &actual).is_ok());
    }

    #[test]
    fn test_error_status_fails_expected_ok() {
        let expected = snapshot(200, r#"{"count":1,"chairs":[]}"#);
        let err = compare_response(&expected, &live(StatusCode::INTERNAL_SERVER_ERROR, ""))
            .unwrap_err();
        assert_eq!(
            err,
            ScenarioError::application(
                "GET /api/chair/search: got response status code 500; expected 200"
            )
        );
    }

    #[test]
    fn test_value_mismatch_fails() {
        let expected = snapshot(200, r#"{"count":1,"chairs":[{"id":1}]}"#);
        let actual = live(StatusCode::OK, r#"{"count":1,"chairs":[{"id":2}]}"#);
        assert!(compare_response(&expected, &actual).is_err());

        // array order is significant
        let expected = snapshot(200, r#"{"chairs":[{"id":1},{"id":2}]}"#);
        let actual = live(StatusCode::OK, r#"{"chairs":[{"id":2},{"id":1}]}"#);
        assert!(compare_response(&expected, &actual).is_err());
    }

    #[test]
    fn test_expected_error_only_rejects_ok() {
        let expected = snapshot(400, "");
        assert!(compare_response(&expected, &live(StatusCode::BAD_REQUEST, "")).is_ok());
        assert!(compare_response(&expected, &live(StatusCode::NOT_FOUND, "")).is_ok());
        assert!(compare_response(&expected, &live(StatusCode::OK, "{}")).is_err());
    }

    #[test]
    fn test_broken_snapshot_body_is_unclassified() {
        let expected = snapshot(200, "not json");
        let err = compare_response(&expected, &live(StatusCode::OK, "{}")).unwrap_err();
        assert!(matches!(err, ScenarioError::Unclassified(_)));
    }

    #[test]
    fn test_snapshot_file_shape() {
        let text = r#"{
            "request": {"method": "POST", "resource": "/api/estate/nazotte", "query": "", "body": "{\"coordinates\":[]}"},
            "response": {"statusCode": 200, "body": "{\"count\":0,\"estates\":[]}"}
        }"#;
        let parsed = Snapshot::from_json(text).unwrap();
        assert_eq!(parsed.request.method, "POST");
        assert_eq!(parsed.response.status_code, 200);
        assert_eq!(parsed.endpoint(), "POST /api/estate/nazotte");
    }

    #[tokio::test]
    async fn test_pick_draws_per_category() {
        let dir = tempfile::tempdir().unwrap();
        for (category, _) in CATEGORIES {
            let sub = dir.path().join(category);
            std::fs::create_dir(&sub).unwrap();
            std::fs::write(sub.join("0.json"), "{}").unwrap();
            std::fs::write(sub.join("1.json"), "{}").unwrap();
        }
        let verifier = SnapshotVerifier::new(dir.path());
        let picked = verifier.pick(&mut StdRng::seed_from_u64(7)).await.unwrap();
        assert_eq!(picked.len(), 20);
        assert!(picked
            .iter()
            .filter(|p| p.parent().unwrap().ends_with("chair_low_priced"))
            .count()
            == 1);
    }

    #[tokio::test]
    async fn test_pick_requires_every_category() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("chair_search_condition")).unwrap();
        let verifier = SnapshotVerifier::new(dir.path());
        assert!(matches!(
            verifier.pick(&mut StdRng::seed_from_u64(7)).await,
            Err(BenchError::Fixture { .. })
        ));
    }

    #[tokio::test]
    async fn test_pick_skips_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        for (category, _) in CATEGORIES {
            let sub = dir.path().join(category);
            std::fs::create_dir_all(sub.join("archive")).unwrap();
            std::fs::write(sub.join("0.json"), "{}").unwrap();
        }
        let picked = SnapshotVerifier::new(dir.path())
            .pick(&mut StdRng::seed_from_u64(7))
            .await
            .unwrap();
        assert!(picked.iter().all(|p| p.ends_with("0.json")));
    }
}
