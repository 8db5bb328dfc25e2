//! Draft posting
//!
//! New listings are uploaded as CSV from line-delimited JSON draft files.
//! The fixtures are known to be valid, so any failure here is critical. Posted
//! records join the ground truth only once the target accepted them.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nestbench_core::asset::{Chair, Estate};
use nestbench_core::fails::{ScenarioError, ScenarioLabel};
use nestbench_core::BenchError;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{Scenario, ScenarioContext};
use crate::client::WebappClient;

/// Draft files of one resource type, handed out in file-name order
#[derive(Debug, Default)]
pub struct DraftQueue {
    files: Mutex<VecDeque<PathBuf>>,
}

impl DraftQueue {
    /// Every regular file in `dir`. A missing directory yields an empty queue.
    pub async fn from_dir(dir: &Path) -> Result<Self, BenchError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "No draft directory");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(Self {
            files: Mutex::new(files.into()),
        })
    }

    pub fn next(&self) -> Option<PathBuf> {
        self.files.lock().pop_front()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.files.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn read_draft<T>(
    path: &Path,
    parse: fn(&str) -> serde_json::Result<T>,
) -> Result<Vec<T>, BenchError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BenchError::fixture(path, e.to_string()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse(line).map_err(|e| BenchError::fixture(path, e.to_string())))
        .collect()
}

/// Headerless CSV, one row per record
pub fn encode_csv<I>(records: I) -> Result<Vec<u8>, BenchError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for record in records {
        writer
            .write_record(&record)
            .map_err(|e| BenchError::fixture("draft csv", e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| BenchError::fixture("draft csv", e.to_string()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "draft.csv".to_string())
}

/// Anything but cancellation becomes critical
fn critical(err: ScenarioError) -> ScenarioError {
    match err {
        ScenarioError::Cancelled => ScenarioError::Cancelled,
        ScenarioError::Coded { message, .. } => ScenarioError::critical(message),
        other => ScenarioError::critical(other.to_string()),
    }
}

#[derive(Debug)]
pub struct ChairDraftPostScenario {
    path: PathBuf,
}

impl ChairDraftPostScenario {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Scenario for ChairDraftPostScenario {
    fn label(&self) -> ScenarioLabel {
        ScenarioLabel::ChairDraftPost
    }

    fn scores(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &ScenarioContext, client: &WebappClient) -> Result<(), ScenarioError> {
        let chairs = read_draft(&self.path, Chair::from_json_line)
            .await
            .map_err(|e| ScenarioError::critical(e.to_string()))?;
        let csv = encode_csv(chairs.iter().map(Chair::csv_record))
            .map_err(|e| ScenarioError::critical(e.to_string()))?;

        client
            .post_chairs(file_name(&self.path), csv)
            .await
            .map_err(critical)?;

        let posted = chairs.len();
        for chair in chairs {
            ctx.store.insert_chair(chair);
        }
        info!(posted, file = %self.path.display(), "Chair drafts posted");
        Ok(())
    }
}

#[derive(Debug)]
pub struct EstateDraftPostScenario {
    path: PathBuf,
}

impl EstateDraftPostScenario {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Scenario for EstateDraftPostScenario {
    fn label(&self) -> ScenarioLabel {
        ScenarioLabel::EstateDraftPost
    }

    fn scores(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &ScenarioContext, client: &WebappClient) -> Result<(), ScenarioError> {
        let estates = read_draft(&self.path, Estate::from_json_line)
            .await
            .map_err(|e| ScenarioError::critical(e.to_string()))?;
        let csv = encode_csv(estates.iter().map(Estate::csv_record))
            .map_err(|e| ScenarioError::critical(e.to_string()))?;

        client
            .post_estates(file_name(&self.path), csv)
            .await
            .map_err(critical)?;

        let posted = estates.len();
        for estate in estates {
            ctx.store.insert_estate(estate);
        }
        info!(posted, file = %self.path.display(), "Estate drafts posted");
        Ok(())
    }
}
