//! Benchmark pipeline: prepare, initialize, verify, load, score

use std::sync::Arc;

use nestbench_core::asset::AssetStore;
use nestbench_core::condition::ConditionCatalog;
use nestbench_core::fails::{ErrorAggregator, ScenarioError, ScenarioLabel};
use nestbench_core::score::LevelController;
use nestbench_core::BenchError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::{ClientFactory, Target};
use crate::config::{BenchConfig, ConfigError};
use crate::load::{LoadOrchestrator, LoadSummary};
use crate::metrics::{MetricsSummary, RequestMetrics};
use crate::report::BenchResult;
use crate::scenario::draft_post::DraftQueue;
use crate::scenario::ScenarioContext;
use crate::verify::SnapshotVerifier;

/// Setup failures that prevent a run from starting at all
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub result: BenchResult,
    pub load: Option<LoadSummary>,
    pub metrics: MetricsSummary,
}

struct Prepared {
    store: AssetStore,
    conditions: ConditionCatalog,
    chair_drafts: DraftQueue,
    estate_drafts: DraftQueue,
}

pub struct BenchRunner {
    config: BenchConfig,
}

impl BenchRunner {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, RunError> {
        let params = Arc::new(self.config.parameters.clone());
        let metrics = Arc::new(RequestMetrics::new());
        let clients = ClientFactory::new(
            Target::from_config(&self.config.target)?,
            metrics.clone(),
            params.api_timeout(),
        )?;
        let errors = Arc::new(ErrorAggregator::new());

        let finish = |result: BenchResult, load: Option<LoadSummary>| RunReport {
            result,
            load,
            metrics: metrics.summary(),
        };

        info!(phase = "prepare", "Loading fixtures");
        let prepared = match self.prepare(cancel).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Fixture loading failed: {}", e);
                errors.add(&ScenarioError::from(e), ScenarioLabel::Initialize);
                return Ok(finish(BenchResult::aborted(&errors.snapshot(), ""), None));
            }
        };

        info!(phase = "initialize", "Resetting target");
        let initializer = clients
            .user(cancel.clone())
            .with_timeout(params.initialize_timeout());
        let language = match initializer.initialize().await {
            Ok(init) => init.language,
            Err(err) => {
                errors.add(&err, ScenarioLabel::Initialize);
                return Ok(finish(BenchResult::aborted(&errors.snapshot(), ""), None));
            }
        };
        info!(%language, "Target initialized");

        info!(phase = "verify", "Replaying snapshots");
        let verifier = SnapshotVerifier::new(self.config.paths.verification_dir());
        let verify_cancel = cancel.child_token();
        let verify_client = clients.user(verify_cancel.clone());
        let verifying = verifier.verify(&verify_client, &errors);
        if tokio::time::timeout(params.verify_timeout(), verifying).await.is_err() {
            verify_cancel.cancel();
            errors.add(
                &ScenarioError::timeout("verification did not finish in time"),
                ScenarioLabel::Verify,
            );
        }
        let snapshot = errors.snapshot();
        if !snapshot.messages.is_empty() {
            error!(errors = snapshot.messages.len(), "Verification failed");
            return Ok(finish(BenchResult::aborted(&snapshot, language), None));
        }

        info!(phase = "load", "Applying load");
        let levels = Arc::new(LevelController::new());
        let ctx = ScenarioContext {
            store: Arc::new(prepared.store),
            conditions: Arc::new(prepared.conditions),
            errors: errors.clone(),
            levels: levels.clone(),
            params,
        };
        let orchestrator = LoadOrchestrator::new(
            ctx,
            clients,
            prepared.chair_drafts,
            prepared.estate_drafts,
        );
        let load = orchestrator.run(cancel).await;

        let result = BenchResult::evaluate(levels.score(), &errors.snapshot(), language);
        info!(pass = result.pass, score = result.score, "Benchmark finished");
        Ok(finish(result, Some(load)))
    }

    async fn prepare(&self, cancel: &CancellationToken) -> Result<Prepared, BenchError> {
        let paths = &self.config.paths;
        let conditions = ConditionCatalog::new();
        let (store, ()) = tokio::try_join!(
            AssetStore::load(&paths.data_dir, cancel),
            conditions.load(&paths.fixture_dir),
        )?;

        Ok(Prepared {
            store,
            conditions,
            chair_drafts: DraftQueue::from_dir(&paths.chair_draft_dir()).await?,
            estate_drafts: DraftQueue::from_dir(&paths.estate_draft_dir()).await?,
        })
    }
}
