//! Simulated user flows
//!
//! A scenario is a short sequence of dependent API calls with assertions
//! against the ground truth. Every instance gets its own [`WebappClient`] and a
//! shared [`ScenarioContext`]; [`execute`] maps the result onto a coarse
//! [`ScenarioOutcome`] and pushes diagnostics into the error aggregator.

pub mod bot;
pub mod chair_search;
pub mod check;
pub mod draft_post;
pub mod estate_search;
pub mod nazotte;
pub mod query;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nestbench_core::asset::{AssetStore, ChairAttributes, EstateAttributes};
use nestbench_core::condition::ConditionCatalog;
use nestbench_core::fails::{ErrorAggregator, ScenarioError, ScenarioLabel, Severity};
use nestbench_core::parameter::Parameters;
use nestbench_core::score::LevelController;
use tracing::debug;

use crate::client::{ChairListResponse, EstateListResponse, WebappClient};

pub use bot::BotScenario;
pub use chair_search::ChairSearchScenario;
pub use draft_post::{ChairDraftPostScenario, EstateDraftPostScenario};
pub use estate_search::EstateSearchScenario;
pub use nazotte::NazotteSearchScenario;

/// Services shared by every scenario instance of a run
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    pub store: Arc<AssetStore>,
    pub conditions: Arc<ConditionCatalog>,
    pub errors: Arc<ErrorAggregator>,
    pub levels: Arc<LevelController>,
    pub params: Arc<Parameters>,
}

impl ScenarioContext {
    /// Start timing a page transition
    pub fn page(&self, step: &'static str) -> PageTimer {
        PageTimer {
            step,
            started: Instant::now(),
            threshold: self.params.abandonment_threshold(),
        }
    }
}

/// Wall-clock budget of one page transition
#[derive(Debug)]
pub struct PageTimer {
    step: &'static str,
    started: Instant,
    threshold: Duration,
}

impl PageTimer {
    /// The user leaves when the page took longer than the threshold
    pub fn finish(self) -> Result<(), ScenarioError> {
        let elapsed = self.started.elapsed();
        if elapsed > self.threshold {
            return Err(ScenarioError::Abandoned {
                step: self.step.to_string(),
                elapsed,
            });
        }
        Ok(())
    }
}

/// Coarse result of one scenario instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Succeeded,
    Failed {
        severity: Severity,
        diagnostic: String,
    },
    Cancelled,
}

impl ScenarioOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[async_trait]
pub trait Scenario: Send + Sync {
    fn label(&self) -> ScenarioLabel;

    /// Whether a successful run counts towards the score
    fn scores(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &ScenarioContext, client: &WebappClient) -> Result<(), ScenarioError>;
}

/// Run one instance and classify its result.
///
/// Abandonment is a timeout the caller backs off from; it is not reported.
/// Any other failure lands in the aggregator under the scenario's label and
/// the caller only sees the Application sentinel.
pub async fn execute(
    scenario: &dyn Scenario,
    ctx: &ScenarioContext,
    client: &WebappClient,
) -> ScenarioOutcome {
    let result = scenario.run(ctx, client).await;
    if client.is_cancelled() {
        return ScenarioOutcome::Cancelled;
    }

    match result {
        Ok(()) => {
            if scenario.scores() {
                ctx.levels.record_success();
            }
            ScenarioOutcome::Succeeded
        }
        Err(ScenarioError::Cancelled) => ScenarioOutcome::Cancelled,
        Err(err @ ScenarioError::Abandoned { .. }) => {
            debug!(label = %scenario.label(), "{}", err);
            ScenarioOutcome::Failed {
                severity: Severity::Timeout,
                diagnostic: err.to_string(),
            }
        }
        Err(err) => {
            ctx.errors.add(&err, scenario.label());
            ScenarioOutcome::Failed {
                severity: Severity::Application,
                diagnostic: err.to_string(),
            }
        }
    }
}

/// Landing page: both recommendation lists
pub async fn access_top_page(
    client: &WebappClient,
) -> Result<(ChairListResponse, EstateListResponse), ScenarioError> {
    tokio::try_join!(client.recommended_chairs(), client.recommended_estates())
}

/// Chair detail page: the chair and the estates its buyer might need.
/// The chair is `None` when it has sold out.
pub async fn access_chair_detail_page(
    client: &WebappClient,
    chair_id: i64,
) -> Result<(Option<ChairAttributes>, EstateListResponse), ScenarioError> {
    tokio::try_join!(
        client.chair_detail(chair_id),
        client.recommended_estates_for_chair(chair_id)
    )
}

pub async fn access_estate_detail_page(
    client: &WebappClient,
    estate_id: i64,
) -> Result<EstateAttributes, ScenarioError> {
    client.estate_detail(estate_id).await
}
