//! Load orchestrator
//!
//! Scenario instances run in waves sized by the current level. A wave is a
//! join point: the next one starts only after every instance of the current
//! one finished or observed the deadline. A side task follows level-ups and
//! posts new drafts for each level reached.

use std::sync::Arc;
use std::time::Duration;

use nestbench_core::fails::Severity;
use nestbench_core::parameter::WorkerMix;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, WebappClient};
use crate::scenario::draft_post::DraftQueue;
use crate::scenario::{
    execute, BotScenario, ChairDraftPostScenario, ChairSearchScenario, EstateDraftPostScenario,
    EstateSearchScenario, NazotteSearchScenario, Scenario, ScenarioContext, ScenarioOutcome,
};

/// Upper bound of the random delay before an instance starts
const START_JITTER_MS: u64 = 100;

/// Tally of a load phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub waves: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub drafts_posted: usize,
    pub final_level: usize,
    /// Whether the phase stopped early on the error limit
    pub aborted: bool,
}

impl LoadSummary {
    fn record(&mut self, outcome: &ScenarioOutcome) {
        match outcome {
            ScenarioOutcome::Succeeded => self.succeeded += 1,
            ScenarioOutcome::Failed { .. } => self.failed += 1,
            ScenarioOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

/// Drives the load phase against one target
pub struct LoadOrchestrator {
    ctx: ScenarioContext,
    clients: ClientFactory,
    chair_drafts: Arc<DraftQueue>,
    estate_drafts: Arc<DraftQueue>,
}

impl LoadOrchestrator {
    pub fn new(
        ctx: ScenarioContext,
        clients: ClientFactory,
        chair_drafts: DraftQueue,
        estate_drafts: DraftQueue,
    ) -> Self {
        Self {
            ctx,
            clients,
            chair_drafts: Arc::new(chair_drafts),
            estate_drafts: Arc::new(estate_drafts),
        }
    }

    /// Run waves until the load timeout elapses, `cancel` fires or the run
    /// can no longer pass
    pub async fn run(&self, cancel: &CancellationToken) -> LoadSummary {
        let deadline = cancel.child_token();
        let timer = tokio::spawn(expire(
            deadline.clone(),
            self.ctx.errors.fail_signal(),
            self.ctx.params.load_timeout(),
        ));
        let watcher = tokio::spawn(post_drafts_on_level_up(
            self.ctx.levels.subscribe(),
            deadline.clone(),
            self.ctx.clone(),
            self.clients.clone(),
            self.chair_drafts.clone(),
            self.estate_drafts.clone(),
        ));

        info!(timeout = ?self.ctx.params.load_timeout(), "Load phase started");
        let mut summary = LoadSummary::default();

        while !deadline.is_cancelled() {
            let level = self.ctx.levels.level();
            let mix = self.ctx.params.workers_at(level);
            if mix.total() == 0 {
                deadline.cancelled().await;
                break;
            }

            debug!(level, ?mix, "Starting wave");
            let mut wave = self.spawn_wave(mix, &deadline);
            while let Some(joined) = wave.join_next().await {
                match joined {
                    Ok(outcome) => summary.record(&outcome),
                    Err(e) => warn!("Scenario task failed: {}", e),
                }
            }
            summary.waves += 1;
        }

        if let Err(e) = timer.await {
            warn!("Load timer failed: {}", e);
        }
        match watcher.await {
            Ok(posted) => summary.drafts_posted = posted,
            Err(e) => warn!("Level watcher failed: {}", e),
        }

        summary.final_level = self.ctx.levels.level();
        summary.aborted = self.ctx.errors.has_failed();
        info!(
            waves = summary.waves,
            succeeded = summary.succeeded,
            failed = summary.failed,
            level = summary.final_level,
            score = self.ctx.levels.score(),
            "Load phase finished"
        );
        summary
    }

    fn spawn_wave(&self, mix: WorkerMix, deadline: &CancellationToken) -> JoinSet<ScenarioOutcome> {
        let mut wave = JoinSet::new();
        let users: [(usize, Arc<dyn Scenario>); 3] = [
            (mix.chair_search, Arc::new(ChairSearchScenario)),
            (mix.estate_search, Arc::new(EstateSearchScenario)),
            (mix.nazotte_search, Arc::new(NazotteSearchScenario)),
        ];
        for (count, scenario) in users {
            for _ in 0..count {
                let client = self.clients.user(deadline.clone());
                wave.spawn(user_instance(scenario.clone(), self.ctx.clone(), client));
            }
        }
        for _ in 0..mix.bot {
            let client = self.clients.bot(deadline.clone());
            wave.spawn(bot_instance(self.ctx.clone(), client));
        }
        wave
    }
}

/// Cancel `deadline` after `timeout`, or as soon as the run has failed
async fn expire(deadline: CancellationToken, failed: CancellationToken, timeout: Duration) {
    tokio::select! {
        _ = deadline.cancelled() => {}
        _ = tokio::time::sleep(timeout) => info!("Load timeout reached"),
        _ = failed.cancelled() => warn!("Error limit reached, stopping load"),
    }
    deadline.cancel();
}

/// Sleep unless cancelled first; returns whether the full duration elapsed
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

async fn user_instance(
    scenario: Arc<dyn Scenario>,
    ctx: ScenarioContext,
    client: WebappClient,
) -> ScenarioOutcome {
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..START_JITTER_MS));
    if !pause(client.cancellation(), jitter).await {
        return ScenarioOutcome::Cancelled;
    }

    let outcome = execute(scenario.as_ref(), &ctx, &client).await;
    if let ScenarioOutcome::Failed { severity, .. } = &outcome {
        let backoff = {
            let mut rng = rand::thread_rng();
            if *severity == Severity::Timeout {
                ctx.params.user_away_sleep(&mut rng)
            } else {
                ctx.params.fail_sleep(&mut rng)
            }
        };
        pause(client.cancellation(), backoff).await;
    }
    outcome
}

async fn bot_instance(ctx: ScenarioContext, client: WebappClient) -> ScenarioOutcome {
    let outcome = execute(&BotScenario, &ctx, &client).await;
    let interval = ctx.params.bot_interval(&mut rand::thread_rng());
    pause(client.cancellation(), interval).await;
    outcome
}

/// One chair and one estate draft post per level gained. Returns how many
/// posts succeeded.
async fn post_drafts_on_level_up(
    mut levels: watch::Receiver<usize>,
    deadline: CancellationToken,
    ctx: ScenarioContext,
    clients: ClientFactory,
    chair_drafts: Arc<DraftQueue>,
    estate_drafts: Arc<DraftQueue>,
) -> usize {
    let mut seen = *levels.borrow_and_update();
    let mut posts: JoinSet<ScenarioOutcome> = JoinSet::new();

    loop {
        tokio::select! {
            _ = deadline.cancelled() => break,
            changed = levels.changed() => {
                if changed.is_err() {
                    break;
                }
                let level = *levels.borrow_and_update();
                for reached in seen + 1..=level {
                    info!(level = reached, "Load level raised");
                    if let Some(path) = chair_drafts.next() {
                        let client = clients.user(deadline.clone());
                        let ctx = ctx.clone();
                        posts.spawn(async move {
                            execute(&ChairDraftPostScenario::new(path), &ctx, &client).await
                        });
                    }
                    if let Some(path) = estate_drafts.next() {
                        let client = clients.user(deadline.clone());
                        let ctx = ctx.clone();
                        posts.spawn(async move {
                            execute(&EstateDraftPostScenario::new(path), &ctx, &client).await
                        });
                    }
                }
                seen = seen.max(level);
            }
        }
    }

    let mut posted = 0;
    while let Some(joined) = posts.join_next().await {
        match joined {
            Ok(outcome) if outcome.is_success() => posted += 1,
            Ok(_) => {}
            Err(e) => warn!("Draft post task failed: {}", e),
        }
    }
    posted
}
