//! Tunable run parameters

use std::ops::Add;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of concurrent instances of each scenario family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMix {
    pub chair_search: usize,
    pub estate_search: usize,
    pub nazotte_search: usize,
    pub bot: usize,
}

impl WorkerMix {
    pub const fn new(
        chair_search: usize,
        estate_search: usize,
        nazotte_search: usize,
        bot: usize,
    ) -> Self {
        Self {
            chair_search,
            estate_search,
            nazotte_search,
            bot,
        }
    }

    pub fn total(&self) -> usize {
        self.chair_search + self.estate_search + self.nazotte_search + self.bot
    }
}

impl Add for WorkerMix {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            chair_search: self.chair_search + rhs.chair_search,
            estate_search: self.estate_search + rhs.estate_search,
            nazotte_search: self.nazotte_search + rhs.nazotte_search,
            bot: self.bot + rhs.bot,
        }
    }
}

/// Every knob of a run. Durations are in milliseconds unless suffixed `_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    /// Extra result pages walked after the first search page
    #[serde(default = "default_paging_checks")]
    pub paging_checks: usize,

    #[serde(default = "default_per_page")]
    pub per_page: usize,

    /// Cap the spatial search applies to its result list
    #[serde(default = "default_nazotte_max_response")]
    pub nazotte_max_response: usize,

    #[serde(default = "default_neighborhood_radius")]
    pub neighborhood_radius: f64,

    #[serde(default = "default_fail_sleep_ms")]
    pub fail_sleep_ms: u64,

    #[serde(default = "default_fail_sleep_swing_ms")]
    pub fail_sleep_swing_ms: u64,

    #[serde(default = "default_user_away_ms")]
    pub user_away_ms: u64,

    #[serde(default = "default_user_away_swing_ms")]
    pub user_away_swing_ms: u64,

    #[serde(default = "default_bot_interval_ms")]
    pub bot_interval_ms: u64,

    #[serde(default = "default_bot_interval_swing_ms")]
    pub bot_interval_swing_ms: u64,

    /// Longest a user waits for a page before leaving
    #[serde(default = "default_abandonment_threshold_ms")]
    pub abandonment_threshold_ms: u64,

    #[serde(default = "default_api_timeout_ms")]
    pub api_timeout_ms: u64,

    #[serde(default = "default_initialize_timeout_secs")]
    pub initialize_timeout_secs: u64,

    #[serde(default = "default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,

    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,

    /// Wave composition at level 0
    #[serde(default = "default_base_workers")]
    pub base_workers: WorkerMix,

    /// `worker_increments[n]` is added when reaching level `n + 1`
    #[serde(default = "default_worker_increments")]
    pub worker_increments: Vec<WorkerMix>,
}

fn default_paging_checks() -> usize {
    3
}

fn default_per_page() -> usize {
    30
}

fn default_nazotte_max_response() -> usize {
    50
}

fn default_neighborhood_radius() -> f64 {
    1e-6
}

fn default_fail_sleep_ms() -> u64 {
    1500
}

fn default_fail_sleep_swing_ms() -> u64 {
    500
}

fn default_user_away_ms() -> u64 {
    500
}

fn default_user_away_swing_ms() -> u64 {
    100
}

fn default_bot_interval_ms() -> u64 {
    500
}

fn default_bot_interval_swing_ms() -> u64 {
    100
}

fn default_abandonment_threshold_ms() -> u64 {
    1000
}

fn default_api_timeout_ms() -> u64 {
    2000
}

fn default_initialize_timeout_secs() -> u64 {
    30
}

fn default_verify_timeout_secs() -> u64 {
    10
}

fn default_load_timeout_secs() -> u64 {
    60
}

fn default_base_workers() -> WorkerMix {
    WorkerMix::new(3, 3, 1, 1)
}

fn default_worker_increments() -> Vec<WorkerMix> {
    vec![WorkerMix::new(1, 1, 1, 1); 20]
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            paging_checks: default_paging_checks(),
            per_page: default_per_page(),
            nazotte_max_response: default_nazotte_max_response(),
            neighborhood_radius: default_neighborhood_radius(),
            fail_sleep_ms: default_fail_sleep_ms(),
            fail_sleep_swing_ms: default_fail_sleep_swing_ms(),
            user_away_ms: default_user_away_ms(),
            user_away_swing_ms: default_user_away_swing_ms(),
            bot_interval_ms: default_bot_interval_ms(),
            bot_interval_swing_ms: default_bot_interval_swing_ms(),
            abandonment_threshold_ms: default_abandonment_threshold_ms(),
            api_timeout_ms: default_api_timeout_ms(),
            initialize_timeout_secs: default_initialize_timeout_secs(),
            verify_timeout_secs: default_verify_timeout_secs(),
            load_timeout_secs: default_load_timeout_secs(),
            base_workers: default_base_workers(),
            worker_increments: default_worker_increments(),
        }
    }
}

/// `base` shifted by a uniform offset in `[-swing/2, swing/2)`
fn jittered<R: Rng + ?Sized>(rng: &mut R, base_ms: u64, swing_ms: u64) -> Duration {
    if swing_ms == 0 {
        return Duration::from_millis(base_ms);
    }
    let offset = rng.gen_range(0..swing_ms) as i64 - (swing_ms / 2) as i64;
    Duration::from_millis((base_ms as i64 + offset).max(0) as u64)
}

impl Parameters {
    pub fn abandonment_threshold(&self) -> Duration {
        Duration::from_millis(self.abandonment_threshold_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn initialize_timeout(&self) -> Duration {
        Duration::from_secs(self.initialize_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Backoff after a failed scenario run
    pub fn fail_sleep<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        jittered(rng, self.fail_sleep_ms, self.fail_sleep_swing_ms)
    }

    /// Pause after a user gave up on a slow page
    pub fn user_away_sleep<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        jittered(rng, self.user_away_ms, self.user_away_swing_ms)
    }

    pub fn bot_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        jittered(rng, self.bot_interval_ms, self.bot_interval_swing_ms)
    }

    /// Wave composition at `level`: the base mix plus every increment up to it
    pub fn workers_at(&self, level: usize) -> WorkerMix {
        self.worker_increments
            .iter()
            .take(level)
            .fold(self.base_workers, |mix, inc| mix + *inc)
    }
}
