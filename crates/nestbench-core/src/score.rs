//! Score and load level

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::info;

/// Score deducted per application error
pub const APPLICATION_PENALTY: i64 = 50;

/// Scores at which the level advances, ascending
pub const LEVEL_BOUNDARIES: [i64; 25] = [
    400, 800, 1200, 1600, 2000, 2400, 2800, 3200, 3600, 4000, 4400, 4800, 5200, 5600, 6000, 6400,
    6800, 7200, 7600, 8000, 8400, 8800, 9200, 9600, 10000,
];

#[derive(Debug, Default, Clone, Copy)]
struct LevelState {
    score: i64,
    level: usize,
}

/// Counts fully successful scenario runs and derives the load level from them.
///
/// Level-ups are published on a single-slot channel: receivers always see the
/// latest level and a slow receiver never blocks [`LevelController::record_success`].
#[derive(Debug)]
pub struct LevelController {
    state: RwLock<LevelState>,
    boundaries: Vec<i64>,
    level_tx: watch::Sender<usize>,
}

impl Default for LevelController {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelController {
    pub fn new() -> Self {
        Self::with_boundaries(LEVEL_BOUNDARIES.to_vec())
    }

    pub fn with_boundaries(boundaries: Vec<i64>) -> Self {
        let (level_tx, _) = watch::channel(0);
        Self {
            state: RwLock::new(LevelState::default()),
            boundaries,
            level_tx,
        }
    }

    /// Count one successful run. Returns the new level if this crossed a boundary.
    pub fn record_success(&self) -> Option<usize> {
        let mut state = self.state.write();
        state.score += 1;

        let boundary = self.boundaries.get(state.level)?;
        if state.score < *boundary {
            return None;
        }

        state.level += 1;
        let level = state.level;
        self.level_tx.send_replace(level);
        drop(state);

        info!(level, "Load level up");
        Some(level)
    }

    pub fn score(&self) -> i64 {
        self.state.read().score
    }

    pub fn level(&self) -> usize {
        self.state.read().level
    }

    /// Receiver that is marked changed on every level-up
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.level_tx.subscribe()
    }
}

/// Raw score minus the application-error penalty, floored at zero
pub fn deducted_score(raw: i64, application_errors: usize) -> i64 {
    let penalty = APPLICATION_PENALTY.saturating_mul(application_errors as i64);
    raw.saturating_sub(penalty).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_boundary_fires_exactly_once() {
        let controller = LevelController::new();
        let mut rx = controller.subscribe();

        for _ in 0..399 {
            assert_eq!(controller.record_success(), None);
        }
        assert!(!rx.has_changed().unwrap());

        assert_eq!(controller.record_success(), Some(1));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);

        assert_eq!(controller.record_success(), None);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(controller.level(), 1);
        assert_eq!(controller.score(), 401);
    }

    #[test]
    fn test_no_level_up_past_table() {
        let controller = LevelController::with_boundaries(vec![2, 4]);
        let levels: Vec<_> = (0..10).filter_map(|_| controller.record_success()).collect();
        assert_eq!(levels, vec![1, 2]);
        assert_eq!(controller.level(), 2);
        assert_eq!(controller.score(), 10);
    }

    #[test]
    fn test_concurrent_successes_level_once_per_boundary() {
        let controller = Arc::new(LevelController::with_boundaries(vec![100, 200, 300]));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let controller = controller.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter_map(|_| controller.record_success())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut levels: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        levels.sort_unstable();
        assert_eq!(levels, vec![1, 2]);
        assert_eq!(controller.score(), 250);
    }

    #[test]
    fn test_deducted_score() {
        assert_eq!(deducted_score(1000, 3), 850);
        assert_eq!(deducted_score(100, 5), 0);
        assert_eq!(deducted_score(0, 0), 0);
    }
}
