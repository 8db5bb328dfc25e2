//! Spatial ("nazotte") search
//!
//! A few random estates are inflated to small diamonds and the convex hull of
//! all diamond corners becomes the search polygon, so every chosen estate lies
//! strictly inside it. The search itself runs on its own task and is raced
//! against the run's cancellation.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use nestbench_core::asset::{Estate, Viewable};
use nestbench_core::fails::{ScenarioError, ScenarioLabel};
use nestbench_core::geometry::{
    bounding_box, convex_hull, neighbors, to_polygon, BoundingBox, Point,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::check::estate_matches_truth;
use super::{access_estate_detail_page, Scenario, ScenarioContext};
use crate::client::{EstateSearchResponse, WebappClient};

const MIN_CORNERS: usize = 3;
const MAX_CORNERS: usize = 8;

/// Terminal state of a spatial search task; exactly one is reached
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Cancelled,
    Failed(ScenarioError),
    Succeeded,
}

impl From<Verdict> for Result<(), ScenarioError> {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Succeeded => Ok(()),
            Verdict::Failed(err) => Err(err),
            Verdict::Cancelled => Err(ScenarioError::Cancelled),
        }
    }
}

/// First settled wins: cancellation aborts the task, otherwise its own
/// result decides between failure and success.
pub async fn race(
    cancel: &CancellationToken,
    mut task: JoinHandle<Result<(), ScenarioError>>,
) -> Verdict {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            task.abort();
            Verdict::Cancelled
        }
        joined = &mut task => match joined {
            Ok(Ok(())) => Verdict::Succeeded,
            Ok(Err(ScenarioError::Cancelled)) => Verdict::Cancelled,
            Ok(Err(err)) => Verdict::Failed(err),
            Err(e) if e.is_cancelled() => Verdict::Cancelled,
            Err(e) => Verdict::Failed(ScenarioError::Unclassified(format!(
                "spatial search task panicked: {e}"
            ))),
        },
    }
}

/// Query polygon around `estates` (a closed ring) and its bounds
pub fn search_polygon(estates: &[Arc<Estate>], radius: f64) -> (Vec<Point>, Option<BoundingBox>) {
    let corners: Vec<Point> = estates
        .iter()
        .flat_map(|estate| neighbors(&estate.location(), radius))
        .collect();
    let hull = convex_hull(&corners);
    let bounds = bounding_box(&hull);
    (to_polygon(&hull), bounds)
}

/// Check a spatial search result against the estates the polygon was built
/// around. Membership is only checked when the result was not truncated.
pub fn check_result(
    ctx: &ScenarioContext,
    chosen: &[Arc<Estate>],
    bounds: Option<&BoundingBox>,
    result: &EstateSearchResponse,
) -> Result<(), ScenarioError> {
    let max = ctx.params.nazotte_max_response;
    if result.estates.len() > max {
        return Err(ScenarioError::application(format!(
            "POST /api/estate/nazotte: returned {} estates; at most {max} allowed",
            result.estates.len()
        )));
    }

    for estate in &result.estates {
        let inside = ctx
            .store
            .get_estate(estate.id)
            .map_or(false, |truth| bounds.map_or(false, |b| b.contains(&truth.location())));
        if !inside || !estate_matches_truth(&ctx.store, estate) {
            return Err(ScenarioError::application(
                "POST /api/estate/nazotte: results contain an estate outside the polygon",
            ));
        }
    }

    if result.count < chosen.len() as i64 {
        return Err(ScenarioError::application(format!(
            "POST /api/estate/nazotte: found {} estates; expected at least {}",
            result.count,
            chosen.len()
        )));
    }

    if result.estates.len() < max {
        let returned: HashSet<i64> = result.estates.iter().map(|e| e.id).collect();
        if chosen.iter().any(|e| !returned.contains(&e.id())) {
            return Err(ScenarioError::application(
                "POST /api/estate/nazotte: results are missing estates inside the polygon",
            ));
        }
    }
    Ok(())
}

async fn search(ctx: ScenarioContext, client: WebappClient) -> Result<(), ScenarioError> {
    let chosen = {
        let mut rng = rand::thread_rng();
        let corners = rng.gen_range(MIN_CORNERS..=MAX_CORNERS);
        ctx.store.sample_estates(&mut rng, corners)
    };
    if chosen.is_empty() {
        return Err(ScenarioError::Unclassified(
            "no estates to build a search polygon from".to_string(),
        ));
    }

    let (polygon, bounds) = search_polygon(&chosen, ctx.params.neighborhood_radius);

    let page = ctx.page("POST /api/estate/nazotte");
    let result = client.search_estates_nazotte(&polygon).await?;
    page.finish()?;

    check_result(&ctx, &chosen, bounds.as_ref(), &result)?;

    let Some(target) = result.estates.choose(&mut rand::thread_rng()).map(|e| e.id) else {
        return Ok(());
    };
    let page = ctx.page("GET /api/estate/:id");
    let estate = access_estate_detail_page(&client, target).await?;
    page.finish()?;

    if !estate_matches_truth(&ctx.store, &estate) {
        return Err(ScenarioError::application(
            "GET /api/estate/:id: estate details do not match",
        ));
    }
    ctx.store.increment_estate_view_count(target);

    client.request_estate_document(target).await
}

#[derive(Debug, Default)]
pub struct NazotteSearchScenario;

#[async_trait]
impl Scenario for NazotteSearchScenario {
    fn label(&self) -> ScenarioLabel {
        ScenarioLabel::EstateNazotteSearch
    }

    async fn run(&self, ctx: &ScenarioContext, client: &WebappClient) -> Result<(), ScenarioError> {
        let task = tokio::spawn(search(ctx.clone(), client.clone()));
        race(client.cancellation(), task).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::check::tests::estate_attributes;
    use std::time::Duration;

    fn estates(ids: &[i64]) -> Vec<Arc<Estate>> {
        ids.iter()
            .map(|id| Arc::new(Estate::new(estate_attributes(*id), 0)))
            .collect()
    }

    fn strictly_inside(ring: &[Point], p: &Point) -> bool {
        // counter-clockwise ring: every edge has p on its left
        ring.windows(2).all(|edge| {
            let (a, b) = (edge[0], edge[1]);
            (b.latitude - a.latitude) * (p.longitude - a.longitude)
                - (b.longitude - a.longitude) * (p.latitude - a.latitude)
                > 0.0
        })
    }

    #[test]
    fn test_polygon_contains_every_chosen_estate() {
        for k in MIN_CORNERS..=MAX_CORNERS {
            let ids: Vec<i64> = (1..=k as i64).collect();
            let chosen = estates(&ids);
            let (ring, bounds) = search_polygon(&chosen, 1e-6);

            assert_eq!(ring.first(), ring.last());
            let bounds = bounds.unwrap();
            for estate in &chosen {
                assert!(strictly_inside(&ring, &estate.location()), "k={k}");
                assert!(bounds.contains(&estate.location()));
            }
        }
    }

    #[test]
    fn test_single_estate_gives_diamond() {
        let (ring, _) = search_polygon(&estates(&[3]), 0.5);
        // four corners plus the closing vertex
        assert_eq!(ring.len(), 5);
    }

    #[tokio::test]
    async fn test_race_success_and_failure() {
        let cancel = CancellationToken::new();

        let ok = tokio::spawn(async { Ok(()) });
        assert_eq!(race(&cancel, ok).await, Verdict::Succeeded);

        let failed = tokio::spawn(async { Err(ScenarioError::application("wrong")) });
        assert_eq!(
            race(&cancel, failed).await,
            Verdict::Failed(ScenarioError::application("wrong"))
        );
    }

    #[tokio::test]
    async fn test_race_cancellation_wins() {
        let cancel = CancellationToken::new();
        let slow = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });
        cancel.cancel();
        assert_eq!(race(&cancel, slow).await, Verdict::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_error_is_not_a_failure() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(async { Err(ScenarioError::Cancelled) });
        let verdict = race(&cancel, task).await;
        assert_eq!(verdict, Verdict::Cancelled);
        let result: Result<(), ScenarioError> = verdict.into();
        assert!(result.unwrap_err().is_cancelled());
    }
}
