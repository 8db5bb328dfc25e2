//! A shopper looking for a chair

use async_trait::async_trait;
use nestbench_core::asset::Stockable;
use nestbench_core::fails::{ScenarioError, ScenarioLabel};
use rand::seq::SliceRandom;
use rand::Rng;

use super::check::{chair_matches_truth, chairs_ordered, estate_matches_truth, estates_ordered};
use super::query::{chair_query, set_page};
use super::{
    access_chair_detail_page, access_estate_detail_page, access_top_page, Scenario,
    ScenarioContext,
};
use crate::client::WebappClient;

/// Landing page, chair search with paging, one chair's detail page, a
/// purchase attempt, then a recommended estate and its document request.
#[derive(Debug, Default)]
pub struct ChairSearchScenario;

#[async_trait]
impl Scenario for ChairSearchScenario {
    fn label(&self) -> ScenarioLabel {
        ScenarioLabel::ChairSearch
    }

    async fn run(&self, ctx: &ScenarioContext, client: &WebappClient) -> Result<(), ScenarioError> {
        let condition = ctx.conditions.chair_condition()?;
        let per_page = ctx.params.per_page;

        let page = ctx.page("GET /");
        access_top_page(client).await?;
        page.finish()?;

        let page = ctx.page("GET /api/chair/search/condition");
        client.chair_search_condition().await?;
        page.finish()?;

        let level = ctx.levels.level();
        let mut query = chair_query(&mut rand::thread_rng(), condition, level, per_page);
        let page = ctx.page("GET /api/chair/search");
        let found = client.search_chairs(&query).await?;
        page.finish()?;

        if found.chairs.is_empty() {
            return Ok(());
        }
        if !chairs_ordered(&ctx.store, &found.chairs) {
            return Err(ScenarioError::application(
                "GET /api/chair/search: results are not ordered by popularity",
            ));
        }

        let mut pages = found.count.max(0) as usize / per_page.max(1);
        if pages > 0 {
            for _ in 0..ctx.params.paging_checks {
                let target = rand::thread_rng().gen_range(0..pages);
                set_page(&mut query, target);

                let page = ctx.page("GET /api/chair/search");
                let paged = client.search_chairs(&query).await?;
                page.finish()?;

                if paged.chairs.is_empty() {
                    return Err(ScenarioError::application(format!(
                        "GET /api/chair/search: page {target} of {pages} is empty"
                    )));
                }
                if !chairs_ordered(&ctx.store, &paged.chairs) {
                    return Err(ScenarioError::application(
                        "GET /api/chair/search: results are not ordered by popularity",
                    ));
                }
                pages = paged.count.max(0) as usize / per_page.max(1);
                if pages == 0 {
                    break;
                }
            }
        }

        let Some(target) = found.chairs.choose(&mut rand::thread_rng()).map(|c| c.id) else {
            return Ok(());
        };
        let page = ctx.page("GET /api/chair/:id");
        let (chair, recommended) = access_chair_detail_page(client, target).await?;
        page.finish()?;

        let Some(chair) = chair else {
            // Sold out since the search
            return Ok(());
        };
        if !chair_matches_truth(&ctx.store, &chair) {
            return Err(ScenarioError::application(
                "GET /api/chair/:id: chair details do not match",
            ));
        }
        ctx.store.increment_chair_view_count(target);

        if !estates_ordered(&ctx.store, &recommended.estates) {
            return Err(ScenarioError::application(
                "GET /api/recommended_estate/:id: recommendations are not ordered by popularity",
            ));
        }

        match client.buy_chair(target).await {
            Ok(()) => ctx.store.decrement_chair_stock(target),
            Err(ScenarioError::Cancelled) => return Err(ScenarioError::Cancelled),
            Err(err) => {
                let in_stock = ctx.store.get_chair(target).map_or(true, |c| c.stock() > 0);
                if in_stock {
                    return Err(err);
                }
            }
        }

        let picked = recommended.estates.choose(&mut rand::thread_rng());
        let Some(estate_id) = picked.map(|e| e.id) else {
            return Ok(());
        };
        let page = ctx.page("GET /api/estate/:id");
        let estate = access_estate_detail_page(client, estate_id).await?;
        page.finish()?;

        if !estate_matches_truth(&ctx.store, &estate) {
            return Err(ScenarioError::application(
                "GET /api/estate/:id: estate details do not match",
            ));
        }
        ctx.store.increment_estate_view_count(estate_id);

        client.request_estate_document(estate_id).await
    }
}
