//! A tenant looking for an estate

use async_trait::async_trait;
use nestbench_core::fails::{ScenarioError, ScenarioLabel};
use rand::seq::SliceRandom;
use rand::Rng;

use super::check::{estate_matches_truth, estates_ordered};
use super::query::{estate_query, set_page};
use super::{access_estate_detail_page, access_top_page, Scenario, ScenarioContext};
use crate::client::WebappClient;

#[derive(Debug, Default)]
pub struct EstateSearchScenario;

#[async_trait]
impl Scenario for EstateSearchScenario {
    fn label(&self) -> ScenarioLabel {
        ScenarioLabel::EstateSearch
    }

    async fn run(&self, ctx: &ScenarioContext, client: &WebappClient) -> Result<(), ScenarioError> {
        let condition = ctx.conditions.estate_condition()?;
        let per_page = ctx.params.per_page;

        let page = ctx.page("GET /");
        access_top_page(client).await?;
        page.finish()?;

        let page = ctx.page("GET /api/estate/search/condition");
        client.estate_search_condition().await?;
        page.finish()?;

        let level = ctx.levels.level();
        let mut query = estate_query(&mut rand::thread_rng(), condition, level, per_page);
        let page = ctx.page("GET /api/estate/search");
        let found = client.search_estates(&query).await?;
        page.finish()?;

        if found.estates.is_empty() {
            return Ok(());
        }
        if !estates_ordered(&ctx.store, &found.estates) {
            return Err(ScenarioError::application(
                "GET /api/estate/search: results are not ordered by popularity",
            ));
        }

        let mut pages = found.count.max(0) as usize / per_page.max(1);
        if pages > 0 {
            for _ in 0..ctx.params.paging_checks {
                let target = rand::thread_rng().gen_range(0..pages);
                set_page(&mut query, target);

                let page = ctx.page("GET /api/estate/search");
                let paged = client.search_estates(&query).await?;
                page.finish()?;

                if paged.estates.is_empty() {
                    return Err(ScenarioError::application(format!(
                        "GET /api/estate/search: page {target} of {pages} is empty"
                    )));
                }
                if !estates_ordered(&ctx.store, &paged.estates) {
                    return Err(ScenarioError::application(
                        "GET /api/estate/search: results are not ordered by popularity",
                    ));
                }
                pages = paged.count.max(0) as usize / per_page.max(1);
                if pages == 0 {
                    break;
                }
            }
        }

        let Some(target) = found.estates.choose(&mut rand::thread_rng()).map(|e| e.id) else {
            return Ok(());
        };
        let page = ctx.page("GET /api/estate/:id");
        let estate = access_estate_detail_page(client, target).await?;
        page.finish()?;

        if !estate_matches_truth(&ctx.store, &estate) {
            return Err(ScenarioError::application(
                "GET /api/estate/:id: estate details do not match",
            ));
        }
        ctx.store.increment_estate_view_count(target);

        client.request_estate_document(target).await
    }
}
