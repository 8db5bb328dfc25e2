//! Crawler traffic
//!
//! Bots only generate background load; their answers are never checked.

use async_trait::async_trait;
use nestbench_core::fails::{ScenarioError, ScenarioLabel};

use super::query::{bot_chair_query, bot_estate_query};
use super::{Scenario, ScenarioContext};
use crate::client::WebappClient;

/// Crawler traffic: one chair and one estate search in parallel, unchecked
#[derive(Debug, Default)]
pub struct BotScenario;

#[async_trait]
impl Scenario for BotScenario {
    fn label(&self) -> ScenarioLabel {
        ScenarioLabel::Bot
    }

    fn scores(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &ScenarioContext, client: &WebappClient) -> Result<(), ScenarioError> {
        let per_page = ctx.params.per_page;
        let (chair_query, estate_query) = {
            let mut rng = rand::thread_rng();
            (
                bot_chair_query(&mut rng, ctx.conditions.chair_condition()?, per_page),
                bot_estate_query(&mut rng, ctx.conditions.estate_condition()?, per_page),
            )
        };

        tokio::try_join!(
            client.search_chairs(&chair_query),
            client.search_estates(&estate_query)
        )?;
        Ok(())
    }
}
