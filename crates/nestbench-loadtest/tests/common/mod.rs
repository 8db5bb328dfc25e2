//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use nestbench_core::condition::{ListCondition, Range, RangeCondition};
use nestbench_core::prelude::*;
use nestbench_loadtest::scenario::ScenarioContext;
use nestbench_loadtest::{ClientFactory, RequestMetrics, Target};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn chair_attributes(id: i64) -> ChairAttributes {
    ChairAttributes {
        id,
        name: format!("chair {id}"),
        description: "a chair".to_string(),
        thumbnail: format!("/images/chair/{id}.png"),
        price: 9_000 + id,
        height: 90,
        width: 60,
        depth: 60,
        color: "black".to_string(),
        features: "armrest".to_string(),
        kind: "office".to_string(),
    }
}

pub fn estate_attributes(id: i64) -> EstateAttributes {
    EstateAttributes {
        id,
        thumbnail: format!("/images/estate/{id}.png"),
        name: format!("estate {id}"),
        description: "an estate".to_string(),
        address: format!("{id} main street"),
        latitude: 35.6 + id as f64 * 0.001,
        longitude: 139.7 + (id % 3) as f64 * 0.002,
        door_height: 210,
        door_width: 100,
        rent: 60_000,
        features: "pets".to_string(),
    }
}

fn ranges() -> RangeCondition {
    RangeCondition {
        prefix: String::new(),
        suffix: String::new(),
        ranges: vec![
            Range {
                id: 0,
                min: -1,
                max: 100,
            },
            Range {
                id: 1,
                min: 100,
                max: -1,
            },
        ],
    }
}

fn list(items: &[&str]) -> ListCondition {
    ListCondition {
        list: items.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn chair_condition() -> ChairSearchCondition {
    ChairSearchCondition {
        width: ranges(),
        height: ranges(),
        depth: ranges(),
        price: ranges(),
        color: list(&["black", "white"]),
        feature: list(&["armrest", "headrest", "held-out"]),
        kind: list(&["office", "gaming"]),
    }
}

pub fn estate_condition() -> EstateSearchCondition {
    EstateSearchCondition {
        door_width: ranges(),
        door_height: ranges(),
        rent: ranges(),
        feature: list(&["pets", "garden", "held-out"]),
    }
}

pub fn context(store: AssetStore) -> ScenarioContext {
    let conditions = ConditionCatalog::from_conditions(chair_condition(), estate_condition())
        .expect("conditions are valid");
    ScenarioContext {
        store: Arc::new(store),
        conditions: Arc::new(conditions),
        errors: Arc::new(ErrorAggregator::new()),
        levels: Arc::new(LevelController::new()),
        params: Arc::new(Parameters::default()),
    }
}

pub fn factory(server: &MockServer) -> ClientFactory {
    let target = Target {
        base_url: Url::parse(&server.uri()).expect("mock uri"),
        host: None,
    };
    ClientFactory::new(target, Arc::new(RequestMetrics::new()), Duration::from_secs(2))
        .expect("client builds")
}

pub fn user(server: &MockServer) -> nestbench_loadtest::WebappClient {
    factory(server).user(CancellationToken::new())
}

/// Both landing page recommendation lists, empty
pub async fn mount_top_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/recommended_chair"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "chairs": [] })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/recommended_estate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "estates": [] })),
        )
        .mount(server)
        .await;
}

/// Detail page and document request for each estate
pub async fn mount_estate_pages(server: &MockServer, ids: &[i64]) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/api/estate/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(estate_attributes(*id)))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/api/estate/req_doc/{id}")))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }
}
