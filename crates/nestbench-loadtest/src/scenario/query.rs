//! Randomized search queries
//!
//! User queries grow with the load level: each level pair adds one more facet
//! draw. Facets are drawn with replacement, so a repeated facet just
//! overwrites the earlier value.

use nestbench_core::condition::{
    ChairSearchCondition, EstateSearchCondition, ListCondition, RangeCondition,
};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::client::Query;

/// Set `key`, replacing an existing value
pub fn set_param(query: &mut Query, key: &str, value: impl Into<String>) {
    let value = value.into();
    match query.iter_mut().find(|(k, _)| k == key) {
        Some((_, v)) => *v = value,
        None => query.push((key.to_string(), value)),
    }
}

#[cfg(test)]
pub(crate) fn get_param<'a>(query: &'a Query, key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub fn set_page(query: &mut Query, page: usize) {
    set_param(query, "page", page.to_string());
}

/// Number of facet draws at `level`
pub fn facet_draws(level: usize) -> usize {
    level / 2 + 1
}

fn random_range<R: Rng + ?Sized>(rng: &mut R, condition: &RangeCondition) -> Option<String> {
    condition.ranges.choose(rng).map(|r| r.id.to_string())
}

fn random_item<R: Rng + ?Sized>(rng: &mut R, condition: &ListCondition) -> Option<String> {
    condition.list.choose(rng).cloned()
}

/// One or two distinct features, comma separated
fn random_features<R: Rng + ?Sized>(rng: &mut R, condition: &ListCondition) -> Option<String> {
    if condition.list.is_empty() {
        return None;
    }
    let amount = rng.gen_range(1..=condition.list.len().min(2));
    let picked: Vec<&str> = condition
        .list
        .choose_multiple(rng, amount)
        .map(String::as_str)
        .collect();
    Some(picked.join(","))
}

fn base_query(per_page: usize) -> Query {
    vec![
        ("perPage".to_string(), per_page.to_string()),
        ("page".to_string(), "0".to_string()),
    ]
}

pub fn chair_query<R: Rng + ?Sized>(
    rng: &mut R,
    condition: &ChairSearchCondition,
    level: usize,
    per_page: usize,
) -> Query {
    let mut query = base_query(per_page);
    for _ in 0..facet_draws(level) {
        let (key, value) = match rng.gen_range(0..7) {
            0 => ("priceRangeId", random_range(rng, &condition.price)),
            1 => ("heightRangeId", random_range(rng, &condition.height)),
            2 => ("widthRangeId", random_range(rng, &condition.width)),
            3 => ("depthRangeId", random_range(rng, &condition.depth)),
            4 => ("kind", random_item(rng, &condition.kind)),
            5 => ("color", random_item(rng, &condition.color)),
            _ => ("features", random_features(rng, &condition.feature)),
        };
        if let Some(value) = value {
            set_param(&mut query, key, value);
        }
    }
    query
}

pub fn estate_query<R: Rng + ?Sized>(
    rng: &mut R,
    condition: &EstateSearchCondition,
    level: usize,
    per_page: usize,
) -> Query {
    let mut query = base_query(per_page);
    for _ in 0..facet_draws(level) {
        let (key, value) = match rng.gen_range(0..4) {
            0 => ("rentRangeId", random_range(rng, &condition.rent)),
            1 => ("doorHeightRangeId", random_range(rng, &condition.door_height)),
            2 => ("doorWidthRangeId", random_range(rng, &condition.door_width)),
            _ => ("features", random_features(rng, &condition.feature)),
        };
        if let Some(value) = value {
            set_param(&mut query, key, value);
        }
    }
    query
}

/// Crawler query: a single price bucket
pub fn bot_chair_query<R: Rng + ?Sized>(
    rng: &mut R,
    condition: &ChairSearchCondition,
    per_page: usize,
) -> Query {
    let mut query = base_query(per_page);
    if let Some(id) = random_range(rng, &condition.price) {
        set_param(&mut query, "priceRangeId", id);
    }
    query
}

/// Crawler query: a single rent bucket
pub fn bot_estate_query<R: Rng + ?Sized>(
    rng: &mut R,
    condition: &EstateSearchCondition,
    per_page: usize,
) -> Query {
    let mut query = base_query(per_page);
    if let Some(id) = random_range(rng, &condition.rent) {
        set_param(&mut query, "rentRangeId", id);
    }
    query
}
