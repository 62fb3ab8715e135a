use std::cmp::Ordering;

use tracing::warn;

use super::{comparator, Comparator, SortConfig, Sorter};
use crate::{
    models::{round_power, BlessingContext, Entity},
    query::fold_cmp,
};

/// Sorter used when none is configured or the configured one is unknown.
pub const DEFAULT_SORT: &str = "power";

/// Every built-in sorter id.
pub const BUILTIN_SORTS: &[&str] = &[
    "power",
    "level",
    "grade",
    "rarity",
    "name",
    "affection",
    "salary",
    "recent",
    "potential",
    "blessed_potential",
];

fn by_power(a: &Entity, b: &Entity) -> Ordering {
    a.power.total_cmp(&b.power)
}

/// Resolve a config into a sorter.
///
/// Context-bound sorters capture `context` by value; resolve again after
/// the blessings change.
pub fn resolve(config: &SortConfig, context: &BlessingContext) -> Sorter {
    let (id, label, chain): (&str, &str, Vec<Comparator>) = match config.sort_id.as_str() {
        "power" => ("power", "Power", vec![comparator(by_power)]),
        "level" => (
            "level",
            "Level",
            vec![
                comparator(|a, b| a.level.cmp(&b.level)),
                comparator(|a, b| a.stars.cmp(&b.stars)),
            ],
        ),
        "grade" => (
            "grade",
            "Grade",
            vec![
                comparator(|a, b| a.stars.cmp(&b.stars)),
                comparator(|a, b| a.max_stars.cmp(&b.max_stars)),
                comparator(|a, b| a.level.cmp(&b.level)),
            ],
        ),
        "rarity" => (
            "rarity",
            "Rarity",
            vec![
                comparator(|a, b| a.rarity.cmp(&b.rarity)),
                comparator(by_power),
            ],
        ),
        "name" => (
            "name",
            "Name",
            vec![comparator(|a, b| fold_cmp(&a.name, &b.name))],
        ),
        "affection" => (
            "affection",
            "Affection",
            vec![comparator(|a, b| a.affection.cmp(&b.affection))],
        ),
        "salary" => (
            "salary",
            "Salary per hour",
            vec![
                comparator(|a, b| a.salary_per_hour.total_cmp(&b.salary_per_hour)),
                comparator(|a, b| a.salary.cmp(&b.salary)),
            ],
        ),
        "recent" => (
            "recent",
            "Recently obtained",
            vec![comparator(|a, b| a.obtained_at.cmp(&b.obtained_at))],
        ),
        "potential" => (
            "potential",
            "Potential",
            vec![comparator(|a, b| {
                round_power(a.potential).total_cmp(&round_power(b.potential))
            })],
        ),
        "blessed_potential" => ("blessed_potential", "Blessed potential", {
            let context = context.clone();
            vec![comparator(move |a, b| {
                context
                    .blessed_potential(a)
                    .total_cmp(&context.blessed_potential(b))
            })]
        }),
        unknown => {
            warn!("unknown sort {unknown}, falling back to {DEFAULT_SORT}");
            return resolve(&SortConfig::new(DEFAULT_SORT, config.direction), context);
        }
    };
    Sorter::new(id, label, chain, config.direction)
}
