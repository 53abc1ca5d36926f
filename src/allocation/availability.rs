//! The availability rule.
//!
//! A board may be allocated iff it is `In stock` in condition `New` or
//! `Repaired`, or it is `Repairing` and already `Repaired`. Every stock count,
//! report and allocation path goes through this module; the SQL form used by
//! the Postgres store is rendered from the same table.

use crate::models::BoardLocation;

pub const CONDITION_NEW: &str = "New";
pub const CONDITION_REPAIRED: &str = "Repaired";
pub const CONDITION_NEEDS_REPAIR: &str = "Needs repair";
pub const CONDITION_UNDER_REPAIR: &str = "Under repair";
pub const CONDITION_SCRAP: &str = "Scrap";

/// `(location, allowed conditions)` pairs; a board is available if it matches any row.
const AVAILABLE_STATES: &[(BoardLocation, &[&str])] = &[
    (BoardLocation::InStock, &[CONDITION_NEW, CONDITION_REPAIRED]),
    (BoardLocation::Repairing, &[CONDITION_REPAIRED]),
];

pub fn is_available(location: BoardLocation, condition: &str) -> bool {
    AVAILABLE_STATES
        .iter()
        .any(|(loc, conditions)| *loc == location && conditions.contains(&condition))
}

/// SQL boolean expression equivalent to [`is_available`] over the
/// `location` / `condition` columns. Built only from the constants above.
pub fn sql_predicate() -> String {
    let clauses: Vec<String> = AVAILABLE_STATES
        .iter()
        .map(|(loc, conditions)| {
            let list = conditions
                .iter()
                .map(|c| format!("'{}'", c))
                .collect::<Vec<_>>()
                .join(", ");
            format!("(location = '{}' AND condition IN ({}))", loc.as_str(), list)
        })
        .collect();
    format!("({})", clauses.join(" OR "))
}
