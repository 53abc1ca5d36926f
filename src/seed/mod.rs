use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::allocation::availability::{
    CONDITION_NEEDS_REPAIR, CONDITION_NEW, CONDITION_REPAIRED, CONDITION_SCRAP,
};
use crate::error::{AppError, AppResult};
use crate::models::{Board, BoardLocation, Category};
use crate::store::InventoryStore;

static ADJECTIVES: &[&str] = &[
    "Main", "Aux", "Power", "Motor", "Sensor", "Display", "Network", "Control",
    "Interface", "Relay", "Safety", "Drive", "Logic", "Signal", "Backplane",
];

static NOUNS: &[&str] = &[
    "Controller", "Board", "Module", "Driver", "Adapter", "Converter", "Regulator",
    "Amplifier", "Encoder", "Decoder", "Receiver", "Transmitter", "Panel", "Bridge",
];

static MANUFACTURERS: &[&str] = &["Acme", "Voltix", "Northwind", "Helix", "Orbital"];

#[derive(Debug, Clone, Serialize)]
pub struct SeedSummary {
    pub categories: Vec<Category>,
    pub boards_created: usize,
}

fn random_category_name(rng: &mut impl Rng) -> String {
    let adj = ADJECTIVES.choose(rng).unwrap_or(&"Main");
    let noun = NOUNS.choose(rng).unwrap_or(&"Board");
    format!("{} {} {:04X}", adj, noun, rng.gen::<u16>())
}

/// Mostly new stock, with a tail of repaired, broken and scrapped boards.
fn random_state(rng: &mut impl Rng) -> (BoardLocation, &'static str) {
    match rng.gen_range(0..100) {
        0..=69 => (BoardLocation::InStock, CONDITION_NEW),
        70..=79 => (BoardLocation::InStock, CONDITION_REPAIRED),
        80..=84 => (BoardLocation::Repairing, CONDITION_REPAIRED),
        85..=94 => (BoardLocation::Repairing, CONDITION_NEEDS_REPAIR),
        _ => (BoardLocation::InStock, CONDITION_SCRAP),
    }
}

/// Seeds `categories` random categories with `boards_per_category` boards each.
pub async fn seed_inventory(
    store: &dyn InventoryStore,
    categories: usize,
    boards_per_category: usize,
    created_by: &str,
) -> AppResult<SeedSummary> {
    info!("Seeding {} categories x {} boards...", categories, boards_per_category);

    // StdRng is Send + Sync, so it can be held across await points
    let mut rng = StdRng::from_entropy();
    let mut created = Vec::with_capacity(categories);
    let mut boards_created = 0_usize;

    for _ in 0..categories {
        let name = random_category_name(&mut rng);
        let category = Category {
            id: Uuid::new_v4(),
            description: Some(format!("Seeded {}", name)),
            manufacturer: MANUFACTURERS.choose(&mut rng).unwrap_or(&"Acme").to_string(),
            version: format!("v{}", rng.gen_range(1..=5)),
            lead_time_days: rng.gen_range(3..=30),
            minimum_stock_quantity: rng.gen_range(1..=10),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            name,
        };
        match store.insert_category(&category).await {
            Ok(()) => {}
            Err(AppError::CategoryNameTaken(name)) => {
                debug!(name = %name, "Seed category name collided, skipping");
                continue;
            }
            Err(e) => return Err(e),
        }

        let prefix: String = category
            .name
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .collect::<String>()
            .to_uppercase();

        for i in 0..boards_per_category {
            let (location, condition) = random_state(&mut rng);
            let now = Utc::now();
            let board = Board {
                id: Uuid::new_v4(),
                category_id: category.id,
                serial_number: format!("{}-{:06}", prefix, i + 1),
                location,
                condition: condition.to_string(),
                issued_by: None,
                issued_to: None,
                qc_by: Some(created_by.to_string()),
                project_number: None,
                comments: None,
                inward_date_time: now,
                issued_date_time: None,
                created_by: created_by.to_string(),
                created_at: now,
            };
            store.insert_board(&board).await?;
            boards_created += 1;
        }

        info!(category = %category.name, boards = boards_per_category, "Seeded category");
        created.push(category);
    }

    info!("Seeding complete. {} categories, {} boards", created.len(), boards_created);
    Ok(SeedSummary {
        categories: created,
        boards_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BoardFilter, MemoryStore};

    #[tokio::test]
    async fn seeds_requested_shape() {
        let store = MemoryStore::new();
        let summary = seed_inventory(&store, 3, 8, "seed@example.com").await.unwrap();

        assert_eq!(summary.boards_created, summary.categories.len() * 8);
        for category in &summary.categories {
            let boards = store.list_boards(Some(category.id), &BoardFilter::Any).await.unwrap();
            assert_eq!(boards.len(), 8);
            assert!(boards[0].serial_number.ends_with("-000001"));
        }
    }

    #[test]
    fn random_states_are_known_pairs() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let (location, condition) = random_state(&mut rng);
            assert!(matches!(location, BoardLocation::InStock | BoardLocation::Repairing));
            assert!([CONDITION_NEW, CONDITION_REPAIRED, CONDITION_NEEDS_REPAIR, CONDITION_SCRAP]
                .contains(&condition));
        }
    }
}
