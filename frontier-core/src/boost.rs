use crate::catalog::{CatalogKind, CatalogRegistry};
use crate::economy::settle_org;
use crate::inventory::{add_part_to_location, add_resource_to_location};
use crate::parts::normalize_part;
use crate::sim_clock::GameClock;
use anyhow::Result;
use frontier_domain::{
    BoostableItem, GameError, GameResult, ItemId, LeoBoost, LocationId, OrgId, ResourceId, TechId,
};
use frontier_store::OrgBmc;
use serde_json::json;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

pub const LEO_BOOST_BASE_COST_USD: f64 = 100_000_000.0;
pub const LEO_BOOST_COST_PER_KG_USD: f64 = 5_000.0;

/// Tech levels liftable from Earth. Integer membership only: a 1.5 or 2.5
/// item is not boostable.
pub const BOOSTABLE_TECH_LEVELS: [i64; 2] = [1, 2];

pub const LEO_LOCATION_ID: &str = "LEO";

const REFINERY_BRANCH_TO_SUBTREE: [(&str, &str); 4] = [
    ("lithic_processing", "refineries_lithic"),
    ("metallurgy", "refineries_metallurgy"),
    ("nuclear_exotic", "refineries_nuclear"),
    ("volatiles_cryogenics", "refineries_volatiles"),
];

fn is_boostable_tech_level(tech_level: f64) -> bool {
    tech_level.fract() == 0.0 && BOOSTABLE_TECH_LEVELS.contains(&(tech_level as i64))
}

/// The tech-tree node gating a catalog item, or `None` for ungated kinds
/// (storage, resources).
pub fn tech_node_id_for_item(
    kind: CatalogKind,
    tech_level: f64,
    branch: &str,
) -> Option<TechId> {
    let prefix = match kind {
        CatalogKind::Thrusters => "thrusters",
        CatalogKind::Reactors => "reactors",
        CatalogKind::Generators => "generators",
        CatalogKind::Radiators => "radiators",
        CatalogKind::Constructors => "constructors",
        CatalogKind::Robonauts => "robonauts",
        CatalogKind::Refineries => REFINERY_BRANCH_TO_SUBTREE
            .iter()
            .find(|(b, _)| *b == branch)
            .map(|(_, subtree)| *subtree)
            .unwrap_or("refineries"),
        CatalogKind::Storage | CatalogKind::Resources | CatalogKind::Recipes => return None,
    };
    let level = if tech_level.fract() == 0.0 {
        format!("{}", tech_level as i64)
    } else {
        format!("{tech_level}")
    };
    Some(TechId(format!("{prefix}_lvl_{level}")))
}

pub fn calculate_boost_cost(mass_kg: f64) -> f64 {
    LEO_BOOST_BASE_COST_USD + LEO_BOOST_COST_PER_KG_USD * mass_kg
}

/// Catalog items the org can currently boost: water (always), plus parts
/// at boostable tech levels whose gating node the org has unlocked.
pub async fn boostable_items(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    org_id: &OrgId,
) -> Result<Vec<BoostableItem>> {
    let unlocked: HashSet<TechId> = OrgBmc::list_unlocks(&mut *conn, org_id)
        .await?
        .into_iter()
        .map(|u| u.tech_id)
        .collect();

    let mut items = Vec::new();

    for (item_id, record) in registry.catalog(CatalogKind::Resources) {
        let name = record.name_or(&item_id.0);
        if name.to_lowercase().contains("water") {
            items.push(BoostableItem {
                item_id: item_id.clone(),
                name,
                item_type: "resource".to_string(),
                mass_per_unit_kg: record.get_f64("mass_per_m3_kg").unwrap_or(1_000.0),
                tech_level: 1.0,
            });
        }
    }

    for kind in CatalogKind::part_kinds() {
        for (item_id, record) in registry.catalog(kind) {
            let tech_level = record.tech_level();
            if !is_boostable_tech_level(tech_level) {
                continue;
            }
            let branch = record.get_str("branch").unwrap_or("");
            if let Some(node) = tech_node_id_for_item(kind, tech_level, branch) {
                if !unlocked.contains(&node) {
                    continue;
                }
            }
            items.push(BoostableItem {
                item_id: item_id.clone(),
                name: record.name_or(&item_id.0),
                item_type: kind.category().to_string(),
                mass_per_unit_kg: record.mass_kg(),
                tech_level,
            });
        }
    }

    items.sort_by(|a, b| (&a.item_type, &a.item_id).cmp(&(&b.item_type, &b.item_id)));
    Ok(items)
}

/// Boost `quantity` of a catalog item from Earth into LEO inventory.
pub async fn boost(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    registry: &CatalogRegistry,
    org_id: &OrgId,
    item_id: &ItemId,
    quantity: f64,
) -> GameResult<LeoBoost> {
    if quantity <= 0.0 {
        return Err(GameError::validation("quantity must be positive"));
    }

    let org = settle_org(&mut *conn, clock, org_id).await?;

    let eligible = boostable_items(&mut *conn, registry, org_id).await?;
    let item = eligible
        .into_iter()
        .find(|i| &i.item_id == item_id)
        .ok_or_else(|| GameError::NotBoostable(item_id.clone()))?;

    let total_mass_kg = item.mass_per_unit_kg * quantity;
    let cost_usd = calculate_boost_cost(total_mass_kg);
    if org.balance_usd < cost_usd {
        return Err(GameError::InsufficientFunds {
            need: cost_usd,
            have: org.balance_usd,
        });
    }

    let destination = LocationId::new(LEO_LOCATION_ID);
    let now = clock.now_s();

    OrgBmc::adjust_balance(&mut *conn, org_id, -cost_usd).await?;

    if item.item_type == "resource" {
        add_resource_to_location(
            &mut *conn,
            registry,
            &destination,
            &ResourceId(item.item_id.0.clone()),
            total_mass_kg,
            now,
        )
        .await?;
    } else {
        let part = normalize_part(registry, &json!({ "item_id": item.item_id.0 }));
        add_part_to_location(&mut *conn, registry, &destination, &part, quantity, now).await?;
    }

    let boost = LeoBoost {
        id: Uuid::new_v4().to_string(),
        org_id: org_id.clone(),
        item_id: item.item_id.clone(),
        item_name: item.name.clone(),
        quantity,
        mass_kg: total_mass_kg,
        cost_usd,
        boosted_at: now,
        destination_location_id: destination,
    };
    OrgBmc::insert_boost(&mut *conn, &boost).await?;

    info!(
        org = %org_id,
        item = %item_id,
        quantity,
        mass_kg = total_mass_kg,
        cost_usd,
        "boosted to LEO"
    );
    Ok(boost)
}

pub async fn boost_history(
    conn: &mut SqliteConnection,
    org_id: &OrgId,
    limit: i64,
) -> Result<Vec<LeoBoost>> {
    OrgBmc::boost_history(conn, org_id, limit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_clock::FakeClock;
    use frontier_domain::Organization;
    use frontier_store::connect_in_memory;
    use frontier_store::InventoryBmc;
    use frontier_domain::{StackKey, StackType};

    #[test]
    fn boost_cost_formula() {
        assert_eq!(calculate_boost_cost(5_000.0), 125_000_000.0);
        assert_eq!(calculate_boost_cost(0.0), 100_000_000.0);
    }

    #[test]
    fn only_integer_tech_levels_one_and_two_are_boostable() {
        assert!(is_boostable_tech_level(1.0));
        assert!(is_boostable_tech_level(2.0));
        assert!(!is_boostable_tech_level(1.5));
        assert!(!is_boostable_tech_level(2.5));
        assert!(!is_boostable_tech_level(3.0));
    }

    #[test]
    fn tech_nodes_follow_category_prefixes() {
        assert_eq!(
            tech_node_id_for_item(CatalogKind::Thrusters, 1.0, ""),
            Some(TechId("thrusters_lvl_1".to_string()))
        );
        assert_eq!(
            tech_node_id_for_item(CatalogKind::Refineries, 2.0, "lithic_processing"),
            Some(TechId("refineries_lithic_lvl_2".to_string()))
        );
        assert_eq!(tech_node_id_for_item(CatalogKind::Storage, 1.0, ""), None);
    }

    async fn seeded_org(conn: &mut sqlx::SqliteConnection, balance: f64) -> OrgId {
        let org = Organization {
            id: OrgId("org-boost".to_string()),
            name: "Boost Org".to_string(),
            balance_usd: balance,
            research_points: 0.0,
            last_settled_at: 0.0,
            created_at: 0.0,
        };
        OrgBmc::insert(conn, &org).await.unwrap();
        org.id
    }

    #[tokio::test]
    async fn water_is_always_boostable_parts_need_tech() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let registry = CatalogRegistry::builtin();
        let org_id = seeded_org(&mut conn, 0.0).await;

        let items = boostable_items(&mut conn, &registry, &org_id).await.unwrap();
        assert!(items.iter().any(|i| i.item_id.0 == "water"));
        // no unlocks yet: gated part kinds are absent, ungated storage present
        assert!(!items.iter().any(|i| i.item_id.0 == "ntr_m1_kiwi"));
        assert!(items.iter().any(|i| i.item_id.0 == "water_tank_10_m3"));

        OrgBmc::insert_unlock(
            &mut conn,
            &frontier_domain::ResearchUnlock {
                org_id: org_id.clone(),
                tech_id: TechId("thrusters_lvl_1".to_string()),
                unlocked_at: 0.0,
                cost_points: 0.0,
            },
        )
        .await
        .unwrap();
        let items = boostable_items(&mut conn, &registry, &org_id).await.unwrap();
        assert!(items.iter().any(|i| i.item_id.0 == "ntr_m1_kiwi"));
        // half-level thruster stays out even with the tech unlocked
        assert!(!items.iter().any(|i| i.item_id.0 == "solar_moth_m1"));
    }

    #[tokio::test]
    async fn boost_debits_balance_and_credits_leo_stack() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let registry = CatalogRegistry::builtin();
        let clock = FakeClock::at(0.0);
        let org_id = seeded_org(&mut conn, 500_000_000.0).await;

        // 50 units of water at 1 t/unit: 50 t, cost 1e8 + 5e3 * 50_000
        let boost_row = boost(
            &mut conn,
            &clock,
            &registry,
            &org_id,
            &ItemId("water".to_string()),
            50.0,
        )
        .await
        .unwrap();
        assert_eq!(boost_row.mass_kg, 50_000.0);
        assert_eq!(boost_row.cost_usd, 350_000_000.0);
        assert_eq!(boost_row.destination_location_id.0, "LEO");

        let org = OrgBmc::get(&mut conn, &org_id).await.unwrap().unwrap();
        assert!((org.balance_usd - 150_000_000.0).abs() < 1.0);

        let stack = InventoryBmc::get(
            &mut conn,
            &LocationId::new("LEO"),
            StackType::Resource,
            &StackKey("water".to_string()),
        )
        .await
        .unwrap()
        .unwrap();
        assert!((stack.mass_kg - 50_000.0).abs() < 1e-6);
        assert!((stack.volume_m3 - 50.0).abs() < 1e-6);

        let history = boost_history(&mut conn, &org_id, 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].item_id.0, "water");
    }

    #[tokio::test]
    async fn gated_item_is_rejected_without_tech() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let registry = CatalogRegistry::builtin();
        let clock = FakeClock::at(0.0);
        let org_id = seeded_org(&mut conn, 10_000_000_000.0).await;

        let err = boost(
            &mut conn,
            &clock,
            &registry,
            &org_id,
            &ItemId("ntr_m1_kiwi".to_string()),
            1.0,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameError::NotBoostable(_)));
    }
}
