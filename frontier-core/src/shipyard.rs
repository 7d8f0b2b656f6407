use crate::catalog::{CatalogKind, CatalogRegistry, FUEL_RESOURCE_ID};
use crate::inventory::{
    add_part_to_location, add_resource_to_location, capacity_summary, consume_parts_by_item_ids,
    consume_resource_mass, ship_containers, ship_resource_rollup, CapacitySummary, ContainerRow,
    ShipResourceRollup,
};
use crate::parts::{normalize_parts, parts_from_item_ids, renormalize};
use crate::ship_stats::{derive_ship_stats, harden_ship_parts};
use crate::sim_clock::GameClock;
use anyhow::Result;
use frontier_domain::{
    GameError, GameResult, ItemId, Location, LocationId, Ship, ShipId, ShipStats, StackKey,
};
use frontier_store::{LocationBmc, ShipBmc};
use serde::Serialize;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::info;

pub const BASELINE_SHIP_ID: &str = "shipyard_starter";

/// Look up a location that may host ships and inventory.
pub async fn require_buildable_location(
    conn: &mut SqliteConnection,
    location_id: &LocationId,
) -> GameResult<Location> {
    if location_id.0.trim().is_empty() {
        return Err(GameError::validation("location_id is required"));
    }
    let location = LocationBmc::get(&mut *conn, location_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("location '{location_id}'")))?;
    if location.is_group {
        return Err(GameError::validation(
            "location_id must be a non-group location",
        ));
    }
    Ok(location)
}

/// Stats preview for a hypothetical build; nothing is consumed.
pub async fn preview(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    item_ids: &[ItemId],
    source_location_id: &LocationId,
    current_fuel_kg: Option<f64>,
) -> GameResult<ShipStats> {
    require_buildable_location(&mut *conn, source_location_id).await?;
    let parts = parts_from_item_ids(registry, item_ids);
    Ok(derive_ship_stats(registry, &parts, current_fuel_kg))
}

pub fn slugify_ship_id(raw: &str) -> String {
    let slug: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let slug = slug.split('_').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("_");
    if slug.is_empty() {
        "ship".to_string()
    } else {
        slug
    }
}

pub async fn next_available_ship_id(
    conn: &mut SqliteConnection,
    preferred: &str,
) -> Result<ShipId> {
    let base = slugify_ship_id(preferred);
    let mut candidate = base.clone();
    let mut suffix = 2;
    while ShipBmc::exists(&mut *conn, &ShipId(candidate.clone())).await? {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    Ok(ShipId(candidate))
}

/// Build a ship at a location from its part inventory. Consumption is
/// all-or-nothing; fuel is drawn from the location's water stack up to the
/// new hull's capacity.
pub async fn build_ship(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    registry: &CatalogRegistry,
    name: &str,
    item_ids: &[ItemId],
    source_location_id: &LocationId,
) -> GameResult<Ship> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::validation("ship name is required"));
    }
    if item_ids.is_empty() {
        return Err(GameError::validation("at least one part is required"));
    }
    require_buildable_location(&mut *conn, source_location_id).await?;

    let now = clock.now_s();
    let mut parts =
        consume_parts_by_item_ids(&mut *conn, registry, source_location_id, item_ids, now)
            .await?;

    let capacity = derive_ship_stats(registry, &parts, None).fuel_capacity_kg;
    let fuel_kg = if capacity > 0.0 {
        let drawn = consume_resource_mass(
            &mut *conn,
            source_location_id,
            &StackKey(FUEL_RESOURCE_ID.to_string()),
            capacity,
            now,
        )
        .await;
        match drawn {
            Ok(mass) => mass,
            // no water stacked here; the hull launches dry
            Err(GameError::NotFound(_)) => 0.0,
            Err(err) => return Err(err),
        }
    } else {
        0.0
    };

    harden_ship_parts(registry, &mut parts, fuel_kg);
    let stats = derive_ship_stats(registry, &parts, Some(fuel_kg));

    let ship = Ship {
        id: next_available_ship_id(&mut *conn, name).await?,
        name: name.to_string(),
        shape: "triangle".to_string(),
        color: "#ffffff".to_string(),
        size_px: 12,
        notes: vec![],
        location_id: Some(source_location_id.clone()),
        transit: None,
        parts,
        fuel_kg: stats.fuel_kg,
        fuel_capacity_kg: stats.fuel_capacity_kg,
        dry_mass_kg: stats.dry_mass_kg,
        isp_s: stats.isp_s,
    };
    ShipBmc::insert(&mut *conn, &ship).await?;
    info!(ship = %ship.id, location = %source_location_id, parts = ship.parts.len(), "ship built");
    Ok(ship)
}

#[derive(Serialize, Debug, Clone)]
pub struct DeconstructReport {
    pub ship_id: ShipId,
    pub location_id: LocationId,
    pub parts_returned: usize,
    pub fuel_returned_kg: f64,
    pub ship_record_kept: bool,
}

/// Tear a docked ship down into its location's inventory. The hull record
/// can be kept (emptied) for the edit flow or deleted outright.
pub async fn deconstruct_ship(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    registry: &CatalogRegistry,
    ship_id: &ShipId,
    keep_ship_record: bool,
) -> GameResult<DeconstructReport> {
    let now = clock.now_s();
    ShipBmc::settle_arrivals(&mut *conn, now).await?;

    let ship = ShipBmc::get(&mut *conn, ship_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("ship '{ship_id}'")))?;
    let location_id = ship
        .docked_at()
        .cloned()
        .ok_or_else(|| GameError::NotDocked(ship_id.clone()))?;

    // containers go back empty; their cargo returns as loose resource mass
    let mut parts = ship.parts.clone();
    for part in &mut parts {
        if let Some(tank) = part.storage_mut() {
            tank.fill = None;
        }
    }

    for part in &parts {
        add_part_to_location(&mut *conn, registry, &location_id, part, 1.0, now).await?;
    }
    if ship.fuel_kg > 0.0 {
        add_resource_to_location(
            &mut *conn,
            registry,
            &location_id,
            &frontier_domain::ResourceId(FUEL_RESOURCE_ID.to_string()),
            ship.fuel_kg,
            now,
        )
        .await?;
    }

    if keep_ship_record {
        ShipBmc::update_loadout(&mut *conn, ship_id, &[], 0.0, 0.0, 0.0, 0.0).await?;
    } else {
        ShipBmc::delete(&mut *conn, ship_id).await?;
    }

    info!(
        ship = %ship_id,
        location = %location_id,
        kept = keep_ship_record,
        "ship deconstructed"
    );
    Ok(DeconstructReport {
        ship_id: ship_id.clone(),
        location_id,
        parts_returned: ship.parts.len(),
        fuel_returned_kg: ship.fuel_kg,
        ship_record_kept: keep_ship_record,
    })
}

/// Guarantee the starter hull exists at LEO, repairing its loadout and
/// derived stats when it already does.
pub async fn ensure_baseline_ship(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
) -> Result<()> {
    // retired legacy fixture hull
    ShipBmc::delete(&mut *conn, &ShipId("artemis_iii".to_string())).await?;

    let starter_parts = normalize_parts(
        registry,
        &[
            json!({ "item_id": "ntr_m2_dumbo_folded_flow" }),
            json!({ "name": "Radiator", "type": "radiator", "mass_kg": 2000.0 }),
            json!({ "item_id": "water_tank_10_m3" }),
        ],
    );
    let starter_id = ShipId(BASELINE_SHIP_ID.to_string());

    match ShipBmc::get(&mut *conn, &starter_id).await? {
        None => {
            let mut parts = starter_parts;
            let stats = derive_ship_stats(registry, &parts, Some(10_000.0));
            harden_ship_parts(registry, &mut parts, stats.fuel_kg);
            let ship = Ship {
                id: starter_id,
                name: "Shipyard Starter".to_string(),
                shape: "triangle".to_string(),
                color: "#ffffff".to_string(),
                size_px: 12,
                notes: vec!["Shipyard baseline hull".to_string()],
                location_id: Some(LocationId::new("LEO")),
                transit: None,
                parts,
                fuel_kg: stats.fuel_kg,
                fuel_capacity_kg: stats.fuel_capacity_kg,
                dry_mass_kg: stats.dry_mass_kg,
                isp_s: stats.isp_s,
            };
            ShipBmc::insert(&mut *conn, &ship).await?;
        }
        Some(existing) => {
            let mut parts = starter_parts;
            let stats = derive_ship_stats(registry, &parts, Some(existing.fuel_kg));
            harden_ship_parts(registry, &mut parts, stats.fuel_kg);
            ShipBmc::update_loadout(
                &mut *conn,
                &existing.id,
                &parts,
                stats.fuel_kg,
                stats.fuel_capacity_kg,
                stats.dry_mass_kg,
                stats.isp_s,
            )
            .await?;
        }
    }
    Ok(())
}

#[derive(Serialize, Debug, Clone)]
pub struct ShipyardCatalogItem {
    pub item_id: ItemId,
    pub name: String,
    pub category: String,
    pub mass_kg: f64,
    pub tech_level: f64,
}

#[derive(Serialize, Debug, Clone)]
pub struct ShipyardCatalog {
    pub parts: Vec<ShipyardCatalogItem>,
    pub build_source_locations: Vec<LocationId>,
}

pub async fn shipyard_catalog(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
) -> Result<ShipyardCatalog> {
    let mut parts = Vec::new();
    for kind in CatalogKind::part_kinds() {
        for (item_id, record) in registry.catalog(kind) {
            parts.push(ShipyardCatalogItem {
                item_id: item_id.clone(),
                name: record.name_or(&item_id.0),
                category: kind.category().to_string(),
                mass_kg: record.mass_kg(),
                tech_level: record.tech_level(),
            });
        }
    }
    parts.sort_by(|a, b| (&a.category, &a.item_id).cmp(&(&b.category, &b.item_id)));

    let build_source_locations = LocationBmc::non_group_ids(&mut *conn).await?;
    Ok(ShipyardCatalog {
        parts,
        build_source_locations,
    })
}

/// A ship with every derived view a client needs: stats, containers, the
/// per-resource rollup, and the capacity summary. The container-hardening
/// migration runs here on load; a changed loadout is written back.
#[derive(Serialize, Debug, Clone)]
pub struct ShipView {
    #[serde(flatten)]
    pub ship: Ship,
    pub stats: ShipStats,
    pub containers: Vec<ContainerRow>,
    pub resources: Vec<ShipResourceRollup>,
    pub capacity_summary: CapacitySummary,
}

pub async fn load_ship_view(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    ship_id: &ShipId,
) -> GameResult<ShipView> {
    let ship = ShipBmc::get(&mut *conn, ship_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("ship '{ship_id}'")))?;
    Ok(ship_view_of(conn, registry, ship).await?)
}

pub async fn fleet_state(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    now_s: f64,
) -> Result<Vec<ShipView>> {
    ShipBmc::settle_arrivals(&mut *conn, now_s).await?;
    let ships = ShipBmc::list(&mut *conn).await?;
    let mut views = Vec::with_capacity(ships.len());
    for ship in ships {
        views.push(ship_view_of(&mut *conn, registry, ship).await?);
    }
    Ok(views)
}

async fn ship_view_of(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    ship: Ship,
) -> Result<ShipView> {
    let mut parts = renormalize(registry, &ship.parts);
    let hardened = harden_ship_parts(registry, &mut parts, ship.fuel_kg);
    let stats = derive_ship_stats(registry, &parts, Some(ship.fuel_kg));
    if hardened {
        ShipBmc::update_loadout(
            &mut *conn,
            &ship.id,
            &parts,
            stats.fuel_kg,
            stats.fuel_capacity_kg,
            stats.dry_mass_kg,
            stats.isp_s,
        )
        .await?;
    }

    let containers = ship_containers(registry, &parts);
    let resources = ship_resource_rollup(&containers);
    let summary = capacity_summary(&containers);
    Ok(ShipView {
        ship: Ship { parts, ..ship },
        stats,
        containers,
        resources,
        capacity_summary: summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost;
    use crate::graph::seed_locations_and_edges_if_empty;
    use crate::sim_clock::FakeClock;
    use frontier_domain::{OrgId, Organization};
    use frontier_store::{connect_in_memory, OrgBmc};

    #[test]
    fn ship_id_slugs_are_stable() {
        assert_eq!(slugify_ship_id("ISV Venture Star!"), "isv_venture_star");
        assert_eq!(slugify_ship_id("  "), "ship");
        assert_eq!(slugify_ship_id("--__--"), "ship");
    }

    #[tokio::test]
    async fn boost_then_build_then_deconstruct_roundtrip() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let registry = CatalogRegistry::builtin();
        let clock = FakeClock::at(0.0);
        seed_locations_and_edges_if_empty(&mut conn).await.unwrap();

        let org = Organization {
            id: OrgId("org-yard".to_string()),
            name: "Yard Org".to_string(),
            balance_usd: 5_000_000_000.0,
            research_points: 0.0,
            last_settled_at: 0.0,
            created_at: 0.0,
        };
        OrgBmc::insert(&mut conn, &org).await.unwrap();
        OrgBmc::insert_unlock(
            &mut conn,
            &frontier_domain::ResearchUnlock {
                org_id: org.id.clone(),
                tech_id: frontier_domain::TechId("thrusters_lvl_1".to_string()),
                unlocked_at: 0.0,
                cost_points: 0.0,
            },
        )
        .await
        .unwrap();

        let leo = LocationId::new("LEO");
        boost::boost(&mut conn, &clock, &registry, &org.id, &ItemId("ntr_m1_kiwi".to_string()), 1.0)
            .await
            .unwrap();
        boost::boost(
            &mut conn,
            &clock,
            &registry,
            &org.id,
            &ItemId("water_tank_10_m3".to_string()),
            1.0,
        )
        .await
        .unwrap();
        boost::boost(&mut conn, &clock, &registry, &org.id, &ItemId("water".to_string()), 5.0)
            .await
            .unwrap();

        let ship = build_ship(
            &mut conn,
            &clock,
            &registry,
            "Venture",
            &[
                ItemId("ntr_m1_kiwi".to_string()),
                ItemId("water_tank_10_m3".to_string()),
            ],
            &leo,
        )
        .await
        .unwrap();
        assert_eq!(ship.location_id, Some(leo.clone()));
        assert_eq!(ship.parts.len(), 2);
        // 5 m3 of boosted water fits inside the 10 t capacity
        assert!((ship.fuel_kg - 5_000.0).abs() < 1e-6);
        assert_eq!(ship.fuel_capacity_kg, 10_000.0);
        assert_eq!(ship.isp_s, 830.0);

        // parts were consumed from inventory: a second build must fail
        let err = build_ship(
            &mut conn,
            &clock,
            &registry,
            "Venture II",
            &[ItemId("ntr_m1_kiwi".to_string())],
            &leo,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameError::InsufficientInventory { .. }));

        let report = deconstruct_ship(&mut conn, &clock, &registry, &ship.id, false)
            .await
            .unwrap();
        assert_eq!(report.parts_returned, 2);
        assert!((report.fuel_returned_kg - 5_000.0).abs() < 1e-6);
        assert!(ShipBmc::get(&mut conn, &ship.id).await.unwrap().is_none());

        // and the parts are buildable again
        let rebuilt = build_ship(
            &mut conn,
            &clock,
            &registry,
            "Venture",
            &[
                ItemId("ntr_m1_kiwi".to_string()),
                ItemId("water_tank_10_m3".to_string()),
            ],
            &leo,
        )
        .await
        .unwrap();
        // the deleted hull freed its slug
        assert_eq!(rebuilt.id.0, "venture");
    }

    #[tokio::test]
    async fn baseline_ship_is_created_and_repaired() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let registry = CatalogRegistry::builtin();
        seed_locations_and_edges_if_empty(&mut conn).await.unwrap();

        ensure_baseline_ship(&mut conn, &registry).await.unwrap();
        let starter = ShipBmc::get(&mut conn, &ShipId(BASELINE_SHIP_ID.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(starter.location_id, Some(LocationId::new("LEO")));
        assert_eq!(starter.fuel_kg, 10_000.0);
        assert_eq!(starter.isp_s, 900.0);

        // idempotent, and preserves the (clamped) fuel load
        ensure_baseline_ship(&mut conn, &registry).await.unwrap();
        let again = ShipBmc::get(&mut conn, &ShipId(BASELINE_SHIP_ID.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.fuel_kg, 10_000.0);
    }
}
