use crate::router;
use crate::ship_stats::fuel_required_for_delta_v_kg;
use crate::sim_clock::GameClock;
use anyhow::Result;
use frontier_domain::{GameError, GameResult, LocationId, Ship, ShipId, Transit};
use frontier_store::ShipBmc;
use sqlx::SqliteConnection;
use tracing::info;

/// Send a docked ship along the least-Δv route to `to`. Debits the full
/// burn's fuel up front; the ship is then a pure function of its transit
/// fields until arrival settles.
pub async fn dispatch(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    ship_id: &ShipId,
    to: &LocationId,
) -> GameResult<Ship> {
    let now = clock.now_s();
    ShipBmc::settle_arrivals(&mut *conn, now).await?;

    let ship = ShipBmc::get(&mut *conn, ship_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("ship '{ship_id}'")))?;

    let from = ship
        .docked_at()
        .cloned()
        .ok_or_else(|| GameError::NotDocked(ship_id.clone()))?;

    if &from == to {
        return Err(GameError::validation(
            "destination matches the ship's current location",
        ));
    }

    let entry = router::route(&mut *conn, &from, to).await?;

    let required_kg = fuel_required_for_delta_v_kg(ship.dry_mass_kg, ship.isp_s, entry.dv_m_s)?;
    if required_kg > ship.fuel_kg {
        return Err(GameError::InsufficientFuel {
            need_kg: required_kg,
            have_kg: ship.fuel_kg,
        });
    }

    let transit = Transit {
        from_location_id: from.clone(),
        to_location_id: to.clone(),
        departed_at: now,
        arrives_at: now + entry.tof_s,
        path: entry.path.clone(),
    };
    let fuel_after = ship.fuel_kg - required_kg;
    ShipBmc::set_in_transit(&mut *conn, ship_id, &transit, fuel_after).await?;

    info!(
        ship = %ship_id,
        from = %from,
        to = %to,
        dv_m_s = entry.dv_m_s,
        fuel_burned_kg = required_kg,
        "ship dispatched"
    );

    ShipBmc::get(&mut *conn, ship_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("ship '{ship_id}'")))
}

/// Promote all due arrivals. Safe to call from any handler; repeated calls
/// are no-ops.
pub async fn settle_arrivals(conn: &mut SqliteConnection, now_s: f64) -> Result<u64> {
    ShipBmc::settle_arrivals(conn, now_s).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRegistry;
    use crate::graph::seed_locations_and_edges_if_empty;
    use crate::parts::normalize_parts;
    use crate::ship_stats::derive_ship_stats;
    use crate::sim_clock::FakeClock;
    use frontier_store::connect_in_memory;
    use serde_json::json;

    async fn docked_test_ship(
        conn: &mut sqlx::SqliteConnection,
        registry: &CatalogRegistry,
        fuel_kg: f64,
    ) -> Ship {
        let parts = normalize_parts(
            registry,
            &[
                json!({ "item_id": "ntr_m2_dumbo_folded_flow" }),
                json!({ "item_id": "water_tank_10_m3", "mass_kg": 2500.0 }),
            ],
        );
        let stats = derive_ship_stats(registry, &parts, Some(fuel_kg));
        let ship = Ship {
            id: ShipId("endeavour".to_string()),
            name: "Endeavour".to_string(),
            shape: "triangle".to_string(),
            color: "#ffffff".to_string(),
            size_px: 12,
            notes: vec![],
            location_id: Some(LocationId::new("LEO")),
            transit: None,
            parts,
            fuel_kg: stats.fuel_kg,
            fuel_capacity_kg: stats.fuel_capacity_kg,
            dry_mass_kg: stats.dry_mass_kg,
            isp_s: stats.isp_s,
        };
        ShipBmc::insert(conn, &ship).await.unwrap();
        ship
    }

    #[tokio::test]
    async fn dispatch_burns_fuel_and_arrival_settles() {
        let pool = connect_in_memory().await.unwrap();
        let registry = CatalogRegistry::builtin();
        let clock = FakeClock::at(1_000_000.0);
        let mut conn = pool.acquire().await.unwrap();

        seed_locations_and_edges_if_empty(&mut conn).await.unwrap();
        let ship = docked_test_ship(&mut conn, &registry, 2_000.0).await;
        // dry 5000, isp 900, edge LEO->HEO is 900 m/s over 7200 s
        assert_eq!(ship.dry_mass_kg, 5_000.0);

        let dispatched = dispatch(&mut conn, &clock, &ship.id, &LocationId::new("HEO"))
            .await
            .unwrap();
        let transit = dispatched.transit.clone().unwrap();
        assert_eq!(transit.arrives_at, 1_000_000.0 + 7_200.0);
        assert_eq!(transit.path, vec![LocationId::new("LEO"), LocationId::new("HEO")]);
        assert!(dispatched.location_id.is_none());
        let burned = 2_000.0 - dispatched.fuel_kg;
        let expected = 5_000.0 * ((900.0 / (900.0 * crate::ship_stats::G0)).exp() - 1.0);
        assert!((burned - expected).abs() < 1e-6, "burned {burned}");

        // not there yet
        clock.advance(7_199.0);
        settle_arrivals(&mut conn, clock.now_s()).await.unwrap();
        let mid = ShipBmc::get(&mut conn, &ship.id).await.unwrap().unwrap();
        assert!(mid.transit.is_some());

        clock.advance(1.0);
        settle_arrivals(&mut conn, clock.now_s()).await.unwrap();
        let arrived = ShipBmc::get(&mut conn, &ship.id).await.unwrap().unwrap();
        assert_eq!(arrived.location_id, Some(LocationId::new("HEO")));
        assert!(arrived.transit.is_none());

        // settling again is a no-op
        let settled = settle_arrivals(&mut conn, clock.now_s()).await.unwrap();
        assert_eq!(settled, 0);
    }

    #[tokio::test]
    async fn dispatch_guards_fire_in_order() {
        let pool = connect_in_memory().await.unwrap();
        let registry = CatalogRegistry::builtin();
        let clock = FakeClock::at(1_000_000.0);
        let mut conn = pool.acquire().await.unwrap();

        seed_locations_and_edges_if_empty(&mut conn).await.unwrap();
        let ship = docked_test_ship(&mut conn, &registry, 10.0).await;

        let err = dispatch(&mut conn, &clock, &ship.id, &LocationId::new("LEO"))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));

        let err = dispatch(&mut conn, &clock, &ship.id, &LocationId::new("HEO"))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InsufficientFuel { .. }));

        // burn the ship into transit with enough fuel, then re-dispatch
        ShipBmc::update_loadout(
            &mut conn,
            &ship.id,
            &ship.parts,
            2_000.0,
            ship.fuel_capacity_kg,
            ship.dry_mass_kg,
            ship.isp_s,
        )
        .await
        .unwrap();
        dispatch(&mut conn, &clock, &ship.id, &LocationId::new("HEO"))
            .await
            .unwrap();
        let err = dispatch(&mut conn, &clock, &ship.id, &LocationId::new("GEO"))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NotDocked(_)));
    }
}
