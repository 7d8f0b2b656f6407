use crate::catalog::{CatalogRegistry, FUEL_RESOURCE_ID};
use frontier_domain::{ContainerFill, GameError, GameResult, Part, ShipStats};
use uuid::Uuid;

/// Standard gravity, m/s^2.
pub const G0: f64 = 9.80665;

/// Rocket-equation derivations over a normalized parts list.
pub fn derive_ship_stats(
    registry: &CatalogRegistry,
    parts: &[Part],
    current_fuel_kg: Option<f64>,
) -> ShipStats {
    let dry_mass_kg: f64 = parts.iter().map(|p| p.mass_kg.max(0.0)).sum();

    let fuel_capacity_kg: f64 = parts
        .iter()
        .filter_map(Part::storage)
        .filter(|tank| tank.holds_resource(FUEL_RESOURCE_ID))
        .map(|tank| {
            let density = if tank.mass_per_m3_kg > 0.0 {
                tank.mass_per_m3_kg
            } else {
                registry.resource_density_kg_m3(FUEL_RESOURCE_ID)
            };
            tank.capacity_m3.max(0.0) * density
        })
        .sum();

    let fuel_kg = current_fuel_kg
        .unwrap_or(0.0)
        .clamp(0.0, fuel_capacity_kg.max(0.0));

    // Dominant thruster (highest thrust) sets the Isp; thrust adds up.
    let isp_s = parts
        .iter()
        .filter(|p| p.thrust_kn() > 0.0)
        .max_by(|a, b| a.thrust_kn().total_cmp(&b.thrust_kn()))
        .map(Part::isp_s)
        .unwrap_or(0.0);
    let thrust_kn: f64 = parts.iter().map(Part::thrust_kn).sum();

    let wet_mass_kg = dry_mass_kg + fuel_kg;
    let acceleration_gs = if wet_mass_kg > 0.0 {
        thrust_kn * 1000.0 / (wet_mass_kg * G0)
    } else {
        0.0
    };

    ShipStats {
        dry_mass_kg,
        fuel_capacity_kg,
        fuel_kg,
        isp_s,
        thrust_kn,
        wet_mass_kg,
        acceleration_gs,
        delta_v_remaining_m_s: delta_v_remaining_m_s(dry_mass_kg, fuel_kg, isp_s),
    }
}

pub fn wet_mass_kg(dry_mass_kg: f64, fuel_kg: f64) -> f64 {
    dry_mass_kg + fuel_kg
}

pub fn acceleration_gs(dry_mass_kg: f64, fuel_kg: f64, thrust_kn: f64) -> f64 {
    let wet = wet_mass_kg(dry_mass_kg, fuel_kg);
    if wet <= 0.0 {
        return 0.0;
    }
    thrust_kn * 1000.0 / (wet * G0)
}

pub fn delta_v_remaining_m_s(dry_mass_kg: f64, fuel_kg: f64, isp_s: f64) -> f64 {
    if dry_mass_kg <= 0.0 || fuel_kg <= 0.0 || isp_s <= 0.0 {
        return 0.0;
    }
    isp_s * G0 * ((dry_mass_kg + fuel_kg) / dry_mass_kg).ln()
}

/// Total burn mass to achieve `dv_m_s` starting from dry mass alone.
pub fn fuel_required_for_delta_v_kg(
    dry_mass_kg: f64,
    isp_s: f64,
    dv_m_s: f64,
) -> GameResult<f64> {
    if dv_m_s <= 0.0 {
        return Ok(0.0);
    }
    if isp_s <= 0.0 {
        return Err(GameError::InsufficientIsp { dv_m_s });
    }
    Ok(dry_mass_kg.max(0.0) * ((dv_m_s / (isp_s * G0)).exp() - 1.0))
}

/// Additional fuel needed beyond the current load, clamped at zero.
pub fn fuel_needed_for_delta_v_kg(
    dry_mass_kg: f64,
    fuel_kg: f64,
    isp_s: f64,
    dv_m_s: f64,
) -> GameResult<f64> {
    let required = fuel_required_for_delta_v_kg(dry_mass_kg, isp_s, dv_m_s)?;
    Ok((required - fuel_kg.max(0.0)).max(0.0))
}

/// One-shot migration of pre-container inline fuel state onto explicit
/// per-tank fill. Water tanks with capacity but no explicit fill absorb the
/// ship-level `fuel_kg` proportionally by capacity. Returns whether any
/// part changed so callers know to persist.
pub fn harden_ship_parts(
    registry: &CatalogRegistry,
    parts: &mut [Part],
    fuel_kg: f64,
) -> bool {
    let mut changed = false;
    let water_density = registry.resource_density_kg_m3(FUEL_RESOURCE_ID);

    for part in parts.iter_mut() {
        if let Some(tank) = part.storage_mut() {
            if tank.container_uid.trim().is_empty() {
                tank.container_uid = Uuid::new_v4().to_string();
                changed = true;
            }
        }
    }

    // Pass 1: total capacity of legacy (fill-less) water tanks.
    let mut legacy_capacity_kg = 0.0;
    for part in parts.iter() {
        if let Some(tank) = part.storage() {
            if tank.holds_resource(FUEL_RESOURCE_ID)
                && tank.capacity_m3 > 0.0
                && tank.fill.is_none()
            {
                let density = if tank.mass_per_m3_kg > 0.0 {
                    tank.mass_per_m3_kg
                } else {
                    water_density
                };
                if density > 0.0 {
                    legacy_capacity_kg += tank.capacity_m3 * density;
                }
            }
        }
    }

    if legacy_capacity_kg <= 0.0 {
        return changed;
    }

    // Pass 2: distribute the inline fuel across those tanks by capacity.
    let ratio = (fuel_kg.max(0.0) / legacy_capacity_kg).clamp(0.0, 1.0);
    for part in parts.iter_mut() {
        if let Some(tank) = part.storage_mut() {
            if tank.holds_resource(FUEL_RESOURCE_ID)
                && tank.capacity_m3 > 0.0
                && tank.fill.is_none()
            {
                let density = if tank.mass_per_m3_kg > 0.0 {
                    tank.mass_per_m3_kg
                } else {
                    water_density
                };
                if density <= 0.0 {
                    continue;
                }
                if tank.mass_per_m3_kg <= 0.0 {
                    tank.mass_per_m3_kg = density;
                }
                let used_m3 = tank.capacity_m3 * ratio;
                tank.fill = Some(ContainerFill {
                    used_m3,
                    cargo_mass_kg: used_m3 * density,
                });
                changed = true;
            }
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::normalize_parts;
    use serde_json::json;

    fn registry() -> CatalogRegistry {
        CatalogRegistry::builtin()
    }

    fn test_parts(registry: &CatalogRegistry) -> Vec<Part> {
        normalize_parts(
            registry,
            &[
                json!({ "item_id": "ntr_m2_dumbo_folded_flow" }),
                json!({ "item_id": "ntr_m1_kiwi" }),
                json!({ "item_id": "water_tank_10_m3" }),
            ],
        )
    }

    #[test]
    fn wet_mass_is_dry_plus_fuel() {
        assert_eq!(wet_mass_kg(1000.0, 500.0), 1500.0);
        assert_eq!(wet_mass_kg(0.0, 0.0), 0.0);
    }

    #[test]
    fn derive_stats_sums_and_clamps() {
        let registry = registry();
        let parts = test_parts(&registry);
        // dry = 2500 + 2000 + 500, capacity = 10 m3 of water
        let stats = derive_ship_stats(&registry, &parts, Some(50_000.0));
        assert_eq!(stats.dry_mass_kg, 5000.0);
        assert_eq!(stats.fuel_capacity_kg, 10_000.0);
        assert_eq!(stats.fuel_kg, 10_000.0);
        assert_eq!(stats.thrust_kn, 400.0);
        // dominant thruster is the Dumbo at 250 kN
        assert_eq!(stats.isp_s, 900.0);
        assert_eq!(stats.wet_mass_kg, 15_000.0);
        assert!(stats.acceleration_gs > 0.0);
        assert!(stats.delta_v_remaining_m_s > 0.0);
    }

    #[test]
    fn delta_v_is_zero_without_dry_mass_or_fuel() {
        assert_eq!(delta_v_remaining_m_s(0.0, 100.0, 900.0), 0.0);
        assert_eq!(delta_v_remaining_m_s(1000.0, 0.0, 900.0), 0.0);
        assert_eq!(delta_v_remaining_m_s(1000.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn fuel_required_matches_rocket_equation() {
        // isp 900, dry 5000, dv 900: 5000 * (e^(900/(900*g0)) - 1)
        let required = fuel_required_for_delta_v_kg(5000.0, 900.0, 900.0).unwrap();
        let expected = 5000.0 * ((900.0 / (900.0 * G0)).exp() - 1.0);
        assert!((required - expected).abs() < 1e-9, "got {required}");
        assert!((required - 536.8).abs() < 1.0, "got {required}");
    }

    #[test]
    fn fuel_needed_clamps_at_zero_and_flags_zero_isp() {
        let needed = fuel_needed_for_delta_v_kg(5000.0, 10_000.0, 900.0, 900.0).unwrap();
        assert_eq!(needed, 0.0);

        let err = fuel_needed_for_delta_v_kg(5000.0, 0.0, 0.0, 900.0).unwrap_err();
        assert!(matches!(err, GameError::InsufficientIsp { .. }));

        assert_eq!(
            fuel_needed_for_delta_v_kg(5000.0, 0.0, 0.0, 0.0).unwrap(),
            0.0
        );
    }

    #[test]
    fn hardening_distributes_fuel_by_capacity_once() {
        let registry = registry();
        let mut parts = normalize_parts(
            &registry,
            &[
                json!({ "item_id": "water_tank_10_m3" }),
                json!({ "item_id": "water_tank_40_m3" }),
            ],
        );
        let changed = harden_ship_parts(&registry, &mut parts, 25_000.0);
        assert!(changed);

        let fills: Vec<ContainerFill> = parts
            .iter()
            .filter_map(|p| p.storage().and_then(|t| t.fill))
            .collect();
        assert_eq!(fills.len(), 2);
        // half full: 25 t into 50 t of capacity
        assert!((fills[0].used_m3 - 5.0).abs() < 1e-9);
        assert!((fills[1].used_m3 - 20.0).abs() < 1e-9);
        assert!((fills[0].cargo_mass_kg + fills[1].cargo_mass_kg - 25_000.0).abs() < 1e-6);

        // second pass is a no-op: fills are now explicit
        let changed_again = harden_ship_parts(&registry, &mut parts, 25_000.0);
        assert!(!changed_again);
    }

    #[test]
    fn hardening_caps_overfull_tanks_at_capacity() {
        let registry = registry();
        let mut parts = normalize_parts(&registry, &[json!({ "item_id": "water_tank_10_m3" })]);
        harden_ship_parts(&registry, &mut parts, 99_000.0);
        let fill = parts[0].storage().unwrap().fill.unwrap();
        assert_eq!(fill.used_m3, 10.0);
        assert_eq!(fill.cargo_mass_kg, 10_000.0);
    }
}
