use anyhow::Result;
use frontier_domain::{ItemCategory, ItemId};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The fuel the stats engine tracks capacity for. Water in the base catalog.
pub const FUEL_RESOURCE_ID: &str = "water";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum CatalogKind {
    Thrusters,
    Reactors,
    Generators,
    Radiators,
    Refineries,
    Robonauts,
    Constructors,
    Storage,
    Resources,
    Recipes,
}

impl CatalogKind {
    /// Kinds whose records describe installable ship parts.
    pub fn part_kinds() -> [CatalogKind; 8] {
        [
            CatalogKind::Thrusters,
            CatalogKind::Reactors,
            CatalogKind::Generators,
            CatalogKind::Radiators,
            CatalogKind::Refineries,
            CatalogKind::Robonauts,
            CatalogKind::Constructors,
            CatalogKind::Storage,
        ]
    }

    pub fn category(&self) -> ItemCategory {
        match self {
            CatalogKind::Thrusters => ItemCategory::Thruster,
            CatalogKind::Reactors => ItemCategory::Reactor,
            CatalogKind::Generators => ItemCategory::Generator,
            CatalogKind::Radiators => ItemCategory::Radiator,
            CatalogKind::Refineries => ItemCategory::Refinery,
            CatalogKind::Robonauts => ItemCategory::Robonaut,
            CatalogKind::Constructors => ItemCategory::Constructor,
            CatalogKind::Storage => ItemCategory::Storage,
            CatalogKind::Resources => ItemCategory::RawMaterial,
            CatalogKind::Recipes => ItemCategory::Generic,
        }
    }
}

/// One catalog entry: an open dictionary of primitive fields. Unknown keys
/// pass through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogRecord(pub Map<String, Value>);

impl CatalogRecord {
    pub fn from_value(value: Value) -> CatalogRecord {
        match value {
            Value::Object(map) => CatalogRecord(map),
            _ => CatalogRecord(Map::new()),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn name_or(&self, fallback: &str) -> String {
        self.get_str("name")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    pub fn tech_level(&self) -> f64 {
        self.get_f64("tech_level").unwrap_or(1.0)
    }

    pub fn mass_kg(&self) -> f64 {
        self.get_f64("mass_kg")
            .or_else(|| self.get_f64("dry_mass_kg"))
            .unwrap_or(0.0)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Inbound catalog contract: the loader layer (files, fixtures) implements
/// this; the kernel only ever sees the maps.
pub trait CatalogSource {
    fn load(&self, kind: CatalogKind) -> Result<HashMap<ItemId, CatalogRecord>>;
}

/// Immutable catalog state, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct CatalogRegistry {
    by_kind: HashMap<CatalogKind, HashMap<ItemId, CatalogRecord>>,
}

impl CatalogRegistry {
    pub fn load(source: &dyn CatalogSource) -> Result<CatalogRegistry> {
        let mut by_kind = HashMap::new();
        for kind in CatalogKind::iter() {
            by_kind.insert(kind, source.load(kind)?);
        }
        Ok(CatalogRegistry { by_kind })
    }

    /// Registry over the built-in seed data. Infallible by construction.
    pub fn builtin() -> CatalogRegistry {
        CatalogRegistry::load(&BuiltinCatalogSource)
            .unwrap_or_else(|_| CatalogRegistry {
                by_kind: HashMap::new(),
            })
    }

    pub fn catalog(&self, kind: CatalogKind) -> &HashMap<ItemId, CatalogRecord> {
        static EMPTY: std::sync::OnceLock<HashMap<ItemId, CatalogRecord>> =
            std::sync::OnceLock::new();
        self.by_kind
            .get(&kind)
            .unwrap_or_else(|| EMPTY.get_or_init(HashMap::new))
    }

    pub fn resource(&self, resource_id: &str) -> Option<&CatalogRecord> {
        self.catalog(CatalogKind::Resources)
            .get(&ItemId(resource_id.to_string()))
    }

    pub fn resource_density_kg_m3(&self, resource_id: &str) -> f64 {
        self.resource(resource_id)
            .and_then(|r| r.get_f64("mass_per_m3_kg"))
            .unwrap_or(0.0)
            .max(0.0)
    }

    /// Find a part record by item id, searching the part catalogs in a
    /// fixed order.
    pub fn lookup_part(&self, item_id: &ItemId) -> Option<(CatalogKind, &CatalogRecord)> {
        CatalogKind::part_kinds()
            .into_iter()
            .find_map(|kind| self.catalog(kind).get(item_id).map(|record| (kind, record)))
    }

    pub fn canonical_item_category(&self, raw: &str) -> ItemCategory {
        ItemCategory::canonical(raw)
    }
}

/// Built-in seed catalogs. The production deployment layers file-backed
/// catalogs on top; these keep the kernel usable (and testable) without any
/// external configuration.
pub struct BuiltinCatalogSource;

impl CatalogSource for BuiltinCatalogSource {
    fn load(&self, kind: CatalogKind) -> Result<HashMap<ItemId, CatalogRecord>> {
        let seed = match kind {
            CatalogKind::Thrusters => json!({
                "ntr_m1_kiwi": {
                    "name": "NTR M1 Kiwi",
                    "thrust_kn": 150.0,
                    "isp_s": 830.0,
                    "mass_kg": 2000.0,
                    "tech_level": 1,
                },
                "ntr_m2_dumbo_folded_flow": {
                    "name": "NTR M2 Dumbo (Folded Flow)",
                    "thrust_kn": 250.0,
                    "isp_s": 900.0,
                    "mass_kg": 2500.0,
                    "tech_level": 1,
                },
                "solar_moth_m1": {
                    "name": "Solar Moth M1",
                    "thrust_kn": 4.0,
                    "isp_s": 700.0,
                    "mass_kg": 600.0,
                    "tech_level": 1.5,
                },
            }),
            CatalogKind::Reactors => json!({
                "fission_core_a1": {
                    "name": "Fission Core A1",
                    "thermal_mw": 50.0,
                    "mass_kg": 1500.0,
                    "tech_level": 1,
                },
                "fission_core_b2": {
                    "name": "Fission Core B2",
                    "thermal_mw": 180.0,
                    "mass_kg": 3600.0,
                    "tech_level": 2,
                },
            }),
            CatalogKind::Generators => json!({
                "brayton_loop_g1": {
                    "name": "Brayton Loop G1",
                    "power_mw": 10.0,
                    "mass_kg": 800.0,
                    "tech_level": 1,
                },
            }),
            CatalogKind::Radiators => json!({
                "radiator_wing_r1": {
                    "name": "Radiator Wing R1",
                    "thermal_mw": 30.0,
                    "mass_kg": 2000.0,
                    "tech_level": 1,
                },
            }),
            CatalogKind::Refineries => json!({
                "refinery_lithic_mk1": {
                    "name": "Lithic Refinery Mk1",
                    "mass_kg": 8000.0,
                    "tech_level": 2,
                    "branch": "lithic_processing",
                },
            }),
            CatalogKind::Robonauts => json!({
                "robonaut_scout_mk1": {
                    "name": "Robonaut Scout Mk1",
                    "mass_kg": 1200.0,
                    "tech_level": 1,
                },
            }),
            CatalogKind::Constructors => json!({
                "constructor_crawler_mk1": {
                    "name": "Constructor Crawler Mk1",
                    "mass_kg": 5000.0,
                    "tech_level": 2,
                },
            }),
            CatalogKind::Storage => json!({
                "water_tank_10_m3": {
                    "name": "Water Tank (10 m3)",
                    "capacity_m3": 10.0,
                    "mass_per_m3_kg": 1000.0,
                    "resource_id": "water",
                    "mass_kg": 500.0,
                    "tech_level": 1,
                },
                "water_tank_40_m3": {
                    "name": "Water Tank (40 m3)",
                    "capacity_m3": 40.0,
                    "mass_per_m3_kg": 1000.0,
                    "resource_id": "water",
                    "mass_kg": 1600.0,
                    "tech_level": 1,
                },
                "dry_hold_20_m3": {
                    "name": "Dry Hold (20 m3)",
                    "capacity_m3": 20.0,
                    "mass_kg": 800.0,
                    "tech_level": 1,
                },
            }),
            CatalogKind::Resources => json!({
                "water": {
                    "name": "Water",
                    "mass_per_m3_kg": 1000.0,
                },
                "iron_oxide": {
                    "name": "Iron Oxide",
                    "mass_per_m3_kg": 5200.0,
                },
                "silica": {
                    "name": "Silica",
                    "mass_per_m3_kg": 2650.0,
                },
                "regolith": {
                    "name": "Regolith",
                    "mass_per_m3_kg": 1500.0,
                },
            }),
            CatalogKind::Recipes => json!({
                "refine_silica_glass": {
                    "name": "Refine Silica Glass",
                    "inputs": { "silica": 1.0 },
                    "outputs": { "glass": 0.9 },
                    "refinery_branch": "lithic_processing",
                },
            }),
        };

        let map = match seed {
            Value::Object(entries) => entries
                .into_iter()
                .map(|(id, record)| (ItemId(id), CatalogRecord::from_value(record)))
                .collect(),
            _ => HashMap::new(),
        };
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_loads_every_kind() {
        let registry = CatalogRegistry::builtin();
        for kind in CatalogKind::iter() {
            assert!(
                !registry.catalog(kind).is_empty(),
                "no seed data for {kind}"
            );
        }
    }

    #[test]
    fn lookup_part_searches_all_part_catalogs() {
        let registry = CatalogRegistry::builtin();
        let (kind, record) = registry
            .lookup_part(&ItemId("water_tank_10_m3".to_string()))
            .unwrap();
        assert_eq!(kind, CatalogKind::Storage);
        assert_eq!(record.get_f64("capacity_m3"), Some(10.0));

        assert!(registry.lookup_part(&ItemId("nonexistent".to_string())).is_none());
    }

    #[test]
    fn resource_density_falls_back_to_zero() {
        let registry = CatalogRegistry::builtin();
        assert_eq!(registry.resource_density_kg_m3("water"), 1000.0);
        assert_eq!(registry.resource_density_kg_m3("unobtainium"), 0.0);
    }
}
